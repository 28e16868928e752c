use anyhow::Result;
use clap::{arg, ArgMatches, Command};

use musicpreneur::email::list;
use musicpreneur::Database;

pub fn cmd() -> Command {
    Command::new("subscriber")
        .subcommand_required(true)
        .display_order(30)
        .about("Manage the mailing list")
        .subcommand(
            Command::new("export")
                .about("Exports current subscribers as csv")
                .arg(arg!(-o --output [path] "Write to file instead of stdout")),
        )
        .subcommand(
            Command::new("unsubscribe")
                .arg_required_else_help(true)
                .about("Removes the address from the mailing list")
                .arg(arg!(<email> "Subscriber email")),
        )
}

pub async fn run(matches: &ArgMatches, db: &Database) -> Result<()> {
    match matches.subcommand() {
        Some(("export", m)) => {
            let csv = list::export_csv(db)?;
            match m.get_one::<String>("output") {
                Some(path) => {
                    tokio::fs::write(path, csv).await?;
                    println!("Exported subscribers to {path}");
                }
                None => print!("{csv}"),
            }
        }
        Some(("unsubscribe", m)) => {
            let email = m.get_one::<String>("email").cloned().unwrap_or_default();
            if list::unsubscribe(db, &email)? {
                println!("Unsubscribed {email}");
            } else {
                println!("{email} is not on the list");
            }
        }
        _ => unreachable!("subcommand is required"),
    }
    Ok(())
}
