use std::str::FromStr;

use anyhow::{Error, Result};
use clap::{arg, Arg, ArgAction, ArgMatches, Command};

use musicpreneur::auth::hash_password;
use musicpreneur::user::{self, Access};
use musicpreneur::{Database, ProductId, User};

pub fn cmd() -> Command {
    Command::new("user")
        .subcommand_required(true)
        .display_order(10)
        .about("Inspect and manipulate users")
        .subcommand(Command::new("list").about("Lists all users"))
        .subcommand(
            Command::new("show")
                .arg_required_else_help(true)
                .about("Shows user with the provided email")
                .arg(arg!(<email> "User email")),
        )
        .subcommand(
            Command::new("add")
                .arg_required_else_help(true)
                .about("Adds new user")
                .arg(arg!(<email> "User email"))
                .arg(arg!(--first_name <first_name> "User first name").required(true))
                .arg(arg!(--last_name [last_name] "User last name"))
                .arg(
                    Arg::new("no_password")
                        .long("no-password")
                        .action(ArgAction::SetTrue)
                        .help("Don't prompt for a password"),
                ),
        )
        .subcommand(
            Command::new("grant")
                .arg_required_else_help(true)
                .about("Grants product access to the user")
                .arg(arg!(<email> "User email"))
                .arg(arg!(<product> "Product id, e.g. guide or planner")),
        )
}

fn find(db: &Database, email: &str) -> Result<User> {
    user::find_by_email(db, email)?
        .ok_or_else(|| Error::msg(format!("user not found: {email}")))
}

pub async fn run(matches: &ArgMatches, db: &Database) -> Result<()> {
    match matches.subcommand() {
        Some(("list", _)) => {
            let mut users = db.get_collection::<User>()?;
            users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            println!("Found {} user(s):", users.len());
            for u in users {
                println!(
                    "{} {} guide: {} planner: {} collective: {}",
                    u.id, u.email, u.owns_guide, u.owns_planner, u.is_collective_member
                );
            }
        }
        Some(("show", m)) => {
            let email = m.get_one::<String>("email").cloned().unwrap_or_default();
            let user = find(db, &email)?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Some(("add", m)) => {
            // email and first name are always provided
            let email = m.get_one::<String>("email").cloned().unwrap_or_default();
            let first_name = m.get_one::<String>("first_name").cloned().unwrap_or_default();

            let mut new_user = User::new(&email, &first_name);
            new_user.last_name = m.get_one::<String>("last_name").cloned();
            if !m.get_flag("no_password") {
                let password = rpassword::prompt_password("Password: ")?;
                new_user.password_hash = Some(hash_password(&password)?);
            }
            user::create(db, &new_user)?;
            println!("Added new user {} ({})", new_user.email, new_user.id);
        }
        Some(("grant", m)) => {
            let email = m.get_one::<String>("email").cloned().unwrap_or_default();
            let product = m.get_one::<String>("product").cloned().unwrap_or_default();
            let product = ProductId::from_str(&product)
                .map_err(|_| Error::msg(format!("unknown product: {product}")))?;

            let target = find(db, &email)?;
            if user::grant_access(db, target.id, Access::for_product(product))?.is_changed() {
                println!("Granted {product} to {email}");
            } else {
                println!("{email} already has access to {product}");
            }
        }
        _ => unreachable!("subcommand is required"),
    }
    Ok(())
}
