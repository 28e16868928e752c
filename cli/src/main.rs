mod application;
mod serve;
mod subscriber;
mod user;

use std::time::Duration;

use clap::{Arg, Command};
use musicpreneur::{config, Config, Database};
use tokio_util::sync::CancellationToken;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    // Config file at the default location is used unless another path is
    // provided with the `--config` argument.
    let matches = cmd().get_matches();
    let mut config: Config = match matches.get_one::<String>("config") {
        Some(path) => config::load_from(path)?,
        None => config::load().unwrap_or_default(),
    };
    if let Some(level) = matches.get_one::<String>("verbosity") {
        config.tracing.level = level.parse()?;
    }

    match matches.subcommand() {
        Some(("serve", _)) => serve::run(config, cancel.clone()).await?,
        Some(("user", m)) => return user::run(m, &open_db(&config)?).await,
        Some(("application", m)) => return application::run(m, &config, &open_db(&config)?).await,
        Some(("subscriber", m)) => return subscriber::run(m, &open_db(&config)?).await,
        _ => unreachable!("subcommand is required"),
    }

    // Wait for either ctrl_c signal or message from within server task(s)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("Initiating graceful shutdown...");
            cancel.cancel();
        },
        _ = cancel.cancelled() => {},
    }

    tokio::time::sleep(Duration::from_millis(300)).await;

    Ok(())
}

fn open_db(config: &Config) -> anyhow::Result<Database> {
    Ok(Database::open(&config.db.path)?)
}

pub fn cmd() -> Command {
    Command::new("musicpreneur")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .infer_subcommands(true)
        .version(VERSION)
        .author(AUTHORS)
        .about("Storefront and Collective membership back-end for The Mindful Musicpreneur")
        .subcommand(serve::cmd())
        .subcommand(user::cmd())
        .subcommand(application::cmd())
        .subcommand(subscriber::cmd())
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .global(true)
                .help("Path to the config file"),
        )
        .arg(
            Arg::new("verbosity")
                .long("verbosity")
                .short('v')
                .display_order(100)
                .value_name("level")
                .value_parser(["trace", "debug", "info", "warn", "error", "none"])
                .global(true)
                .help("Set the verbosity of the log output"),
        )
}
