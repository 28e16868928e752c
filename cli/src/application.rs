use std::str::FromStr;

use anyhow::{Error, Result};
use clap::{arg, ArgMatches, Command};
use uuid::Uuid;

use musicpreneur::collective::{self, ApplicationStatus};
use musicpreneur::{email, Config, Database};

/// Recorded as the reviewer of applications handled from the command line.
const REVIEWER: &str = "cli";

pub fn cmd() -> Command {
    Command::new("application")
        .subcommand_required(true)
        .display_order(20)
        .about("Review Collective applications")
        .subcommand(
            Command::new("list")
                .about("Lists applications, newest first")
                .arg(arg!(-s --status [status] "Filter by status: pending, approved or denied")),
        )
        .subcommand(
            Command::new("approve")
                .arg_required_else_help(true)
                .about("Approves a pending application and emails the applicant")
                .arg(arg!(<id> "Application id"))
                .arg(arg!(-m --message [message] "Personal message added to the welcome email")),
        )
        .subcommand(
            Command::new("deny")
                .arg_required_else_help(true)
                .about("Denies a pending application and emails the applicant")
                .arg(arg!(<id> "Application id"))
                .arg(arg!(-m --message [message] "Replaces the default denial message")),
        )
}

fn application_id(matches: &ArgMatches) -> Result<Uuid> {
    let id = matches.get_one::<String>("id").cloned().unwrap_or_default();
    Uuid::from_str(&id).map_err(|_| Error::msg(format!("invalid application id: {id}")))
}

pub async fn run(matches: &ArgMatches, config: &Config, db: &Database) -> Result<()> {
    match matches.subcommand() {
        Some(("list", m)) => {
            let status = m
                .get_one::<String>("status")
                .map(|s| ApplicationStatus::from_str(s))
                .transpose()
                .map_err(|_| Error::msg("status must be one of: pending, approved, denied"))?;
            for application in collective::applications(db, status)? {
                println!(
                    "{} {} user: {} submitted: {}",
                    application.id,
                    application.status,
                    application.user_id,
                    application.created_at.format("%Y-%m-%d %H:%M"),
                );
            }
        }
        Some(("approve", m)) => {
            let id = application_id(m)?;
            let mailer = email::from_config(config)?;
            let message = m.get_one::<String>("message").cloned();
            collective::approve(db, mailer.as_ref(), id, REVIEWER, message).await?;
            println!("Approved application {id}");
        }
        Some(("deny", m)) => {
            let id = application_id(m)?;
            let mailer = email::from_config(config)?;
            let message = m.get_one::<String>("message").cloned();
            collective::deny(db, mailer.as_ref(), id, REVIEWER, message).await?;
            println!("Denied application {id}");
        }
        _ => unreachable!("subcommand is required"),
    }
    Ok(())
}
