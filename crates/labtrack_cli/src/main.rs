//! Operator CLI for the research project tracker.
//!
//! # Responsibility
//! - Wire configuration, logging and the database file together.
//! - Expose maintenance and read commands over `labtrack_core`.
//!
//! # Invariants
//! - Every command goes through the core services; no direct SQL.
//! - Command output on stdout is JSON; diagnostics go to the log file.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use labtrack_core::model::now_epoch_ms;
use labtrack_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use labtrack_core::{
    default_log_level, init_logging, open_db, AppConfig, Argon2Hasher, AssignmentCoordinator,
    DashboardAggregator, EmailDispatcher, IdentityError, IdentityService, MailSettings, NewUser,
    Role, Title, User,
};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "labtrack",
    about = "Research project tracker maintenance CLI",
    version
)]
struct Cli {
    /// SQLite database file
    #[arg(long, default_value = "labtrack.db", env = "LABTRACK_DB")]
    db: PathBuf,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "LABTRACK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for rotated log files
    #[arg(long, default_value = "logs", env = "LABTRACK_LOG_DIR")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database or migrate it to the latest schema
    Init,
    /// Register a new account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long, value_enum)]
        role: RoleArg,
        /// Courtesy title: Mr, Ms, Mrs, Dr or Prof
        #[arg(long, default_value = "Mr", value_parser = parse_title)]
        title: Title,
        #[arg(long, env = "LABTRACK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Print the dashboard for a user
    Dashboard {
        #[arg(long)]
        user: String,
    },
    /// Print meetings visible to a user
    Calendar {
        #[arg(long)]
        user: String,
    },
    /// Complete every scheduled meeting that is already in the past
    RefreshMeetings,
    /// Print unread notifications for a user
    Notifications {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Pi,
    TeamMember,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Pi => Role::Pi,
            RoleArg::TeamMember => Role::TeamMember,
        }
    }
}

fn parse_title(value: &str) -> Result<Title, String> {
    Title::parse(value).ok_or_else(|| format!("unknown title `{value}`; expected Mr|Ms|Mrs|Dr|Prof"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig {
        db_path: cli.db.clone(),
        log_level: cli.log_level.clone(),
        log_dir: cli.log_dir.clone(),
        mail: MailSettings::from_env().context("invalid mail settings")?,
    };

    let level = config.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level, &config.log_dir).context("failed to start logging")?;

    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open database `{}`", config.db_path.display()))?;
    info!(
        "event=cli_command module=cli status=start command={}",
        command_name(&cli.command)
    );

    match cli.command {
        Command::Init => print_json(&serde_json::json!({
            "database": config.db_path.display().to_string(),
            "schema_version": labtrack_core::db::migrations::latest_version(),
        })),
        Command::Register {
            username,
            email,
            first_name,
            last_name,
            role,
            title,
            password,
        } => {
            let identity =
                IdentityService::new(SqliteUserRepository::new(&conn), Argon2Hasher::default());
            let input = NewUser {
                title,
                username,
                email,
                first_name,
                last_name,
                role: role.into(),
                password,
            };
            match identity.register(&input) {
                Ok(user) => print_json(&user),
                Err(IdentityError::Validation(errors)) => {
                    print_json(&errors.errors())?;
                    bail!("registration rejected")
                }
                Err(err) => Err(err.into()),
            }
        }
        Command::Dashboard { user } => {
            let actor = find_user(&conn, &user)?;
            let snapshot = DashboardAggregator::new(&conn).dashboard(&actor, now_epoch_ms())?;
            print_json(&snapshot)
        }
        Command::Calendar { user } => {
            let actor = find_user(&conn, &user)?;
            let meetings = DashboardAggregator::new(&conn).calendar(&actor, now_epoch_ms())?;
            print_json(&meetings)
        }
        Command::RefreshMeetings => {
            let email = EmailDispatcher::from_settings(config.mail.clone())?;
            let completed = AssignmentCoordinator::new(&conn, &email)
                .refresh_meeting_statuses(now_epoch_ms())?;
            print_json(&serde_json::json!({ "completed": completed }))
        }
        Command::Notifications { user, limit } => {
            let actor = find_user(&conn, &user)?;
            let unread = DashboardAggregator::new(&conn).unread_notifications(&actor, limit)?;
            print_json(&unread)
        }
    }
}

fn find_user(conn: &Connection, username: &str) -> Result<User> {
    SqliteUserRepository::new(conn)
        .get_by_username(username)?
        .ok_or_else(|| anyhow!("no user named `{username}`"))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Init => "init",
        Command::Register { .. } => "register",
        Command::Dashboard { .. } => "dashboard",
        Command::Calendar { .. } => "calendar",
        Command::RefreshMeetings => "refresh-meetings",
        Command::Notifications { .. } => "notifications",
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_title, Cli, Command};
    use clap::Parser;

    #[test]
    fn parses_dashboard_command() {
        let cli = Cli::try_parse_from(["labtrack", "--db", "/tmp/x.db", "dashboard", "--user", "ada"])
            .unwrap();
        assert!(matches!(cli.command, Command::Dashboard { ref user } if user == "ada"));
    }

    #[test]
    fn rejects_unknown_title() {
        assert!(parse_title("Sir").is_err());
        assert!(parse_title("Dr").is_ok());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
