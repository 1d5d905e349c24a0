//! `matcode`: command-line front end for the material-code workflow.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Material code application and approval tool.
#[derive(Parser, Debug)]
#[command(name = "matcode", version, about = "Material code application workflow")]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, default_value = "matcode.db")]
    db: PathBuf,

    /// Log level (trace|debug|info|warn|error). Defaults by build mode.
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,

    /// Directory for rotating log files. Logging is off when omitted.
    #[arg(long = "log-dir", global = true)]
    log_dir: Option<PathBuf>,

    /// Username to act as.
    #[arg(long = "as", global = true)]
    as_user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database and its first admin account.
    Init {
        /// Admin username.
        #[arg(long)]
        admin: String,
    },

    /// Print the category taxonomy.
    Categories {
        /// Only this main category.
        main: Option<String>,
    },

    /// Print option dictionaries (materials, units...).
    Options {
        #[arg(long, default_value = "application")]
        module: String,
        /// Only this dictionary.
        cate: Option<String>,
    },

    /// Show the next item code without consuming it.
    CodePreview { main: String, sub: String, spec: String },

    /// Submit an application from a JSON draft file.
    Submit {
        /// Draft file path.
        file: PathBuf,
    },

    /// List applications.
    List {
        /// PENDING, APPROVED, REJECTED or ALL.
        #[arg(long, default_value = "ALL")]
        status: String,
        #[arg(long = "item-code")]
        item_code: Option<String>,
        #[arg(long)]
        applicant: Option<String>,
        #[arg(long)]
        main: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Approve one review level of an application.
    Approve {
        id: Uuid,
        #[arg(long)]
        comment: Option<String>,
    },

    /// Reject an application.
    Reject {
        id: Uuid,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        comment: Option<String>,
    },

    /// Export applications as CSV.
    Export {
        /// Output file.
        output: PathBuf,
        #[arg(long)]
        main: Option<String>,
        /// PENDING, APPROVED, REJECTED or ALL.
        #[arg(long, default_value = "APPROVED")]
        status: String,
        /// First submit date, `YYYY-MM-DD`.
        #[arg(long)]
        from: Option<String>,
        /// Last submit date, `YYYY-MM-DD`.
        #[arg(long)]
        to: Option<String>,
    },

    /// Business settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print stored settings.
    Show,
    /// Set one setting from text.
    Set { key: String, value: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or_else(|| matcode_core::default_log_level());
        commands::start_logging(level, log_dir)?;
    }

    let conn = matcode_core::open_db(&cli.db)?;
    let as_user = cli.as_user.as_deref();

    match cli.command {
        Commands::Init { admin } => commands::init(&conn, &admin)?,
        Commands::Categories { main } => commands::categories(&conn, main.as_deref())?,
        Commands::Options { module, cate } => {
            commands::options(&conn, &module, cate.as_deref())?
        }
        Commands::CodePreview { main, sub, spec } => {
            commands::code_preview(&conn, &main, &sub, &spec)?
        }
        Commands::Submit { file } => commands::submit(&conn, as_user, &file)?,
        Commands::List {
            status,
            item_code,
            applicant,
            main,
            limit,
            json,
        } => commands::list(
            &conn,
            as_user,
            commands::ListArgs {
                status: &status,
                item_code,
                applicant,
                main,
                limit,
                json,
            },
        )?,
        Commands::Approve { id, comment } => {
            commands::approve(&conn, as_user, id, comment.as_deref())?
        }
        Commands::Reject {
            id,
            reason,
            comment,
        } => commands::reject(&conn, as_user, id, &reason, comment.as_deref())?,
        Commands::Export {
            output,
            main,
            status,
            from,
            to,
        } => commands::export(
            &conn,
            as_user,
            &output,
            main,
            &status,
            from.as_deref(),
            to.as_deref(),
        )?,
        Commands::Settings { action } => match action {
            SettingsAction::Show => commands::settings_show(&conn)?,
            SettingsAction::Set { key, value } => {
                commands::settings_set(&conn, as_user, &key, &value)?
            }
        },
    }

    Ok(())
}
