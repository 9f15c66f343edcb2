mod commands;
mod prompt;
mod ui;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use commands::{Context, Format};
use resloc_core::{classify, ResLocError};
use resloc_services::util::validate_tag;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::Layer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Process exit codes.
pub mod exit {
    pub const OK: i32 = 0;
    /// The initial confirmation was answered with no.
    pub const DECLINED: i32 = 1;
    pub const CANCELLED: i32 = 2;
    pub const BAD_ARGUMENTS: i32 = -1;
    /// Directory missing or unknown command.
    pub const NO_DIRECTORY: i32 = -2;
    pub const UNEXPECTED: i32 = -4;
}

#[derive(Parser)]
#[command(
    name = "resloc",
    version,
    about = "Report translation tables and resource language rotation"
)]
struct Cli {
    /// Answer yes to every confirmation
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    /// Output format for the run summary
    #[arg(long, value_enum, default_value_t = Format::Text, global = true)]
    format: Format,

    /// Configuration file (otherwise ./resloc.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect translatable texts from every report into a new table
    Prepare {
        /// Directory holding the report files
        reports_dir: PathBuf,
        /// Table to create, relative to the reports directory.
        /// A `.xlsx` name writes a spreadsheet, anything else CSV
        table: PathBuf,
    },

    /// Write a translated copy of every report using a filled-in table
    Translate {
        reports_dir: PathBuf,
        table: PathBuf,
    },

    /// Promote <IMPORT_TAG> resources to neutral, keeping the old neutral values as <NEUTRAL_TAG>
    Swap {
        #[arg(value_parser = validate_tag)]
        neutral_tag: String,
        #[arg(value_parser = validate_tag)]
        import_tag: String,
        directory: PathBuf,
        /// Only show what would be rotated
        #[arg(long)]
        dry_run: bool,
    },
}

trait Runnable {
    fn run(self, ctx: &Context) -> Result<i32>;
}

impl Runnable for Commands {
    fn run(self, ctx: &Context) -> Result<i32> {
        let cmd_name = format!("{:?}", self);
        info!("▶ Starting command: {}", cmd_name);

        let result = match self {
            Commands::Prepare { reports_dir, table } => {
                commands::prepare::run_prepare(ctx, &reports_dir, &table)
            }
            Commands::Translate { reports_dir, table } => {
                commands::translate::run_translate(ctx, &reports_dir, &table)
            }
            Commands::Swap {
                neutral_tag,
                import_tag,
                directory,
                dry_run,
            } => commands::swap::run_swap(ctx, &neutral_tag, &import_tag, &directory, dry_run),
        };

        match &result {
            Ok(code) => info!("✔ Finished command: {} (exit {})", cmd_name, code),
            Err(e) => error!("✖ Command {} failed: {:?}", cmd_name, e),
        }

        result
    }
}

fn exit_code(err: &color_eyre::eyre::Report) -> i32 {
    match classify(err) {
        Some(ResLocError::UserCancelled(_)) => exit::CANCELLED,
        _ => exit::UNEXPECTED,
    }
}

fn parse_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => exit::OK,
        ErrorKind::InvalidSubcommand => exit::NO_DIRECTORY,
        _ => exit::BAD_ARGUMENTS,
    }
}

fn init_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    // no file log when the directory cannot be created
    let file = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("resloc.log")
        .build(log_dir)
        .ok()
        .map(tracing_appender::non_blocking);
    let (file_layer, guard) = match file {
        Some((writer, guard)) => (
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(writer)
                    .with_filter(EnvFilter::new("debug")),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
    guard
}

fn run(cli: Cli) -> i32 {
    if let Err(e) = color_eyre::install() {
        eprintln!("{e}");
    }

    let config = match resloc_config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            ui_err!("{e}");
            return exit::UNEXPECTED;
        }
    };
    let log_dir = config
        .log
        .as_ref()
        .and_then(|l| l.dir.clone())
        .unwrap_or_else(|| "logs".into());
    let _guard = init_tracing(Path::new(&log_dir));
    debug!(event = "config_loaded", config = ?config);

    let ctx = Context {
        yes: cli.yes,
        format: cli.format,
        config,
    };

    match cli.cmd.run(&ctx) {
        Ok(code) => code,
        Err(e) => {
            let code = exit_code(&e);
            match classify(&e) {
                Some(ResLocError::UserCancelled(msg)) => ui_warn!("Cancelled: {msg}"),
                Some(other) => ui_err!("{other}"),
                None => ui_err!("{e:?}"),
            }
            code
        }
    }
}

fn main() {
    let code = match Cli::try_parse() {
        Ok(cli) => run(cli),
        Err(e) => {
            let _ = e.print();
            parse_exit_code(&e)
        }
    };
    std::process::exit(code);
}
