mod commands;
mod config;
mod pipeline;
mod server;
mod tools;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use commands::{BodyArgs, Operation};
use config::Settings;
use tools::ToolManager;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Shipping tool server with guided completion of shipment and rate requests.
#[derive(Parser)]
#[command(
    name = "parcelkit",
    version,
    about = "Shipping tool server with guided completion of shipment and rate requests"
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tool server over stdio (line-delimited JSON-RPC)
    Serve,

    /// Report the fields a request body is still missing
    Check {
        /// Request kind the body holds
        #[arg(long, value_enum)]
        operation: Operation,
        /// Rating request option (Rate, Shop, Ratetimeintransit, Shoptimeintransit)
        #[arg(long)]
        request_option: Option<String>,
        /// Path to the request body JSON file
        body: PathBuf,
    },

    /// Print the form schema a client would be shown for a request body
    Schema {
        /// Request kind the body holds
        #[arg(long, value_enum)]
        operation: Operation,
        /// Rating request option (Rate, Shop, Ratetimeintransit, Shoptimeintransit)
        #[arg(long)]
        request_option: Option<String>,
        /// Path to the request body JSON file
        body: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let settings = load_settings(cli.config.as_deref(), cli.output, cli.quiet);

    match cli.command {
        Commands::Serve => cmd_serve(settings, cli.output, cli.quiet),
        Commands::Check {
            operation,
            request_option,
            body,
        } => {
            let args = BodyArgs {
                operation,
                request_option: request_option.as_deref(),
                body: &body,
                settings: &settings,
            };
            commands::check::cmd_check(&args, cli.output, cli.quiet);
        }
        Commands::Schema {
            operation,
            request_option,
            body,
        } => {
            let args = BodyArgs {
                operation,
                request_option: request_option.as_deref(),
                body: &body,
                settings: &settings,
            };
            commands::schema::cmd_schema(&args, cli.output, cli.quiet);
        }
    }
}

/// Logs go to stderr; stdout belongs to the tool-server protocol.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(path: Option<&Path>, output: OutputFormat, quiet: bool) -> Settings {
    match Settings::load(path) {
        Ok(settings) => settings,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_serve(settings: Settings, output: OutputFormat, quiet: bool) {
    if let Err(e) = settings.require_credentials() {
        report_error(&e.to_string(), output, quiet);
        process::exit(1);
    }
    tracing::info!(environment = %settings.environment, "starting tool server");

    let tools = match ToolManager::new(settings) {
        Ok(tools) => Arc::new(tools),
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start async runtime: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let served = rt.block_on(server::serve(
        tools,
        tokio::io::BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    ));
    if let Err(e) = served {
        report_error(&format!("server error: {}", e), output, quiet);
        process::exit(1);
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
