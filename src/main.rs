use anyhow::Result;
use cambio::core::log::init_logging;
use cambio::core::ranking::RankingOrder;
use cambio::core::series::ChartPeriod;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for cambio::AppCommand {
    fn from(cmd: Commands) -> cambio::AppCommand {
        match cmd {
            Commands::Convert {
                amount,
                from,
                to,
                interactive,
            } => cambio::AppCommand::Convert {
                amount,
                from,
                to,
                interactive,
            },
            Commands::Lookup { base } => cambio::AppCommand::Lookup { base },
            Commands::History {
                base,
                targets,
                period,
            } => cambio::AppCommand::History {
                base,
                targets,
                period,
            },
            Commands::Ranking { sort, watch } => cambio::AppCommand::Ranking { order: sort, watch },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount between two currencies
    Convert {
        /// Amount to convert, e.g. 100 or 12,50
        #[arg(required_unless_present = "interactive")]
        amount: Option<String>,
        /// Currency to convert from
        #[arg(short, long)]
        from: Option<String>,
        /// Currency to convert to
        #[arg(short, long)]
        to: Option<String>,
        /// Keep reading amounts and commands from stdin
        #[arg(short, long)]
        interactive: bool,
    },
    /// Show a currency against every other supported currency
    Lookup {
        /// Base currency
        base: Option<String>,
    },
    /// Show historical rates for one or more pairs
    History {
        /// Base currency
        base: String,
        /// Target currencies
        #[arg(required = true)]
        targets: Vec<String>,
        /// Period: 7D, 15D, 1M, 3M or 6M
        #[arg(short, long, default_value = "7D")]
        period: ChartPeriod,
    },
    /// Show the most traded currencies
    Ranking {
        /// Row order: fixed, change or value
        #[arg(short, long, default_value = "fixed")]
        sort: RankingOrder,
        /// Refresh on the configured interval until interrupted
        #[arg(short, long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => cambio::cli::setup::setup_at_path(path),
            None => cambio::cli::setup::setup(),
        },
        Some(cmd) => cambio::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
