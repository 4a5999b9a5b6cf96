pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::quote::RateClient;
use crate::core::ranking::RankingOrder;
use crate::core::series::ChartPeriod;
use crate::providers::AwesomeApiClient;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Convert {
        amount: Option<String>,
        from: Option<String>,
        to: Option<String>,
        interactive: bool,
    },
    Lookup {
        base: Option<String>,
    },
    History {
        base: String,
        targets: Vec<String>,
        period: ChartPeriod,
    },
    Ranking {
        order: RankingOrder,
        watch: bool,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("cambio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    config.validate().context("Invalid configuration")?;
    debug!("Loaded config: {config:#?}");

    let client: Arc<dyn RateClient> = Arc::new(AwesomeApiClient::new(
        &config.awesomeapi(),
        config.converter.same_currency,
    )?);

    match command {
        AppCommand::Convert {
            amount,
            from,
            to,
            interactive: true,
        } => {
            cli::convert::run_interactive(
                client,
                &config,
                amount.as_deref(),
                from.as_deref(),
                to.as_deref(),
            )
            .await
        }
        AppCommand::Convert {
            amount: Some(amount),
            from,
            to,
            interactive: false,
        } => cli::convert::run(client, &config, &amount, from.as_deref(), to.as_deref()).await,
        AppCommand::Convert { amount: None, .. } => {
            anyhow::bail!("An amount is required unless --interactive is set")
        }
        AppCommand::Lookup { base } => {
            cli::lookup::run(client.as_ref(), &config, base.as_deref()).await
        }
        AppCommand::History {
            base,
            targets,
            period,
        } => cli::history::run(client.as_ref(), &config, &base, &targets, period).await,
        AppCommand::Ranking { order, watch } => {
            cli::ranking::run(client, &config, order, watch).await
        }
    }
}
