use super::ui;
use crate::core::catalog;
use crate::core::config::AppConfig;
use crate::core::quote::RateClient;
use crate::core::ranking::{RankingBoard, RankingFeed, RankingOrder, RankingSettings, RankingSnapshot};
use crate::core::state::Phase;
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::sync::Arc;
use tracing::debug;

pub async fn run(
    client: Arc<dyn RateClient>,
    config: &AppConfig,
    order: RankingOrder,
    watch: bool,
) -> Result<()> {
    let settings = RankingSettings::from_config(config, order);
    let mut board = RankingBoard::new(client, settings);

    if !watch {
        let spinner = ui::new_spinner("Fetching ranking...");
        let snapshot = board.refresh().await;
        spinner.finish_and_clear();
        display_snapshot(&snapshot.context("Failed to fetch ranking")?);
        return Ok(());
    }

    let refresh = board.settings().refresh;
    let feed = RankingFeed::spawn(board);
    let mut rx = feed.subscribe();
    println!(
        "{}",
        ui::style_text(
            &format!("Refreshing every {}s. Press Ctrl-C to stop.", refresh.as_secs()),
            ui::StyleType::Subtle
        )
    );

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                match state {
                    Phase::Idle => {}
                    Phase::Loading => println!("{}", ui::style_text("Refreshing...", ui::StyleType::Subtle)),
                    Phase::Ready(snapshot) => display_snapshot(&snapshot),
                    Phase::Failed(e) => println!(
                        "{} {}",
                        ui::style_text(e.user_message(), ui::StyleType::Error),
                        ui::style_text("Retrying on the next refresh.", ui::StyleType::Subtle)
                    ),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted, stopping ranking feed");
                break;
            }
        }
    }

    feed.dispose();
    Ok(())
}

fn display_snapshot(snapshot: &RankingSnapshot) {
    let quote = &snapshot.quote_currency;
    println!(
        "\n{}",
        ui::style_text(
            &format!("Most traded currencies in {}", catalog::display_name(quote)),
            ui::StyleType::Title
        )
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Currency"),
        ui::header_cell("Name"),
        ui::header_cell(&format!("Value ({})", catalog::symbol(quote))),
        ui::header_cell("Change"),
    ]);
    for row in &snapshot.rows {
        table.add_row(vec![
            Cell::new(row.position),
            Cell::new(row.currency.as_str()),
            Cell::new(catalog::display_name(&row.currency)),
            row.value
                .map_or_else(|| ui::na_cell(true), |v| ui::format_optional_cell(Some(v), ui::format_rate)),
            row.percent_change
                .map_or_else(|| ui::na_cell(row.value.is_none()), ui::change_cell),
        ]);
    }
    println!("{table}");

    if let Some(at) = snapshot.last_updated {
        println!(
            "{}",
            ui::style_text(&format!("Last updated {}", ui::format_time(at)), ui::StyleType::Subtle)
        );
    }
}
