use super::ui;
use crate::core::config::AppConfig;
use crate::core::currency::{CurrencyCode, CurrencyPair};
use crate::core::quote::RateClient;
use crate::core::series::{ChartPeriod, RateSeries, fetch_series};
use anyhow::Result;
use chrono::Local;
use comfy_table::Cell;
use futures::future::join_all;
use tracing::warn;

/// Longer series are summarized without the per-day table.
const MAX_TABLE_POINTS: usize = 31;

pub async fn run(
    client: &dyn RateClient,
    config: &AppConfig,
    base: &str,
    targets: &[String],
    period: ChartPeriod,
) -> Result<()> {
    let supported = config.supported();
    let base = supported.parse(base)?;
    let targets = targets
        .iter()
        .map(|t| supported.parse(t))
        .collect::<Result<Vec<CurrencyCode>, _>>()?;
    if targets.is_empty() {
        anyhow::bail!("At least one target currency is required");
    }

    let today = Local::now().date_naive();
    let pb = ui::new_progress_bar(targets.len() as u64, false);
    let series_futures = targets.iter().map(|target| {
        let pb_clone = pb.clone();
        let pair = CurrencyPair::new(base.clone(), target.clone());
        async move {
            let res = fetch_series(client, &pair, period, today).await;
            pb_clone.inc(1);
            (pair, res)
        }
    });
    let results = join_all(series_futures).await;
    pb.finish_and_clear();

    let total = results.len();
    let mut failures = 0;
    for (i, (pair, result)) in results.into_iter().enumerate() {
        match result {
            Ok(series) => display_series(&series, period),
            Err(e) => {
                failures += 1;
                warn!(pair = %pair, error = %e, "History fetch failed");
                println!(
                    "\n{} {}",
                    ui::style_text(&pair.to_string(), ui::StyleType::Title),
                    ui::style_text(e.user_message(), ui::StyleType::Error)
                );
            }
        }
        if i < total - 1 {
            ui::print_separator();
        }
    }

    if failures == total {
        anyhow::bail!("Could not fetch history for any of the requested pairs");
    }
    Ok(())
}

fn display_series(series: &RateSeries, period: ChartPeriod) {
    println!(
        "\n{} {}",
        ui::style_text(&series.pair.to_string(), ui::StyleType::Title),
        ui::style_text(&format!("({period})"), ui::StyleType::Subtle)
    );

    if series.is_empty() {
        println!("No data for this period.");
        return;
    }

    let bids: Vec<_> = series.points().iter().map(|p| p.bid).collect();
    println!("{}", ui::sparkline(&bids));

    let mut summary = ui::new_styled_table();
    summary.set_header(vec![
        ui::header_cell("First"),
        ui::header_cell("Last"),
        ui::header_cell("Min"),
        ui::header_cell("Max"),
        ui::header_cell("Change"),
    ]);
    summary.add_row(vec![
        ui::format_optional_cell(series.first().map(|p| p.bid), ui::format_rate),
        ui::format_optional_cell(series.last().map(|p| p.bid), ui::format_rate),
        ui::format_optional_cell(series.min(), ui::format_rate),
        ui::format_optional_cell(series.max(), ui::format_rate),
        series
            .change_pct()
            .map_or_else(|| ui::na_cell(false), ui::change_cell),
    ]);
    println!("{summary}");

    if series.points().len() > MAX_TABLE_POINTS {
        return;
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Date"), ui::header_cell("Bid")]);
    for point in series.points() {
        table.add_row(vec![
            Cell::new(point.timestamp.with_timezone(&Local).format("%d/%m").to_string()),
            ui::format_optional_cell(Some(point.bid), ui::format_rate),
        ]);
    }
    println!("{table}");
}
