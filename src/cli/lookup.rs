use super::ui;
use crate::core::config::AppConfig;
use crate::core::lookup::{CurrencyOverview, lookup};
use crate::core::quote::RateClient;
use anyhow::{Context, Result};
use comfy_table::Cell;

pub async fn run(client: &dyn RateClient, config: &AppConfig, base: Option<&str>) -> Result<()> {
    let supported = config.supported();
    let base = match base {
        Some(code) => supported.parse(code)?,
        None => config.lookup.default_base.clone(),
    };

    let spinner = ui::new_spinner(&format!("Fetching rates for {base}..."));
    let overview = lookup(client, &base, &supported).await;
    spinner.finish_and_clear();

    let overview = overview.with_context(|| format!("Failed to look up {base}"))?;
    display_overview(&overview);
    Ok(())
}

fn display_overview(overview: &CurrencyOverview) {
    println!(
        "\n{} {}",
        ui::style_text(&overview.name, ui::StyleType::Title),
        ui::style_text(&format!("({})", overview.base), ui::StyleType::Subtle)
    );
    if let Some(summary) = &overview.summary {
        println!("{summary}");
    }

    if overview.rows.is_empty() {
        println!("No rates available for {}.", overview.base);
        return;
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Name"),
        ui::header_cell(&format!("1 {} =", overview.base)),
        ui::header_cell("Change"),
        ui::header_cell("Updated"),
    ]);
    for row in &overview.rows {
        table.add_row(vec![
            Cell::new(row.currency.as_str()),
            Cell::new(&row.name),
            ui::format_optional_cell(Some(row.bid), ui::format_rate),
            row.pct_change
                .map_or_else(|| ui::na_cell(false), ui::change_cell),
            Cell::new(ui::format_time(row.updated_at)),
        ]);
    }
    println!("{table}");
}
