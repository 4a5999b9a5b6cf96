use super::ui;
use crate::core::catalog;
use crate::core::config::AppConfig;
use crate::core::currency::{CurrencyCode, CurrencySet};
use crate::core::error::RateError;
use crate::core::pipeline::{
    Conversion, ConversionInput, ConversionPipeline, PipelineSettings, PipelineState,
};
use crate::core::quote::RateClient;
use crate::core::state::Phase;
use crate::core::timer::TokioScheduler;
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const INTERACTIVE_HELP: &str = "Type an amount, `from XXX`, `to XXX`, `swap`, `retry` or `quit`.";

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq)]
enum InputLine {
    Amount(String),
    From(CurrencyCode),
    To(CurrencyCode),
    Swap,
    Retry,
    Help,
    Quit,
}

fn parse_line(line: &str, supported: &CurrencySet) -> Result<InputLine, RateError> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or("").to_lowercase();
    let argument = words.next();

    match (command.as_str(), argument) {
        ("from", Some(code)) => Ok(InputLine::From(supported.parse(code)?)),
        ("to", Some(code)) => Ok(InputLine::To(supported.parse(code)?)),
        ("from" | "to", None) => Err(RateError::Validation(format!(
            "`{command}` needs a currency code"
        ))),
        ("swap", None) => Ok(InputLine::Swap),
        ("retry", None) => Ok(InputLine::Retry),
        ("help" | "?", None) => Ok(InputLine::Help),
        ("quit" | "exit" | "q", None) => Ok(InputLine::Quit),
        _ => Ok(InputLine::Amount(line.to_string())),
    }
}

fn resolve_code(
    supported: &CurrencySet,
    requested: Option<&str>,
    fallback: &CurrencyCode,
) -> Result<CurrencyCode> {
    match requested {
        Some(code) => Ok(supported.parse(code)?),
        None => Ok(fallback.clone()),
    }
}

fn new_pipeline(
    client: Arc<dyn RateClient>,
    config: &AppConfig,
    amount: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<ConversionPipeline> {
    let supported = config.supported();
    let base = resolve_code(&supported, from, &config.converter.default_from)?;
    let target = resolve_code(&supported, to, &config.converter.default_to)?;

    Ok(ConversionPipeline::new(
        client,
        PipelineSettings::from_config(config),
        Arc::new(TokioScheduler),
        ConversionInput::new(amount, base, target),
    ))
}

fn with_symbol(code: &CurrencyCode, value: &str) -> String {
    format!("{} {}", catalog::symbol(code), value)
}

/// Settles a single conversion and prints it as a table.
pub async fn run(
    client: Arc<dyn RateClient>,
    config: &AppConfig,
    amount: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let pipeline = new_pipeline(client, config, amount, from, to)?;

    let spinner = ui::new_spinner("Fetching rate...");
    pipeline.settle_now().await;
    spinner.finish_and_clear();

    match pipeline.state() {
        Phase::Ready(conversion) => {
            display_conversion(&conversion);
            Ok(())
        }
        Phase::Failed(e) => {
            eprintln!("{}", ui::style_text(e.user_message(), ui::StyleType::Error));
            Err(e).context("Conversion failed")
        }
        Phase::Idle | Phase::Loading => Ok(()),
    }
}

fn display_conversion(conversion: &Conversion) {
    let pair = &conversion.pair;
    let (Some(amount), Some(result)) = (conversion.amount, conversion.result) else {
        println!(
            "{}",
            ui::style_text(
                "Nothing to convert. Enter an amount greater than zero.",
                ui::StyleType::Subtle
            )
        );
        return;
    };

    println!(
        "\n{}",
        ui::style_text(
            &format!(
                "{} → {}",
                catalog::display_name(&pair.base),
                catalog::display_name(&pair.target)
            ),
            ui::StyleType::Title
        )
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Amount"),
        ui::header_cell("Result"),
        ui::header_cell("Rate"),
        ui::header_cell("Change"),
        ui::header_cell("Updated"),
    ]);
    table.add_row(vec![
        Cell::new(with_symbol(&pair.base, &ui::format_amount(amount))),
        Cell::new(ui::style_text(
            &with_symbol(&pair.target, &ui::format_amount(result)),
            ui::StyleType::TotalValue,
        )),
        ui::format_optional_cell(conversion.rate, |r| {
            format!("1 {} = {} {}", pair.base, ui::format_rate(r), pair.target)
        }),
        conversion
            .percent_change
            .map_or_else(|| ui::na_cell(false), ui::change_cell),
        ui::format_optional_cell(conversion.observed_at, ui::format_time),
    ]);
    println!("{table}");
}

fn render_state(state: &PipelineState) {
    match state {
        Phase::Idle => {}
        Phase::Loading => println!("{}", ui::style_text("…", ui::StyleType::Subtle)),
        Phase::Ready(conversion) => match (conversion.amount, conversion.result) {
            (Some(amount), Some(result)) => {
                let pair = &conversion.pair;
                let rate = conversion
                    .rate
                    .map(|r| format!("1 {} = {} {}", pair.base, ui::format_rate(r), pair.target))
                    .unwrap_or_default();
                let change = conversion
                    .percent_change
                    .map(ui::format_change)
                    .unwrap_or_default();
                println!(
                    "{} = {}  {}",
                    with_symbol(&pair.base, &ui::format_amount(amount)),
                    ui::style_text(
                        &with_symbol(&pair.target, &ui::format_amount(result)),
                        ui::StyleType::TotalValue
                    ),
                    ui::style_text(&format!("({rate}, {change})"), ui::StyleType::Subtle)
                );
            }
            _ => println!(
                "{}",
                ui::style_text(
                    &format!("{} → {}: nothing to convert", conversion.pair.base, conversion.pair.target),
                    ui::StyleType::Subtle
                )
            ),
        },
        Phase::Failed(e) => {
            debug!(error = %e, "Conversion failed");
            println!(
                "{} {}",
                ui::style_text(e.user_message(), ui::StyleType::Error),
                ui::style_text("Type `retry` to try again.", ui::StyleType::Subtle)
            );
        }
    }
}

/// Reads edits from stdin and prints every state the pipeline settles into.
pub async fn run_interactive(
    client: Arc<dyn RateClient>,
    config: &AppConfig,
    amount: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let supported = config.supported();
    let pipeline = new_pipeline(client, config, amount.unwrap_or(""), from, to)?;

    let input = pipeline.input();
    println!(
        "{} {}",
        ui::style_text(
            &format!("Converting {} → {}.", input.pair.base, input.pair.target),
            ui::StyleType::TotalLabel
        ),
        INTERACTIVE_HELP
    );

    let mut rx = pipeline.subscribe();
    let printer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            render_state(&state);
        }
    });

    if let Some(amount) = amount {
        pipeline.set_amount(amount);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read from stdin")?
    {
        match parse_line(&line, &supported) {
            Ok(InputLine::Amount(amount)) => pipeline.set_amount(amount),
            Ok(InputLine::From(code)) => pipeline.set_base(code),
            Ok(InputLine::To(code)) => pipeline.set_target(code),
            Ok(InputLine::Swap) => pipeline.swap(),
            Ok(InputLine::Retry) => pipeline.settle_now().await,
            Ok(InputLine::Help) => println!("{INTERACTIVE_HELP}"),
            Ok(InputLine::Quit) => break,
            Err(e) => println!("{}", ui::style_text(&e.to_string(), ui::StyleType::Error)),
        }
    }

    pipeline.dispose();
    printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::code;

    fn supported() -> CurrencySet {
        CurrencySet::new(vec![code("BRL"), code("USD"), code("EUR")])
    }

    #[test]
    fn test_parse_commands() {
        let set = supported();
        assert_eq!(parse_line("from eur", &set).unwrap(), InputLine::From(code("EUR")));
        assert_eq!(parse_line(" TO usd ", &set).unwrap(), InputLine::To(code("USD")));
        assert_eq!(parse_line("swap", &set).unwrap(), InputLine::Swap);
        assert_eq!(parse_line("retry", &set).unwrap(), InputLine::Retry);
        assert_eq!(parse_line("q", &set).unwrap(), InputLine::Quit);
    }

    #[test]
    fn test_anything_else_is_an_amount() {
        let set = supported();
        assert_eq!(
            parse_line("12,50", &set).unwrap(),
            InputLine::Amount("12,50".to_string())
        );
        assert_eq!(parse_line("", &set).unwrap(), InputLine::Amount(String::new()));
        assert_eq!(
            parse_line("abc", &set).unwrap(),
            InputLine::Amount("abc".to_string())
        );
    }

    #[test]
    fn test_unsupported_or_missing_currency_is_rejected() {
        let set = supported();
        assert_eq!(
            parse_line("from JPY", &set).unwrap_err(),
            RateError::Validation("Unsupported currency: JPY".to_string())
        );
        assert!(matches!(
            parse_line("to", &set).unwrap_err(),
            RateError::Validation(_)
        ));
    }
}
