//! Debounced fetch-and-derive conversion pipeline
//!
//! Input edits go through a [`DebounceGate`]; each settled input fetches a
//! fresh quote, multiplies the amount by the bid and records the bid in a
//! [`QuoteHistory`] to derive the percent change. The latest state is
//! published on a watch channel. Responses belonging to superseded requests,
//! or arriving after disposal, are dropped.

use crate::core::config::{AppConfig, SameCurrencyPolicy};
use crate::core::currency::{CurrencyCode, CurrencyPair};
use crate::core::debounce::DebounceGate;
use crate::core::error::RateError;
use crate::core::history::QuoteHistory;
use crate::core::quote::{Quote, RateClient};
use crate::core::state::Phase;
use crate::core::timer::Scheduler;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub debounce: Duration,
    pub history_capacity: usize,
    pub same_currency: SameCurrencyPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            debounce: config.debounce(),
            history_capacity: config.converter.history_capacity,
            same_currency: config.converter.same_currency,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What the user has entered: a raw amount and the selected pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionInput {
    pub amount: String,
    pub pair: CurrencyPair,
}

impl ConversionInput {
    pub fn new(amount: impl Into<String>, base: CurrencyCode, target: CurrencyCode) -> Self {
        Self {
            amount: amount.into(),
            pair: CurrencyPair::new(base, target),
        }
    }
}

/// Derived values for one settled input. `result` is `None` when there was nothing to convert.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub pair: CurrencyPair,
    pub amount: Option<Decimal>,
    pub result: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub percent_change: Option<Decimal>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl Conversion {
    fn nothing(pair: CurrencyPair) -> Self {
        Self {
            pair,
            amount: None,
            result: None,
            rate: None,
            percent_change: None,
            observed_at: None,
        }
    }

    fn identity(pair: CurrencyPair, amount: Decimal, observed_at: DateTime<Utc>) -> Self {
        Self {
            pair,
            amount: Some(amount),
            result: Some(amount),
            rate: Some(Decimal::ONE),
            percent_change: Some(Decimal::ZERO),
            observed_at: Some(observed_at),
        }
    }
}

pub type PipelineState = Phase<Conversion>;

/// Parses a user-entered amount. Empty, non-numeric and non-positive input is rejected.
pub fn parse_amount(input: &str) -> Result<Decimal, RateError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(RateError::Validation("Amount is empty".to_string()));
    }
    // Accept a decimal comma when no decimal point is present
    let normalized = if trimmed.contains('.') {
        trimmed.to_string()
    } else {
        trimmed.replace(',', ".")
    };
    let amount = Decimal::from_str(&normalized)
        .map_err(|_| RateError::Validation(format!("Amount is not a number: '{trimmed}'")))?;
    if amount <= Decimal::ZERO {
        return Err(RateError::Validation(format!(
            "Amount must be positive: {amount}"
        )));
    }
    Ok(amount)
}

struct Shared {
    client: Arc<dyn RateClient>,
    settings: PipelineSettings,
    history: Mutex<QuoteHistory>,
    state: watch::Sender<PipelineState>,
    latest_request: AtomicU64,
    disposed: AtomicBool,
}

impl Shared {
    #[instrument(name = "Settle", skip(self, input), fields(pair = %input.pair, amount = %input.amount))]
    async fn settle(&self, input: ConversionInput) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let request = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;

        let amount = match parse_amount(&input.amount) {
            Ok(amount) => amount,
            Err(e) => {
                debug!(error = %e, "Nothing to convert");
                self.publish(request, Phase::Ready(Conversion::nothing(input.pair)));
                return;
            }
        };

        if input.pair.is_identity() && self.settings.same_currency == SameCurrencyPolicy::ShortCircuit {
            debug!("Same currency, skipping provider");
            self.publish(
                request,
                Phase::Ready(Conversion::identity(input.pair, amount, Utc::now())),
            );
            return;
        }

        self.publish(request, Phase::Loading);
        let outcome = self
            .client
            .fetch_quote(&input.pair.base, &input.pair.target)
            .await;

        if !self.is_current(request) {
            debug!(request, "Discarding response for superseded request");
            return;
        }

        let next = match outcome {
            Ok(quote) => self.derive(amount, quote),
            Err(e) => {
                warn!(error = %e, "Quote fetch failed");
                Phase::Failed(e)
            }
        };
        self.publish(request, next);
    }

    fn derive(&self, amount: Decimal, quote: Quote) -> PipelineState {
        let Some(result) = amount.checked_mul(quote.bid) else {
            debug!(%amount, bid = %quote.bid, "Conversion overflowed");
            return Phase::Ready(Conversion::nothing(quote.pair));
        };
        let computed = self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&quote.pair.key(), quote.bid, quote.timestamp);

        Phase::Ready(Conversion {
            amount: Some(amount),
            result: Some(result),
            rate: Some(quote.bid),
            percent_change: Some(quote.pct_change.unwrap_or(computed)),
            observed_at: Some(quote.timestamp),
            pair: quote.pair,
        })
    }

    fn is_current(&self, request: u64) -> bool {
        !self.disposed.load(Ordering::SeqCst)
            && self.latest_request.load(Ordering::SeqCst) == request
    }

    /// The currency check runs under the channel lock, so a superseded
    /// request can never overwrite a newer request's state.
    fn publish(&self, request: u64, next: PipelineState) -> bool {
        let published = self.state.send_if_modified(|state| {
            if self.is_current(request) {
                *state = next;
                true
            } else {
                false
            }
        });
        if !published {
            debug!(request, "Dropped state for superseded request");
        }
        published
    }

    fn reset_history(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }
}

/// One converter instance: owns its gate, history and state until disposed.
pub struct ConversionPipeline {
    shared: Arc<Shared>,
    gate: DebounceGate<ConversionInput>,
    input: Mutex<ConversionInput>,
}

impl ConversionPipeline {
    /// Creates an idle pipeline. Nothing is fetched until the first input settles.
    ///
    /// Settled inputs are processed on spawned tokio tasks, so the pipeline
    /// must be driven from within a tokio runtime.
    pub fn new(
        client: Arc<dyn RateClient>,
        settings: PipelineSettings,
        scheduler: Arc<dyn Scheduler>,
        initial: ConversionInput,
    ) -> Self {
        let (state, _) = watch::channel(Phase::Idle);
        let shared = Arc::new(Shared {
            client,
            settings,
            history: Mutex::new(QuoteHistory::new(settings.history_capacity)),
            state,
            latest_request: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        });

        let for_gate = Arc::clone(&shared);
        let gate = DebounceGate::new(settings.debounce, scheduler, move |input| {
            let shared = Arc::clone(&for_gate);
            tokio::spawn(async move { shared.settle(input).await });
        });

        Self {
            shared,
            gate,
            input: Mutex::new(initial),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.shared.state.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state.borrow().clone()
    }

    pub fn input(&self) -> ConversionInput {
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn settings(&self) -> PipelineSettings {
        self.shared.settings
    }

    pub fn set_amount(&self, amount: impl Into<String>) {
        let amount = amount.into();
        self.apply(|input| input.amount = amount);
    }

    /// Changing the base forgets the rate history, so the next percent change starts at zero.
    pub fn set_base(&self, base: CurrencyCode) {
        self.apply(|input| input.pair.base = base);
    }

    pub fn set_target(&self, target: CurrencyCode) {
        self.apply(|input| input.pair.target = target);
    }

    /// Exchanges base and target and re-triggers the pipeline.
    pub fn swap(&self) {
        self.apply(|input| input.pair = input.pair.swapped());
    }

    /// Settles the current input immediately, skipping the quiet window.
    /// Backs the "try again" action after a failure.
    pub async fn settle_now(&self) {
        self.gate.cancel();
        let input = self.input();
        self.shared.settle(input).await;
    }

    /// Stops all further state changes, including responses still in flight.
    pub fn dispose(&self) {
        self.shared.disposed.store(true, Ordering::SeqCst);
        self.gate.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    fn apply(&self, change: impl FnOnce(&mut ConversionInput)) {
        if self.is_disposed() {
            return;
        }
        let snapshot = {
            let mut input = self.input.lock().unwrap_or_else(PoisonError::into_inner);
            let previous_base = input.pair.base.clone();
            change(&mut input);
            if input.pair.base != previous_base {
                self.shared.reset_history();
            }
            input.clone()
        };
        self.gate.notify(snapshot);
    }
}

impl Drop for ConversionPipeline {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::code;
    use crate::core::error::ErrorKind;
    use crate::core::quote::{DateRange, HistoricalPoint};
    use crate::core::timer::TokioScheduler;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use tokio::time::sleep;

    const DEBOUNCE: Duration = Duration::from_millis(100);

    struct Step {
        delay: Duration,
        outcome: Result<(&'static str, Option<&'static str>), RateError>,
    }

    fn ok(delay_ms: u64, bid: &'static str) -> Step {
        Step {
            delay: Duration::from_millis(delay_ms),
            outcome: Ok((bid, None)),
        }
    }

    /// Plays back a fixed script of responses, one per request.
    #[derive(Default)]
    struct ScriptedClient {
        script: Mutex<VecDeque<Step>>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn with(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(steps.into()),
                requested: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requested.lock().unwrap().len()
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RateClient for ScriptedClient {
        async fn fetch_pairs(
            &self,
            pairs: &[CurrencyPair],
        ) -> Result<HashMap<CurrencyPair, Quote>, RateError> {
            let pair = pairs[0].clone();
            self.requested.lock().unwrap().push(pair.key());
            let step = self.script.lock().unwrap().pop_front().unwrap_or(Step {
                delay: Duration::ZERO,
                outcome: Err(RateError::Network("script exhausted".to_string())),
            });
            sleep(step.delay).await;
            let (bid, pct) = step.outcome?;
            let quote = Quote {
                pair: pair.clone(),
                bid: Decimal::from_str(bid).unwrap(),
                ask: None,
                pct_change: pct.map(|p| Decimal::from_str(p).unwrap()),
                name: None,
                timestamp: Utc::now(),
            };
            Ok(HashMap::from([(pair, quote)]))
        }

        async fn fetch_history(
            &self,
            _pair: &CurrencyPair,
            _range: DateRange,
        ) -> Result<Vec<HistoricalPoint>, RateError> {
            Ok(Vec::new())
        }
    }

    fn pipeline(client: Arc<ScriptedClient>, amount: &str, from: &str, to: &str) -> ConversionPipeline {
        pipeline_with(client, amount, from, to, SameCurrencyPolicy::ShortCircuit)
    }

    fn pipeline_with(
        client: Arc<ScriptedClient>,
        amount: &str,
        from: &str,
        to: &str,
        same_currency: SameCurrencyPolicy,
    ) -> ConversionPipeline {
        let settings = PipelineSettings {
            debounce: DEBOUNCE,
            history_capacity: 5,
            same_currency,
        };
        ConversionPipeline::new(
            client,
            settings,
            Arc::new(TokioScheduler),
            ConversionInput::new(amount, code(from), code(to)),
        )
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn ready(state: &PipelineState) -> &Conversion {
        state
            .ready()
            .unwrap_or_else(|| panic!("expected Ready, got {state:?}"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_idle_without_fetching() {
        let client = ScriptedClient::with(vec![ok(0, "1.0")]);
        let pipeline = pipeline(client.clone(), "100", "BRL", "USD");

        sleep(Duration::from_secs(2)).await;
        assert_eq!(pipeline.state(), Phase::Idle);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_conversion() {
        let client = ScriptedClient::with(vec![ok(10, "0.20")]);
        let pipeline = pipeline(client.clone(), "1", "BRL", "USD");

        pipeline.set_amount("100");
        sleep(Duration::from_millis(200)).await;

        let state = pipeline.state();
        let conversion = ready(&state);
        assert_eq!(conversion.result, Some(dec("20")));
        assert_eq!(conversion.rate, Some(dec("0.2")));
        assert_eq!(format!("{:.2}", conversion.result.unwrap()), "20.00");
        assert_eq!(format!("{:.4}", conversion.rate.unwrap()), "0.2000");
        assert_eq!(conversion.percent_change, Some(Decimal::ZERO));
        assert_eq!(client.requested(), vec!["BRLUSD"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_fetches_once() {
        let client = ScriptedClient::with(vec![ok(0, "5.0"), ok(0, "5.0")]);
        let pipeline = pipeline(client.clone(), "", "USD", "BRL");

        for amount in ["1", "10", "100", "1000"] {
            pipeline.set_amount(amount);
            sleep(Duration::from_millis(30)).await;
        }
        sleep(Duration::from_millis(200)).await;

        assert_eq!(client.calls(), 1);
        assert_eq!(ready(&pipeline.state()).result, Some(dec("5000")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_currency_short_circuits() {
        let client = ScriptedClient::with(vec![]);
        let pipeline = pipeline(client.clone(), "", "USD", "USD");

        pipeline.set_amount("42");
        sleep(Duration::from_millis(200)).await;

        let state = pipeline.state();
        let conversion = ready(&state);
        assert_eq!(conversion.result, Some(dec("42")));
        assert_eq!(conversion.rate, Some(Decimal::ONE));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_policy_asks_provider_for_same_currency() {
        let client = ScriptedClient::with(vec![ok(0, "0.998")]);
        let pipeline =
            pipeline_with(client.clone(), "", "USD", "USD", SameCurrencyPolicy::Fetch);

        pipeline.set_amount("1000");
        sleep(Duration::from_millis(200)).await;

        assert_eq!(ready(&pipeline.state()).result, Some(dec("998")));
        assert_eq!(client.requested(), vec!["USDUSD"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_amounts_settle_without_result() {
        let client = ScriptedClient::with(vec![]);
        let pipeline = pipeline(client.clone(), "", "BRL", "USD");

        for amount in ["", "   ", "abc", "-5", "0"] {
            pipeline.set_amount(amount);
            sleep(Duration::from_millis(200)).await;

            let state = pipeline.state();
            let conversion = ready(&state);
            assert_eq!(conversion.result, None, "amount {amount:?}");
            assert_eq!(conversion.rate, None);
        }
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 12.5 ").unwrap(), dec("12.5"));
        assert_eq!(parse_amount("12,5").unwrap(), dec("12.5"));
        assert!(matches!(parse_amount("0"), Err(RateError::Validation(_))));
        assert!(matches!(parse_amount("1.000,5"), Err(RateError::Validation(_))));
        assert!(matches!(parse_amount("ten"), Err(RateError::Validation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_not_a_lockout() {
        let client = ScriptedClient::with(vec![
            Step {
                delay: Duration::from_millis(10),
                outcome: Err(RateError::Provider {
                    status: 500,
                    message: "Internal Server Error".to_string(),
                }),
            },
            ok(100, "5.0"),
        ]);
        let pipeline = pipeline(client.clone(), "", "USD", "BRL");

        pipeline.set_amount("2");
        sleep(Duration::from_millis(200)).await;
        let state = pipeline.state();
        assert_eq!(state.error().map(RateError::kind), Some(ErrorKind::Provider));

        pipeline.set_amount("3");
        sleep(Duration::from_millis(150)).await;
        assert!(pipeline.state().is_loading());

        sleep(Duration::from_millis(100)).await;
        assert_eq!(ready(&pipeline.state()).result, Some(dec("15")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_now_retries_immediately() {
        let client = ScriptedClient::with(vec![
            Step {
                delay: Duration::ZERO,
                outcome: Err(RateError::Network("connection refused".to_string())),
            },
            ok(0, "4.0"),
        ]);
        let pipeline = pipeline(client.clone(), "10", "USD", "BRL");

        pipeline.settle_now().await;
        assert!(matches!(pipeline.state(), Phase::Failed(RateError::Network(_))));

        pipeline.settle_now().await;
        assert_eq!(ready(&pipeline.state()).result, Some(dec("40")));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let client = ScriptedClient::with(vec![ok(1000, "2.0"), ok(10, "3.0")]);
        let pipeline = pipeline(client.clone(), "", "USD", "BRL");

        // Request A settles and stays in flight
        pipeline.set_amount("10");
        sleep(Duration::from_millis(150)).await;
        assert!(pipeline.state().is_loading());

        // Request B settles and resolves before A
        pipeline.set_amount("20");
        sleep(Duration::from_millis(150)).await;
        assert_eq!(ready(&pipeline.state()).result, Some(dec("60")));

        // A finally resolves and must not overwrite B
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(client.calls(), 2);
        let state = pipeline.state();
        assert_eq!(ready(&state).result, Some(dec("60")));
        assert_eq!(ready(&state).rate, Some(dec("3.0")));
    }

    #[tokio::test]
    async fn test_superseded_request_cannot_publish_after_newer_one() {
        let client = ScriptedClient::with(Vec::new());
        let pipeline = pipeline(client.clone(), "10", "USD", "BRL");
        let shared = &pipeline.shared;

        // A is issued, then B is issued and publishes first
        let request_a = shared.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        let request_b = shared.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        let pair = CurrencyPair::new(code("USD"), code("BRL"));
        assert!(shared.publish(request_b, Phase::Ready(Conversion::nothing(pair.clone()))));

        let late = Conversion::identity(pair.clone(), dec("10"), Utc::now());
        assert!(!shared.publish(request_a, Phase::Ready(late)));
        assert_eq!(pipeline.state(), Phase::Ready(Conversion::nothing(pair)));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_percent_change_from_history_or_provider() {
        let client = ScriptedClient::with(vec![
            ok(0, "5.0"),
            ok(0, "5.5"),
            Step {
                delay: Duration::ZERO,
                outcome: Ok(("5.6", Some("0.75"))),
            },
        ]);
        let pipeline = pipeline(client.clone(), "1", "USD", "BRL");

        pipeline.settle_now().await;
        assert_eq!(ready(&pipeline.state()).percent_change, Some(Decimal::ZERO));

        pipeline.settle_now().await;
        assert_eq!(ready(&pipeline.state()).percent_change, Some(dec("10")));

        pipeline.settle_now().await;
        assert_eq!(ready(&pipeline.state()).percent_change, Some(dec("0.75")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_base_change_resets_history() {
        let client = ScriptedClient::with(vec![ok(0, "5.0"), ok(0, "6.0"), ok(0, "5.5")]);
        let pipeline = pipeline(client.clone(), "1", "USD", "BRL");

        pipeline.settle_now().await;
        pipeline.set_base(code("EUR"));
        sleep(Duration::from_millis(200)).await;
        pipeline.set_base(code("USD"));
        sleep(Duration::from_millis(200)).await;

        assert_eq!(client.requested(), vec!["USDBRL", "EURBRL", "USDBRL"]);
        // Without the reset this would be +10% against the first USD/BRL quote
        assert_eq!(ready(&pipeline.state()).percent_change, Some(Decimal::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_exchanges_pair_and_refetches() {
        let client = ScriptedClient::with(vec![ok(0, "0.2"), ok(0, "5.0")]);
        let pipeline = pipeline(client.clone(), "10", "BRL", "USD");

        pipeline.settle_now().await;
        pipeline.swap();
        assert_eq!(pipeline.input().pair, CurrencyPair::new(code("USD"), code("BRL")));
        sleep(Duration::from_millis(200)).await;

        assert_eq!(client.requested(), vec!["BRLUSD", "USDBRL"]);
        assert_eq!(ready(&pipeline.state()).result, Some(dec("50")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disposed_pipeline_ignores_late_results() {
        let client = ScriptedClient::with(vec![ok(500, "5.0"), ok(0, "5.0")]);
        let pipeline = pipeline(client.clone(), "", "USD", "BRL");
        let rx = pipeline.subscribe();

        pipeline.set_amount("1");
        sleep(Duration::from_millis(150)).await;
        assert!(rx.borrow().is_loading());

        pipeline.dispose();
        pipeline.set_amount("2");
        sleep(Duration::from_secs(1)).await;

        assert!(rx.borrow().is_loading());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_settle() {
        let client = ScriptedClient::with(vec![ok(0, "5.0")]);
        let pipeline = pipeline(client.clone(), "", "USD", "BRL");
        let rx = pipeline.subscribe();

        pipeline.set_amount("1");
        drop(pipeline);
        sleep(Duration::from_secs(1)).await;

        assert_eq!(*rx.borrow(), Phase::Idle);
        assert_eq!(client.calls(), 0);
    }
}
