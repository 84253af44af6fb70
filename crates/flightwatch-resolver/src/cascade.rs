// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered GDS → external API → scraping cascade.
//!
//! Layers run strictly in order and the first success short-circuits. Every
//! layer call is bounded by a timeout and isolated from panics, so one failing
//! collaborator only ever produces a failed [`LayerAttempt`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use flightwatch_config::model::ResolverConfig;
use flightwatch_core::{
    AttemptLog, Clock, FlightDetails, FlightHint, FlightSource, LayerAttempt, PluginAdapter,
    ResolutionFailure, ResolutionKey, ResolutionOutcome, SourceError, SourceLayer, SourceQuery,
    StatusCode, SystemClock,
};

use crate::airline::extract_airline_code;
use crate::recording;
use crate::scrapers::ScraperRegistry;

/// The three-layer resolver. Build with [`CascadingResolver::builder`].
pub struct CascadingResolver {
    gds: Option<Arc<dyn FlightSource>>,
    api: Option<Arc<dyn FlightSource>>,
    scrapers: ScraperRegistry,
    layer_timeout: Duration,
    retry_after_secs: u64,
    suggestion: String,
    clock: Arc<dyn Clock>,
}

enum LayerResult {
    Found(FlightDetails),
    Failed(SourceError),
}

impl CascadingResolver {
    pub fn builder() -> CascadingResolverBuilder {
        CascadingResolverBuilder::default()
    }

    pub fn has_gds(&self) -> bool {
        self.gds.is_some()
    }

    pub fn has_api(&self) -> bool {
        self.api.is_some()
    }

    pub fn scrapers(&self) -> &ScraperRegistry {
        &self.scrapers
    }

    /// Runs the cascade for `key`. Never fails: exhaustion is reported as an
    /// `AllLayersFailed` outcome carrying the full attempt log.
    pub async fn resolve(&self, key: &ResolutionKey, airline: Option<&str>) -> ResolutionOutcome {
        let started = Instant::now();
        let mut attempts = AttemptLog::default();
        let mut hint = FlightHint {
            airline: airline.map(|a| a.trim().to_uppercase()).filter(|a| !a.is_empty()),
            ..FlightHint::default()
        };

        if let Some(gds) = &self.gds {
            let query = booking_query(key, &hint);
            if let Some(flight) = self
                .run_layer(SourceLayer::Gds, gds, &query, &mut attempts, &mut hint)
                .await
            {
                return self.found(key, flight, SourceLayer::Gds, attempts, started);
            }
        }

        if let Some(api) = &self.api {
            let query = match (&hint.flight_number, hint.date) {
                (Some(flight_number), Some(date)) => SourceQuery::Flight {
                    flight_number: flight_number.clone(),
                    date,
                    airline: hint.airline.clone(),
                },
                _ => booking_query(key, &hint),
            };
            if let Some(flight) = self
                .run_layer(SourceLayer::ExternalApi, api, &query, &mut attempts, &mut hint)
                .await
            {
                return self.found(key, flight, SourceLayer::ExternalApi, attempts, started);
            }
        }

        let airline_hint = hint
            .airline
            .clone()
            .or_else(|| hint.flight_number.as_deref().and_then(extract_airline_code));
        if !self.scrapers.is_empty() || airline_hint.is_some() {
            match self.scrapers.select(airline_hint.as_deref()) {
                Some(scraper) => {
                    hint.airline = airline_hint;
                    let query = booking_query(key, &hint);
                    if let Some(flight) = self
                        .run_layer(
                            SourceLayer::WebScraping,
                            &scraper,
                            &query,
                            &mut attempts,
                            &mut hint,
                        )
                        .await
                    {
                        return self.found(key, flight, SourceLayer::WebScraping, attempts, started);
                    }
                }
                None => {
                    let code = airline_hint.unwrap_or_else(|| "unknown".to_string());
                    debug!(key = %key, airline = %code, "no scraper for airline");
                    attempts.scraping =
                        LayerAttempt::failed(format!("no scraper registered for airline {code}"), 0);
                }
            }
        }

        attempts.total_duration_ms = elapsed_ms(started);
        warn!(
            key = %key,
            duration_ms = attempts.total_duration_ms,
            "all source layers failed"
        );
        recording::record_resolution(SourceLayer::None);
        ResolutionOutcome::failed(
            key.clone(),
            StatusCode::FlightStatusUnavailable,
            ResolutionFailure::AllLayersFailed {
                retry_after_secs: self.retry_after_secs,
                suggestion: self.suggestion.clone(),
            },
            attempts,
            self.clock.now(),
        )
    }

    async fn run_layer(
        &self,
        layer: SourceLayer,
        source: &Arc<dyn FlightSource>,
        query: &SourceQuery,
        attempts: &mut AttemptLog,
        hint: &mut FlightHint,
    ) -> Option<FlightDetails> {
        let started = Instant::now();
        let call = AssertUnwindSafe(source.attempt_resolve(query)).catch_unwind();
        let result = match tokio::time::timeout(self.layer_timeout, call).await {
            Ok(Ok(Ok(flight))) => LayerResult::Found(flight),
            Ok(Ok(Err(err))) => LayerResult::Failed(err),
            Ok(Err(_panic)) => LayerResult::Failed(SourceError::new(format!(
                "{} panicked",
                source.name()
            ))),
            Err(_) => LayerResult::Failed(SourceError::new(format!(
                "timed out after {}s",
                self.layer_timeout.as_secs_f64()
            ))),
        };
        let duration_ms = elapsed_ms(started);

        match result {
            LayerResult::Found(flight) => {
                debug!(layer = %layer, source = source.name(), duration_ms, "layer resolved");
                recording::record_layer_attempt(layer, true, duration_ms);
                if let Some(slot) = attempts.layer_mut(layer) {
                    *slot = LayerAttempt::succeeded(duration_ms);
                }
                Some(flight)
            }
            LayerResult::Failed(err) => {
                debug!(
                    layer = %layer,
                    source = source.name(),
                    duration_ms,
                    error = %err.message,
                    "layer failed"
                );
                recording::record_layer_attempt(layer, false, duration_ms);
                if let Some(partial) = err.partial {
                    hint.merge(partial);
                }
                if let Some(slot) = attempts.layer_mut(layer) {
                    *slot = LayerAttempt::failed(err.message, duration_ms);
                }
                None
            }
        }
    }

    fn found(
        &self,
        key: &ResolutionKey,
        flight: FlightDetails,
        layer: SourceLayer,
        mut attempts: AttemptLog,
        started: Instant,
    ) -> ResolutionOutcome {
        attempts.total_duration_ms = elapsed_ms(started);
        info!(
            key = %key,
            layer = %layer,
            flight = %flight.flight_number,
            duration_ms = attempts.total_duration_ms,
            "flight status resolved"
        );
        recording::record_resolution(layer);
        ResolutionOutcome::found(key.clone(), flight, layer, attempts, self.clock.now())
    }
}

fn booking_query(key: &ResolutionKey, hint: &FlightHint) -> SourceQuery {
    SourceQuery::Booking {
        booking_reference: key.booking_reference().to_string(),
        last_name: key.last_name().to_string(),
        airline: hint.airline.clone(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Builder for [`CascadingResolver`]. Layers left unset are skipped and
/// recorded as `tried = false`.
pub struct CascadingResolverBuilder {
    gds: Option<Arc<dyn FlightSource>>,
    api: Option<Arc<dyn FlightSource>>,
    scrapers: ScraperRegistry,
    layer_timeout: Duration,
    retry_after_secs: u64,
    suggestion: String,
    clock: Arc<dyn Clock>,
}

impl Default for CascadingResolverBuilder {
    fn default() -> Self {
        let defaults = ResolverConfig::default();
        Self {
            gds: None,
            api: None,
            scrapers: ScraperRegistry::new(),
            layer_timeout: Duration::from_secs(defaults.layer_timeout_secs),
            retry_after_secs: defaults.retry_after_secs,
            suggestion: defaults.suggestion,
            clock: Arc::new(SystemClock),
        }
    }
}

impl CascadingResolverBuilder {
    /// Applies timeout, retry hint and suggestion from configuration.
    pub fn config(mut self, config: &ResolverConfig) -> Self {
        self.layer_timeout = Duration::from_secs(config.layer_timeout_secs);
        self.retry_after_secs = config.retry_after_secs;
        self.suggestion = config.suggestion.clone();
        self
    }

    pub fn gds(mut self, source: Arc<dyn FlightSource>) -> Self {
        self.gds = Some(source);
        self
    }

    pub fn api(mut self, source: Arc<dyn FlightSource>) -> Self {
        self.api = Some(source);
        self
    }

    /// Registers a scraper for one airline designator.
    pub fn scraper(mut self, airline: &str, source: Arc<dyn FlightSource>) -> Self {
        self.scrapers.register(airline, source);
        self
    }

    /// Scraper used when none matches the airline.
    pub fn default_scraper(mut self, source: Arc<dyn FlightSource>) -> Self {
        self.scrapers.set_fallback(source);
        self
    }

    pub fn scrapers(mut self, registry: ScraperRegistry) -> Self {
        self.scrapers = registry;
        self
    }

    pub fn layer_timeout(mut self, timeout: Duration) -> Self {
        self.layer_timeout = timeout;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> CascadingResolver {
        CascadingResolver {
            gds: self.gds,
            api: self.api,
            scrapers: self.scrapers,
            layer_timeout: self.layer_timeout,
            retry_after_secs: self.retry_after_secs,
            suggestion: self.suggestion,
            clock: self.clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightwatch_test_utils::MockSource;
    use flightwatch_test_utils::fixtures::flight;

    fn key() -> ResolutionKey {
        ResolutionKey::new("abc123", "smith").unwrap()
    }

    #[tokio::test]
    async fn gds_success_short_circuits() {
        let gds = Arc::new(MockSource::succeeding("gds", flight("BA117")));
        let api = Arc::new(MockSource::succeeding("api", flight("BA117")));
        let resolver = CascadingResolver::builder()
            .gds(gds.clone())
            .api(api.clone())
            .build();

        let outcome = resolver.resolve(&key(), None).await;
        assert!(outcome.success);
        assert_eq!(outcome.source_layer, SourceLayer::Gds);
        assert!(outcome.attempts.gds.success);
        assert!(!outcome.attempts.external_api.tried);
        assert!(!outcome.attempts.scraping.tried);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn failing_gds_falls_through_to_api() {
        let gds = Arc::new(MockSource::failing("gds", "gds down"));
        let api = Arc::new(MockSource::succeeding("api", flight("LH400")));
        let resolver = CascadingResolver::builder().gds(gds).api(api).build();

        let outcome = resolver.resolve(&key(), None).await;
        assert!(outcome.success);
        assert_eq!(outcome.source_layer, SourceLayer::ExternalApi);
        assert!(outcome.attempts.gds.tried);
        assert!(!outcome.attempts.gds.success);
        assert_eq!(outcome.attempts.gds.error.as_deref(), Some("gds down"));
        assert!(outcome.attempts.external_api.tried);
        assert!(outcome.attempts.external_api.success);
        assert!(!outcome.attempts.scraping.tried);
    }

    #[tokio::test]
    async fn partial_gds_result_switches_api_to_flight_query() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let gds = Arc::new(MockSource::rejecting(
            "gds",
            SourceError::new("segment detail unavailable").with_partial(FlightHint {
                flight_number: Some("BA117".into()),
                date: Some(date),
                airline: Some("BA".into()),
            }),
        ));
        let api = Arc::new(MockSource::succeeding("api", flight("BA117")));
        let resolver = CascadingResolver::builder().gds(gds).api(api.clone()).build();

        resolver.resolve(&key(), None).await;
        assert_eq!(
            api.last_query(),
            Some(SourceQuery::Flight {
                flight_number: "BA117".into(),
                date,
                airline: Some("BA".into()),
            })
        );
    }

    #[tokio::test]
    async fn all_layers_failing_reports_retry_hint() {
        let resolver = CascadingResolver::builder()
            .gds(Arc::new(MockSource::failing("gds", "a")))
            .api(Arc::new(MockSource::failing("api", "b")))
            .default_scraper(Arc::new(MockSource::failing("scraper", "c")))
            .build();

        let outcome = resolver.resolve(&key(), None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.source_layer, SourceLayer::None);
        assert_eq!(outcome.status_code, StatusCode::FlightStatusUnavailable);
        assert_eq!(outcome.retry_after_secs(), Some(300));
        assert!(outcome.attempts.gds.tried);
        assert!(outcome.attempts.external_api.tried);
        assert!(outcome.attempts.scraping.tried);
        assert!(outcome.flight.is_none());
    }

    #[tokio::test]
    async fn unconfigured_layers_are_not_tried() {
        let outcome = CascadingResolver::builder().build().resolve(&key(), None).await;
        assert!(!outcome.success);
        assert!(!outcome.attempts.gds.tried);
        assert!(!outcome.attempts.external_api.tried);
        assert!(!outcome.attempts.scraping.tried);
    }

    #[tokio::test]
    async fn airline_hint_without_scraper_records_error() {
        let outcome = CascadingResolver::builder()
            .build()
            .resolve(&key(), Some("ba"))
            .await;
        assert!(outcome.attempts.scraping.tried);
        assert_eq!(
            outcome.attempts.scraping.error.as_deref(),
            Some("no scraper registered for airline BA")
        );
    }

    #[tokio::test]
    async fn scraper_is_selected_by_airline() {
        let ba = Arc::new(MockSource::succeeding("ba-scraper", flight("BA117")));
        let lh = Arc::new(MockSource::succeeding("lh-scraper", flight("LH400")));
        let resolver = CascadingResolver::builder()
            .scraper("BA", ba.clone())
            .scraper("LH", lh.clone())
            .build();

        let outcome = resolver.resolve(&key(), Some("LH")).await;
        assert_eq!(outcome.source_layer, SourceLayer::WebScraping);
        assert_eq!(lh.calls(), 1);
        assert_eq!(ba.calls(), 0);
        assert_eq!(
            lh.last_query(),
            Some(SourceQuery::Booking {
                booking_reference: "ABC123".into(),
                last_name: "SMITH".into(),
                airline: Some("LH".into()),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_layer_times_out() {
        let gds = Arc::new(MockSource::succeeding("gds", flight("BA117")).with_delay(Duration::from_secs(60)));
        let api = Arc::new(MockSource::succeeding("api", flight("BA117")));
        let resolver = CascadingResolver::builder()
            .gds(gds)
            .api(api)
            .layer_timeout(Duration::from_secs(5))
            .build();

        let outcome = resolver.resolve(&key(), None).await;
        assert_eq!(outcome.source_layer, SourceLayer::ExternalApi);
        assert!(
            outcome
                .attempts
                .gds
                .error
                .as_deref()
                .is_some_and(|e| e.starts_with("timed out"))
        );
    }

    #[tokio::test]
    async fn panicking_layer_does_not_abort_cascade() {
        let resolver = CascadingResolver::builder()
            .gds(Arc::new(MockSource::panicking("gds")))
            .api(Arc::new(MockSource::succeeding("api", flight("BA117"))))
            .build();

        let outcome = resolver.resolve(&key(), None).await;
        assert!(outcome.success);
        assert_eq!(outcome.attempts.gds.error.as_deref(), Some("gds panicked"));
    }
}
