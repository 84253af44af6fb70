// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The caller-facing surface and its composition root.
//!
//! [`FlightwatchBuilder`] constructs the store, cache, lock, resolver,
//! resolution service and monitoring engine exactly once; everything is
//! injected from here, nothing is looked up at call time.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use flightwatch_bus::EventBus;
use flightwatch_cache::{CacheStore, DistributedLock};
use flightwatch_config::model::FlightwatchConfig;
use flightwatch_core::{
    Clock, EventSink, FlightSource, FlightwatchError, HistoryRecord, JobScheduler, MonitoringJob,
    MonitoringOptions, ResolutionKey, ResolutionOutcome, StoreBackend, SystemClock,
};
use flightwatch_resolver::{CascadingResolver, ResolutionService, ResolveOptions};

use crate::engine::MonitoringEngine;

/// Resolution and monitoring keyed by raw booking reference and surname.
#[derive(Clone)]
pub struct Flightwatch {
    service: Arc<ResolutionService>,
    engine: Arc<MonitoringEngine>,
    bus: Option<EventBus>,
}

impl Flightwatch {
    pub fn builder(config: FlightwatchConfig) -> FlightwatchBuilder {
        FlightwatchBuilder::new(config)
    }

    pub fn service(&self) -> &Arc<ResolutionService> {
        &self.service
    }

    pub fn engine(&self) -> &Arc<MonitoringEngine> {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        self.service.cache()
    }

    /// The built-in bus, unless a custom sink was supplied.
    pub fn bus(&self) -> Option<&EventBus> {
        self.bus.as_ref()
    }

    pub async fn resolve(
        &self,
        booking_reference: &str,
        last_name: &str,
        options: &ResolveOptions,
    ) -> Result<ResolutionOutcome, FlightwatchError> {
        let key = ResolutionKey::new(booking_reference, last_name)?;
        self.service.resolve(&key, options).await
    }

    pub async fn start_monitoring(
        &self,
        booking_reference: &str,
        last_name: &str,
        options: MonitoringOptions,
    ) -> Result<MonitoringJob, FlightwatchError> {
        let key = ResolutionKey::new(booking_reference, last_name)?;
        self.engine.start(&key, options).await
    }

    pub async fn stop_monitoring(
        &self,
        booking_reference: &str,
        last_name: &str,
    ) -> Result<bool, FlightwatchError> {
        let key = ResolutionKey::new(booking_reference, last_name)?;
        self.engine.stop(&key).await
    }

    pub async fn get_job(
        &self,
        booking_reference: &str,
        last_name: &str,
    ) -> Result<Option<MonitoringJob>, FlightwatchError> {
        let key = ResolutionKey::new(booking_reference, last_name)?;
        self.engine.get_job(&key).await
    }

    pub async fn list_active_jobs(&self) -> Result<Vec<MonitoringJob>, FlightwatchError> {
        self.engine.list_active_jobs().await
    }

    pub async fn list_all_jobs(&self) -> Result<Vec<MonitoringJob>, FlightwatchError> {
        self.engine.list_all_jobs().await
    }

    pub async fn get_history(
        &self,
        booking_reference: &str,
        last_name: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, FlightwatchError> {
        let key = ResolutionKey::new(booking_reference, last_name)?;
        self.service.cache().get_history(&key, limit).await
    }

    pub async fn check_now(
        &self,
        booking_reference: &str,
        last_name: &str,
    ) -> Result<MonitoringJob, FlightwatchError> {
        let key = ResolutionKey::new(booking_reference, last_name)?;
        self.engine.check_now(&key).await
    }

    pub async fn latest_changes(
        &self,
        booking_reference: &str,
        last_name: &str,
    ) -> Result<Vec<String>, FlightwatchError> {
        let key = ResolutionKey::new(booking_reference, last_name)?;
        self.engine.latest_changes(&key).await
    }

    /// Drops expired keys from the backing store every `every` until
    /// `cancel` fires. Keys that are never read again would otherwise stay.
    pub fn spawn_purge(&self, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let backend = self.cache().backend().clone();
        let every = every.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match backend.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "purged expired keys"),
                    Err(e) => warn!(error = %e, "purging expired keys failed"),
                }
            }
            debug!("purge task stopped");
        })
    }

    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}

pub struct FlightwatchBuilder {
    config: FlightwatchConfig,
    clock: Arc<dyn Clock>,
    backend: Option<Arc<dyn StoreBackend>>,
    gds: Option<Arc<dyn FlightSource>>,
    api: Option<Arc<dyn FlightSource>>,
    scrapers: Vec<(String, Arc<dyn FlightSource>)>,
    default_scraper: Option<Arc<dyn FlightSource>>,
    scheduler: Option<Arc<dyn JobScheduler>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl FlightwatchBuilder {
    pub fn new(config: FlightwatchConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            backend: None,
            gds: None,
            api: None,
            scrapers: Vec::new(),
            default_scraper: None,
            scheduler: None,
            sink: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Uses `backend` instead of opening the one named in `[storage]`.
    pub fn backend(mut self, backend: Arc<dyn StoreBackend>) -> Self {
        self.backend = Some(backend);
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

    pub fn scraper(mut self, airline: &str, source: Arc<dyn FlightSource>) -> Self {
        self.scrapers.push((airline.to_string(), source));
        self
    }

    pub fn default_scraper(mut self, source: Arc<dyn FlightSource>) -> Self {
        self.default_scraper = Some(source);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn JobScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Publishes events to `sink` instead of a built-in [`EventBus`].
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub async fn build(self) -> Result<Flightwatch, FlightwatchError> {
        let config = self.config;
        let backend = match self.backend {
            Some(backend) => backend,
            None => flightwatch_storage::open_backend(&config.storage, self.clock.clone()).await?,
        };

        flightwatch_cache::recording::register_metrics();
        flightwatch_resolver::recording::register_metrics();

        let cache = Arc::new(CacheStore::new(
            backend.clone(),
            self.clock.clone(),
            &config.cache,
            &config.rate_limit,
        ));
        let lock = Arc::new(DistributedLock::new(
            backend,
            self.clock.clone(),
            &config.lock,
        ));

        let mut resolver = CascadingResolver::builder()
            .config(&config.resolver)
            .clock(self.clock.clone());
        if let Some(gds) = self.gds {
            resolver = resolver.gds(gds);
        }
        if let Some(api) = self.api {
            resolver = resolver.api(api);
        }
        for (airline, scraper) in self.scrapers {
            resolver = resolver.scraper(&airline, scraper);
        }
        if let Some(scraper) = self.default_scraper {
            resolver = resolver.default_scraper(scraper);
        }
        let resolver = Arc::new(resolver.build());
        info!(
            gds = resolver.has_gds(),
            api = resolver.has_api(),
            scrapers = ?resolver.scrapers().airlines(),
            "source layers configured"
        );

        let service = Arc::new(ResolutionService::new(
            cache,
            lock,
            resolver,
            self.clock.clone(),
        ));

        let (sink, bus): (Arc<dyn EventSink>, Option<EventBus>) = match self.sink {
            Some(sink) => (sink, None),
            None => {
                let bus = EventBus::with_capacity(config.monitor.event_buffer);
                (Arc::new(bus.clone()), Some(bus))
            }
        };

        let engine = MonitoringEngine::new(
            service.clone(),
            self.scheduler,
            sink,
            self.clock,
            &config.monitor,
        )?;

        Ok(Flightwatch {
            service,
            engine,
            bus,
        })
    }
}
