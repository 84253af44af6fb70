// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full resolution and monitoring stack with
//! mock sources, a recording scheduler and sink, a manual clock, and either
//! an in-memory store or a temp SQLite database.

use std::sync::Arc;

use flightwatch_config::model::{FlightwatchConfig, StorageBackendKind};
use flightwatch_core::{FlightwatchError, ManualClock, StoreBackend};
use flightwatch_monitor::Flightwatch;
use flightwatch_storage::MemoryBackend;

use crate::mock_scheduler::{MockScheduler, RecordingSink};
use crate::mock_source::MockSource;

pub struct TestHarnessBuilder {
    config: FlightwatchConfig,
    gds: Option<MockSource>,
    api: Option<MockSource>,
    scraper: Option<(String, MockSource)>,
    sqlite: bool,
    scheduler: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = FlightwatchConfig::default();
        config.lock.poll_interval_ms = 5;
        Self {
            config,
            gds: None,
            api: None,
            scraper: None,
            sqlite: false,
            scheduler: true,
        }
    }

    pub fn with_gds(mut self, source: MockSource) -> Self {
        self.gds = Some(source);
        self
    }

    pub fn with_api(mut self, source: MockSource) -> Self {
        self.api = Some(source);
        self
    }

    /// Registers a scraper for `airline`.
    pub fn with_scraper(mut self, airline: &str, source: MockSource) -> Self {
        self.scraper = Some((airline.to_string(), source));
        self
    }

    /// Adjusts the configuration before the stack is built.
    pub fn with_config(mut self, adjust: impl FnOnce(&mut FlightwatchConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    /// Stores everything in a temp SQLite file instead of memory.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    /// Leaves the external scheduler out so only local timers trigger checks.
    pub fn without_scheduler(mut self) -> Self {
        self.scheduler = false;
        self
    }

    pub async fn build(self) -> Result<TestHarness, FlightwatchError> {
        let clock = Arc::new(ManualClock::default());
        let mut config = self.config;

        let temp_dir = if self.sqlite {
            let dir = tempfile::TempDir::new().map_err(FlightwatchError::storage)?;
            config.storage.backend = StorageBackendKind::Sqlite;
            config.storage.database_path = dir
                .path()
                .join("flightwatch.db")
                .to_string_lossy()
                .into_owned();
            Some(dir)
        } else {
            None
        };

        let backend: Arc<dyn StoreBackend> = if self.sqlite {
            flightwatch_storage::open_backend(&config.storage, clock.clone()).await?
        } else {
            Arc::new(MemoryBackend::with_clock(clock.clone()))
        };

        let gds = self.gds.map(Arc::new);
        let api = self.api.map(Arc::new);
        let scraper = self.scraper.map(|(airline, source)| (airline, Arc::new(source)));
        let scheduler = Arc::new(MockScheduler::new());
        let sink = Arc::new(RecordingSink::new());

        let mut builder = Flightwatch::builder(config.clone())
            .clock(clock.clone())
            .backend(backend.clone())
            .sink(sink.clone());
        if let Some(gds) = &gds {
            builder = builder.gds(gds.clone());
        }
        if let Some(api) = &api {
            builder = builder.api(api.clone());
        }
        if let Some((airline, source)) = &scraper {
            builder = builder.scraper(airline, source.clone());
        }
        if self.scheduler {
            builder = builder.scheduler(scheduler.clone());
        }
        let flightwatch = builder.build().await?;

        Ok(TestHarness {
            flightwatch,
            backend,
            clock,
            gds,
            api,
            scraper: scraper.map(|(_, source)| source),
            scheduler,
            sink,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete Flightwatch stack with mock collaborators.
pub struct TestHarness {
    pub flightwatch: Flightwatch,
    pub backend: Arc<dyn StoreBackend>,
    pub clock: Arc<ManualClock>,
    pub gds: Option<Arc<MockSource>>,
    pub api: Option<Arc<MockSource>>,
    pub scraper: Option<Arc<MockSource>>,
    pub scheduler: Arc<MockScheduler>,
    pub sink: Arc<RecordingSink>,
    pub config: FlightwatchConfig,
    /// Keeps the SQLite file alive for the harness lifetime.
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Total calls across every configured mock source.
    pub fn source_calls(&self) -> usize {
        [&self.gds, &self.api, &self.scraper]
            .into_iter()
            .flatten()
            .map(|source| source.calls())
            .sum()
    }
}
