// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Continuous monitoring for Flightwatch.
//!
//! [`MonitoringEngine`] turns single resolutions into supervised polling
//! jobs with change detection, notification filtering and auto-stop.
//! [`Flightwatch`] is the caller-facing facade built by
//! [`FlightwatchBuilder`].

pub mod changes;
pub mod engine;
pub mod facade;
pub mod job_store;
pub mod notify;

pub use changes::{ChangeKind, FlightChange, detect_changes};
pub use engine::MonitoringEngine;
pub use facade::{Flightwatch, FlightwatchBuilder};
pub use job_store::JobStore;
pub use notify::notifiable_changes;

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use flightwatch_config::model::FlightwatchConfig;
    use flightwatch_core::{
        AdapterType, AutoStop, FlightDetails, FlightEndpoint, FlightSource, FlightStatus,
        FlightwatchError, HealthStatus, ManualClock, MonitorEvent, MonitoringOptions,
        MonitoringStatus, PluginAdapter, SourceError, SourceQuery, StoreBackend,
    };
    use flightwatch_storage::MemoryBackend;

    use crate::facade::Flightwatch;

    pub fn flight() -> FlightDetails {
        let departs = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let endpoint = |airport: &str, gate: Option<&str>| FlightEndpoint {
            airport: airport.into(),
            scheduled_time: departs,
            estimated_time: None,
            actual_time: None,
            terminal: Some("5".into()),
            gate: gate.map(Into::into),
            delay_minutes: None,
        };
        FlightDetails {
            flight_number: "BA117".into(),
            airline_code: "BA".into(),
            airline_name: "British Airways".into(),
            aircraft: Some("B777".into()),
            status: FlightStatus::Scheduled,
            departure: endpoint("LHR", Some("A1")),
            arrival: endpoint("JFK", None),
            passengers: Vec::new(),
            last_updated: departs,
        }
    }

    /// Answers from a script; the last answer repeats once the script runs out.
    struct ScriptedSource {
        script: Mutex<VecDeque<FlightDetails>>,
        last: Mutex<Option<FlightDetails>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<FlightDetails>, delay: Option<Duration>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PluginAdapter for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }

        fn adapter_type(&self) -> AdapterType {
            AdapterType::Source
        }

        async fn health_check(&self) -> Result<HealthStatus, FlightwatchError> {
            Ok(HealthStatus::Healthy)
        }

        async fn shutdown(&self) -> Result<(), FlightwatchError> {
            Ok(())
        }
    }

    #[async_trait]
    impl FlightSource for ScriptedSource {
        async fn attempt_resolve(&self, _query: &SourceQuery) -> Result<FlightDetails, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(flight) = next {
                *last = Some(flight);
            }
            last.clone().ok_or_else(|| SourceError::new("script empty"))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<MonitorEvent>>,
    }

    impl RecordingSink {
        fn names(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(|e| e.name()).collect()
        }

        fn notifications(&self) -> Vec<Vec<String>> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    MonitorEvent::NotificationSend(request) => Some(request.changes.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl flightwatch_core::EventSink for RecordingSink {
        fn publish(&self, event: MonitorEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    struct Rig {
        fw: Flightwatch,
        source: Arc<ScriptedSource>,
        sink: Arc<RecordingSink>,
        clock: Arc<ManualClock>,
    }

    async fn rig(script: Vec<FlightDetails>, delay: Option<Duration>) -> Rig {
        let clock = Arc::new(ManualClock::default());
        let backend: Arc<dyn StoreBackend> = Arc::new(MemoryBackend::with_clock(clock.clone()));
        let source = ScriptedSource::new(script, delay);
        let sink = Arc::new(RecordingSink::default());
        let mut config = FlightwatchConfig::default();
        config.lock.poll_interval_ms = 5;
        let fw = Flightwatch::builder(config)
            .clock(clock.clone())
            .backend(backend)
            .gds(source.clone())
            .sink(sink.clone())
            .build()
            .await
            .unwrap();
        Rig {
            fw,
            source,
            sink,
            clock,
        }
    }

    fn moved_gate() -> FlightDetails {
        let mut f = flight();
        f.departure.gate = Some("A2".into());
        f
    }

    #[tokio::test]
    async fn start_takes_a_baseline_and_rejects_duplicates() {
        let r = rig(vec![flight()], None).await;
        let job = r
            .fw
            .start_monitoring("abc123", "smith", MonitoringOptions::default())
            .await
            .unwrap();
        assert_eq!(job.id, "ABC123:SMITH");
        assert_eq!(job.status, MonitoringStatus::Active);
        assert_eq!(job.interval_minutes, 15);
        assert_eq!(job.checks_performed, 0);
        assert!(job.current_snapshot.as_ref().is_some_and(|s| s.success));
        assert_eq!(r.fw.engine().local_timer_count(), 1);

        let again = r
            .fw
            .start_monitoring("ABC123", "SMITH", MonitoringOptions::default())
            .await;
        assert!(matches!(
            again,
            Err(FlightwatchError::AlreadyMonitoring { job_id }) if job_id == "ABC123:SMITH"
        ));
        assert_eq!(r.sink.names(), vec!["monitoring:started"]);
        r.fw.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_starts_for_one_key_yield_one_job() {
        let r = rig(vec![flight()], Some(Duration::from_millis(200))).await;
        let starts: Vec<_> = (0..2)
            .map(|_| {
                let fw = r.fw.clone();
                tokio::spawn(async move {
                    fw.start_monitoring("ABC123", "SMITH", MonitoringOptions::default())
                        .await
                })
            })
            .collect();

        let (mut started, mut rejected) = (0, 0);
        for handle in starts {
            match handle.await.unwrap() {
                Ok(job) => {
                    assert!(job.is_active());
                    assert!(job.current_snapshot.is_some());
                    started += 1;
                }
                Err(FlightwatchError::AlreadyMonitoring { job_id }) => {
                    assert_eq!(job_id, "ABC123:SMITH");
                    rejected += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((started, rejected), (1, 1));
        assert_eq!(r.sink.names(), vec!["monitoring:started"]);
        assert_eq!(r.fw.engine().local_timer_count(), 1);
        assert_eq!(r.source.calls(), 1);
        r.fw.shutdown().await;
    }

    #[tokio::test]
    async fn interval_outside_bounds_is_rejected() {
        let r = rig(vec![flight()], None).await;
        let options = MonitoringOptions {
            interval_minutes: Some(5000),
            ..MonitoringOptions::default()
        };
        let err = r
            .fw
            .start_monitoring("ABC123", "SMITH", options)
            .await
            .unwrap_err();
        assert!(matches!(err, FlightwatchError::InvalidOptions(_)));
        assert_eq!(r.source.calls(), 0);
    }

    #[tokio::test]
    async fn gate_change_is_detected_and_notified() {
        let r = rig(vec![flight(), moved_gate()], None).await;
        r.fw
            .start_monitoring("ABC123", "SMITH", MonitoringOptions::default())
            .await
            .unwrap();

        let job = r.fw.check_now("ABC123", "SMITH").await.unwrap();
        assert_eq!(job.checks_performed, 1);
        assert_eq!(job.changes_detected, 1);
        assert_eq!(
            r.sink.notifications(),
            vec![vec!["Departure gate changed from A1 to A2".to_string()]]
        );
        assert_eq!(
            r.sink.names(),
            vec!["monitoring:started", "flight:changed", "notification:send"]
        );

        let history = r.fw.get_history("ABC123", "SMITH", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(
            history[0].changes_detected.as_deref(),
            Some(&["Departure gate changed from A1 to A2".to_string()][..])
        );
        assert_eq!(
            r.fw.latest_changes("ABC123", "SMITH").await.unwrap(),
            vec!["Departure gate changed from A1 to A2".to_string()]
        );
        r.fw.shutdown().await;
    }

    #[tokio::test]
    async fn gate_notifications_can_be_switched_off() {
        let r = rig(vec![flight(), moved_gate()], None).await;
        let options = MonitoringOptions {
            notify_on_gate_change: false,
            ..MonitoringOptions::default()
        };
        r.fw.start_monitoring("ABC123", "SMITH", options).await.unwrap();
        r.fw.check_now("ABC123", "SMITH").await.unwrap();
        assert!(r.sink.notifications().is_empty());
        assert!(r.sink.names().contains(&"flight:changed"));
        r.fw.shutdown().await;
    }

    #[tokio::test]
    async fn departure_auto_stops_and_no_further_checks_run() {
        let mut departed = flight();
        departed.status = FlightStatus::Departed;
        let r = rig(vec![flight(), departed], None).await;
        let options = MonitoringOptions {
            auto_stop: Some(AutoStop {
                after_departure: true,
                after_minutes: None,
            }),
            ..MonitoringOptions::default()
        };
        r.fw.start_monitoring("ABC123", "SMITH", options).await.unwrap();

        let job = r.fw.check_now("ABC123", "SMITH").await.unwrap();
        assert_eq!(job.status, MonitoringStatus::Stopped);
        assert_eq!(r.fw.engine().local_timer_count(), 0);
        assert_eq!(r.fw.engine().check_guard_count(), 0);
        let calls = r.source.calls();

        let job = r.fw.check_now("ABC123", "SMITH").await.unwrap();
        assert_eq!(job.checks_performed, 1);
        assert_eq!(r.source.calls(), calls);
        assert_eq!(r.fw.engine().check_guard_count(), 0);
        assert!(r.fw.list_active_jobs().await.unwrap().is_empty());
        assert_eq!(r.fw.list_all_jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn time_budget_auto_stops() {
        let r = rig(vec![flight()], None).await;
        let options = MonitoringOptions {
            auto_stop: Some(AutoStop {
                after_departure: false,
                after_minutes: Some(60),
            }),
            ..MonitoringOptions::default()
        };
        r.fw.start_monitoring("ABC123", "SMITH", options).await.unwrap();
        assert!(r.fw.check_now("ABC123", "SMITH").await.unwrap().is_active());

        r.clock.advance(Duration::from_secs(61 * 60));
        let job = r.fw.check_now("ABC123", "SMITH").await.unwrap();
        assert_eq!(job.status, MonitoringStatus::Stopped);
    }

    #[tokio::test]
    async fn stop_reports_whether_a_job_existed() {
        let r = rig(vec![flight()], None).await;
        assert!(!r.fw.stop_monitoring("ABC123", "SMITH").await.unwrap());

        r.fw.start_monitoring("ABC123", "SMITH", MonitoringOptions::default())
            .await
            .unwrap();
        assert!(r.fw.stop_monitoring("ABC123", "SMITH").await.unwrap());
        let job = r.fw.get_job("ABC123", "SMITH").await.unwrap().unwrap();
        assert_eq!(job.status, MonitoringStatus::Stopped);
        assert_eq!(r.fw.engine().local_timer_count(), 0);
        assert_eq!(r.sink.names(), vec!["monitoring:started", "monitoring:stopped"]);

        r.fw.start_monitoring("ABC123", "SMITH", MonitoringOptions::default())
            .await
            .unwrap();
        r.fw.shutdown().await;
    }

    #[tokio::test]
    async fn check_now_for_unknown_job_is_not_found() {
        let r = rig(vec![flight()], None).await;
        assert!(matches!(
            r.fw.check_now("NOPE00", "NOBODY").await,
            Err(FlightwatchError::JobNotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_during_in_flight_check_wins() {
        let mut departed = flight();
        departed.status = FlightStatus::Departed;
        let r = rig(vec![flight(), departed], Some(Duration::from_millis(200))).await;
        let options = MonitoringOptions {
            auto_stop: Some(AutoStop {
                after_departure: true,
                after_minutes: None,
            }),
            ..MonitoringOptions::default()
        };
        r.fw.start_monitoring("ABC123", "SMITH", options).await.unwrap();

        let fw = r.fw.clone();
        let check = tokio::spawn(async move { fw.check_now("ABC123", "SMITH").await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(r.fw.stop_monitoring("ABC123", "SMITH").await.unwrap());

        let job = check.await.unwrap().unwrap();
        assert_eq!(job.status, MonitoringStatus::Stopped);
        assert_eq!(job.checks_performed, 1);
        let stops = r
            .sink
            .names()
            .into_iter()
            .filter(|n| *n == "monitoring:stopped")
            .count();
        assert_eq!(stops, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn local_timer_drives_checks() {
        let r = rig(vec![flight()], None).await;
        let options = MonitoringOptions {
            interval_minutes: Some(1),
            ..MonitoringOptions::default()
        };
        r.fw.start_monitoring("ABC123", "SMITH", options).await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        let mut checks = 0;
        for _ in 0..50 {
            checks = r
                .fw
                .get_job("ABC123", "SMITH")
                .await
                .unwrap()
                .unwrap()
                .checks_performed;
            if checks > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(checks, 1);
        r.fw.shutdown().await;
        assert_eq!(r.fw.engine().local_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_task_drops_expired_keys_until_cancelled() {
        let clock = Arc::new(ManualClock::default());
        let backend = Arc::new(MemoryBackend::with_clock(clock.clone()));
        let fw = Flightwatch::builder(FlightwatchConfig::default())
            .clock(clock.clone())
            .backend(backend.clone())
            .sink(Arc::new(RecordingSink::default()))
            .build()
            .await
            .unwrap();
        backend
            .set("ratelimit:ip:10.0.0.1", "3", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        backend.set("monitor:ABC123:SMITH", "{}", None).await.unwrap();
        clock.advance(Duration::from_secs(61));

        let cancel = tokio_util::sync::CancellationToken::new();
        let task = fw.spawn_purge(Duration::from_secs(30), cancel.clone());
        tokio::time::sleep(Duration::from_secs(31)).await;
        for _ in 0..50 {
            if backend.len() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(backend.len(), 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn engine_needs_some_trigger() {
        let clock = Arc::new(ManualClock::default());
        let mut config = FlightwatchConfig::default();
        config.monitor.local_timer = false;
        let result = Flightwatch::builder(config)
            .clock(clock.clone())
            .backend(Arc::new(MemoryBackend::with_clock(clock)))
            .build()
            .await;
        assert!(matches!(result, Err(FlightwatchError::Config(_))));
    }
}
