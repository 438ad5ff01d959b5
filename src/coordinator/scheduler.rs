//! Scheduler: drives a RefreshCoordinator on a fixed interval
//!
//! The coordinator sits behind a mutex, so timer ticks and forced
//! refreshes never overlap. The next timer cycle is armed only after the
//! previous one finishes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time;

use crate::coordinator::refresh::RefreshCoordinator;
use crate::coordinator::snapshot::Snapshot;
use crate::error::UpdateFailed;

#[derive(Debug, Clone)]
struct SchedulerState {
    data: Arc<Snapshot>,
    last_update_success: bool,
    last_error: Option<String>,
    last_updated: Option<DateTime<Utc>>,
}

/// What the host sees after each cycle
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub name: String,
    pub last_update_success: bool,
    pub last_error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub update_interval_secs: u64,
    pub device_count: usize,
}

pub struct Scheduler {
    name: String,
    coordinator: Mutex<RefreshCoordinator>,
    state: RwLock<SchedulerState>,
    interval: watch::Sender<Duration>,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(coordinator: RefreshCoordinator, update_interval: Duration) -> Self {
        let name = coordinator.name().to_string();
        let data = Arc::new(coordinator.snapshot().clone());

        Self {
            name,
            coordinator: Mutex::new(coordinator),
            state: RwLock::new(SchedulerState {
                data,
                last_update_success: false,
                last_error: None,
                last_updated: None,
            }),
            interval: watch::Sender::new(update_interval),
            shutdown: watch::Sender::new(false),
        }
    }

    /// Start the background refresh loop (runs until `shutdown`)
    pub async fn start(self: Arc<Self>) {
        let mut interval_rx = self.interval.subscribe();
        let mut shutdown_rx = self.shutdown.subscribe();

        tracing::info!(
            "[Scheduler] {}: starting background refresh (interval: {}s)",
            self.name,
            interval_rx.borrow().as_secs()
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let period = *interval_rx.borrow_and_update();

            tokio::select! {
                _ = time::sleep(period) => {
                    // Errors are recorded in the state; the next tick is the retry
                    let _ = self.refresh_now().await;
                }
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    tracing::info!(
                        "[Scheduler] {}: update interval changed to {}s",
                        self.name,
                        interval_rx.borrow().as_secs()
                    );
                }
                _ = shutdown_rx.changed() => {}
            }
        }

        tracing::info!("[Scheduler] {}: stopped", self.name);
    }

    /// Run a cycle now, waiting for any in-flight cycle first
    pub async fn refresh_now(&self) -> Result<Arc<Snapshot>, UpdateFailed> {
        let mut coordinator = self.coordinator.lock().await;
        let result = coordinator.refresh().await;

        let mut state = self.state.write().await;
        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                if !state.last_update_success && state.last_updated.is_some() {
                    tracing::info!("[Scheduler] {}: fetching data recovered", self.name);
                }
                state.data = snapshot.clone();
                state.last_update_success = true;
                state.last_error = None;
                state.last_updated = Some(Utc::now());
                Ok(snapshot)
            }
            Err(e) => {
                state.last_update_success = false;
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Last committed snapshot
    pub async fn data(&self) -> Arc<Snapshot> {
        self.state.read().await.data.clone()
    }

    #[cfg(test)]
    pub async fn last_update_success(&self) -> bool {
        self.state.read().await.last_update_success
    }

    #[cfg(test)]
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.read().await;
        SchedulerStatus {
            name: self.name.clone(),
            last_update_success: state.last_update_success,
            last_error: state.last_error.clone(),
            last_updated: state.last_updated,
            update_interval_secs: self.update_interval().as_secs(),
            device_count: state.data.devices.len(),
        }
    }

    pub fn update_interval(&self) -> Duration {
        *self.interval.borrow()
    }

    pub fn set_update_interval(&self, update_interval: Duration) {
        self.interval.send_replace(update_interval);
    }

    /// Wait for the in-flight cycle, then stop the loop
    pub async fn shutdown(&self) {
        let _coordinator = self.coordinator.lock().await;
        self.shutdown.send_replace(true);
        tracing::debug!("[Scheduler] {}: shutdown requested", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::pool::WorkerPool;
    use crate::coordinator::refresh::coordinator_name;
    use crate::coordinator::testing::*;
    use crate::loggamera::TelemetryApi;
    use crate::models::DeviceClass;

    fn scheduler(api: &Arc<FakeApi>, every: Duration) -> Arc<Scheduler> {
        let api: Arc<dyn TelemetryApi> = api.clone();
        let coordinator = RefreshCoordinator::new(coordinator_name(None), api, WorkerPool::new(4));
        Arc::new(Scheduler::new(coordinator, every))
    }

    fn backend() -> Arc<FakeApi> {
        let api = Arc::new(FakeApi::default());
        api.set_organizations(Ok(vec![organization(1)]));
        api.set_devices(Ok(vec![device(7, DeviceClass::PowerMeter)]));
        api.set_device_data(7, Ok(power_data(12.0)));
        api
    }

    #[tokio::test]
    async fn test_refresh_records_success() {
        let api = backend();
        let scheduler = scheduler(&api, Duration::from_secs(1200));

        assert!(!scheduler.last_update_success().await);
        scheduler.refresh_now().await.unwrap();

        assert!(scheduler.last_update_success().await);
        assert_eq!(scheduler.last_error().await, None);
        assert_eq!(scheduler.data().await.devices.len(), 1);
        let status = scheduler.status().await;
        assert_eq!(status.update_interval_secs, 1200);
        assert!(status.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_failure_keeps_last_snapshot() {
        let api = backend();
        let scheduler = scheduler(&api, Duration::from_secs(1200));
        scheduler.refresh_now().await.unwrap();

        api.set_organizations(Err(api_error("network down")));
        assert!(scheduler.refresh_now().await.is_err());

        assert!(!scheduler.last_update_success().await);
        let error = scheduler.last_error().await.unwrap();
        assert!(error.contains("network down"));
        assert!(scheduler.data().await.device_data_for(7).is_some());
    }

    #[tokio::test]
    async fn test_set_update_interval() {
        let api = backend();
        let scheduler = scheduler(&api, Duration::from_secs(1200));

        scheduler.set_update_interval(Duration::from_secs(300));
        assert_eq!(scheduler.update_interval(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_do_not_overlap() {
        let api = backend();
        api.set_devices(Ok(vec![
            device(7, DeviceClass::PowerMeter),
            device(8, DeviceClass::PowerMeter),
        ]));
        api.set_device_data(8, Ok(power_data(3.0)));
        api.set_fetch_delay(Duration::from_millis(50));
        let scheduler = scheduler(&api, Duration::from_secs(1200));

        let (first, second) = tokio::join!(scheduler.refresh_now(), scheduler.refresh_now());

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(api.peak_concurrent_fetches(), 1);
        assert_eq!(api.device_fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_refreshes_on_interval_and_stops() {
        let api = backend();
        let scheduler = scheduler(&api, Duration::from_secs(60));

        let handle = tokio::spawn(scheduler.clone().start());
        time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        scheduler.shutdown().await;
        handle.await.unwrap();

        assert_eq!(api.device_fetches(), 1);
        assert!(scheduler.last_update_success().await);
    }
}
