//! RefreshCoordinator: one polling cycle against the telemetry API
//!
//! Calls run one at a time on the worker pool. Organization and device
//! bootstrap failures fail the cycle; scenarios, per-device data, raw
//! data and the gap report are best-effort and keep their stale values.

use std::sync::Arc;
use std::time::Instant;

use crate::coordinator::pool::WorkerPool;
use crate::coordinator::snapshot::{device_key, raw_data_key, Snapshot};
use crate::error::{ApiError, UpdateFailed};
use crate::loggamera::TelemetryApi;
use crate::models::{ApiResponse, DeviceData, DevicePayload, Provenance};

pub fn coordinator_name(organization_id: Option<i64>) -> String {
    match organization_id {
        Some(id) => format!("Loggamera {}", id),
        None => "Loggamera".to_string(),
    }
}

pub struct RefreshCoordinator {
    name: String,
    api: Arc<dyn TelemetryApi>,
    pool: WorkerPool,
    snapshot: Snapshot,
}

impl RefreshCoordinator {
    pub fn new(name: String, api: Arc<dyn TelemetryApi>, pool: WorkerPool) -> Self {
        tracing::debug!("[Coordinator] Created data coordinator '{}'", name);
        Self {
            name,
            api,
            pool,
            snapshot: Snapshot::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Run one cycle. The snapshot is staged and committed only on success.
    pub async fn refresh(&mut self) -> Result<Snapshot, UpdateFailed> {
        tracing::debug!("[Coordinator] {}: starting data update cycle", self.name);
        let start = Instant::now();

        let mut staged = self.snapshot.clone();
        let result = self.run_cycle(&mut staged).await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                self.snapshot = staged;
                tracing::debug!(
                    "[Coordinator] {}: finished fetching data in {:.3} seconds (success: true)",
                    self.name,
                    elapsed
                );
                Ok(self.snapshot.clone())
            }
            Err(e) => {
                match &e {
                    UpdateFailed::Api(err) => {
                        tracing::error!("[Coordinator] {}: error fetching data: {}", self.name, err)
                    }
                    UpdateFailed::Unexpected(msg) => tracing::error!(
                        "[Coordinator] {}: unexpected error during update: {}",
                        self.name,
                        msg
                    ),
                }
                Err(e)
            }
        }
    }

    async fn run_cycle(&self, staged: &mut Snapshot) -> Result<(), UpdateFailed> {
        self.fetch_organizations(staged).await?;

        if staged.devices.is_empty() {
            self.bootstrap_devices(staged).await?;
        }

        self.fetch_scenarios(staged).await?;
        self.fetch_device_data(staged).await;
        self.report_data_gaps().await;

        Ok(())
    }

    /// Run one API query on the worker pool
    async fn call<F, T>(&self, query: F) -> Result<T, UpdateFailed>
    where
        F: FnOnce(&dyn TelemetryApi) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let api = self.api.clone();
        let result = self.pool.run(move || query(api.as_ref())).await?;
        Ok(result?)
    }

    async fn fetch_organizations(&self, staged: &mut Snapshot) -> Result<(), UpdateFailed> {
        let response = self.call(|api| api.get_organizations()).await?;

        let organizations = response
            .data
            .and_then(|d| d.organizations)
            .filter(|orgs| !orgs.is_empty());

        match organizations {
            Some(orgs) => {
                tracing::debug!("[Coordinator] Found {} organizations", orgs.len());

                if self.api.organization_id().is_none() {
                    let first = orgs[0].id;
                    self.api.set_organization_id(first);
                    tracing::info!("[Coordinator] Set organization ID to {}", first);
                }

                staged.replace_organizations(orgs);
            }
            None => staged.replace_organizations(Vec::new()),
        }

        Ok(())
    }

    /// One-shot: the device set stays fixed for the coordinator's lifetime
    async fn bootstrap_devices(&self, staged: &mut Snapshot) -> Result<(), UpdateFailed> {
        let response = self.call(|api| api.get_devices()).await?;

        if let Some(devices) = response.data.and_then(|d| d.devices) {
            tracing::info!("[Coordinator] Found {} devices", devices.len());
            staged.replace_devices(devices);
        }

        Ok(())
    }

    async fn fetch_scenarios(&self, staged: &mut Snapshot) -> Result<(), UpdateFailed> {
        match self.call(|api| api.get_scenarios()).await {
            Ok(response) => {
                if let Some(scenarios) = response.data.and_then(|d| d.scenarios) {
                    tracing::debug!("[Coordinator] Found {} scenarios", scenarios.len());
                    staged.replace_scenarios(scenarios);
                }
                Ok(())
            }
            Err(UpdateFailed::Api(e)) => {
                tracing::debug!("[Coordinator] Scenarios not available: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_device_data(&self, staged: &mut Snapshot) {
        let devices = staged.devices.clone();

        for device in &devices {
            let device_id = device.id;
            let device_class = device.class.clone();

            match self
                .call(move |api| api.get_device_data(device_id, &device_class))
                .await
            {
                Ok(data) => {
                    let sources = data.provenance.sources();
                    if !sources.is_empty() {
                        tracing::debug!(
                            "[Coordinator] Device {} data fetched from: {}",
                            device_id,
                            sources.join(", ")
                        );
                    }
                    staged.upsert_device_data(device_key(device_id), data);
                }
                Err(e) => {
                    tracing::warn!(
                        "[Coordinator] Failed to get data for device {}: {}",
                        device_id,
                        e
                    );
                }
            }

            // Not every device exposes RawData
            match self.call(move |api| api.get_raw_data(device_id)).await {
                Ok(ApiResponse {
                    data: Some(raw), ..
                }) if raw.readings.has_content() => {
                    staged.upsert_device_data(
                        raw_data_key(device_id),
                        DeviceData {
                            payload: DevicePayload::RawData(raw),
                            provenance: Provenance::raw_data(),
                        },
                    );
                    tracing::debug!("[Coordinator] Collected RawData for device {}", device_id);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(
                        "[Coordinator] RawData not available for device {}: {}",
                        device_id,
                        e
                    );
                }
            }
        }
    }

    async fn report_data_gaps(&self) {
        match self.call(|api| api.get_data_gap_status()).await {
            Ok(status) if status.devices_with_gaps > 0 => {
                tracing::warn!(
                    "[Coordinator] Data gaps detected: {}/{} devices affected",
                    status.devices_with_gaps,
                    status.total_devices_tracked
                );
            }
            Ok(status) => {
                tracing::debug!(
                    "[Coordinator] All {} devices reporting data successfully",
                    status.total_devices_tracked
                );
            }
            Err(e) => {
                tracing::debug!("[Coordinator] Could not check API health status: {}", e);
            }
        }
    }
}
