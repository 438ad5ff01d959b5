//! Loggamera platform API integration
//!
//! - `client`: Blocking HTTP client for the v2 API
//! - `gaps`: Per-device data gap bookkeeping

pub mod client;
pub mod gaps;

pub use client::LoggameraClient;

use crate::error::ApiError;
use crate::models::{
    ApiResponse, DataGapStatus, DeviceClass, DeviceData, DevicesResponse, OrganizationsResponse,
    RawData, ScenariosResponse,
};

/// Queries the refresh coordinator issues against the telemetry API.
///
/// Every call blocks on network I/O and must be run on the worker pool.
/// `organization_id` is interior state: read by every query, written
/// only by the coordinator.
pub trait TelemetryApi: Send + Sync {
    fn get_organizations(&self) -> Result<OrganizationsResponse, ApiError>;

    fn get_devices(&self) -> Result<DevicesResponse, ApiError>;

    fn get_scenarios(&self) -> Result<ScenariosResponse, ApiError>;

    /// Type-specific measurement query; payload carries provenance markers
    fn get_device_data(
        &self,
        device_id: i64,
        device_class: &DeviceClass,
    ) -> Result<DeviceData, ApiError>;

    /// Supplementary raw telemetry; `Data` is absent when the device has none
    fn get_raw_data(&self, device_id: i64) -> Result<ApiResponse<RawData>, ApiError>;

    fn get_data_gap_status(&self) -> Result<DataGapStatus, ApiError>;

    fn execute_scenario(&self, scenario_id: i64) -> Result<(), ApiError>;

    fn organization_id(&self) -> Option<i64>;

    fn set_organization_id(&self, organization_id: i64);
}
