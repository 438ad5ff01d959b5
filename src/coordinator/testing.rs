//! Scripted in-memory `TelemetryApi` for coordinator tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::ApiError;
use crate::loggamera::TelemetryApi;
use crate::models::{
    ApiResponse, DataGapStatus, Device, DeviceClass, DeviceData, DevicePayload, DevicesData,
    DevicesResponse, MeasurementValue, Organization, OrganizationsData, OrganizationsResponse,
    Provenance, RawData, Scenario, ScenariosData, ScenariosResponse, ValueSet,
};

pub struct FakeApi {
    organizations: Mutex<Result<Vec<Organization>, ApiError>>,
    devices: Mutex<Result<Vec<Device>, ApiError>>,
    scenarios: Mutex<Result<Vec<Scenario>, ApiError>>,
    device_data: Mutex<HashMap<i64, Result<DeviceData, ApiError>>>,
    raw_data: Mutex<HashMap<i64, Result<Option<RawData>, ApiError>>>,
    panicking_devices: Mutex<HashSet<i64>>,
    gaps: Mutex<Result<DataGapStatus, ApiError>>,
    organization_id: Mutex<Option<i64>>,
    executed: Mutex<Vec<i64>>,
    device_fetches: AtomicUsize,
    fetch_delay: Mutex<Option<Duration>>,
    active_fetches: AtomicUsize,
    peak_fetches: AtomicUsize,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            organizations: Mutex::new(Ok(Vec::new())),
            devices: Mutex::new(Ok(Vec::new())),
            scenarios: Mutex::new(Ok(Vec::new())),
            device_data: Mutex::new(HashMap::new()),
            raw_data: Mutex::new(HashMap::new()),
            panicking_devices: Mutex::new(HashSet::new()),
            gaps: Mutex::new(Ok(DataGapStatus::default())),
            organization_id: Mutex::new(None),
            executed: Mutex::new(Vec::new()),
            device_fetches: AtomicUsize::new(0),
            fetch_delay: Mutex::new(None),
            active_fetches: AtomicUsize::new(0),
            peak_fetches: AtomicUsize::new(0),
        }
    }
}

impl FakeApi {
    pub fn set_organizations(&self, result: Result<Vec<Organization>, ApiError>) {
        *self.organizations.lock().unwrap() = result;
    }

    pub fn set_devices(&self, result: Result<Vec<Device>, ApiError>) {
        *self.devices.lock().unwrap() = result;
    }

    pub fn set_scenarios(&self, result: Result<Vec<Scenario>, ApiError>) {
        *self.scenarios.lock().unwrap() = result;
    }

    pub fn set_device_data(&self, device_id: i64, result: Result<DeviceData, ApiError>) {
        self.device_data.lock().unwrap().insert(device_id, result);
    }

    pub fn set_raw_data(&self, device_id: i64, result: Result<Option<RawData>, ApiError>) {
        self.raw_data.lock().unwrap().insert(device_id, result);
    }

    pub fn panic_on_device(&self, device_id: i64) {
        self.panicking_devices.lock().unwrap().insert(device_id);
    }

    pub fn set_gaps(&self, result: Result<DataGapStatus, ApiError>) {
        *self.gaps.lock().unwrap() = result;
    }

    /// Make every device data query block for `delay`
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    /// Most device data queries observed running at the same time
    pub fn peak_concurrent_fetches(&self) -> usize {
        self.peak_fetches.load(Ordering::SeqCst)
    }

    pub fn device_fetches(&self) -> usize {
        self.device_fetches.load(Ordering::SeqCst)
    }

    pub fn executed_scenarios(&self) -> Vec<i64> {
        self.executed.lock().unwrap().clone()
    }
}

impl TelemetryApi for FakeApi {
    fn get_organizations(&self) -> Result<OrganizationsResponse, ApiError> {
        let organizations = self.organizations.lock().unwrap().clone()?;
        Ok(ApiResponse::with_data(OrganizationsData {
            organizations: Some(organizations),
        }))
    }

    fn get_devices(&self) -> Result<DevicesResponse, ApiError> {
        self.device_fetches.fetch_add(1, Ordering::SeqCst);
        let devices = self.devices.lock().unwrap().clone()?;
        Ok(ApiResponse::with_data(DevicesData {
            devices: Some(devices),
        }))
    }

    fn get_scenarios(&self) -> Result<ScenariosResponse, ApiError> {
        let scenarios = self.scenarios.lock().unwrap().clone()?;
        Ok(ApiResponse::with_data(ScenariosData {
            scenarios: Some(scenarios),
        }))
    }

    fn get_device_data(
        &self,
        device_id: i64,
        _device_class: &DeviceClass,
    ) -> Result<DeviceData, ApiError> {
        if self.panicking_devices.lock().unwrap().contains(&device_id) {
            panic!("device {} handler crashed", device_id);
        }

        let active = self.active_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_fetches.fetch_max(active, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.active_fetches.fetch_sub(1, Ordering::SeqCst);

        self.device_data
            .lock()
            .unwrap()
            .get(&device_id)
            .cloned()
            .unwrap_or_else(|| Err(not_found(device_id)))
    }

    fn get_raw_data(&self, device_id: i64) -> Result<ApiResponse<RawData>, ApiError> {
        let raw = self
            .raw_data
            .lock()
            .unwrap()
            .get(&device_id)
            .cloned()
            .unwrap_or_else(|| Err(not_found(device_id)))?;
        Ok(match raw {
            Some(data) => ApiResponse::with_data(data),
            None => ApiResponse::empty(),
        })
    }

    fn get_data_gap_status(&self) -> Result<DataGapStatus, ApiError> {
        self.gaps.lock().unwrap().clone()
    }

    fn execute_scenario(&self, scenario_id: i64) -> Result<(), ApiError> {
        self.executed.lock().unwrap().push(scenario_id);
        Ok(())
    }

    fn organization_id(&self) -> Option<i64> {
        *self.organization_id.lock().unwrap()
    }

    fn set_organization_id(&self, organization_id: i64) {
        *self.organization_id.lock().unwrap() = Some(organization_id);
    }
}

fn not_found(device_id: i64) -> ApiError {
    ApiError::Remote {
        endpoint: "RawData".to_string(),
        message: format!("no data for device {}", device_id),
    }
}

pub fn api_error(message: &str) -> ApiError {
    ApiError::Transport(message.to_string())
}

pub fn organization(id: i64) -> Organization {
    Organization {
        id,
        name: Some(format!("Org {}", id)),
        parent_organization_id: None,
        attributes: Default::default(),
    }
}

pub fn device(id: i64, class: DeviceClass) -> Device {
    Device {
        id,
        class,
        title: Some(format!("Device {}", id)),
        attributes: Default::default(),
    }
}

pub fn values(name: &str, value: f64) -> ValueSet {
    ValueSet {
        log_date_time_utc: Some("2024-05-01T10:00:00Z".to_string()),
        values: vec![MeasurementValue {
            name: name.to_string(),
            value: serde_json::json!(value.to_string()),
            value_type: Some("DECIMAL".to_string()),
            unit_type: None,
            unit_presentation: None,
            clarified_name: None,
            is_logged: Some(true),
        }],
    }
}

pub fn power_data(kwh: f64) -> DeviceData {
    DeviceData {
        payload: DevicePayload::from_endpoint("PowerMeter", values("ConsumedTotalInkWh", kwh)),
        provenance: Provenance {
            power_meter_used: true,
            endpoint_used: Some("PowerMeter".to_string()),
            ..Default::default()
        },
    }
}

pub fn raw(name: &str, value: f64) -> RawData {
    RawData {
        readings: values(name, value),
    }
}
