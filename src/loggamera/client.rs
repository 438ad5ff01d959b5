//! Loggamera API v2 client
//!
//! Every endpoint is a JSON POST to `<base_url>/<Endpoint>` carrying the
//! API key; responses are wrapped as `{"Data": ..., "Error": ...}`.
//! Built on `reqwest::blocking`, so construct and call it from the
//! worker pool only.

use std::sync::{Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::gaps::DataGapTracker;
use super::TelemetryApi;
use crate::config::AccountConfig;
use crate::error::ApiError;
use crate::models::{
    ApiResponse, DataGapStatus, DeviceClass, DeviceData, DevicePayload, DevicesResponse,
    HasReadings, OrganizationsResponse, Provenance, RawData, ScenariosResponse, ValueSet,
};

pub const ENDPOINT_ORGANIZATIONS: &str = "Organizations";
pub const ENDPOINT_DEVICES: &str = "Devices";
pub const ENDPOINT_SCENARIOS: &str = "Scenarios";
pub const ENDPOINT_RAW_DATA: &str = "RawData";
pub const ENDPOINT_EXECUTE_SCENARIO: &str = "ExecuteScenarioAsync";

pub struct LoggameraClient {
    api_key: String,
    base_url: String,
    organization_id: RwLock<Option<i64>>,
    http_client: Client,
    gaps: Mutex<DataGapTracker>,
}

impl LoggameraClient {
    pub fn new(account: &AccountConfig) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(account.timeout_secs))
            .build()
            .map_err(|e| ApiError::Transport(format!("HTTP client: {}", e)))?;

        Ok(Self {
            api_key: account.api_key.clone(),
            base_url: account.base_url.trim_end_matches('/').to_string(),
            organization_id: RwLock::new(account.organization_id),
            http_client,
            gaps: Mutex::new(DataGapTracker::default()),
        })
    }

    fn request_body(&self, device_id: Option<i64>) -> Value {
        let mut body = serde_json::json!({ "ApiKey": self.api_key });
        if let Some(org) = self.organization_id() {
            body["OrganizationId"] = Value::from(org);
        }
        if let Some(id) = device_id {
            body["DeviceId"] = Value::from(id);
        }
        body
    }

    fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> Result<ApiResponse<T>, ApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let resp = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Transport(format!("{} request timed out", endpoint))
                } else {
                    ApiError::Transport(format!("{} request failed: {}", endpoint, e))
                }
            })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Auth(format!("{} returned {}", endpoint, status)));
        }
        if !status.is_success() {
            return Err(ApiError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let text = resp.text().map_err(|e| ApiError::Malformed {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        parse_envelope(endpoint, &text)
    }

    fn fetch_values(&self, endpoint: &str, device_id: i64) -> Result<ValueSet, ApiError> {
        let body = self.request_body(Some(device_id));
        let response: ApiResponse<ValueSet> = self.post(endpoint, &body)?;
        Ok(response.data.unwrap_or_default())
    }

    fn query_device(
        &self,
        device_id: i64,
        device_class: &DeviceClass,
    ) -> Result<DeviceData, ApiError> {
        let endpoint = device_class.endpoint();
        let primary = self.fetch_values(endpoint, device_id);
        resolve_device_data(device_id, endpoint, primary, || {
            self.fetch_values(ENDPOINT_RAW_DATA, device_id)
        })
    }

    fn record_fetch(&self, device_id: i64, result: &Result<DeviceData, ApiError>) {
        match result {
            Ok(data) if !data.value_set().is_empty() => {
                self.gaps().record_success(device_id, data.measured_at());
            }
            Ok(_) => self.gaps().record_success(device_id, None),
            Err(_) => self.gaps().record_failure(device_id),
        }
    }

    fn gaps(&self) -> std::sync::MutexGuard<'_, DataGapTracker> {
        self.gaps.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TelemetryApi for LoggameraClient {
    fn get_organizations(&self) -> Result<OrganizationsResponse, ApiError> {
        let body = serde_json::json!({ "ApiKey": self.api_key });
        self.post(ENDPOINT_ORGANIZATIONS, &body)
    }

    fn get_devices(&self) -> Result<DevicesResponse, ApiError> {
        let body = self.request_body(None);
        self.post(ENDPOINT_DEVICES, &body)
    }

    fn get_scenarios(&self) -> Result<ScenariosResponse, ApiError> {
        let body = self.request_body(None);
        self.post(ENDPOINT_SCENARIOS, &body)
    }

    fn get_device_data(
        &self,
        device_id: i64,
        device_class: &DeviceClass,
    ) -> Result<DeviceData, ApiError> {
        let result = self.query_device(device_id, device_class);
        self.record_fetch(device_id, &result);
        result
    }

    fn get_raw_data(&self, device_id: i64) -> Result<ApiResponse<RawData>, ApiError> {
        let body = self.request_body(Some(device_id));
        self.post(ENDPOINT_RAW_DATA, &body)
    }

    fn get_data_gap_status(&self) -> Result<DataGapStatus, ApiError> {
        Ok(self.gaps().status(Utc::now()))
    }

    fn execute_scenario(&self, scenario_id: i64) -> Result<(), ApiError> {
        let mut body = self.request_body(None);
        body["ScenarioId"] = Value::from(scenario_id);
        let _: ApiResponse<Value> = self.post(ENDPOINT_EXECUTE_SCENARIO, &body)?;

        tracing::info!("[Loggamera] Scenario {} execution requested", scenario_id);
        Ok(())
    }

    fn organization_id(&self) -> Option<i64> {
        *self.organization_id.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_organization_id(&self, organization_id: i64) {
        let mut guard = self.organization_id.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(organization_id);
    }
}

/// Choose between the class endpoint result and the RawData fallback.
///
/// `fallback` runs only when the class endpoint failed or returned no
/// values. With nothing from either, the class endpoint's error wins.
fn resolve_device_data<F>(
    device_id: i64,
    endpoint: &str,
    primary: Result<ValueSet, ApiError>,
    fallback: F,
) -> Result<DeviceData, ApiError>
where
    F: FnOnce() -> Result<ValueSet, ApiError>,
{
    let primary_err = match primary {
        Ok(readings) if !readings.is_empty() => {
            return Ok(DeviceData {
                payload: DevicePayload::from_endpoint(endpoint, readings),
                provenance: Provenance {
                    power_meter_used: endpoint == "PowerMeter",
                    endpoint_used: Some(endpoint.to_string()),
                    ..Default::default()
                },
            });
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(
                "[Loggamera] {} failed for device {}: {}, trying RawData",
                endpoint,
                device_id,
                e
            );
            Some(e)
        }
    };

    match fallback() {
        Ok(raw) if !raw.is_empty() => Ok(DeviceData {
            payload: DevicePayload::from_endpoint(endpoint, raw),
            provenance: Provenance {
                raw_data_used: true,
                endpoint_used: Some(ENDPOINT_RAW_DATA.to_string()),
                ..Default::default()
            },
        }),
        _ => match primary_err {
            Some(e) => Err(e),
            None => Ok(DeviceData {
                payload: DevicePayload::from_endpoint(endpoint, ValueSet::default()),
                provenance: Provenance {
                    endpoint_used: Some(endpoint.to_string()),
                    ..Default::default()
                },
            }),
        },
    }
}

/// Decode a response body, surfacing a populated `Error` as an API error
pub fn parse_envelope<T: DeserializeOwned>(
    endpoint: &str,
    body: &str,
) -> Result<ApiResponse<T>, ApiError> {
    let response: ApiResponse<T> =
        serde_json::from_str(body).map_err(|e| ApiError::Malformed {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

    if let Some(err) = &response.error {
        let message = err
            .message
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());
        if message.to_lowercase().contains("apikey") {
            return Err(ApiError::Auth(message));
        }
        return Err(ApiError::Remote {
            endpoint: endpoint.to_string(),
            message,
        });
    }

    Ok(response)
}
