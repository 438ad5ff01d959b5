//! Data models for the Loggamera bridge

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Response envelope
// ============================================================================

/// `{"Data": ..., "Error": ...}` wrapper shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

#[cfg(test)]
impl<T> ApiResponse<T> {
    pub fn with_data(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiErrorBody {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrganizationsData {
    pub organizations: Option<Vec<Organization>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DevicesData {
    pub devices: Option<Vec<Device>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScenariosData {
    pub scenarios: Option<Vec<Scenario>>,
}

pub type OrganizationsResponse = ApiResponse<OrganizationsData>;
pub type DevicesResponse = ApiResponse<DevicesData>;
pub type ScenariosResponse = ApiResponse<ScenariosData>;

// ============================================================================
// Organizations, devices, scenarios
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Organization {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_organization_id: Option<i64>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Device {
    pub id: i64,
    pub class: DeviceClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Scenario {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Device type tag (`Class` in the device list)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceClass {
    PowerMeter,
    RoomSensor,
    HeatPump,
    WaterMeter,
    CoolingUnit,
    GenericDevice,
    Other(String),
}

impl DeviceClass {
    pub fn as_str(&self) -> &str {
        match self {
            DeviceClass::PowerMeter => "PowerMeter",
            DeviceClass::RoomSensor => "RoomSensor",
            DeviceClass::HeatPump => "HeatPump",
            DeviceClass::WaterMeter => "WaterMeter",
            DeviceClass::CoolingUnit => "CoolingUnit",
            DeviceClass::GenericDevice => "GenericDevice",
            DeviceClass::Other(s) => s,
        }
    }

    /// Endpoint queried for this class; unknown classes go through GenericDevice
    pub fn endpoint(&self) -> &'static str {
        match self {
            DeviceClass::PowerMeter => "PowerMeter",
            DeviceClass::RoomSensor => "RoomSensor",
            DeviceClass::HeatPump => "HeatPump",
            DeviceClass::WaterMeter => "WaterMeter",
            DeviceClass::CoolingUnit => "CoolingUnit",
            DeviceClass::GenericDevice | DeviceClass::Other(_) => "GenericDevice",
        }
    }
}

impl From<String> for DeviceClass {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PowerMeter" => DeviceClass::PowerMeter,
            "RoomSensor" => DeviceClass::RoomSensor,
            "HeatPump" => DeviceClass::HeatPump,
            "WaterMeter" => DeviceClass::WaterMeter,
            "CoolingUnit" => DeviceClass::CoolingUnit,
            "GenericDevice" => DeviceClass::GenericDevice,
            _ => DeviceClass::Other(s),
        }
    }
}

impl From<DeviceClass> for String {
    fn from(class: DeviceClass) -> Self {
        class.as_str().to_string()
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Measurement values
// ============================================================================

/// One entry of a `Values` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeasurementValue {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_presentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_logged: Option<bool>,
}

impl MeasurementValue {
    /// Values arrive as JSON numbers or as numeric strings
    pub fn as_f64(&self) -> Option<f64> {
        match &self.value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

/// `Data` object of a device endpoint: timestamp plus values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValueSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_date_time_utc: Option<String>,
    #[serde(default)]
    pub values: Vec<MeasurementValue>,
}

impl ValueSet {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when the `Data` object carried anything at all
    pub fn has_content(&self) -> bool {
        self.log_date_time_utc.is_some() || !self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MeasurementValue> {
        self.values.iter().find(|v| v.name == name)
    }

    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(MeasurementValue::as_f64)
    }

    /// `LogDateTimeUtc` with or without an explicit offset
    pub fn measured_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.log_date_time_utc.as_deref()?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericReading {
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Capability shared by every device payload
pub trait HasReadings {
    fn value_set(&self) -> &ValueSet;

    fn numeric_readings(&self) -> Vec<NumericReading> {
        self.value_set()
            .values
            .iter()
            .filter_map(|v| {
                v.as_f64().map(|value| NumericReading {
                    name: v.name.clone(),
                    value,
                    unit: v.unit_presentation.clone(),
                })
            })
            .collect()
    }

    fn has_numeric_readings(&self) -> bool {
        self.value_set().values.iter().any(|v| v.as_f64().is_some())
    }

    fn measured_at(&self) -> Option<DateTime<Utc>> {
        self.value_set().measured_at()
    }
}

// ============================================================================
// Per-class payloads
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PowerMeterData {
    pub readings: ValueSet,
}

impl PowerMeterData {
    pub fn consumed_total_kwh(&self) -> Option<f64> {
        self.readings.numeric("ConsumedTotalInkWh")
    }

    pub fn power_w(&self) -> Option<f64> {
        self.readings.numeric("PowerInW")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomSensorData {
    pub readings: ValueSet,
}

impl RoomSensorData {
    pub fn temperature(&self) -> Option<f64> {
        self.readings.numeric("Temperature")
    }

    pub fn humidity(&self) -> Option<f64> {
        self.readings.numeric("Humidity")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeatPumpData {
    pub readings: ValueSet,
}

impl HeatPumpData {
    pub fn outdoor_temperature(&self) -> Option<f64> {
        self.readings.numeric("OutdoorTemperature")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaterMeterData {
    pub readings: ValueSet,
}

impl WaterMeterData {
    pub fn consumed_total_m3(&self) -> Option<f64> {
        self.readings.numeric("ConsumedTotalInM3")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoolingUnitData {
    pub readings: ValueSet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenericDeviceData {
    pub readings: ValueSet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawData {
    pub readings: ValueSet,
}

/// Typed result of a device query, tagged by the class that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DevicePayload {
    PowerMeter(PowerMeterData),
    RoomSensor(RoomSensorData),
    HeatPump(HeatPumpData),
    WaterMeter(WaterMeterData),
    CoolingUnit(CoolingUnitData),
    GenericDevice(GenericDeviceData),
    RawData(RawData),
}

impl DevicePayload {
    /// Wrap values returned by `endpoint`
    pub fn from_endpoint(endpoint: &str, readings: ValueSet) -> Self {
        match endpoint {
            "PowerMeter" => DevicePayload::PowerMeter(PowerMeterData { readings }),
            "RoomSensor" => DevicePayload::RoomSensor(RoomSensorData { readings }),
            "HeatPump" => DevicePayload::HeatPump(HeatPumpData { readings }),
            "WaterMeter" => DevicePayload::WaterMeter(WaterMeterData { readings }),
            "CoolingUnit" => DevicePayload::CoolingUnit(CoolingUnitData { readings }),
            "RawData" => DevicePayload::RawData(RawData { readings }),
            _ => DevicePayload::GenericDevice(GenericDeviceData { readings }),
        }
    }
}

impl DevicePayload {
    /// Headline values per class, keyed by sensor kind
    pub fn summary(&self) -> BTreeMap<&'static str, f64> {
        let mut summary = BTreeMap::new();
        let mut put = |key: &'static str, value: Option<f64>| {
            if let Some(v) = value {
                summary.insert(key, v);
            }
        };

        match self {
            DevicePayload::PowerMeter(d) => {
                put("energy", d.consumed_total_kwh());
                put("power", d.power_w());
            }
            DevicePayload::RoomSensor(d) => {
                put("temperature", d.temperature());
                put("humidity", d.humidity());
            }
            DevicePayload::WaterMeter(d) => put("water", d.consumed_total_m3()),
            DevicePayload::HeatPump(d) => put("temperature", d.outdoor_temperature()),
            DevicePayload::CoolingUnit(_)
            | DevicePayload::GenericDevice(_)
            | DevicePayload::RawData(_) => {
                put("value", self.numeric_readings().first().map(|r| r.value));
            }
        }
        summary
    }
}

impl HasReadings for DevicePayload {
    fn value_set(&self) -> &ValueSet {
        match self {
            DevicePayload::PowerMeter(d) => &d.readings,
            DevicePayload::RoomSensor(d) => &d.readings,
            DevicePayload::HeatPump(d) => &d.readings,
            DevicePayload::WaterMeter(d) => &d.readings,
            DevicePayload::CoolingUnit(d) => &d.readings,
            DevicePayload::GenericDevice(d) => &d.readings,
            DevicePayload::RawData(d) => &d.readings,
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Which API sub-resource produced a payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Provenance {
    #[serde(rename = "_raw_data_used", skip_serializing_if = "is_false")]
    pub raw_data_used: bool,
    #[serde(rename = "_power_meter_used", skip_serializing_if = "is_false")]
    pub power_meter_used: bool,
    #[serde(rename = "_endpoint_used", skip_serializing_if = "Option::is_none")]
    pub endpoint_used: Option<String>,
    #[serde(rename = "_is_raw_data", skip_serializing_if = "is_false")]
    pub is_raw_data: bool,
}

impl Provenance {
    pub fn raw_data() -> Self {
        Self {
            endpoint_used: Some("RawData".to_string()),
            is_raw_data: true,
            ..Default::default()
        }
    }

    /// Source names in logging order
    pub fn sources(&self) -> Vec<&str> {
        let mut sources = Vec::new();
        if self.raw_data_used {
            sources.push("RawData");
        }
        if self.power_meter_used {
            sources.push("PowerMeter");
        }
        if let Some(endpoint) = self.endpoint_used.as_deref() {
            sources.push(endpoint);
        }
        sources
    }
}

/// One `device_data` slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceData {
    pub payload: DevicePayload,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl HasReadings for DeviceData {
    fn value_set(&self) -> &ValueSet {
        self.payload.value_set()
    }
}

// ============================================================================
// Data gap status
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataGapStatus {
    pub devices_with_gaps: usize,
    pub total_devices_tracked: usize,
    pub devices: Vec<i64>,
}
