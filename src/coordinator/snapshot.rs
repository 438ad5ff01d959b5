//! Snapshot store: the aggregate a refresh cycle merges into

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Device, DeviceData, Organization, Scenario};

/// `device_data` slot holding the type-specific payload
pub fn device_key(device_id: i64) -> String {
    device_id.to_string()
}

/// `device_data` slot holding supplementary raw telemetry
pub fn raw_data_key(device_id: i64) -> String {
    format!("rawdata_{}", device_id)
}

/// Ordered containers keep serialization stable across cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub organizations: Vec<Organization>,
    pub devices: Vec<Device>,
    pub device_data: BTreeMap<String, DeviceData>,
    pub scenarios: Vec<Scenario>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_organizations(&mut self, organizations: Vec<Organization>) {
        self.organizations = organizations;
    }

    pub fn replace_devices(&mut self, devices: Vec<Device>) {
        self.devices = devices;
    }

    pub fn replace_scenarios(&mut self, scenarios: Vec<Scenario>) {
        self.scenarios = scenarios;
    }

    pub fn upsert_device_data(&mut self, key: String, data: DeviceData) {
        self.device_data.insert(key, data);
    }

    pub fn device_data_for(&self, device_id: i64) -> Option<&DeviceData> {
        self.device_data.get(&device_key(device_id))
    }

    pub fn raw_data_for(&self, device_id: i64) -> Option<&DeviceData> {
        self.device_data.get(&raw_data_key(device_id))
    }
}
