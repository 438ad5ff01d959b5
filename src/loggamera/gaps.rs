//! Data gap tracking
//!
//! A device has a gap when its last fetch failed, when it returned no
//! values, or when its newest measurement is older than the stale window.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::models::DataGapStatus;

#[derive(Debug, Clone)]
struct DeviceHealth {
    consecutive_failures: u32,
    last_measured_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct DataGapTracker {
    devices: BTreeMap<i64, DeviceHealth>,
    stale_after: Duration,
}

impl Default for DataGapTracker {
    fn default() -> Self {
        Self::new(Duration::hours(2))
    }
}

impl DataGapTracker {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            devices: BTreeMap::new(),
            stale_after,
        }
    }

    pub fn record_success(&mut self, device_id: i64, measured_at: Option<DateTime<Utc>>) {
        let entry = self.devices.entry(device_id).or_insert(DeviceHealth {
            consecutive_failures: 0,
            last_measured_at: None,
        });
        entry.consecutive_failures = 0;
        entry.last_measured_at = measured_at;
    }

    pub fn record_failure(&mut self, device_id: i64) {
        let entry = self.devices.entry(device_id).or_insert(DeviceHealth {
            consecutive_failures: 0,
            last_measured_at: None,
        });
        entry.consecutive_failures += 1;

        if entry.consecutive_failures > 1 {
            tracing::debug!(
                "[Loggamera] Device {} failed {} consecutive fetches",
                device_id,
                entry.consecutive_failures
            );
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> DataGapStatus {
        let devices: Vec<i64> = self
            .devices
            .iter()
            .filter(|(_, health)| self.has_gap(health, now))
            .map(|(id, _)| *id)
            .collect();

        DataGapStatus {
            devices_with_gaps: devices.len(),
            total_devices_tracked: self.devices.len(),
            devices,
        }
    }

    fn has_gap(&self, health: &DeviceHealth, now: DateTime<Utc>) -> bool {
        if health.consecutive_failures > 0 {
            return true;
        }
        match health.last_measured_at {
            Some(at) => now - at > self.stale_after,
            None => true,
        }
    }
}
