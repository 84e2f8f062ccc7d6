//! The fleet of simulated devices.
//!
//! [`DeviceRegistry`] is the single owner of every [`Device`]. Devices keep the
//! order they were inserted in, which is the order ticks visit them. Lookups by
//! id go through an index so command handling doesn't scan the fleet.

use std::collections::HashMap;

use crate::device::{Device, DeviceKind, DeviceType};
use crate::error::SimError;

/// Ordered, id-keyed set of devices.
#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    index: HashMap<String, usize>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The four-device demo fleet: one device of each type.
    pub fn demo_fleet() -> Self {
        let mut registry = Self::new();
        for (id, ty) in [
            ("temp-sensor-1", DeviceType::Temperature),
            ("smart-bulb-1", DeviceType::Bulb),
            ("heart-monitor-1", DeviceType::HeartRate),
            ("vehicle-1", DeviceType::Gps),
        ] {
            // ids above are distinct
            let _ = registry.insert(Device::new(id, ty.default_kind()));
        }
        registry
    }

    /// Build a registry from devices, rejecting duplicate ids.
    pub fn from_devices(devices: impl IntoIterator<Item = Device>) -> Result<Self, SimError> {
        let mut registry = Self::new();
        for device in devices {
            registry.insert(device)?;
        }
        Ok(registry)
    }

    /// Add a device at the end of the tick order.
    pub fn insert(&mut self, device: Device) -> Result<(), SimError> {
        if self.index.contains_key(device.id()) {
            return Err(SimError::DuplicateDevice(device.id().to_string()));
        }
        self.index.insert(device.id().to_string(), self.devices.len());
        self.devices.push(device);
        Ok(())
    }

    /// Convenience for `insert(Device::new(id, kind))`.
    pub fn add(&mut self, id: impl Into<String>, kind: DeviceKind) -> Result<(), SimError> {
        self.insert(Device::new(id, kind))
    }

    /// Look up a device by id.
    pub fn get(&self, id: &str) -> Option<&Device> {
        self.index.get(id).map(|&i| &self.devices[i])
    }

    /// Look up a device by id for mutation.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Device> {
        match self.index.get(id) {
            Some(&i) => self.devices.get_mut(i),
            None => None,
        }
    }

    /// Whether a device with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Devices in tick order.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    /// Devices in tick order, for mutation.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.iter_mut()
    }

    /// Device ids in tick order.
    pub fn ids(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.id().to_string()).collect()
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the fleet is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
