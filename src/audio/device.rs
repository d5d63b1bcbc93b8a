use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, SampleFormat, SupportedStreamConfig};
use std::collections::BTreeMap;

use crate::error::AudioError;

/// Output configuration the player will open a stream with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl From<&SupportedStreamConfig> for OutputFormat {
    fn from(config: &SupportedStreamConfig) -> Self {
        Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            sample_format: config.sample_format(),
        }
    }
}

/// Manages audio device enumeration and selection
pub struct DeviceManager {
    host: Host,
    devices: BTreeMap<String, Device>,
    current_device: Option<Device>,
}

impl DeviceManager {
    pub fn new() -> Result<Self, AudioError> {
        let mut manager = DeviceManager {
            host: cpal::default_host(),
            devices: BTreeMap::new(),
            current_device: None,
        };
        manager.refresh_devices()?;
        Ok(manager)
    }

    /// Refresh the list of available output devices
    pub fn refresh_devices(&mut self) -> Result<(), AudioError> {
        self.devices.clear();

        let devices = self.host.output_devices().map_err(|e| {
            AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e))
        })?;

        for device in devices {
            match device.name() {
                Ok(name) => {
                    self.devices.insert(name, device);
                }
                Err(e) => log::debug!("Skipping device without a name: {}", e),
            }
        }
        Ok(())
    }

    /// Names of all output devices, sorted
    pub fn list_devices(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    /// Select a device by name, or the host default when `None`
    pub fn select_device(&mut self, device_name: Option<&str>) -> Result<(), AudioError> {
        match device_name {
            Some(name) => {
                let device = self.devices.get(name).cloned().ok_or_else(|| {
                    AudioError::DeviceNotFound {
                        device: name.to_string(),
                    }
                })?;
                self.current_device = Some(device);
                Ok(())
            }
            None => self.select_default_device(),
        }
    }

    /// Select a device by name, falling back to the default device if it is missing
    pub fn select_device_with_fallback(&mut self, device_name: Option<&str>) -> Result<(), AudioError> {
        match self.select_device(device_name) {
            Err(AudioError::DeviceNotFound { device }) => {
                log::warn!("Device '{}' not found, using default output", device);
                self.select_default_device()
            }
            other => other,
        }
    }

    pub fn select_default_device(&mut self) -> Result<(), AudioError> {
        let device = self.host.default_output_device().ok_or_else(|| {
            AudioError::InitializationFailed("No default output device available".to_string())
        })?;
        self.current_device = Some(device);
        Ok(())
    }

    pub fn current_device(&self) -> Option<&Device> {
        self.current_device.as_ref()
    }

    pub fn current_device_name(&self) -> Option<String> {
        self.current_device.as_ref().and_then(|d| d.name().ok())
    }

    /// Default stream format of the selected device
    pub fn output_format(&self) -> Result<OutputFormat, AudioError> {
        let device = self
            .current_device
            .as_ref()
            .ok_or_else(|| AudioError::InitializationFailed("No device selected".to_string()))?;
        let config = device.default_output_config().map_err(|e| {
            AudioError::InitializationFailed(format!("Failed to get default config: {}", e))
        })?;
        Ok(OutputFormat::from(&config))
    }
}
