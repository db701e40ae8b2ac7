use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use voxbridge_foundation::AudioError;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    pub max_input_channels: u16,
    pub default_sample_rate: u32,
}

/// Enumerate input-capable devices on the default host, in index order.
pub fn enumerate_input_devices() -> Result<Vec<DeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for (index, device) in host.input_devices()?.enumerate() {
        let name = device.name().unwrap_or_else(|_| format!("device-{index}"));
        let (channels, sample_rate) = match device.default_input_config() {
            Ok(cfg) => (cfg.channels(), cfg.sample_rate().0),
            Err(_) => (0, 0),
        };
        devices.push(DeviceInfo {
            index,
            name: name.clone(),
            is_default: default_name.as_deref() == Some(name.as_str()),
            max_input_channels: channels,
            default_sample_rate: sample_rate,
        });
    }
    Ok(devices)
}

/// Resolve an input device by enumeration index; `None` picks the host
/// default.
pub fn resolve_input_device(index: Option<usize>) -> Result<Device, AudioError> {
    let host = cpal::default_host();
    match index {
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceUnavailable),
        Some(wanted) => host
            .input_devices()?
            .nth(wanted)
            .ok_or(AudioError::DeviceNotFound {
                name: Some(format!("#{wanted}")),
            }),
    }
}

/// Print the `--list-devices` report to stdout.
pub fn print_input_devices() -> Result<(), AudioError> {
    let devices = enumerate_input_devices()?;
    println!("Available audio input devices:");
    println!("-----------------------------");
    for device in &devices {
        println!("Device #{}: {}", device.index, device.name);
        println!("  Input channels: {}", device.max_input_channels);
        println!("  Default sample rate: {} Hz", device.default_sample_rate);
        if device.is_default {
            println!("  (Default input device)");
        }
        println!();
    }
    Ok(())
}
