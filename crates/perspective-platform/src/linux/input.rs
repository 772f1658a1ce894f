//! evdev-based input device control for Linux.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use evdev::{BusType, Device};
use parking_lot::Mutex;
use perspective_types::{InputDeviceId, InputDeviceInfo};
use tracing::{debug, info};

use crate::error::PlatformError;
use crate::InputDevices;

/// Linux input devices via evdev.
///
/// Devices are `/dev/input/event<N>` nodes; `N` is the device ID. A device
/// on the USB or Bluetooth bus counts as external. Disabling a device takes
/// an exclusive grab and holds the file open; enabling drops the grab.
///
/// Event nodes are reused by the kernel, so each grab remembers what it was
/// taken on. A grab whose node has vanished or now names a different device
/// is dropped, which closes the file and frees the node.
#[derive(Default)]
pub struct EvdevInputDevices {
    grabbed: Mutex<HashMap<InputDeviceId, Grab<Device>>>,
}

/// What a node looked like when it was grabbed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DeviceIdentity {
    name: Option<String>,
    phys: Option<String>,
    bus: u16,
    vendor: u16,
    product: u16,
}

impl DeviceIdentity {
    fn of(device: &Device) -> Self {
        let input_id = device.input_id();
        Self {
            name: device.name().map(ToString::to_string),
            phys: device.physical_path().map(ToString::to_string),
            bus: input_id.bus_type().0,
            vendor: input_id.vendor(),
            product: input_id.product(),
        }
    }
}

struct Grab<D> {
    identity: DeviceIdentity,
    device: D,
}

impl EvdevInputDevices {
    pub fn new() -> Self {
        Self::default()
    }

    fn device_path(id: InputDeviceId) -> PathBuf {
        PathBuf::from(format!("/dev/input/event{}", id.0))
    }

    fn open(id: InputDeviceId) -> Result<Device, PlatformError> {
        let path = Self::device_path(id);
        Device::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlatformError::DeviceNotFound(id)
            } else {
                PlatformError::Device(format!("{}: {e}", path.display()))
            }
        })
    }
}

fn device_id(path: &Path) -> Option<InputDeviceId> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
        .map(InputDeviceId)
}

fn is_external(device: &Device) -> bool {
    let bus = device.input_id().bus_type();
    bus == BusType::BUS_USB || bus == BusType::BUS_BLUETOOTH
}

/// Remove grabs whose node is gone or now holds a different device.
/// Returns the removed IDs; their devices are dropped.
fn prune_stale<D>(
    grabbed: &mut HashMap<InputDeviceId, Grab<D>>,
    present: &HashMap<InputDeviceId, DeviceIdentity>,
) -> Vec<InputDeviceId> {
    let mut stale: Vec<InputDeviceId> = grabbed
        .iter()
        .filter(|(id, grab)| present.get(id) != Some(&grab.identity))
        .map(|(id, _)| *id)
        .collect();
    stale.sort_unstable();
    for id in &stale {
        grabbed.remove(id);
    }
    stale
}

impl InputDevices for EvdevInputDevices {
    fn devices(&self) -> Vec<InputDeviceInfo> {
        let mut present = HashMap::new();
        let mut devices: Vec<InputDeviceInfo> = evdev::enumerate()
            .filter_map(|(path, device)| {
                let id = device_id(&path)?;
                present.insert(id, DeviceIdentity::of(&device));
                Some(InputDeviceInfo {
                    id,
                    name: device.name().unwrap_or("Unknown Device").to_string(),
                    external: is_external(&device),
                })
            })
            .collect();
        devices.sort_by_key(|d| d.id.0);

        for id in prune_stale(&mut self.grabbed.lock(), &present) {
            debug!(device = %id, "dropped grab on departed input device");
        }
        devices
    }

    fn set_enabled(&self, id: InputDeviceId, enabled: bool) -> Result<(), PlatformError> {
        let mut grabbed = self.grabbed.lock();
        if enabled {
            if let Some(mut grab) = grabbed.remove(&id) {
                // Closing the file releases the grab if the device is gone.
                if let Err(e) = grab.device.ungrab() {
                    debug!(device = %id, error = %e, "ungrab failed, dropping device");
                }
                info!(device = %id, "input device released");
            }
            return Ok(());
        }

        let mut device = match Self::open(id) {
            Ok(device) => device,
            Err(e) => {
                if grabbed.remove(&id).is_some() {
                    debug!(device = %id, "dropped grab on departed input device");
                }
                return Err(e);
            }
        };
        let identity = DeviceIdentity::of(&device);
        match grabbed.get(&id) {
            Some(grab) if grab.identity == identity => {
                debug!(device = %id, "input device already disabled");
                return Ok(());
            }
            Some(_) => {
                grabbed.remove(&id);
                debug!(device = %id, "event node reused, replacing stale grab");
            }
            None => {}
        }

        device
            .grab()
            .map_err(|e| PlatformError::Device(e.to_string()))?;
        grabbed.insert(id, Grab { identity, device });
        info!(device = %id, "input device grabbed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str, product: u16) -> DeviceIdentity {
        DeviceIdentity {
            name: Some(name.to_string()),
            phys: Some(format!("usb-0000:00:14.0-{product}/input0")),
            bus: BusType::BUS_USB.0,
            vendor: 0x046d,
            product,
        }
    }

    fn grab(identity: DeviceIdentity) -> Grab<()> {
        Grab {
            identity,
            device: (),
        }
    }

    #[test]
    fn device_ids_from_paths() {
        assert_eq!(
            device_id(Path::new("/dev/input/event12")),
            Some(InputDeviceId(12))
        );
        assert_eq!(device_id(Path::new("/dev/input/mouse0")), None);
        assert_eq!(device_id(Path::new("/dev/input/eventX")), None);
    }

    #[test]
    fn unplugged_device_grab_is_dropped() {
        let keyboard = identity("USB Keyboard", 1);
        let mouse = identity("USB Mouse", 2);
        let mut grabbed = HashMap::from([
            (InputDeviceId(5), grab(keyboard)),
            (InputDeviceId(6), grab(mouse.clone())),
        ]);
        let present = HashMap::from([(InputDeviceId(6), mouse)]);

        assert_eq!(prune_stale(&mut grabbed, &present), vec![InputDeviceId(5)]);
        assert_eq!(grabbed.len(), 1);
        assert!(grabbed.contains_key(&InputDeviceId(6)));
    }

    #[test]
    fn reused_node_drops_the_old_grab() {
        let mut grabbed = HashMap::from([(InputDeviceId(5), grab(identity("USB Keyboard", 1)))]);
        let present = HashMap::from([(InputDeviceId(5), identity("USB Mouse", 2))]);

        assert_eq!(prune_stale(&mut grabbed, &present), vec![InputDeviceId(5)]);
        assert!(grabbed.is_empty());
    }

    #[test]
    fn unchanged_grabs_are_kept() {
        let keyboard = identity("USB Keyboard", 1);
        let mut grabbed = HashMap::from([(InputDeviceId(5), grab(keyboard.clone()))]);
        let present = HashMap::from([(InputDeviceId(5), keyboard)]);

        assert!(prune_stale(&mut grabbed, &present).is_empty());
        assert_eq!(grabbed.len(), 1);
    }
}
