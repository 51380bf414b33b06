//! Named runtime-adjustable camera parameters.
//!
//! The set of controllables depends on the camera model and is discovered
//! once per session. The registry caches the descriptors; values always come
//! from the device.

use std::collections::BTreeMap;

use log::debug;

use crate::driver::{ControlCaps, DeviceDriver};
use crate::error::{CameraError, Result};

/// Snapshot of one controllable: descriptor plus current device value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Controllable {
    /// Name reported by the device.
    pub name: String,
    /// Smallest accepted value.
    pub min_value: i64,
    /// Largest accepted value.
    pub max_value: i64,
    /// Value after power-on.
    pub default_value: i64,
    /// Current value.
    pub value: i64,
    /// Whether the value can be written.
    pub is_writable: bool,
    /// Whether the device can adjust the value itself.
    pub supports_auto: bool,
    /// Whether the device currently adjusts the value itself.
    pub is_auto: bool,
}

impl Controllable {
    fn from_caps(caps: &ControlCaps, value: i64, is_auto: bool) -> Self {
        Self {
            name: caps.name.clone(),
            min_value: caps.min_value,
            max_value: caps.max_value,
            default_value: caps.default_value,
            value,
            is_writable: caps.writable,
            supports_auto: caps.auto_supported,
            is_auto,
        }
    }

    /// Check that this entry can be applied as a desired setting.
    ///
    /// Read-only entries always pass, they are skipped when applied.
    pub fn check(&self) -> Result<()> {
        if !self.is_writable {
            return Ok(());
        }
        if self.is_auto {
            if !self.supports_auto {
                return Err(CameraError::AutoNotSupported(self.name.clone()));
            }
            return Ok(());
        }
        if self.value < self.min_value || self.value > self.max_value {
            return Err(CameraError::OutOfBounds {
                name: self.name.clone(),
                value: self.value,
                min: self.min_value,
                max: self.max_value,
            });
        }
        Ok(())
    }
}

/// Descriptors of every controllable of one camera session.
#[derive(Debug, Clone)]
pub struct ControllableRegistry {
    index: u32,
    camera_id: i32,
    controls: BTreeMap<String, ControlCaps>,
}

impl ControllableRegistry {
    /// Discover every controllable of the camera.
    ///
    /// Aborts on the first failed descriptor fetch; no partial registry.
    pub fn discover<D: DeviceDriver>(driver: &mut D, index: u32, camera_id: i32) -> Result<Self> {
        let count = driver.control_count(camera_id).map_err(CameraError::protocol(
            index,
            "failed to read the number of controllable parameters",
        ))?;

        let mut controls = BTreeMap::new();
        for control_index in 0..count {
            let caps = driver.control_caps(camera_id, control_index).map_err(|code| {
                CameraError::DeviceProtocol {
                    index,
                    code,
                    message: format!(
                        "failed to get parameter value for controllable {control_index}"
                    ),
                }
            })?;
            controls.insert(caps.name.clone(), caps);
        }
        debug!("camera {index}: discovered {} controllables", controls.len());

        Ok(Self {
            index,
            camera_id,
            controls,
        })
    }

    /// Names of the discovered controllables, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.controls.keys().map(String::as_str)
    }

    /// Number of discovered controllables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    /// Whether the camera reported no controllables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Descriptor of a controllable.
    pub fn caps(&self, name: &str) -> Result<&ControlCaps> {
        self.controls
            .get(name)
            .ok_or_else(|| CameraError::UnknownControllable(name.to_owned()))
    }

    /// Read the current value of one controllable.
    pub fn read<D: DeviceDriver>(&self, driver: &mut D, name: &str) -> Result<Controllable> {
        let caps = self.caps(name)?;
        self.read_caps(driver, caps)
    }

    fn read_caps<D: DeviceDriver>(
        &self,
        driver: &mut D,
        caps: &ControlCaps,
    ) -> Result<Controllable> {
        let (value, is_auto) = driver
            .control_value(self.camera_id, caps.control_type)
            .map_err(|code| CameraError::DeviceProtocol {
                index: self.index,
                code,
                message: format!("failed to read values for parameter {}", caps.name),
            })?;
        Ok(Controllable::from_caps(caps, value, is_auto))
    }

    /// Re-read every controllable from the device.
    pub fn read_all<D: DeviceDriver>(
        &self,
        driver: &mut D,
    ) -> Result<BTreeMap<String, Controllable>> {
        self.controls
            .iter()
            .map(|(name, caps)| Ok((name.clone(), self.read_caps(driver, caps)?)))
            .collect()
    }

    /// Write a value, turning auto mode off.
    ///
    /// Bounds are left to the device, which reports violations.
    pub fn set<D: DeviceDriver>(&self, driver: &mut D, name: &str, value: i64) -> Result<()> {
        let caps = self.caps(name)?;
        if !caps.writable {
            return Err(CameraError::NotWritable(name.to_owned()));
        }
        driver
            .set_control_value(self.camera_id, caps.control_type, value, false)
            .map_err(|code| CameraError::DeviceProtocol {
                index: self.index,
                code,
                message: format!("failed to set values for controllable: {name}"),
            })?;
        debug!("camera {}: {name} = {value}", self.index);
        Ok(())
    }

    /// Hand a controllable over to the device's automatic adjustment,
    /// starting from its last known value.
    pub fn set_auto<D: DeviceDriver>(&self, driver: &mut D, name: &str) -> Result<()> {
        let caps = self.caps(name)?;
        if !caps.auto_supported {
            return Err(CameraError::AutoNotSupported(name.to_owned()));
        }
        let current = self.read_caps(driver, caps)?;
        driver
            .set_control_value(self.camera_id, caps.control_type, current.value, true)
            .map_err(|code| CameraError::DeviceProtocol {
                index: self.index,
                code,
                message: format!("failed to set auto-mode for controllable: {name}"),
            })?;
        debug!("camera {}: {name} = auto", self.index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ErrorCode;
    use crate::mock::MockDriver;

    fn registry(driver: &mut MockDriver) -> ControllableRegistry {
        ControllableRegistry::discover(driver, 0, 0).expect("discover failed")
    }

    #[test]
    fn test_discover_fetches_every_descriptor() {
        let mut driver = MockDriver::new();
        let registry = registry(&mut driver);
        assert_eq!(registry.len(), driver.controls().len());
        assert_eq!(driver.call_count("control_count"), 1);
        assert_eq!(driver.call_count("control_caps"), registry.len());
        assert!(registry.names().any(|name| name == "Gain"));
    }

    #[test]
    fn test_discover_aborts_on_failed_descriptor() {
        let mut driver = MockDriver::new();
        driver.fail_on("control_caps", ErrorCode::CameraClosed);
        let err = ControllableRegistry::discover(&mut driver, 0, 0).expect_err("should fail");
        assert!(matches!(
            err,
            CameraError::DeviceProtocol {
                code: ErrorCode::CameraClosed,
                ..
            }
        ));
    }

    #[test]
    fn test_read_all_reflects_descriptor_and_value() {
        let mut driver = MockDriver::new();
        let registry = registry(&mut driver);
        let controls = registry.read_all(&mut driver).expect("read_all failed");

        let gain = controls.get("Gain").expect("Gain missing");
        let caps = registry.caps("Gain").expect("Gain caps missing");
        let (value, is_auto) = driver
            .control_value(0, caps.control_type)
            .expect("control_value failed");
        assert_eq!(gain.min_value, caps.min_value);
        assert_eq!(gain.max_value, caps.max_value);
        assert_eq!(gain.default_value, caps.default_value);
        assert_eq!(gain.is_writable, caps.writable);
        assert_eq!(gain.supports_auto, caps.auto_supported);
        assert_eq!(gain.value, value);
        assert_eq!(gain.is_auto, is_auto);
    }

    #[test]
    fn test_read_all_has_no_device_side_effect() {
        let mut driver = MockDriver::new();
        let registry = registry(&mut driver);
        let first = registry.read_all(&mut driver).expect("read_all failed");
        let second = registry.read_all(&mut driver).expect("read_all failed");
        assert_eq!(first, second);
        assert_eq!(driver.call_count("set_control_value"), 0);
    }

    #[test]
    fn test_set_unknown_name() {
        let mut driver = MockDriver::new();
        let registry = registry(&mut driver);
        let err = registry
            .set(&mut driver, "Focus", 3)
            .expect_err("Focus does not exist");
        assert!(matches!(err, CameraError::UnknownControllable(name) if name == "Focus"));
    }

    #[test]
    fn test_set_not_writable_makes_no_driver_call() {
        let mut driver = MockDriver::new();
        let registry = registry(&mut driver);
        let before = driver.total_calls();
        let err = registry
            .set(&mut driver, "Temperature", 10)
            .expect_err("Temperature is read-only");
        assert!(matches!(err, CameraError::NotWritable(name) if name == "Temperature"));
        assert_eq!(driver.total_calls(), before);
    }

    #[test]
    fn test_set_turns_auto_off() {
        let mut driver = MockDriver::new();
        let registry = registry(&mut driver);
        registry.set_auto(&mut driver, "Gain").expect("set_auto failed");
        registry.set(&mut driver, "Gain", 120).expect("set failed");
        let gain = registry.read(&mut driver, "Gain").expect("read failed");
        assert_eq!(gain.value, 120);
        assert!(!gain.is_auto);
    }

    #[test]
    fn test_set_out_of_range_is_rejected_by_device() {
        let mut driver = MockDriver::new();
        let registry = registry(&mut driver);
        let err = registry
            .set(&mut driver, "Gain", 100_000)
            .expect_err("device rejects out of range gain");
        assert_eq!(err.code(), Some(ErrorCode::GeneralError));
        assert_eq!(driver.call_count("set_control_value"), 1);
    }

    #[test]
    fn test_set_auto_not_supported_makes_no_driver_call() {
        let mut driver = MockDriver::new();
        let registry = registry(&mut driver);
        let before = driver.total_calls();
        let err = registry
            .set_auto(&mut driver, "Offset")
            .expect_err("Offset has no auto mode");
        assert!(matches!(err, CameraError::AutoNotSupported(name) if name == "Offset"));
        assert_eq!(driver.total_calls(), before);
    }

    #[test]
    fn test_set_auto_keeps_last_value() {
        let mut driver = MockDriver::new();
        let registry = registry(&mut driver);
        registry.set(&mut driver, "Exposure", 20_000).expect("set failed");
        registry.set_auto(&mut driver, "Exposure").expect("set_auto failed");
        let exposure = registry.read(&mut driver, "Exposure").expect("read failed");
        assert!(exposure.is_auto);
        assert_eq!(exposure.value, 20_000);
    }

    #[test]
    fn test_check_desired_entries() {
        let gain = Controllable {
            name: "Gain".to_owned(),
            min_value: 0,
            max_value: 570,
            value: 600,
            is_writable: true,
            ..Controllable::default()
        };
        assert!(matches!(gain.check(), Err(CameraError::OutOfBounds { value: 600, .. })));

        let auto_gain = Controllable {
            is_auto: true,
            ..gain.clone()
        };
        assert!(matches!(auto_gain.check(), Err(CameraError::AutoNotSupported(_))));

        let read_only = Controllable {
            is_writable: false,
            ..gain
        };
        assert!(read_only.check().is_ok());
    }
}
