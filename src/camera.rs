//! Camera session: the public entry point of the crate.
//!
//! A [`Camera`] owns the driver for one open device. Opening discovers the
//! capabilities and controllables; dropping (or [`Camera::close`]) always
//! releases the device. Only one live session may exist per camera index.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use log::{debug, warn};

use crate::catalog::{CapabilityCatalog, ImageType};
use crate::controllable::{Controllable, ControllableRegistry};
use crate::driver::{
    CameraMode, DeviceDriver, ErrorCode, ExposureStatus, GuideDirection, RawRoiFormat,
};
use crate::error::{CameraError, Result};
use crate::exposure::{CancelToken, Exposure};
use crate::report;
use crate::roi::{self, Roi};
use crate::settings::CameraSettings;

static OPEN_SESSIONS: Mutex<BTreeSet<u32>> = Mutex::new(BTreeSet::new());

/// Claim on a camera index, released on drop.
#[derive(Debug)]
struct SessionClaim(u32);

impl SessionClaim {
    fn acquire(index: u32) -> Result<Self> {
        let mut open = OPEN_SESSIONS.lock().unwrap_or_else(PoisonError::into_inner);
        if !open.insert(index) {
            return Err(CameraError::AlreadyOpen(index));
        }
        Ok(Self(index))
    }
}

impl Drop for SessionClaim {
    fn drop(&mut self) {
        OPEN_SESSIONS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.0);
    }
}

/// Number of cameras the driver can see.
pub fn connected_cameras<D: DeviceDriver>(driver: &mut D) -> u32 {
    driver.connected_cameras()
}

fn to_native(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn from_native(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// One open camera session.
///
/// Calls must be serialized by the owner; the session holds no lock.
pub struct Camera<D: DeviceDriver> {
    driver: D,
    index: u32,
    catalog: CapabilityCatalog,
    registry: ControllableRegistry,
    settings: CameraSettings,
    released: bool,
    _claim: SessionClaim,
}

impl<D: DeviceDriver> Camera<D> {
    /// Open the camera at `index` with default settings.
    pub fn open(driver: D, index: u32) -> Result<Self> {
        Self::open_with(driver, index, CameraSettings::default())
    }

    /// Open the camera at `index`.
    pub fn open_with(mut driver: D, index: u32, settings: CameraSettings) -> Result<Self> {
        let claim = SessionClaim::acquire(index)?;

        let catalog = match CapabilityCatalog::discover(&mut driver, index) {
            Ok(catalog) => catalog,
            // Without device access the driver sees no camera at all; a
            // missing index among visible cameras is an absent device.
            Err(err @ CameraError::DeviceUnavailable { code, .. }) => {
                if driver.connected_cameras() > 0 {
                    return Err(err);
                }
                return Err(settings.host.diagnose(index, code).unwrap_or(err));
            }
            Err(err) => return Err(err),
        };
        let camera_id = catalog.camera_id;

        driver.open(camera_id).map_err(|code| {
            settings
                .host
                .diagnose(index, code)
                .unwrap_or_else(|| CameraError::protocol(index, "failed to open the camera")(code))
        })?;

        let registry = match Self::initialize(&mut driver, index, camera_id) {
            Ok(registry) => registry,
            Err(err) => {
                if let Err(code) = driver.close(camera_id) {
                    warn!("camera {index}: failed to close after init failure ({code})");
                }
                return Err(err);
            }
        };
        debug!("camera {index}: session open");

        Ok(Self {
            driver,
            index,
            catalog,
            registry,
            settings,
            released: false,
            _claim: claim,
        })
    }

    fn initialize(driver: &mut D, index: u32, camera_id: i32) -> Result<ControllableRegistry> {
        driver
            .init(camera_id)
            .map_err(CameraError::protocol(index, "failed to init the camera"))?;
        ControllableRegistry::discover(driver, index, camera_id)
    }

    /// Close the session. Failures are logged, not returned.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(code) = self.driver.close(self.catalog.camera_id) {
            warn!("camera {}: failed to close the camera ({code})", self.index);
        }
        debug!("camera {}: session closed", self.index);
    }

    /// Camera index of this session.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Capabilities of the camera.
    #[must_use]
    pub const fn info(&self) -> &CapabilityCatalog {
        &self.catalog
    }

    /// Descriptors discovered when the session opened.
    #[must_use]
    pub const fn registry(&self) -> &ControllableRegistry {
        &self.registry
    }

    /// Session settings.
    #[must_use]
    pub const fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// The underlying driver.
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the underlying driver.
    ///
    /// Changes made directly are unknown to the session; re-read values
    /// with [`Camera::controls`] afterwards.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Read every controllable from the device.
    pub fn controls(&mut self) -> Result<BTreeMap<String, Controllable>> {
        self.registry.read_all(&mut self.driver)
    }

    /// Read one controllable from the device.
    pub fn control(&mut self, name: &str) -> Result<Controllable> {
        self.registry.read(&mut self.driver, name)
    }

    /// Write a controllable value, turning its auto mode off.
    pub fn set_control(&mut self, name: &str, value: i64) -> Result<()> {
        self.registry.set(&mut self.driver, name, value)
    }

    /// Let the device adjust a controllable automatically.
    pub fn set_auto(&mut self, name: &str) -> Result<()> {
        self.registry.set_auto(&mut self.driver, name)
    }

    /// Read the current ROI, including its start position.
    pub fn roi(&mut self) -> Result<Roi> {
        let id = self.catalog.camera_id;
        let format = self
            .driver
            .roi_format(id)
            .map_err(CameraError::protocol(self.index, "failed to read the current ROI"))?;
        let (start_x, start_y) = self.driver.start_position(id).map_err(CameraError::protocol(
            self.index,
            "failed to read the ROI starting position",
        ))?;
        let image_type = ImageType::from_native(format.image_type).ok_or_else(|| {
            CameraError::protocol(self.index, "unknown image type in the current ROI")(
                ErrorCode::InvalidImageType,
            )
        })?;

        Ok(Roi {
            start_x: from_native(start_x),
            start_y: from_native(start_y),
            width: from_native(format.width),
            height: from_native(format.height),
            bin: from_native(format.bin),
            image_type,
        })
    }

    /// Validate and apply an ROI.
    ///
    /// Nothing is written unless validation passes. The format and the start
    /// position are then written by two separate calls.
    pub fn set_roi(&mut self, roi: &Roi) -> Result<()> {
        roi::validate(roi, &self.catalog)?;
        if self.settings.enforce_roi_bounds {
            roi.check_bounds(&self.catalog)?;
        }

        let id = self.catalog.camera_id;
        let format = RawRoiFormat {
            width: to_native(roi.width),
            height: to_native(roi.height),
            bin: to_native(roi.bin),
            image_type: roi.image_type.native(),
        };
        self.driver
            .set_roi_format(id, format)
            .map_err(CameraError::protocol(self.index, "failed to set the ROI"))?;
        self.driver
            .set_start_position(id, to_native(roi.start_x), to_native(roi.start_y))
            .map_err(CameraError::protocol(
                self.index,
                "failed to set the ROI starting position",
            ))?;
        debug!(
            "camera {}: ROI {}x{} at ({}, {}), bin {}, {}",
            self.index, roi.width, roi.height, roi.start_x, roi.start_y, roi.bin, roi.image_type
        );
        Ok(())
    }

    /// Apply an ROI then every writable entry of `desired`, in order.
    ///
    /// Entries are checked (known name, bounds, auto support) before anything
    /// is written. A device rejection partway leaves earlier entries applied.
    pub fn configure(&mut self, roi: &Roi, desired: &BTreeMap<String, Controllable>) -> Result<()> {
        for (name, control) in desired.iter().filter(|(_, control)| control.is_writable) {
            let caps = self.registry.caps(name)?;
            if !caps.writable {
                return Err(CameraError::NotWritable(name.clone()));
            }
            Controllable {
                min_value: caps.min_value,
                max_value: caps.max_value,
                supports_auto: caps.auto_supported,
                ..control.clone()
            }
            .check()?;
        }

        self.set_roi(roi)?;
        for (name, control) in desired.iter().filter(|(_, control)| control.is_writable) {
            if control.is_auto {
                self.set_auto(name)?;
            } else {
                self.set_control(name, control.value)?;
            }
        }
        Ok(())
    }

    /// Switch the camera (trigger) mode.
    pub fn set_camera_mode(&mut self, mode: CameraMode) -> Result<()> {
        self.driver
            .set_camera_mode(self.catalog.camera_id, mode)
            .map_err(CameraError::protocol(self.index, "failed to set camera mode"))
    }

    /// Start pulse guiding in `direction`.
    pub fn pulse_guide_on(&mut self, direction: GuideDirection) -> Result<()> {
        self.driver
            .pulse_guide_on(self.catalog.camera_id, direction)
            .map_err(CameraError::protocol(self.index, "failed to set pulse guide on"))
    }

    /// Stop pulse guiding in `direction`.
    pub fn pulse_guide_off(&mut self, direction: GuideDirection) -> Result<()> {
        self.driver
            .pulse_guide_off(self.catalog.camera_id, direction)
            .map_err(CameraError::protocol(self.index, "failed to set off pulse guide"))
    }

    /// Subtract the dark frame bitmap at `path` from subsequent captures.
    pub fn enable_dark_subtract(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(CameraError::DarkFrameNotFound(path.to_path_buf()));
        }
        self.driver
            .enable_dark_subtract(self.catalog.camera_id, path)
            .map_err(CameraError::protocol(self.index, "failed to enable dark subtract"))
    }

    /// Stop subtracting a dark frame.
    pub fn disable_dark_subtract(&mut self) -> Result<()> {
        self.driver
            .disable_dark_subtract(self.catalog.camera_id)
            .map_err(CameraError::protocol(self.index, "failed to disable dark subtract"))
    }

    /// Current exposure status.
    pub fn exposure_status(&mut self) -> Result<ExposureStatus> {
        self.exposure().status()
    }

    /// Abort the exposure in progress.
    pub fn stop_exposure(&mut self) -> Result<()> {
        self.driver
            .stop_exposure(self.catalog.camera_id)
            .map_err(CameraError::protocol(self.index, "failed to stop exposure"))
    }

    fn exposure(&mut self) -> Exposure<'_, D> {
        Exposure::new(
            &mut self.driver,
            self.index,
            self.catalog.camera_id,
            self.settings.poll,
        )
    }

    /// Take one picture into `buffer`, blocking until it is ready.
    ///
    /// `buffer` must hold exactly [`Roi::frame_size`] bytes of the current
    /// ROI. The exposure time is the "Exposure" controllable.
    pub fn capture(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.exposure().capture(buffer, false)
    }

    /// Take one dark frame (shutter closed where fitted) into `buffer`.
    pub fn capture_dark(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.exposure().capture(buffer, true)
    }

    /// Like [`Camera::capture`], giving up when `token` is cancelled.
    pub fn capture_with_cancel(&mut self, buffer: &mut [u8], token: &CancelToken) -> Result<()> {
        self.exposure().with_cancel(token).capture(buffer, false)
    }

    /// Diagnostic report of the capabilities and every controllable.
    pub fn status_report(&mut self) -> Result<String> {
        let controls = self.controls()?;
        Ok(report::render(
            &self.driver.sdk_version(),
            &self.catalog,
            &controls,
        ))
    }
}

impl<D: DeviceDriver> Drop for Camera<D> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoiKind;
    use crate::host::{HostPermissions, RULES_FILE_NAME};
    use crate::mock::{asi294mc_info, MockControl, MockDriver};
    use serial_test::serial;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Settings whose host checks only see `dir`, never the build machine.
    fn settings(dir: &TempDir) -> CameraSettings {
        CameraSettings::default()
            .with_poll_interval(Duration::from_micros(1))
            .with_host_permissions(HostPermissions {
                usbfs_memory_path: dir.path().join("usbfs_memory_mb"),
                rules_dir: dir.path().to_path_buf(),
            })
    }

    fn open_driver(driver: MockDriver, index: u32) -> Result<Camera<MockDriver>> {
        let dir = TempDir::new().expect("tempdir");
        Camera::open_with(driver, index, settings(&dir))
    }

    fn open() -> Camera<MockDriver> {
        open_driver(MockDriver::new(), 0).expect("open failed")
    }

    #[test]
    #[serial]
    fn test_open_discovers_and_initializes() {
        let camera = open();
        assert_eq!(camera.info().name, "ZWO ASI294MC Pro");
        assert!(!camera.registry().is_empty());
        assert!(camera.driver().is_open(0));
        assert_eq!(camera.driver().call_count("init"), 1);
    }

    #[test]
    #[serial]
    fn test_second_session_for_index_is_refused() {
        let camera = open();
        let err = open_driver(MockDriver::new(), 0)
            .err()
            .expect("index 0 is taken");
        assert!(matches!(err, CameraError::AlreadyOpen(0)));

        camera.close();
        let reopened = open_driver(MockDriver::new(), 0);
        assert!(reopened.is_ok());
    }

    #[test]
    #[serial]
    fn test_open_missing_camera() {
        let err = open_driver(MockDriver::new(), 5).err().expect("no camera 5");
        assert!(matches!(err, CameraError::DeviceUnavailable { index: 5, .. }));
        // the failed attempt does not keep the index claimed
        assert!(open_driver(MockDriver::new().with_cameras(Vec::new()), 5).is_err());
        assert!(SessionClaim::acquire(5).is_ok());
    }

    #[test]
    #[serial]
    fn test_absent_index_is_not_a_permission_problem() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("usbfs_memory_mb"), "16\n").expect("write usbfs file");

        let err = Camera::open_with(MockDriver::new(), 5, settings(&dir))
            .err()
            .expect("no camera 5");
        assert!(matches!(err, CameraError::DeviceUnavailable { index: 5, .. }));
        assert!(!dir.path().join(RULES_FILE_NAME).exists());
    }

    #[test]
    #[serial]
    fn test_invisible_cameras_point_to_permissions() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("usbfs_memory_mb"), "16\n").expect("write usbfs file");

        let driver = MockDriver::new().with_cameras(Vec::new());
        let err = Camera::open_with(driver, 0, settings(&dir))
            .err()
            .expect("no camera visible");
        assert!(matches!(err, CameraError::PermissionDenied { index: 0, .. }));
        assert!(dir.path().join(RULES_FILE_NAME).exists());
    }

    #[test]
    #[serial]
    fn test_init_failure_closes_device() {
        let mut driver = MockDriver::new();
        driver.fail_on("control_count", ErrorCode::CameraRemoved);
        let err = open_driver(driver, 0).err().expect("discovery fails");
        assert_eq!(err.code(), Some(ErrorCode::CameraRemoved));
        assert!(SessionClaim::acquire(0).is_ok());
    }

    #[test]
    #[serial]
    fn test_roi_round_trip() {
        let mut camera = open();
        let roi = Roi {
            start_x: 8,
            start_y: 4,
            width: 1024,
            height: 768,
            bin: 2,
            image_type: ImageType::Raw16,
        };
        camera.set_roi(&roi).expect("set_roi failed");
        assert_eq!(camera.roi().expect("roi failed"), roi);
        assert_eq!(
            camera.driver().roi_state(),
            RawRoiFormat {
                width: 1024,
                height: 768,
                bin: 2,
                image_type: 2,
            }
        );
    }

    #[test]
    #[serial]
    fn test_invalid_roi_never_reaches_device() {
        let mut camera = open();
        let roi = Roi {
            width: 4145,
            ..Roi::full_frame(camera.info(), ImageType::Raw8)
        };
        let err = camera.set_roi(&roi).expect_err("width is invalid");
        assert!(matches!(
            err,
            CameraError::RoiInvalid(RoiKind::WidthNotMultipleOf8(4145))
        ));
        assert_eq!(camera.driver().call_count("set_roi_format"), 0);
        assert_eq!(camera.driver().call_count("set_start_position"), 0);
    }

    #[test]
    #[serial]
    fn test_bounds_policy() {
        let mut camera = open();
        let roi = Roi {
            start_x: 8,
            ..Roi::full_frame(camera.info(), ImageType::Raw8)
        };
        // without the policy the device rejects the start position
        let err = camera.set_roi(&roi).expect_err("device rejects");
        assert_eq!(err.code(), Some(ErrorCode::OutOfBoundary));
        assert_eq!(camera.driver().call_count("set_roi_format"), 1);
        camera.close();

        let dir = TempDir::new().expect("tempdir");
        let settings = settings(&dir).with_roi_bounds_check(true);
        let mut camera = Camera::open_with(MockDriver::new(), 0, settings).expect("open failed");
        let err = camera.set_roi(&roi).expect_err("rejected locally");
        assert!(matches!(err, CameraError::RoiInvalid(RoiKind::OutOfBounds { .. })));
        assert_eq!(camera.driver().call_count("set_roi_format"), 0);
    }

    #[test]
    #[serial]
    fn test_capture_full_frame() {
        let mut camera = open();
        let roi = camera.roi().expect("roi failed");
        let mut buffer = vec![0u8; roi.frame_size()];
        camera.capture(&mut buffer).expect("capture failed");
        assert_eq!(camera.driver().last_data_size(), Some(4144 * 2822));
        assert_eq!(
            camera.exposure_status().expect("status failed"),
            ExposureStatus::Idle
        );
    }

    #[test]
    #[serial]
    fn test_dark_subtract_requires_file() {
        let mut camera = open();
        let err = camera
            .enable_dark_subtract(Path::new("/nonexistent/dark.bmp"))
            .expect_err("missing file");
        assert!(matches!(err, CameraError::DarkFrameNotFound(_)));
        assert_eq!(camera.driver().call_count("enable_dark_subtract"), 0);

        let file = tempfile::NamedTempFile::new().expect("tempfile");
        camera
            .enable_dark_subtract(file.path())
            .expect("enable failed");
        assert_eq!(camera.driver().dark_frame(), Some(file.path()));
        camera.disable_dark_subtract().expect("disable failed");
        assert_eq!(camera.driver().dark_frame(), None);
    }

    #[test]
    #[serial]
    fn test_guide_and_mode_need_capable_camera() {
        let mut camera = open();
        let err = camera
            .pulse_guide_on(GuideDirection::North)
            .expect_err("no ST4 port");
        assert!(matches!(err, CameraError::DeviceProtocol { .. }));
        let err = camera
            .set_camera_mode(CameraMode::RiseEdge)
            .expect_err("not a trigger camera");
        assert_eq!(err.code(), Some(ErrorCode::InvalidMode));
        camera.close();

        let mut info = asi294mc_info();
        info.st4_port = true;
        info.is_trigger = true;
        let mut camera =
            open_driver(MockDriver::new().with_cameras(vec![info]), 0).expect("open failed");
        camera.pulse_guide_on(GuideDirection::West).expect("guide on");
        assert_eq!(camera.driver().guiding(), &[GuideDirection::West]);
        camera.pulse_guide_off(GuideDirection::West).expect("guide off");
        assert!(camera.driver().guiding().is_empty());
        camera.set_camera_mode(CameraMode::RiseEdge).expect("mode");
        assert_eq!(camera.driver().mode(), CameraMode::RiseEdge);
    }

    #[test]
    #[serial]
    fn test_status_report_reads_values() {
        let mut camera = open();
        let reads = camera.driver().call_count("control_value");
        let report = camera.status_report().expect("report failed");
        assert!(report.contains("Gain"));
        assert!(report.contains("Temperature"));
        assert_eq!(
            camera.driver().call_count("control_value"),
            reads + camera.registry().len()
        );
    }

    #[test]
    #[serial]
    fn test_registry_follows_device_controls() {
        let driver = MockDriver::new().with_controls(vec![
            MockControl::new("Exposure", 1, (32, 2_000_000_000, 10_000), true, false),
            MockControl::new("Temperature", 8, (-500, 1000, 20), false, false),
        ]);
        let mut camera = open_driver(driver, 0).expect("open failed");
        assert_eq!(
            camera.registry().names().collect::<Vec<_>>(),
            ["Exposure", "Temperature"]
        );
        assert!(matches!(
            camera.control("Gain"),
            Err(CameraError::UnknownControllable(name)) if name == "Gain"
        ));
        assert!(matches!(
            camera.set_auto("Exposure"),
            Err(CameraError::AutoNotSupported(_))
        ));
        assert_eq!(camera.driver().call_count("set_control_value"), 0);
    }
}
