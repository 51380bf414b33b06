//! Mock driver for testing without hardware.
//!
//! Simulates one or more cameras in process: controllable values with device
//! side bounds checks, ROI state, and scripted exposure status sequences.
//! Every driver call is counted so tests can assert which calls were made.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use crate::driver::{
    CameraMode, ControlCaps, DeviceDriver, DriverResult, ErrorCode, ExposureStatus, GuideDirection,
    RawCameraInfo, RawRoiFormat,
};

/// Properties of a colour ASI294MC Pro, used as the default mock camera.
#[must_use]
pub fn asi294mc_info() -> RawCameraInfo {
    RawCameraInfo {
        name: "ZWO ASI294MC Pro".to_owned(),
        camera_id: 0,
        max_height: 2822,
        max_width: 4144,
        is_color: true,
        bayer_pattern: 0,
        supported_bins: [1, 2, 3, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        supported_video_formats: [0, 1, 2, 3, -1, -1, -1, -1],
        pixel_size_um: 4.63,
        mechanical_shutter: false,
        st4_port: false,
        is_cooler: true,
        is_usb3_host: true,
        is_usb3_camera: true,
        elec_per_adu: 0.4,
        bit_depth: 14,
        is_trigger: false,
    }
}

/// Simulated controllable: descriptor plus device-side state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockControl {
    /// Descriptor returned by `control_caps`.
    pub caps: ControlCaps,
    /// Current value.
    pub value: i64,
    /// Current auto flag.
    pub auto: bool,
}

impl MockControl {
    /// Create a control whose value starts at `default`.
    #[must_use]
    pub fn new(
        name: &str,
        control_type: i32,
        (min, max, default): (i64, i64, i64),
        writable: bool,
        auto_supported: bool,
    ) -> Self {
        Self {
            caps: ControlCaps {
                name: name.to_owned(),
                description: format!("{name} (simulated)"),
                max_value: max,
                min_value: min,
                default_value: default,
                auto_supported,
                writable,
                control_type,
            },
            value: default,
            auto: false,
        }
    }
}

fn default_controls() -> Vec<MockControl> {
    vec![
        MockControl::new("Gain", 0, (0, 570, 200), true, true),
        MockControl::new("Exposure", 1, (32, 2_000_000_000, 10_000), true, true),
        MockControl::new("WB_R", 3, (1, 99, 52), true, true),
        MockControl::new("WB_B", 4, (1, 99, 95), true, true),
        MockControl::new("Offset", 5, (0, 80, 8), true, false),
        MockControl::new("BandWidth", 6, (40, 100, 50), true, true),
        MockControl::new("Flip", 9, (0, 3, 0), true, false),
        MockControl::new("Temperature", 8, (-500, 1000, 20), false, false),
    ]
}

/// Mock driver for testing without hardware.
pub struct MockDriver {
    cameras: Vec<RawCameraInfo>,
    controls: Vec<MockControl>,
    open: Vec<i32>,
    roi: RawRoiFormat,
    start: (i32, i32),
    status: ExposureStatus,
    script: Vec<ExposureStatus>,
    pending: VecDeque<ExposureStatus>,
    exposing: bool,
    last_data_size: Option<usize>,
    dark_frame: Option<PathBuf>,
    guiding: Vec<GuideDirection>,
    mode: CameraMode,
    failures: BTreeMap<&'static str, ErrorCode>,
    calls: BTreeMap<&'static str, usize>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create a mock with one ASI294MC-like camera at index 0.
    #[must_use]
    pub fn new() -> Self {
        let info = asi294mc_info();
        let roi = RawRoiFormat {
            width: i32::try_from(info.max_width).unwrap_or(0),
            height: i32::try_from(info.max_height).unwrap_or(0),
            bin: 1,
            image_type: 0,
        };
        Self {
            cameras: vec![info],
            controls: default_controls(),
            open: Vec::new(),
            roi,
            start: (0, 0),
            status: ExposureStatus::Idle,
            script: vec![ExposureStatus::Working, ExposureStatus::Success],
            pending: VecDeque::new(),
            exposing: false,
            last_data_size: None,
            dark_frame: None,
            guiding: Vec::new(),
            mode: CameraMode::Normal,
            failures: BTreeMap::new(),
            calls: BTreeMap::new(),
        }
    }

    /// Replace the connected cameras.
    #[must_use]
    pub fn with_cameras(mut self, cameras: Vec<RawCameraInfo>) -> Self {
        self.cameras = cameras;
        self
    }

    /// Replace the simulated controllables.
    #[must_use]
    pub fn with_controls(mut self, controls: Vec<MockControl>) -> Self {
        self.controls = controls;
        self
    }

    /// Statuses reported, one per poll, after each exposure start. The last
    /// one repeats until the exposure ends.
    #[must_use]
    pub fn with_exposure_script(mut self, script: &[ExposureStatus]) -> Self {
        self.script = script.to_vec();
        self
    }

    /// Force the current exposure status, e.g. to simulate a busy camera.
    #[must_use]
    pub const fn with_status(mut self, status: ExposureStatus) -> Self {
        self.status = status;
        self
    }

    /// Make every subsequent `call` fail with `code`.
    pub fn fail_on(&mut self, call: &'static str, code: ErrorCode) {
        self.failures.insert(call, code);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    /// Number of times `call` was made.
    #[must_use]
    pub fn call_count(&self, call: &str) -> usize {
        self.calls.get(call).copied().unwrap_or(0)
    }

    /// Number of driver calls made so far.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.values().sum()
    }

    /// Simulated controllables.
    #[must_use]
    pub fn controls(&self) -> &[MockControl] {
        &self.controls
    }

    /// Whether the device `camera_id` is open.
    #[must_use]
    pub fn is_open(&self, camera_id: i32) -> bool {
        self.open.contains(&camera_id)
    }

    /// Size of the buffer passed to the last successful data retrieval.
    #[must_use]
    pub const fn last_data_size(&self) -> Option<usize> {
        self.last_data_size
    }

    /// Current ROI format on the device.
    #[must_use]
    pub const fn roi_state(&self) -> RawRoiFormat {
        self.roi
    }

    /// Dark frame reference in use.
    #[must_use]
    pub fn dark_frame(&self) -> Option<&Path> {
        self.dark_frame.as_deref()
    }

    /// Directions currently pulse guiding.
    #[must_use]
    pub fn guiding(&self) -> &[GuideDirection] {
        &self.guiding
    }

    /// Current camera mode.
    #[must_use]
    pub const fn mode(&self) -> CameraMode {
        self.mode
    }

    fn record(&mut self, call: &'static str) -> DriverResult<()> {
        *self.calls.entry(call).or_insert(0) += 1;
        self.failures.get(call).map_or(Ok(()), |&code| Err(code))
    }

    fn camera(&self, camera_id: i32) -> DriverResult<&RawCameraInfo> {
        self.cameras
            .iter()
            .find(|info| info.camera_id == camera_id)
            .ok_or(ErrorCode::InvalidId)
    }

    fn control_mut(&mut self, control_type: i32) -> DriverResult<&mut MockControl> {
        self.controls
            .iter_mut()
            .find(|control| control.caps.control_type == control_type)
            .ok_or(ErrorCode::InvalidControlType)
    }

    fn frame_size(&self) -> usize {
        let bytes_per_pixel = match self.roi.image_type {
            1 => 3,
            2 => 2,
            _ => 1,
        };
        usize::try_from(self.roi.width).unwrap_or(0)
            * usize::try_from(self.roi.height).unwrap_or(0)
            * bytes_per_pixel
    }
}

impl DeviceDriver for MockDriver {
    fn sdk_version(&self) -> String {
        "1, 31, 0, 0 (mock)".to_owned()
    }

    fn connected_cameras(&mut self) -> u32 {
        *self.calls.entry("connected_cameras").or_insert(0) += 1;
        u32::try_from(self.cameras.len()).unwrap_or(u32::MAX)
    }

    fn camera_property(&mut self, index: u32) -> DriverResult<RawCameraInfo> {
        self.record("camera_property")?;
        usize::try_from(index)
            .ok()
            .and_then(|index| self.cameras.get(index))
            .cloned()
            .ok_or(ErrorCode::InvalidIndex)
    }

    fn open(&mut self, camera_id: i32) -> DriverResult<()> {
        self.record("open")?;
        self.camera(camera_id)?;
        if !self.open.contains(&camera_id) {
            self.open.push(camera_id);
        }
        Ok(())
    }

    fn init(&mut self, camera_id: i32) -> DriverResult<()> {
        self.record("init")?;
        if self.is_open(camera_id) {
            Ok(())
        } else {
            Err(ErrorCode::CameraClosed)
        }
    }

    fn close(&mut self, camera_id: i32) -> DriverResult<()> {
        self.record("close")?;
        self.camera(camera_id)?;
        self.open.retain(|&id| id != camera_id);
        Ok(())
    }

    fn control_count(&mut self, camera_id: i32) -> DriverResult<u32> {
        self.record("control_count")?;
        self.camera(camera_id)?;
        Ok(u32::try_from(self.controls.len()).unwrap_or(u32::MAX))
    }

    fn control_caps(&mut self, camera_id: i32, control_index: u32) -> DriverResult<ControlCaps> {
        self.record("control_caps")?;
        self.camera(camera_id)?;
        usize::try_from(control_index)
            .ok()
            .and_then(|index| self.controls.get(index))
            .map(|control| control.caps.clone())
            .ok_or(ErrorCode::InvalidControlType)
    }

    fn control_value(&mut self, camera_id: i32, control_type: i32) -> DriverResult<(i64, bool)> {
        self.record("control_value")?;
        self.camera(camera_id)?;
        let control = self.control_mut(control_type)?;
        Ok((control.value, control.auto))
    }

    fn set_control_value(
        &mut self,
        camera_id: i32,
        control_type: i32,
        value: i64,
        auto: bool,
    ) -> DriverResult<()> {
        self.record("set_control_value")?;
        self.camera(camera_id)?;
        let control = self.control_mut(control_type)?;
        if !control.caps.writable || (auto && !control.caps.auto_supported) {
            return Err(ErrorCode::InvalidControlType);
        }
        if value < control.caps.min_value || value > control.caps.max_value {
            return Err(ErrorCode::GeneralError);
        }
        control.value = value;
        control.auto = auto;
        Ok(())
    }

    fn roi_format(&mut self, camera_id: i32) -> DriverResult<RawRoiFormat> {
        self.record("roi_format")?;
        self.camera(camera_id)?;
        Ok(self.roi)
    }

    fn set_roi_format(&mut self, camera_id: i32, format: RawRoiFormat) -> DriverResult<()> {
        self.record("set_roi_format")?;
        let info = self.camera(camera_id)?;
        if !info.supported_video_formats.contains(&format.image_type) || format.image_type < 0 {
            return Err(ErrorCode::InvalidImageType);
        }
        let bin_supported = format.bin > 0 && info.supported_bins.contains(&format.bin);
        let fits = format.width > 0
            && format.height > 0
            && i64::from(format.width) * i64::from(format.bin) <= info.max_width
            && i64::from(format.height) * i64::from(format.bin) <= info.max_height;
        if !bin_supported || !fits {
            return Err(ErrorCode::InvalidSize);
        }
        self.roi = format;
        self.start = (0, 0);
        Ok(())
    }

    fn start_position(&mut self, camera_id: i32) -> DriverResult<(i32, i32)> {
        self.record("start_position")?;
        self.camera(camera_id)?;
        Ok(self.start)
    }

    fn set_start_position(&mut self, camera_id: i32, x: i32, y: i32) -> DriverResult<()> {
        self.record("set_start_position")?;
        let info = self.camera(camera_id)?;
        let bin = i64::from(self.roi.bin.max(1));
        let end_x = (i64::from(x) + i64::from(self.roi.width)) * bin;
        let end_y = (i64::from(y) + i64::from(self.roi.height)) * bin;
        if x < 0 || y < 0 || end_x > info.max_width || end_y > info.max_height {
            return Err(ErrorCode::OutOfBoundary);
        }
        self.start = (x, y);
        Ok(())
    }

    fn exposure_status(&mut self, camera_id: i32) -> DriverResult<ExposureStatus> {
        self.record("exposure_status")?;
        self.camera(camera_id)?;
        if self.exposing {
            if let Some(next) = self.pending.pop_front() {
                self.status = next;
            }
        }
        Ok(self.status)
    }

    fn start_exposure(&mut self, camera_id: i32, _dark: bool) -> DriverResult<()> {
        self.record("start_exposure")?;
        self.camera(camera_id)?;
        if self.status != ExposureStatus::Idle {
            return Err(ErrorCode::ExposureInProgress);
        }
        self.pending = self.script.iter().copied().collect();
        self.exposing = true;
        Ok(())
    }

    fn stop_exposure(&mut self, camera_id: i32) -> DriverResult<()> {
        self.record("stop_exposure")?;
        self.camera(camera_id)?;
        self.pending.clear();
        self.exposing = false;
        self.status = ExposureStatus::Idle;
        Ok(())
    }

    fn exposure_data(&mut self, camera_id: i32, buffer: &mut [u8]) -> DriverResult<()> {
        self.record("exposure_data")?;
        self.camera(camera_id)?;
        if self.status != ExposureStatus::Success {
            return Err(ErrorCode::GeneralError);
        }
        if buffer.len() != self.frame_size() {
            return Err(ErrorCode::InvalidSize);
        }
        for (byte, value) in buffer.iter_mut().zip((1..=u8::MAX).cycle()) {
            *byte = value;
        }
        self.last_data_size = Some(buffer.len());
        self.exposing = false;
        self.status = ExposureStatus::Idle;
        Ok(())
    }

    fn enable_dark_subtract(&mut self, camera_id: i32, path: &Path) -> DriverResult<()> {
        self.record("enable_dark_subtract")?;
        self.camera(camera_id)?;
        self.dark_frame = Some(path.to_path_buf());
        Ok(())
    }

    fn disable_dark_subtract(&mut self, camera_id: i32) -> DriverResult<()> {
        self.record("disable_dark_subtract")?;
        self.camera(camera_id)?;
        self.dark_frame = None;
        Ok(())
    }

    fn pulse_guide_on(&mut self, camera_id: i32, direction: GuideDirection) -> DriverResult<()> {
        self.record("pulse_guide_on")?;
        if !self.camera(camera_id)?.st4_port {
            return Err(ErrorCode::GeneralError);
        }
        if !self.guiding.contains(&direction) {
            self.guiding.push(direction);
        }
        Ok(())
    }

    fn pulse_guide_off(&mut self, camera_id: i32, direction: GuideDirection) -> DriverResult<()> {
        self.record("pulse_guide_off")?;
        if !self.camera(camera_id)?.st4_port {
            return Err(ErrorCode::GeneralError);
        }
        self.guiding.retain(|&active| active != direction);
        Ok(())
    }

    fn set_camera_mode(&mut self, camera_id: i32, mode: CameraMode) -> DriverResult<()> {
        self.record("set_camera_mode")?;
        if !self.camera(camera_id)?.is_trigger && mode != CameraMode::Normal {
            return Err(ErrorCode::InvalidMode);
        }
        self.mode = mode;
        Ok(())
    }
}
