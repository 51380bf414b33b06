//! Device driver abstraction over the ASI camera SDK.
//!
//! Every call mirrors one SDK entry point and either succeeds or returns the
//! SDK's numeric error code, translated into [`ErrorCode`].

use std::fmt;
use std::path::Path;

/// Error code reported by the camera SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No camera connected at the index, or the index is out of range.
    InvalidIndex,
    /// Invalid camera id.
    InvalidId,
    /// Invalid control type.
    InvalidControlType,
    /// Camera was not opened.
    CameraClosed,
    /// Camera was removed while in use.
    CameraRemoved,
    /// Cannot find the path of the file.
    InvalidPath,
    /// Unsupported file format.
    InvalidFileFormat,
    /// Wrong video format size.
    InvalidSize,
    /// Unsupported image format.
    InvalidImageType,
    /// Start position is out of boundary.
    OutOfBoundary,
    /// The SDK timed out.
    Timeout,
    /// Stop capture first.
    InvalidSequence,
    /// Buffer size is not big enough.
    BufferTooSmall,
    /// Video mode is active.
    VideoModeActive,
    /// Exposure is in progress.
    ExposureInProgress,
    /// General error, e.g. a value out of its valid range.
    GeneralError,
    /// The current mode is wrong.
    InvalidMode,
    /// A code this crate does not know about.
    Unknown(i32),
}

impl ErrorCode {
    /// Translate a raw SDK error code. Returns `None` for `ASI_SUCCESS`.
    #[must_use]
    pub const fn from_raw(code: i32) -> Option<Self> {
        let code = match code {
            0 => return None,
            1 => Self::InvalidIndex,
            2 => Self::InvalidId,
            3 => Self::InvalidControlType,
            4 => Self::CameraClosed,
            5 => Self::CameraRemoved,
            6 => Self::InvalidPath,
            7 => Self::InvalidFileFormat,
            8 => Self::InvalidSize,
            9 => Self::InvalidImageType,
            10 => Self::OutOfBoundary,
            11 => Self::Timeout,
            12 => Self::InvalidSequence,
            13 => Self::BufferTooSmall,
            14 => Self::VideoModeActive,
            15 => Self::ExposureInProgress,
            16 => Self::GeneralError,
            17 => Self::InvalidMode,
            other => Self::Unknown(other),
        };
        Some(code)
    }

    /// The raw SDK value of this code.
    #[must_use]
    pub const fn raw(self) -> i32 {
        match self {
            Self::InvalidIndex => 1,
            Self::InvalidId => 2,
            Self::InvalidControlType => 3,
            Self::CameraClosed => 4,
            Self::CameraRemoved => 5,
            Self::InvalidPath => 6,
            Self::InvalidFileFormat => 7,
            Self::InvalidSize => 8,
            Self::InvalidImageType => 9,
            Self::OutOfBoundary => 10,
            Self::Timeout => 11,
            Self::InvalidSequence => 12,
            Self::BufferTooSmall => 13,
            Self::VideoModeActive => 14,
            Self::ExposureInProgress => 15,
            Self::GeneralError => 16,
            Self::InvalidMode => 17,
            Self::Unknown(code) => code,
        }
    }

    const fn sdk_name(self) -> &'static str {
        match self {
            Self::InvalidIndex => "ASI_ERROR_INVALID_INDEX",
            Self::InvalidId => "ASI_ERROR_INVALID_ID",
            Self::InvalidControlType => "ASI_ERROR_INVALID_CONTROL_TYPE",
            Self::CameraClosed => "ASI_ERROR_CAMERA_CLOSED",
            Self::CameraRemoved => "ASI_ERROR_CAMERA_REMOVED",
            Self::InvalidPath => "ASI_ERROR_INVALID_PATH",
            Self::InvalidFileFormat => "ASI_ERROR_INVALID_FILEFORMAT",
            Self::InvalidSize => "ASI_ERROR_INVALID_SIZE",
            Self::InvalidImageType => "ASI_ERROR_INVALID_IMGTYPE",
            Self::OutOfBoundary => "ASI_ERROR_OUTOF_BOUNDARY",
            Self::Timeout => "ASI_ERROR_TIMEOUT",
            Self::InvalidSequence => "ASI_ERROR_INVALID_SEQUENCE",
            Self::BufferTooSmall => "ASI_ERROR_BUFFER_TOO_SMALL",
            Self::VideoModeActive => "ASI_ERROR_VIDEO_MODE_ACTIVE",
            Self::ExposureInProgress => "ASI_ERROR_EXPOSURE_IN_PROGRESS",
            Self::GeneralError => "ASI_ERROR_GENERAL_ERROR",
            Self::InvalidMode => "ASI_ERROR_INVALID_MODE",
            Self::Unknown(_) => "ASI_ERROR_UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.raw(), self.sdk_name())
    }
}

/// Result of a single driver call.
pub type DriverResult<T> = std::result::Result<T, ErrorCode>;

/// Static device properties, in the SDK's native encodings.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCameraInfo {
    /// Model name, e.g. "ZWO ASI294MC Pro".
    pub name: String,
    /// Id used by every call after discovery.
    pub camera_id: i32,
    /// Sensor height in pixels.
    pub max_height: i64,
    /// Sensor width in pixels.
    pub max_width: i64,
    /// Colour sensor.
    pub is_color: bool,
    /// Native bayer value (0 = RG, 1 = BG, 2 = GR, 3 = GB).
    pub bayer_pattern: i32,
    /// Supported bins, terminated by 0.
    pub supported_bins: [i32; 16],
    /// Supported image types, terminated by -1.
    pub supported_video_formats: [i32; 8],
    /// Pixel size in micrometers.
    pub pixel_size_um: f64,
    /// Mechanical shutter fitted.
    pub mechanical_shutter: bool,
    /// ST4 guide port fitted.
    pub st4_port: bool,
    /// Cooled camera.
    pub is_cooler: bool,
    /// Connected to a USB3 host.
    pub is_usb3_host: bool,
    /// USB3 camera.
    pub is_usb3_camera: bool,
    /// Electrons per ADU.
    pub elec_per_adu: f32,
    /// ADC bit depth.
    pub bit_depth: i32,
    /// Supports trigger modes.
    pub is_trigger: bool,
}

/// Capability descriptor of one controllable parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCaps {
    /// Name reported by the device, unique within a session.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Largest accepted value.
    pub max_value: i64,
    /// Smallest accepted value.
    pub min_value: i64,
    /// Value after power-on.
    pub default_value: i64,
    /// Whether the device can adjust the parameter itself.
    pub auto_supported: bool,
    /// Whether the parameter can be written.
    pub writable: bool,
    /// Native control type, the key used for value reads and writes.
    pub control_type: i32,
}

/// ROI format as exchanged with the SDK (start position is separate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRoiFormat {
    /// Width in (binned) pixels.
    pub width: i32,
    /// Height in (binned) pixels.
    pub height: i32,
    /// Bin factor.
    pub bin: i32,
    /// Native image type.
    pub image_type: i32,
}

/// Exposure status as reported by the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExposureStatus {
    /// Ready to start an exposure.
    Idle,
    /// Exposure in progress.
    Working,
    /// Exposure finished, data waiting to be read.
    Success,
    /// Exposure failed; the camera has to start a new one.
    Failed,
}

impl ExposureStatus {
    /// Translate the native status value.
    #[must_use]
    pub const fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Working),
            2 => Some(Self::Success),
            3 => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ExposureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Camera (trigger) mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraMode {
    /// Free running.
    Normal,
    /// Software edge trigger.
    SoftEdge,
    /// Rising edge trigger.
    RiseEdge,
    /// Falling edge trigger.
    FallEdge,
    /// Software level trigger.
    SoftLevel,
    /// High level trigger.
    HighLevel,
    /// Low level trigger.
    LowLevel,
}

impl CameraMode {
    /// Native SDK value.
    #[must_use]
    pub const fn native(self) -> i32 {
        match self {
            Self::Normal => 0,
            Self::SoftEdge => 1,
            Self::RiseEdge => 2,
            Self::FallEdge => 3,
            Self::SoftLevel => 4,
            Self::HighLevel => 5,
            Self::LowLevel => 6,
        }
    }
}

/// Pulse guide direction on the ST4 port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuideDirection {
    /// North.
    North,
    /// South.
    South,
    /// East.
    East,
    /// West.
    West,
}

impl GuideDirection {
    /// Native SDK value.
    #[must_use]
    pub const fn native(self) -> i32 {
        match self {
            Self::North => 0,
            Self::South => 1,
            Self::East => 2,
            Self::West => 3,
        }
    }
}

/// Synchronous interface to the camera SDK.
///
/// Device ids are the `camera_id` values returned in [`RawCameraInfo`].
pub trait DeviceDriver {
    /// SDK version string.
    fn sdk_version(&self) -> String;

    /// Number of connected cameras.
    fn connected_cameras(&mut self) -> u32;

    /// Static properties of the camera at `index`.
    fn camera_property(&mut self, index: u32) -> DriverResult<RawCameraInfo>;

    /// Open the device.
    fn open(&mut self, camera_id: i32) -> DriverResult<()>;

    /// Initialize an opened device.
    fn init(&mut self, camera_id: i32) -> DriverResult<()>;

    /// Close the device.
    fn close(&mut self, camera_id: i32) -> DriverResult<()>;

    /// Number of controllable parameters.
    fn control_count(&mut self, camera_id: i32) -> DriverResult<u32>;

    /// Descriptor of the `control_index`-th controllable.
    fn control_caps(&mut self, camera_id: i32, control_index: u32) -> DriverResult<ControlCaps>;

    /// Current value and auto flag of a controllable.
    fn control_value(&mut self, camera_id: i32, control_type: i32) -> DriverResult<(i64, bool)>;

    /// Write a controllable value together with its auto flag.
    fn set_control_value(
        &mut self,
        camera_id: i32,
        control_type: i32,
        value: i64,
        auto: bool,
    ) -> DriverResult<()>;

    /// Current ROI format.
    fn roi_format(&mut self, camera_id: i32) -> DriverResult<RawRoiFormat>;

    /// Set the ROI format.
    fn set_roi_format(&mut self, camera_id: i32, format: RawRoiFormat) -> DriverResult<()>;

    /// Current ROI start position.
    fn start_position(&mut self, camera_id: i32) -> DriverResult<(i32, i32)>;

    /// Set the ROI start position.
    fn set_start_position(&mut self, camera_id: i32, x: i32, y: i32) -> DriverResult<()>;

    /// Current exposure status.
    fn exposure_status(&mut self, camera_id: i32) -> DriverResult<ExposureStatus>;

    /// Start an exposure, optionally as a dark frame.
    fn start_exposure(&mut self, camera_id: i32, dark: bool) -> DriverResult<()>;

    /// Abort the exposure in progress.
    fn stop_exposure(&mut self, camera_id: i32) -> DriverResult<()>;

    /// Copy the finished exposure into `buffer`. The driver rejects buffers
    /// whose length does not match the current ROI.
    fn exposure_data(&mut self, camera_id: i32, buffer: &mut [u8]) -> DriverResult<()>;

    /// Enable dark subtraction using the bitmap at `path`.
    fn enable_dark_subtract(&mut self, camera_id: i32, path: &Path) -> DriverResult<()>;

    /// Disable dark subtraction.
    fn disable_dark_subtract(&mut self, camera_id: i32) -> DriverResult<()>;

    /// Start pulse guiding.
    fn pulse_guide_on(&mut self, camera_id: i32, direction: GuideDirection) -> DriverResult<()>;

    /// Stop pulse guiding.
    fn pulse_guide_off(&mut self, camera_id: i32, direction: GuideDirection) -> DriverResult<()>;

    /// Switch the camera (trigger) mode.
    fn set_camera_mode(&mut self, camera_id: i32, mode: CameraMode) -> DriverResult<()>;
}
