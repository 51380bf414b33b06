//! Error types for camera sessions.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::ImageType;
use crate::driver::{ErrorCode, ExposureStatus};

/// Reason an ROI was rejected before reaching the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoiKind {
    /// Width is not a multiple of 8.
    #[error("ROI width%8 should be 0 (not the case for {0})")]
    WidthNotMultipleOf8(u32),
    /// Height is not a multiple of 2.
    #[error("ROI height%2 should be 0 (not the case for {0})")]
    HeightNotMultipleOf2(u32),
    /// Legacy USB2 models need `width * height` to be a multiple of 1024.
    #[error("for camera {model}, ROI width*height%1024 should be 0 (not the case for {width}/{height})")]
    AreaNotMultipleOf1024 {
        /// Camera model name.
        model: String,
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// Bin factor not supported by the camera.
    #[error("unsupported number of bin(s): {0}")]
    UnsupportedBin(u32),
    /// Pixel encoding not supported by the camera.
    #[error("unsupported image type: {0}")]
    UnsupportedEncoding(ImageType),
    /// Region leaves the binned sensor area.
    #[error("ROI {width}x{height} at ({start_x}, {start_y}) exceeds the {limit_width}x{limit_height} binned sensor")]
    OutOfBounds {
        /// Requested start column.
        start_x: u32,
        /// Requested start row.
        start_y: u32,
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Sensor width divided by the bin factor.
        limit_width: u32,
        /// Sensor height divided by the bin factor.
        limit_height: u32,
    },
}

/// Error type for camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// No camera at the index, or its properties could not be read.
    #[error("ASI Camera: (camera index: {index}) failed to read camera infos (error code: {code})")]
    DeviceUnavailable {
        /// Requested camera index.
        index: u32,
        /// Code reported by the driver.
        code: ErrorCode,
    },
    /// The driver rejected a call.
    #[error("ASI Camera: (camera index: {index}) {message} (error code: {code})")]
    DeviceProtocol {
        /// Session camera index.
        index: u32,
        /// Code reported by the driver.
        code: ErrorCode,
        /// What was being attempted.
        message: String,
    },
    /// The host USB configuration prevents using the camera.
    #[error("ASI Camera: (camera index: {index}) {message}")]
    PermissionDenied {
        /// Session camera index.
        index: u32,
        /// Code of the driver failure that prompted the host check.
        code: ErrorCode,
        /// Diagnosis and remediation instructions.
        message: String,
    },
    /// The name was never discovered for this camera.
    #[error("no such controllable: {0}")]
    UnknownControllable(String),
    /// Write attempted on a read-only controllable.
    #[error("failed to change the value of {0}: not writable")]
    NotWritable(String),
    /// Auto mode requested for a controllable that does not support it.
    #[error("failed to change the value of {0}: to auto-mode (not supported)")]
    AutoNotSupported(String),
    /// Requested value outside the controllable's bounds.
    #[error("out of bound value for {name}: {value} is not in the range [{min}; {max}]")]
    OutOfBounds {
        /// Controllable name.
        name: String,
        /// Requested value.
        value: i64,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
    /// ROI rejected before any device write.
    #[error("invalid ROI: {0}")]
    RoiInvalid(#[from] RoiKind),
    /// Capture requested while the camera is not idle.
    #[error("could not take a picture: camera {index} busy ({status})")]
    DeviceBusy {
        /// Session camera index.
        index: u32,
        /// Status observed before starting.
        status: ExposureStatus,
    },
    /// The device reported a failed exposure.
    #[error("failed to get exposure from camera {index}")]
    ExposureFailed {
        /// Session camera index.
        index: u32,
    },
    /// The exposure did not finish within the configured timeout.
    #[error("exposure on camera {index} did not finish within {waited:?}")]
    Timeout {
        /// Session camera index.
        index: u32,
        /// Time spent polling.
        waited: Duration,
    },
    /// The capture was cancelled through its token.
    #[error("exposure on camera {index} cancelled")]
    Cancelled {
        /// Session camera index.
        index: u32,
    },
    /// A live session already owns this camera index.
    #[error("camera {0} is already open")]
    AlreadyOpen(u32),
    /// Dark frame reference file missing.
    #[error("file not found: {}", .0.display())]
    DarkFrameNotFound(PathBuf),
}

impl CameraError {
    /// Driver error code, for failures reported by the device.
    #[must_use]
    pub const fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::DeviceUnavailable { code, .. }
            | Self::DeviceProtocol { code, .. }
            | Self::PermissionDenied { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Camera index of the session the error belongs to, when known.
    #[must_use]
    pub const fn index(&self) -> Option<u32> {
        match self {
            Self::DeviceUnavailable { index, .. }
            | Self::DeviceProtocol { index, .. }
            | Self::PermissionDenied { index, .. }
            | Self::DeviceBusy { index, .. }
            | Self::ExposureFailed { index }
            | Self::Timeout { index, .. }
            | Self::Cancelled { index }
            | Self::AlreadyOpen(index) => Some(*index),
            _ => None,
        }
    }

    pub(crate) fn protocol(index: u32, message: &str) -> impl FnOnce(ErrorCode) -> Self {
        let message = message.to_owned();
        move |code| Self::DeviceProtocol {
            index,
            code,
            message,
        }
    }
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;
