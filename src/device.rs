//! ASI SDK driver linking against `libASICamera2`.
//!
//! Set `ASI_SDK_LIB_DIR` at build time when the library is not on the default
//! linker search path.
#![allow(unsafe_code)]

use std::ffi::{c_char, c_int, c_long, c_uchar, CStr, CString};
use std::path::Path;

use crate::driver::{
    CameraMode, ControlCaps, DeviceDriver, DriverResult, ErrorCode, ExposureStatus, GuideDirection,
    RawCameraInfo, RawRoiFormat,
};

const ASI_TRUE: c_int = 1;
const ASI_FALSE: c_int = 0;

#[repr(C)]
struct AsiCameraInfo {
    name: [c_char; 64],
    camera_id: c_int,
    max_height: c_long,
    max_width: c_long,
    is_color_cam: c_int,
    bayer_pattern: c_int,
    supported_bins: [c_int; 16],
    supported_video_format: [c_int; 8],
    pixel_size: f64,
    mechanical_shutter: c_int,
    st4_port: c_int,
    is_cooler_cam: c_int,
    is_usb3_host: c_int,
    is_usb3_camera: c_int,
    elec_per_adu: f32,
    bit_depth: c_int,
    is_trigger_cam: c_int,
    _reserved: [c_char; 16],
}

#[repr(C)]
struct AsiControlCaps {
    name: [c_char; 64],
    description: [c_char; 128],
    max_value: c_long,
    min_value: c_long,
    default_value: c_long,
    is_auto_supported: c_int,
    is_writable: c_int,
    control_type: c_int,
    _reserved: [c_char; 32],
}

#[link(name = "ASICamera2")]
extern "C" {
    fn ASIGetNumOfConnectedCameras() -> c_int;
    fn ASIGetCameraProperty(info: *mut AsiCameraInfo, index: c_int) -> c_int;
    fn ASIOpenCamera(id: c_int) -> c_int;
    fn ASIInitCamera(id: c_int) -> c_int;
    fn ASICloseCamera(id: c_int) -> c_int;
    fn ASIGetNumOfControls(id: c_int, count: *mut c_int) -> c_int;
    fn ASIGetControlCaps(id: c_int, index: c_int, caps: *mut AsiControlCaps) -> c_int;
    fn ASIGetControlValue(id: c_int, control: c_int, value: *mut c_long, auto: *mut c_int)
        -> c_int;
    fn ASISetControlValue(id: c_int, control: c_int, value: c_long, auto: c_int) -> c_int;
    fn ASISetROIFormat(id: c_int, width: c_int, height: c_int, bin: c_int, kind: c_int) -> c_int;
    fn ASIGetROIFormat(
        id: c_int,
        width: *mut c_int,
        height: *mut c_int,
        bin: *mut c_int,
        kind: *mut c_int,
    ) -> c_int;
    fn ASISetStartPos(id: c_int, x: c_int, y: c_int) -> c_int;
    fn ASIGetStartPos(id: c_int, x: *mut c_int, y: *mut c_int) -> c_int;
    fn ASIGetExpStatus(id: c_int, status: *mut c_int) -> c_int;
    fn ASIStartExposure(id: c_int, dark: c_int) -> c_int;
    fn ASIStopExposure(id: c_int) -> c_int;
    fn ASIGetDataAfterExp(id: c_int, buffer: *mut c_uchar, size: c_long) -> c_int;
    fn ASIEnableDarkSubtract(id: c_int, path: *mut c_char) -> c_int;
    fn ASIDisableDarkSubtract(id: c_int) -> c_int;
    fn ASIPulseGuideOn(id: c_int, direction: c_int) -> c_int;
    fn ASIPulseGuideOff(id: c_int, direction: c_int) -> c_int;
    fn ASISetCameraMode(id: c_int, mode: c_int) -> c_int;
    fn ASIGetSDKVersion() -> *mut c_char;
}

fn check(code: c_int) -> DriverResult<()> {
    ErrorCode::from_raw(code).map_or(Ok(()), Err)
}

fn text(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c.to_ne_bytes()[0])
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn flag(value: c_int) -> bool {
    value == ASI_TRUE
}

/// Driver backed by the vendor SDK.
#[derive(Debug, Default)]
pub struct AsiDriver;

impl AsiDriver {
    /// Create the driver. The SDK needs no global initialization.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DeviceDriver for AsiDriver {
    fn sdk_version(&self) -> String {
        // SAFETY: the SDK returns a pointer to a static NUL-terminated string.
        unsafe {
            let version = ASIGetSDKVersion();
            if version.is_null() {
                return String::new();
            }
            CStr::from_ptr(version).to_string_lossy().into_owned()
        }
    }

    fn connected_cameras(&mut self) -> u32 {
        // SAFETY: no arguments.
        let count = unsafe { ASIGetNumOfConnectedCameras() };
        u32::try_from(count).unwrap_or(0)
    }

    fn camera_property(&mut self, index: u32) -> DriverResult<RawCameraInfo> {
        let index = c_int::try_from(index).map_err(|_| ErrorCode::InvalidIndex)?;
        // The SDK may not find the camera unless the cameras were counted first.
        self.connected_cameras();
        // SAFETY: AsiCameraInfo is plain data, all-zero is a valid value, and
        // the SDK writes at most size_of::<AsiCameraInfo>() bytes.
        let info = unsafe {
            let mut info: AsiCameraInfo = std::mem::zeroed();
            check(ASIGetCameraProperty(&mut info, index))?;
            info
        };
        Ok(RawCameraInfo {
            name: text(&info.name),
            camera_id: info.camera_id,
            max_height: i64::from(info.max_height),
            max_width: i64::from(info.max_width),
            is_color: flag(info.is_color_cam),
            bayer_pattern: info.bayer_pattern,
            supported_bins: info.supported_bins,
            supported_video_formats: info.supported_video_format,
            pixel_size_um: info.pixel_size,
            mechanical_shutter: flag(info.mechanical_shutter),
            st4_port: flag(info.st4_port),
            is_cooler: flag(info.is_cooler_cam),
            is_usb3_host: flag(info.is_usb3_host),
            is_usb3_camera: flag(info.is_usb3_camera),
            elec_per_adu: info.elec_per_adu,
            bit_depth: info.bit_depth,
            is_trigger: flag(info.is_trigger_cam),
        })
    }

    fn open(&mut self, camera_id: i32) -> DriverResult<()> {
        // SAFETY: plain value arguments.
        check(unsafe { ASIOpenCamera(camera_id) })
    }

    fn init(&mut self, camera_id: i32) -> DriverResult<()> {
        // SAFETY: plain value arguments.
        check(unsafe { ASIInitCamera(camera_id) })
    }

    fn close(&mut self, camera_id: i32) -> DriverResult<()> {
        // SAFETY: plain value arguments.
        check(unsafe { ASICloseCamera(camera_id) })
    }

    fn control_count(&mut self, camera_id: i32) -> DriverResult<u32> {
        let mut count: c_int = 0;
        // SAFETY: `count` outlives the call.
        check(unsafe { ASIGetNumOfControls(camera_id, &mut count) })?;
        Ok(u32::try_from(count).unwrap_or(0))
    }

    fn control_caps(&mut self, camera_id: i32, control_index: u32) -> DriverResult<ControlCaps> {
        let index = c_int::try_from(control_index).map_err(|_| ErrorCode::InvalidControlType)?;
        // SAFETY: AsiControlCaps is plain data, all-zero is a valid value.
        let caps = unsafe {
            let mut caps: AsiControlCaps = std::mem::zeroed();
            check(ASIGetControlCaps(camera_id, index, &mut caps))?;
            caps
        };
        Ok(ControlCaps {
            name: text(&caps.name),
            description: text(&caps.description),
            max_value: i64::from(caps.max_value),
            min_value: i64::from(caps.min_value),
            default_value: i64::from(caps.default_value),
            auto_supported: flag(caps.is_auto_supported),
            writable: flag(caps.is_writable),
            control_type: caps.control_type,
        })
    }

    fn control_value(&mut self, camera_id: i32, control_type: i32) -> DriverResult<(i64, bool)> {
        let mut value: c_long = 0;
        let mut auto: c_int = ASI_FALSE;
        // SAFETY: both out pointers outlive the call.
        check(unsafe { ASIGetControlValue(camera_id, control_type, &mut value, &mut auto) })?;
        Ok((i64::from(value), flag(auto)))
    }

    fn set_control_value(
        &mut self,
        camera_id: i32,
        control_type: i32,
        value: i64,
        auto: bool,
    ) -> DriverResult<()> {
        let value = c_long::try_from(value).map_err(|_| ErrorCode::GeneralError)?;
        let auto = if auto { ASI_TRUE } else { ASI_FALSE };
        // SAFETY: plain value arguments.
        check(unsafe { ASISetControlValue(camera_id, control_type, value, auto) })
    }

    fn roi_format(&mut self, camera_id: i32) -> DriverResult<RawRoiFormat> {
        let (mut width, mut height, mut bin, mut image_type) = (0, 0, 0, 0);
        // SAFETY: all out pointers outlive the call.
        check(unsafe {
            ASIGetROIFormat(camera_id, &mut width, &mut height, &mut bin, &mut image_type)
        })?;
        Ok(RawRoiFormat {
            width,
            height,
            bin,
            image_type,
        })
    }

    fn set_roi_format(&mut self, camera_id: i32, format: RawRoiFormat) -> DriverResult<()> {
        // SAFETY: plain value arguments.
        check(unsafe {
            ASISetROIFormat(
                camera_id,
                format.width,
                format.height,
                format.bin,
                format.image_type,
            )
        })
    }

    fn start_position(&mut self, camera_id: i32) -> DriverResult<(i32, i32)> {
        let (mut x, mut y) = (0, 0);
        // SAFETY: both out pointers outlive the call.
        check(unsafe { ASIGetStartPos(camera_id, &mut x, &mut y) })?;
        Ok((x, y))
    }

    fn set_start_position(&mut self, camera_id: i32, x: i32, y: i32) -> DriverResult<()> {
        // SAFETY: plain value arguments.
        check(unsafe { ASISetStartPos(camera_id, x, y) })
    }

    fn exposure_status(&mut self, camera_id: i32) -> DriverResult<ExposureStatus> {
        let mut status: c_int = 0;
        // SAFETY: `status` outlives the call.
        check(unsafe { ASIGetExpStatus(camera_id, &mut status) })?;
        ExposureStatus::from_raw(status).ok_or(ErrorCode::Unknown(status))
    }

    fn start_exposure(&mut self, camera_id: i32, dark: bool) -> DriverResult<()> {
        let dark = if dark { ASI_TRUE } else { ASI_FALSE };
        // SAFETY: plain value arguments.
        check(unsafe { ASIStartExposure(camera_id, dark) })
    }

    fn stop_exposure(&mut self, camera_id: i32) -> DriverResult<()> {
        // SAFETY: plain value arguments.
        check(unsafe { ASIStopExposure(camera_id) })
    }

    fn exposure_data(&mut self, camera_id: i32, buffer: &mut [u8]) -> DriverResult<()> {
        let size = c_long::try_from(buffer.len()).map_err(|_| ErrorCode::InvalidSize)?;
        // SAFETY: the SDK writes at most `size` bytes, the length of `buffer`.
        check(unsafe { ASIGetDataAfterExp(camera_id, buffer.as_mut_ptr(), size) })
    }

    fn enable_dark_subtract(&mut self, camera_id: i32, path: &Path) -> DriverResult<()> {
        let path = CString::new(path.to_string_lossy().into_owned())
            .map_err(|_| ErrorCode::InvalidPath)?;
        let raw = path.into_raw();
        // SAFETY: `raw` is a valid NUL-terminated string for the duration of
        // the call and is reclaimed right after.
        unsafe {
            let code = ASIEnableDarkSubtract(camera_id, raw);
            drop(CString::from_raw(raw));
            check(code)
        }
    }

    fn disable_dark_subtract(&mut self, camera_id: i32) -> DriverResult<()> {
        // SAFETY: plain value arguments.
        check(unsafe { ASIDisableDarkSubtract(camera_id) })
    }

    fn pulse_guide_on(&mut self, camera_id: i32, direction: GuideDirection) -> DriverResult<()> {
        // SAFETY: plain value arguments.
        check(unsafe { ASIPulseGuideOn(camera_id, direction.native()) })
    }

    fn pulse_guide_off(&mut self, camera_id: i32, direction: GuideDirection) -> DriverResult<()> {
        // SAFETY: plain value arguments.
        check(unsafe { ASIPulseGuideOff(camera_id, direction.native()) })
    }

    fn set_camera_mode(&mut self, camera_id: i32, mode: CameraMode) -> DriverResult<()> {
        // SAFETY: plain value arguments.
        check(unsafe { ASISetCameraMode(camera_id, mode.native()) })
    }
}
