//! Immutable capabilities of one physical camera.

use std::collections::BTreeSet;
use std::fmt;

use log::debug;

use crate::driver::{DeviceDriver, RawCameraInfo};
use crate::error::{CameraError, Result};

/// Colour filter arrangement of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BayerPattern {
    /// Monochrome sensor.
    #[default]
    None,
    /// RGGB.
    RG,
    /// BGGR.
    BG,
    /// GRBG.
    GR,
    /// GBRG.
    GB,
}

impl BayerPattern {
    fn from_native(value: i32) -> Self {
        match value {
            0 => Self::RG,
            1 => Self::BG,
            2 => Self::GR,
            3 => Self::GB,
            _ => Self::None,
        }
    }
}

impl fmt::Display for BayerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::RG => "RG",
            Self::BG => "BG",
            Self::GR => "GR",
            Self::GB => "GB",
        };
        f.write_str(name)
    }
}

/// Pixel encoding of captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ImageType {
    /// 8-bit raw sensor data.
    Raw8,
    /// 24-bit RGB.
    Rgb24,
    /// 16-bit raw sensor data.
    Raw16,
    /// 8-bit luminance.
    #[default]
    Y8,
}

impl ImageType {
    /// Native value terminating the SDK's image type array.
    pub const NATIVE_END: i32 = -1;

    /// Translate the SDK image type. Unknown values yield `None`.
    #[must_use]
    pub const fn from_native(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Raw8),
            1 => Some(Self::Rgb24),
            2 => Some(Self::Raw16),
            3 => Some(Self::Y8),
            _ => None,
        }
    }

    /// Native SDK value.
    #[must_use]
    pub const fn native(self) -> i32 {
        match self {
            Self::Raw8 => 0,
            Self::Rgb24 => 1,
            Self::Raw16 => 2,
            Self::Y8 => 3,
        }
    }

    /// Bytes used by one pixel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Raw8 | Self::Y8 => 1,
            Self::Raw16 => 2,
            Self::Rgb24 => 3,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Raw8 => "raw8",
            Self::Rgb24 => "rgb24",
            Self::Raw16 => "raw16",
            Self::Y8 => "y8",
        };
        f.write_str(name)
    }
}

/// Static description of a camera, read once when a session opens.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityCatalog {
    /// Model name.
    pub name: String,
    /// SDK camera id.
    pub camera_id: i32,
    /// Sensor width in pixels.
    pub max_width: u32,
    /// Sensor height in pixels.
    pub max_height: u32,
    /// Colour sensor.
    pub is_color: bool,
    /// Bayer arrangement, `None` for monochrome sensors.
    pub bayer: BayerPattern,
    /// Supported bin factors.
    pub supported_bins: BTreeSet<u32>,
    /// Supported pixel encodings.
    pub supported_image_types: BTreeSet<ImageType>,
    /// Pixel size in micrometers.
    pub pixel_size_um: f64,
    /// Mechanical shutter fitted.
    pub mechanical_shutter: bool,
    /// ST4 guide port fitted.
    pub st4_port: bool,
    /// Cooled camera.
    pub has_cooler: bool,
    /// Connected to a USB3 host.
    pub is_usb3_host: bool,
    /// USB3 camera.
    pub is_usb3: bool,
    /// Electrons per ADU.
    pub elec_per_adu: f32,
    /// ADC bit depth.
    pub bit_depth: u32,
    /// Supports trigger modes.
    pub is_trigger: bool,
}

impl CapabilityCatalog {
    /// Fetch the properties of the camera at `index`.
    ///
    /// A single driver call; failure means the device cannot be used at all.
    pub fn discover<D: DeviceDriver>(driver: &mut D, index: u32) -> Result<Self> {
        let raw = driver
            .camera_property(index)
            .map_err(|code| CameraError::DeviceUnavailable { index, code })?;
        let catalog = Self::from(raw);
        debug!(
            "camera {index}: {} (id {}), {}x{}",
            catalog.name, catalog.camera_id, catalog.max_width, catalog.max_height
        );
        Ok(catalog)
    }

    /// Whether this is a legacy USB2 model with the 1024-pixel area constraint.
    #[must_use]
    pub fn has_area_constraint(&self) -> bool {
        let model = self.name.strip_prefix("ZWO ").unwrap_or(&self.name);
        model.starts_with("ASI120") && !self.is_usb3
    }

    /// Human readable summary of the capabilities.
    #[must_use]
    pub fn describe(&self) -> String {
        let flag = |value: bool| if value { "*" } else { "-" };
        let bins = self
            .supported_bins
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        let types = self
            .supported_image_types
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "{} (id: {})\n\
             max height: ({}) | max width: ({}) |\n\
             colored: {} | mechanical shutter: {} | st4 port: {} |\n\
             has cooler: {} | is usb3 host: {} | is usb3: {} |\n\
             is triggered camera: {} | bayer pattern: {}\n\
             supported bins: {bins}\n\
             supported image types: {types}\n\
             pixel size (um): {} | elec per ADU: {} | bit depth: {}\n",
            self.name,
            self.camera_id,
            self.max_height,
            self.max_width,
            flag(self.is_color),
            flag(self.mechanical_shutter),
            flag(self.st4_port),
            flag(self.has_cooler),
            flag(self.is_usb3_host),
            flag(self.is_usb3),
            flag(self.is_trigger),
            self.bayer,
            self.pixel_size_um,
            self.elec_per_adu,
            self.bit_depth,
        )
    }
}

impl From<RawCameraInfo> for CapabilityCatalog {
    fn from(raw: RawCameraInfo) -> Self {
        let supported_bins = raw
            .supported_bins
            .iter()
            .take_while(|&&bin| bin != 0)
            .filter_map(|&bin| u32::try_from(bin).ok())
            .collect();
        let supported_image_types = raw
            .supported_video_formats
            .iter()
            .take_while(|&&native| native != ImageType::NATIVE_END)
            .filter_map(|&native| ImageType::from_native(native))
            .collect();
        let bayer = if raw.is_color {
            BayerPattern::from_native(raw.bayer_pattern)
        } else {
            BayerPattern::None
        };

        Self {
            name: raw.name,
            camera_id: raw.camera_id,
            max_width: u32::try_from(raw.max_width).unwrap_or(0),
            max_height: u32::try_from(raw.max_height).unwrap_or(0),
            is_color: raw.is_color,
            bayer,
            supported_bins,
            supported_image_types,
            pixel_size_um: raw.pixel_size_um,
            mechanical_shutter: raw.mechanical_shutter,
            st4_port: raw.st4_port,
            has_cooler: raw.is_cooler,
            is_usb3_host: raw.is_usb3_host,
            is_usb3: raw.is_usb3_camera,
            elec_per_adu: raw.elec_per_adu,
            bit_depth: u32::try_from(raw.bit_depth).unwrap_or(0),
            is_trigger: raw.is_trigger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ErrorCode;
    use crate::mock::{asi294mc_info, MockDriver};

    #[test]
    fn test_bins_stop_at_terminator() {
        let mut raw = asi294mc_info();
        raw.supported_bins = [0; 16];
        raw.supported_bins[0] = 1;
        raw.supported_bins[1] = 2;
        raw.supported_bins[3] = 4; // after the terminator, ignored
        let catalog = CapabilityCatalog::from(raw);
        assert_eq!(catalog.supported_bins, BTreeSet::from([1, 2]));
    }

    #[test]
    fn test_image_types_stop_at_terminator() {
        let mut raw = asi294mc_info();
        raw.supported_video_formats = [0, 2, -1, 1, 3, -1, -1, -1];
        let catalog = CapabilityCatalog::from(raw);
        assert_eq!(
            catalog.supported_image_types,
            BTreeSet::from([ImageType::Raw8, ImageType::Raw16])
        );
    }

    #[test]
    fn test_monochrome_has_no_bayer() {
        let mut raw = asi294mc_info();
        raw.is_color = false;
        raw.bayer_pattern = 1;
        assert_eq!(CapabilityCatalog::from(raw).bayer, BayerPattern::None);

        let mut raw = asi294mc_info();
        raw.bayer_pattern = 1;
        assert_eq!(CapabilityCatalog::from(raw).bayer, BayerPattern::BG);
    }

    #[test]
    fn test_discover_single_round_trip() {
        let mut driver = MockDriver::new();
        let catalog = CapabilityCatalog::discover(&mut driver, 0).expect("discover failed");
        assert_eq!(catalog.max_width, 4144);
        assert_eq!(catalog.max_height, 2822);
        assert_eq!(driver.call_count("camera_property"), 1);
        assert_eq!(driver.total_calls(), 1);
    }

    #[test]
    fn test_discover_missing_device() {
        let mut driver = MockDriver::new();
        let err = CapabilityCatalog::discover(&mut driver, 3).expect_err("index 3 is absent");
        assert!(matches!(
            err,
            CameraError::DeviceUnavailable {
                index: 3,
                code: ErrorCode::InvalidIndex
            }
        ));
    }

    #[test]
    fn test_area_constraint_only_for_usb2_asi120() {
        let mut raw = asi294mc_info();
        raw.name = "ZWO ASI120MM".to_owned();
        raw.is_usb3_camera = false;
        assert!(CapabilityCatalog::from(raw.clone()).has_area_constraint());

        raw.is_usb3_camera = true;
        assert!(!CapabilityCatalog::from(raw).has_area_constraint());

        assert!(!CapabilityCatalog::from(asi294mc_info()).has_area_constraint());
    }

    #[test]
    fn test_describe_lists_bins_and_types() {
        let catalog = CapabilityCatalog::from(asi294mc_info());
        let text = catalog.describe();
        assert!(text.contains("supported bins: 1 2 3 4"));
        assert!(text.contains("supported image types: raw8 rgb24 raw16 y8"));
    }
}
