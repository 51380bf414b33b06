//! Capture region of interest and its validation against a camera.
//!
//! Validity depends on the camera, so [`Roi`] carries no catalog reference;
//! [`validate`] takes both.

use crate::catalog::{CapabilityCatalog, ImageType};
use crate::error::RoiKind;

/// Rectangular sensor region, bin factor and pixel encoding of a capture.
///
/// Width and height are expressed in binned pixels. The default is an empty
/// region at bin 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    /// First column.
    pub start_x: u32,
    /// First row.
    pub start_y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bin factor.
    pub bin: u32,
    /// Pixel encoding.
    pub image_type: ImageType,
}

impl Default for Roi {
    fn default() -> Self {
        Self {
            start_x: 0,
            start_y: 0,
            width: 0,
            height: 0,
            bin: 1,
            image_type: ImageType::default(),
        }
    }
}

impl Roi {
    /// Full-sensor region at bin 1.
    #[must_use]
    pub const fn full_frame(catalog: &CapabilityCatalog, image_type: ImageType) -> Self {
        Self {
            start_x: 0,
            start_y: 0,
            width: catalog.max_width,
            height: catalog.max_height,
            bin: 1,
            image_type,
        }
    }

    /// Bytes needed to hold one frame of this region.
    #[must_use]
    pub const fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * self.image_type.bytes_per_pixel()
    }

    /// Check that the region stays within the binned sensor.
    pub fn check_bounds(&self, catalog: &CapabilityCatalog) -> Result<(), RoiKind> {
        let bin = self.bin.max(1);
        let limit_width = catalog.max_width / bin;
        let limit_height = catalog.max_height / bin;
        let end_x = u64::from(self.start_x) + u64::from(self.width);
        let end_y = u64::from(self.start_y) + u64::from(self.height);
        if end_x > u64::from(limit_width) || end_y > u64::from(limit_height) {
            return Err(RoiKind::OutOfBounds {
                start_x: self.start_x,
                start_y: self.start_y,
                width: self.width,
                height: self.height,
                limit_width,
                limit_height,
            });
        }
        Ok(())
    }
}

/// Check `roi` against the constraints of `catalog`.
///
/// Checks run in a fixed order and the first violation is returned. Whether
/// the region fits on the sensor is not checked here, see
/// [`Roi::check_bounds`].
pub fn validate(roi: &Roi, catalog: &CapabilityCatalog) -> Result<(), RoiKind> {
    if roi.width % 8 != 0 {
        return Err(RoiKind::WidthNotMultipleOf8(roi.width));
    }
    if roi.height % 2 != 0 {
        return Err(RoiKind::HeightNotMultipleOf2(roi.height));
    }
    if catalog.has_area_constraint() && (u64::from(roi.width) * u64::from(roi.height)) % 1024 != 0
    {
        return Err(RoiKind::AreaNotMultipleOf1024 {
            model: catalog.name.clone(),
            width: roi.width,
            height: roi.height,
        });
    }
    if !catalog.supported_bins.contains(&roi.bin) {
        return Err(RoiKind::UnsupportedBin(roi.bin));
    }
    if !catalog.supported_image_types.contains(&roi.image_type) {
        return Err(RoiKind::UnsupportedEncoding(roi.image_type));
    }
    Ok(())
}
