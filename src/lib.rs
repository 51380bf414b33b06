//! asi-cam-control: control layer for ZWO ASI scientific cameras.
//!
//! The library wraps the vendor driver behind the [`DeviceDriver`] trait so
//! that sessions can run against the real SDK (feature `asi-sdk`) or the
//! scripted `mock::MockDriver` in tests (feature `mock`).
//!
//! ```no_run
//! # fn demo<D: asi_cam_control::DeviceDriver>(driver: D) -> asi_cam_control::Result<()> {
//! use asi_cam_control::{Camera, ImageType, Roi};
//!
//! let mut camera = Camera::open(driver, 0)?;
//! let roi = Roi::full_frame(camera.info(), ImageType::Raw16);
//! camera.set_roi(&roi)?;
//! let mut frame = vec![0_u8; roi.frame_size()];
//! camera.capture(&mut frame)?;
//! camera.close();
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod catalog;
pub mod controllable;
pub mod driver;
pub mod error;
pub mod exposure;
pub mod host;
pub mod report;
pub mod roi;
pub mod settings;

#[cfg(feature = "asi-sdk")]
pub mod device;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use camera::{connected_cameras, Camera};
pub use catalog::{BayerPattern, CapabilityCatalog, ImageType};
pub use controllable::{Controllable, ControllableRegistry};
#[cfg(feature = "asi-sdk")]
pub use device::AsiDriver;
pub use driver::{CameraMode, DeviceDriver, ErrorCode, ExposureStatus, GuideDirection};
pub use error::{CameraError, Result, RoiKind};
pub use exposure::{CancelToken, PollPolicy};
pub use host::HostPermissions;
pub use roi::{validate, Roi};
pub use settings::CameraSettings;
