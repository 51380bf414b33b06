//! Host USB permission checks.
//!
//! ASI cameras need the kernel's usbfs buffer raised to 200 MB and device
//! access for non-root users. When the driver fails to reach a camera and the
//! buffer is misconfigured, a udev rules file fixing both is written and the
//! error explains how to install it.

use std::fmt::Write;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::driver::ErrorCode;
use crate::error::CameraError;

/// Kernel parameter holding the usbfs buffer size in MB.
pub const USBFS_MEMORY_MB_PATH: &str = "/sys/module/usbcore/parameters/usbfs_memory_mb";

/// usbfs buffer size the cameras need.
pub const REQUIRED_USBFS_MEMORY_MB: u32 = 200;

/// Name of the generated udev rules file.
pub const RULES_FILE_NAME: &str = "99-asi.rules";

const RULES: &str = "ACTION==\"add\", ATTR{idVendor}==\"03c3\", \
RUN+=\"/bin/sh -c '/bin/echo 200 >/sys/module/usbcore/parameters/usbfs_memory_mb'\"\n\
# All ASI Cameras and filter wheels\n\
SUBSYSTEMS==\"usb\", ATTR{idVendor}==\"03c3\", MODE=\"0666\"\n";

const MANUAL_URL: &str = "https://astronomy-imaging-camera.com/manuals/\
ASI%20Cameras%20software%20Manual%20Linux%20OSX%20EN.pdf";

/// Where to look for the usbfs setting and where to write the rules file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPermissions {
    /// File holding the usbfs buffer size.
    pub usbfs_memory_path: PathBuf,
    /// Directory receiving the generated rules file.
    pub rules_dir: PathBuf,
}

impl Default for HostPermissions {
    fn default() -> Self {
        Self {
            usbfs_memory_path: PathBuf::from(USBFS_MEMORY_MB_PATH),
            rules_dir: PathBuf::from("."),
        }
    }
}

impl HostPermissions {
    /// Current usbfs buffer size, `None` if it cannot be read.
    #[must_use]
    pub fn usbfs_memory_mb(&self) -> Option<u32> {
        let content = fs::read_to_string(&self.usbfs_memory_path).ok()?;
        content.trim().parse().ok()
    }

    /// Whether the usbfs buffer is readable and not the required size.
    #[must_use]
    pub fn usb_buffer_misconfigured(&self) -> bool {
        self.usbfs_memory_mb()
            .is_some_and(|mb| mb != REQUIRED_USBFS_MEMORY_MB)
    }

    /// Write the udev rules file, returning its path.
    pub fn write_rules_file(&self) -> io::Result<PathBuf> {
        let path = self.rules_dir.join(RULES_FILE_NAME);
        fs::write(&path, RULES)?;
        Ok(path)
    }

    /// Turn a driver failure into `PermissionDenied` when the host is the
    /// likely cause, writing the rules file as a side effect.
    ///
    /// Returns `None` when the host configuration looks fine.
    #[must_use]
    pub fn diagnose(&self, index: u32, code: ErrorCode) -> Option<CameraError> {
        if !self.usb_buffer_misconfigured() {
            return None;
        }
        let current = self.usbfs_memory_mb()?;
        debug!(
            "usbfs buffer is {current} MB, cameras need {REQUIRED_USBFS_MEMORY_MB} MB"
        );

        let mut message = format!(
            "{} holds {current} instead of the expected value of \
             '{REQUIRED_USBFS_MEMORY_MB}', which may indicate incorrect udev rules \
             for the ASI camera.\n",
            self.usbfs_memory_path.display()
        );
        match self.write_rules_file() {
            Ok(path) => message.push_str(&remediation(&path)),
            Err(err) => {
                warn!("failed to create {RULES_FILE_NAME}: {err}");
                let _ = write!(
                    message,
                    "There has been a failed attempt to create '{}' ({err}).\n\
                     See 'install udev rule' in:\n{MANUAL_URL}",
                    self.rules_dir.join(RULES_FILE_NAME).display()
                );
            }
        }

        Some(CameraError::PermissionDenied {
            index,
            code,
            message,
        })
    }
}

fn remediation(path: &Path) -> String {
    format!(
        "A file '{}' has been created, please run in a terminal:\n  \
         sudo install {} /lib/udev/rules.d\n\
         and reconnect the camera\n",
        path.display(),
        path.display()
    )
}
