//! Single-exposure state machine.
//!
//! `Idle -> Working -> {Success, Failed}`, driven by polling the device status.
//! Polling is unbounded unless a timeout is configured; a [`CancelToken`]
//! stops it between polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::driver::{DeviceDriver, ExposureStatus};
use crate::error::{CameraError, Result};

/// Default pause between two status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Shared flag asking an in-flight capture to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Observed at the next poll.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Polling policy of an exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between two status polls.
    pub interval: Duration,
    /// Longest time spent waiting for the exposure, `None` for no limit.
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// One exposure against an open device.
pub struct Exposure<'a, D: DeviceDriver> {
    driver: &'a mut D,
    index: u32,
    camera_id: i32,
    policy: PollPolicy,
    cancel: Option<&'a CancelToken>,
}

impl<'a, D: DeviceDriver> Exposure<'a, D> {
    /// Prepare an exposure on the device `camera_id` of session `index`.
    pub fn new(driver: &'a mut D, index: u32, camera_id: i32, policy: PollPolicy) -> Self {
        Self {
            driver,
            index,
            camera_id,
            policy,
            cancel: None,
        }
    }

    /// Stop polling once `token` is cancelled.
    #[must_use]
    pub const fn with_cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Current device status.
    pub fn status(&mut self) -> Result<ExposureStatus> {
        self.driver
            .exposure_status(self.camera_id)
            .map_err(CameraError::protocol(self.index, "failed to read the exposure status"))
    }

    /// Expose one frame and copy it into `buffer`.
    ///
    /// `buffer` must be exactly the frame size of the current ROI; the driver
    /// rejects any other size. On success the device is back to `Idle`.
    pub fn capture(mut self, buffer: &mut [u8], dark: bool) -> Result<()> {
        let status = self.status()?;
        if status != ExposureStatus::Idle {
            return Err(CameraError::DeviceBusy {
                index: self.index,
                status,
            });
        }

        self.driver
            .start_exposure(self.camera_id, dark)
            .map_err(CameraError::protocol(self.index, "failed to start exposure"))?;
        debug!("camera {}: exposure started", self.index);

        let started = Instant::now();
        let terminal = match self.wait_for_terminal(started) {
            Ok(status) => status,
            Err(err) => {
                if matches!(err, CameraError::Timeout { .. } | CameraError::Cancelled { .. }) {
                    self.abort();
                }
                return Err(err);
            }
        };
        debug!(
            "camera {}: exposure {terminal} after {:?}",
            self.index,
            started.elapsed()
        );

        if terminal == ExposureStatus::Failed {
            return Err(CameraError::ExposureFailed { index: self.index });
        }

        self.driver
            .exposure_data(self.camera_id, buffer)
            .map_err(CameraError::protocol(
                self.index,
                "failed to read image after capture",
            ))
    }

    fn wait_for_terminal(&mut self, started: Instant) -> Result<ExposureStatus> {
        // The device may take a moment to leave Idle after the start call.
        self.wait_while(ExposureStatus::Idle, started)?;
        self.wait_while(ExposureStatus::Working, started)
    }

    /// Poll until the status differs from `current`, returning the new status.
    fn wait_while(&mut self, current: ExposureStatus, started: Instant) -> Result<ExposureStatus> {
        loop {
            let status = self.status()?;
            trace!("camera {}: exposure status {status}", self.index);
            if status != current {
                return Ok(status);
            }
            if self.cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(CameraError::Cancelled { index: self.index });
            }
            let waited = started.elapsed();
            if self.policy.timeout.is_some_and(|timeout| waited >= timeout) {
                return Err(CameraError::Timeout {
                    index: self.index,
                    waited,
                });
            }
            thread::sleep(self.policy.interval);
        }
    }

    fn abort(&mut self) {
        if let Err(code) = self.driver.stop_exposure(self.camera_id) {
            warn!("camera {}: failed to stop exposure ({code})", self.index);
        }
    }
}
