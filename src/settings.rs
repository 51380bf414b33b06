//! Per-session configuration.

use std::time::Duration;

use crate::exposure::PollPolicy;
use crate::host::HostPermissions;

/// Settings applied to a camera session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraSettings {
    /// Exposure status polling.
    pub poll: PollPolicy,
    /// Reject ROIs leaving the binned sensor before writing them.
    pub enforce_roi_bounds: bool,
    /// Host USB permission checks run when the driver cannot reach a camera.
    pub host: HostPermissions,
}

impl CameraSettings {
    /// Pause between two exposure status polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll.interval = interval;
        self
    }

    /// Give up on an exposure after `timeout`.
    #[must_use]
    pub const fn with_exposure_timeout(mut self, timeout: Duration) -> Self {
        self.poll.timeout = Some(timeout);
        self
    }

    /// Also check that ROIs fit on the binned sensor.
    #[must_use]
    pub const fn with_roi_bounds_check(mut self, enforce: bool) -> Self {
        self.enforce_roi_bounds = enforce;
        self
    }

    /// Use custom host permission paths.
    #[must_use]
    pub fn with_host_permissions(mut self, host: HostPermissions) -> Self {
        self.host = host;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::DEFAULT_POLL_INTERVAL;

    #[test]
    fn test_defaults_keep_unbounded_polling() {
        let settings = CameraSettings::default();
        assert_eq!(settings.poll.interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(settings.poll.timeout, None);
        assert!(!settings.enforce_roi_bounds);
    }

    #[test]
    fn test_builder() {
        let settings = CameraSettings::default()
            .with_poll_interval(Duration::from_millis(2))
            .with_exposure_timeout(Duration::from_secs(30))
            .with_roi_bounds_check(true);
        assert_eq!(settings.poll.interval, Duration::from_millis(2));
        assert_eq!(settings.poll.timeout, Some(Duration::from_secs(30)));
        assert!(settings.enforce_roi_bounds);
    }
}
