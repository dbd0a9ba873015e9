//! Engine configuration.

use std::time::Duration;

/// Tunables for one wizard instance.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Quiet window before a uniqueness check is actually issued; edits
    /// inside the window coalesce into one remote call.
    pub debounce: Duration,
    /// Bounded wait for a uniqueness check; past it the field resolves to
    /// "could not verify" rather than hanging in pending.
    pub verify_timeout: Duration,
    /// Lifetime of transient alerts (success notices, transport errors).
    pub alert_duration: Duration,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            verify_timeout: Duration::from_secs(5),
            alert_duration: Duration::from_secs(4),
        }
    }
}

impl WizardConfig {
    /// Set the uniqueness-check debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the bounded verification wait.
    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    /// Set the transient alert lifetime.
    pub fn with_alert_duration(mut self, duration: Duration) -> Self {
        self.alert_duration = duration;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_setters() {
        let config = WizardConfig::default()
            .with_debounce(Duration::from_millis(50))
            .with_verify_timeout(Duration::from_secs(2))
            .with_alert_duration(Duration::from_secs(1));
        assert_eq!(config.debounce, Duration::from_millis(50));
        assert_eq!(config.verify_timeout, Duration::from_secs(2));
        assert_eq!(config.alert_duration, Duration::from_secs(1));
    }
}
