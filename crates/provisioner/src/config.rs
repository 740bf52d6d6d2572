//! Provisioner timing configuration
//!
//! Delays are passed to each provisioner at construction rather than kept
//! as process-wide values, so tests and different backends can use their own.

use crate::error::ProvisionerError;
use std::env;
use std::time::Duration;

/// Requeue delays advised by provisioning steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionerConfig {
    /// Delay after a host is registered
    pub registration_backoff: Duration,
    /// Delay between polls while an image is written
    pub provision_poll_delay: Duration,
    /// Delay between polls while a host is torn down
    pub deprovision_poll_delay: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            registration_backoff: Duration::from_secs(5),
            provision_poll_delay: Duration::from_secs(10),
            deprovision_poll_delay: Duration::from_secs(10),
        }
    }
}

impl ProvisionerConfig {
    /// Load from `REGISTRATION_BACKOFF_SECS`, `PROVISION_POLL_DELAY_SECS` and
    /// `DEPROVISION_POLL_DELAY_SECS`, falling back to the defaults.
    pub fn from_env() -> Result<Self, ProvisionerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProvisionerError> {
        let defaults = Self::default();
        let seconds = |key: &str, default: Duration| -> Result<Duration, ProvisionerError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| ProvisionerError::InvalidConfig(format!("{key}={raw:?}: {e}"))),
            }
        };

        Ok(Self {
            registration_backoff: seconds("REGISTRATION_BACKOFF_SECS", defaults.registration_backoff)?,
            provision_poll_delay: seconds("PROVISION_POLL_DELAY_SECS", defaults.provision_poll_delay)?,
            deprovision_poll_delay: seconds("DEPROVISION_POLL_DELAY_SECS", defaults.deprovision_poll_delay)?,
        })
    }

    /// Set the registration backoff
    #[must_use]
    pub fn with_registration_backoff(mut self, delay: Duration) -> Self {
        self.registration_backoff = delay;
        self
    }

    /// Set the provisioning poll delay
    #[must_use]
    pub fn with_provision_poll_delay(mut self, delay: Duration) -> Self {
        self.provision_poll_delay = delay;
        self
    }

    /// Set the deprovisioning poll delay
    #[must_use]
    pub fn with_deprovision_poll_delay(mut self, delay: Duration) -> Self {
        self.deprovision_poll_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProvisionerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ProvisionerConfig::default());
        assert_eq!(config.registration_backoff, Duration::from_secs(5));
        assert_eq!(config.provision_poll_delay, Duration::from_secs(10));
        assert_eq!(config.deprovision_poll_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = ProvisionerConfig::from_lookup(lookup(&[
            ("REGISTRATION_BACKOFF_SECS", "1"),
            ("DEPROVISION_POLL_DELAY_SECS", " 30 "),
        ]))
        .unwrap();
        assert_eq!(config.registration_backoff, Duration::from_secs(1));
        assert_eq!(config.provision_poll_delay, Duration::from_secs(10));
        assert_eq!(config.deprovision_poll_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_value() {
        let result = ProvisionerConfig::from_lookup(lookup(&[("PROVISION_POLL_DELAY_SECS", "soon")]));
        assert!(matches!(result, Err(ProvisionerError::InvalidConfig(_))));
    }

    #[test]
    fn test_builders() {
        let config = ProvisionerConfig::default()
            .with_registration_backoff(Duration::ZERO)
            .with_provision_poll_delay(Duration::from_secs(2))
            .with_deprovision_poll_delay(Duration::from_secs(3));
        assert_eq!(config.registration_backoff, Duration::ZERO);
        assert_eq!(config.provision_poll_delay, Duration::from_secs(2));
        assert_eq!(config.deprovision_poll_delay, Duration::from_secs(3));
    }
}
