use std::time::Duration;

use super::constants::{
    DEFAULT_MIN_ROWS_ALL, DEFAULT_PROVIDER_TIMEOUT, FRESH_WINDOW, RECHECK_SUPPRESSION_WINDOW,
};
use crate::errors::{Error, Result};

/// Tunables of [`QuoteAcquisitionService`](super::QuoteAcquisitionService).
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    pub fresh_window: Duration,
    pub recheck_suppression_window: Duration,
    /// Combined store rows below which `all` goes live for every market
    pub min_rows_all: usize,
    pub provider_timeout: Duration,
    /// Upsert successful live results into the store
    pub write_through: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            fresh_window: FRESH_WINDOW,
            recheck_suppression_window: RECHECK_SUPPRESSION_WINDOW,
            min_rows_all: DEFAULT_MIN_ROWS_ALL,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            write_through: true,
        }
    }
}

impl AcquisitionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.provider_timeout.is_zero() {
            return Err(Error::InvalidConfigValue(
                "provider timeout must be greater than zero".to_string(),
            ));
        }
        if self.recheck_suppression_window > self.fresh_window {
            return Err(Error::InvalidConfigValue(format!(
                "recheck suppression window ({:?}) exceeds fresh window ({:?})",
                self.recheck_suppression_window, self.fresh_window
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.fresh_window, Duration::from_secs(180));
        assert_eq!(config.min_rows_all, 20);
        assert!(config.write_through);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = AcquisitionConfig {
            provider_timeout: Duration::ZERO,
            ..AcquisitionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfigValue(_))
        ));
    }
}
