//! Configuration for the backend and the in-memory key-value store.

use crate::error::ValidationError;

/// Configuration for the in-memory key-value store.
#[derive(Debug, Clone)]
pub struct MemoryKvConfig {
    /// Maximum number of keys a scanner returns per batch.
    pub scan_batch_size: usize,
}

impl Default for MemoryKvConfig {
    fn default() -> Self {
        Self {
            scan_batch_size: 256,
        }
    }
}

impl MemoryKvConfig {
    const MIN_SCAN_BATCH_SIZE: usize = 1;

    /// Checks the configuration and returns it unchanged when valid.
    ///
    /// # Errors
    /// `ValidationError::InvalidConfig` if the batch size is zero.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.scan_batch_size < Self::MIN_SCAN_BATCH_SIZE {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "scan_batch_size must be at least {} (got {})",
                    Self::MIN_SCAN_BATCH_SIZE,
                    self.scan_batch_size
                ),
            });
        }
        Ok(self)
    }
}

/// Configuration for [`crate::KvBackend`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Package types skipped by `find_packages_that_need_scanning`.
    pub scan_excluded_package_types: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            scan_excluded_package_types: vec!["guac".to_string()],
        }
    }
}

impl BackendConfig {
    /// Checks the configuration and returns it unchanged when valid.
    ///
    /// # Errors
    /// `ValidationError::InvalidConfig` if an excluded package type is blank.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self
            .scan_excluded_package_types
            .iter()
            .any(|t| t.trim().is_empty())
        {
            return Err(ValidationError::InvalidConfig {
                reason: "scan_excluded_package_types must not contain blank entries".to_string(),
            });
        }
        Ok(self)
    }

    pub(crate) fn is_scan_excluded(&self, pkg_type: &str) -> bool {
        self.scan_excluded_package_types
            .iter()
            .any(|t| t == pkg_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configs_are_valid() {
        assert!(MemoryKvConfig::default().validate().is_ok());
        let cfg = BackendConfig::default().validate().unwrap();
        assert!(cfg.is_scan_excluded("guac"));
        assert!(!cfg.is_scan_excluded("npm"));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = MemoryKvConfig { scan_batch_size: 0 }.validate().unwrap_err();
        assert!(err.to_string().contains("scan_batch_size"));
    }

    #[test]
    fn blank_excluded_type_is_rejected() {
        let cfg = BackendConfig {
            scan_excluded_package_types: vec!["  ".to_string()],
        };
        assert!(cfg.validate().is_err());
    }
}
