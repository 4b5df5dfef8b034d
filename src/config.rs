//! Device configuration

use crate::error::{ChardevError, Result};
use std::path::PathBuf;

/// Device name published under `dev/`
pub const DEFAULT_DEVICE_NAME: &str = "simple_chardev";

/// Class name published under `class/`
pub const DEFAULT_CLASS_NAME: &str = "simple_class";

/// Default buffer capacity in bytes
pub const DEFAULT_CAPACITY: usize = 1024;

/// Smallest usable capacity: one payload byte plus the terminator slot
pub const MIN_CAPACITY: usize = 2;

/// Device configuration
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    /// Name of the published device node
    pub device_name: String,
    /// Name of the device class
    pub class_name: String,
    /// Size of the shared buffer in bytes, terminator slot included
    pub capacity: usize,
    /// Directory the filesystem registrar publishes into
    pub root: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            class_name: DEFAULT_CLASS_NAME.to_string(),
            capacity: DEFAULT_CAPACITY,
            root: std::env::temp_dir().join(DEFAULT_DEVICE_NAME),
        }
    }
}

impl DeviceConfig {
    /// Config with default names and capacity, published under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Check the config before anything is allocated for it
    pub fn validate(&self) -> Result<()> {
        if self.capacity < MIN_CAPACITY {
            return Err(ChardevError::InvalidConfig(format!(
                "capacity must be at least {} bytes, got {}",
                MIN_CAPACITY, self.capacity
            )));
        }
        check_name("device name", &self.device_name)?;
        check_name("class name", &self.class_name)
    }
}

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ChardevError::InvalidConfig(format!("{} is empty", what)));
    }
    if name.contains(['/', '\0']) || name == "." || name == ".." {
        return Err(ChardevError::InvalidConfig(format!(
            "{} '{}' is not a valid path component",
            what,
            name.escape_default()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DeviceConfig::default();
        assert_eq!(config.capacity, 1024);
        assert_eq!(config.device_name, "simple_chardev");
        assert_eq!(config.class_name, "simple_class");
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = DeviceConfig::with_root("/tmp/unused");
        config.capacity = 1;
        assert!(matches!(config.validate(), Err(ChardevError::InvalidConfig(_))));

        let mut config = DeviceConfig::with_root("/tmp/unused");
        config.device_name = "dev/evil".into();
        assert!(config.validate().is_err());

        let mut config = DeviceConfig::with_root("/tmp/unused");
        config.class_name = String::new();
        assert!(config.validate().is_err());

        let mut config = DeviceConfig::with_root("/tmp/unused");
        config.class_name = "..".into();
        assert!(config.validate().is_err());
    }
}
