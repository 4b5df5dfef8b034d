//! Error types for simple_chardev

use rustix::io::Errno;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for device operations
pub type Result<T> = std::result::Result<T, ChardevError>;

/// Startup step that failed while registering the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    /// Allocating the major number
    Major,
    /// Creating the device class
    Class,
    /// Creating the device node
    Node,
}

impl fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegistrationStage::Major => "register a major number",
            RegistrationStage::Class => "register a class",
            RegistrationStage::Node => "create the device",
        })
    }
}

/// Direction of a caller memory copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Caller memory into the device buffer (write)
    FromCaller,
    /// Device buffer into caller memory (read)
    ToCaller,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransferDirection::FromCaller => "from",
            TransferDirection::ToCaller => "to",
        })
    }
}

/// Errors that can occur in device operations
#[derive(Debug, Error)]
pub enum ChardevError {
    /// Startup could not complete; everything acquired before `stage` was released
    #[error("failed to {stage} for '{name}': {source}")]
    Registration {
        stage: RegistrationStage,
        name: String,
        #[source]
        source: io::Error,
    },

    /// Copying bytes across the caller boundary failed
    #[error("failed to copy {len} bytes {direction} the caller")]
    TransferFault {
        direction: TransferDirection,
        len: usize,
    },

    /// The device configuration was rejected
    #[error("invalid device configuration: {0}")]
    InvalidConfig(String),
}

impl ChardevError {
    pub(crate) fn registration(
        stage: RegistrationStage,
        name: &str,
        source: impl Into<io::Error>,
    ) -> Self {
        ChardevError::Registration {
            stage,
            name: name.to_string(),
            source: source.into(),
        }
    }

    /// Errno equivalent of this error, as an OS call would report it.
    pub fn errno(&self) -> Errno {
        match self {
            ChardevError::Registration { source, .. } => source
                .raw_os_error()
                .map(Errno::from_raw_os_error)
                .unwrap_or(Errno::BUSY),
            ChardevError::TransferFault { .. } => Errno::FAULT,
            ChardevError::InvalidConfig(_) => Errno::INVAL,
        }
    }

    /// Negative result code, e.g. `-EFAULT`.
    pub fn to_code(&self) -> isize {
        -(self.errno().raw_os_error() as isize)
    }
}
