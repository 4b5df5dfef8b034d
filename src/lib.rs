//! simple_chardev - a shared-buffer character device
//!
//! One device owns one fixed-capacity buffer. Any number of callers open it,
//! write into it and read from it with byte-stream semantics: a write
//! replaces the whole buffer, a read continues from the caller's own cursor
//! and returns 0 once everything has been read.
//!
//! # Architecture
//!
//! - **Endpoint**: buffer, content length and the open/read/write/release operations
//! - **Registrar**: publishes the endpoint as a named node (directory tree backend)
//! - **CharDevice**: ordered bring-up and tear-down of the registration
//!
//! # Example
//!
//! ```no_run
//! use simple_chardev::{CharDevice, DeviceConfig};
//!
//! let device = CharDevice::load(DeviceConfig::with_root("/tmp/chardev"))?;
//! let endpoint = device.endpoint();
//!
//! let mut file = endpoint.open();
//! endpoint.write(&mut file, b"hello")?;
//! assert_eq!(endpoint.read_to_vec(&mut file, 16)?, b"hello");
//! endpoint.release(file);
//!
//! device.shutdown();
//! # Ok::<(), simple_chardev::ChardevError>(())
//! ```

pub mod bindings;
pub mod buffer;
pub mod config;
pub mod device;
pub mod diag;
pub mod endpoint;
pub mod error;
pub mod registry;
pub mod transfer;

pub use config::DeviceConfig;
pub use device::CharDevice;
pub use diag::{Diagnostics, LogDiagnostics, Severity};
pub use endpoint::{Endpoint, FileOperations, OpenFile};
pub use error::{ChardevError, Result};
pub use registry::{DevNum, FsRegistrar, Registrar};
pub use transfer::{CallerSink, CallerSource, RawRegion};
