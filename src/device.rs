//! Device lifecycle: bring-up and tear-down
//!
//! [`CharDevice::initialize`] acquires the major number, the class and the
//! node in that order. If any step fails, everything acquired so far is
//! released in reverse order before the error is returned, so a failed
//! start leaves nothing published. [`CharDevice::shutdown`] (or dropping the
//! device) releases the same resources in reverse order.

use crate::config::DeviceConfig;
use crate::diag::{Diagnostics, LogDiagnostics};
use crate::endpoint::{Endpoint, FileOperations, OpenFile};
use crate::error::{ChardevError, RegistrationStage, Result};
use crate::registry::{DevNum, DeviceClass, FsRegistrar, Registrar};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Minor number of the single device instance
pub const DEVICE_MINOR: u32 = 0;

/// Whatever part of the registration has been acquired
#[derive(Default)]
struct Registration {
    major: Option<u32>,
    class: Option<DeviceClass>,
    node: Option<(DevNum, PathBuf)>,
}

impl Registration {
    fn release(&mut self, registrar: &dyn Registrar, device_name: &str) {
        if let Some((devnum, _)) = self.node.take() {
            if let Some(class) = &self.class {
                registrar.device_destroy(class, devnum);
            }
        }
        if let Some(class) = self.class.take() {
            registrar.class_destroy(&class);
        }
        if let Some(major) = self.major.take() {
            registrar.unregister_chrdev(major, device_name);
        }
    }
}

/// Releases a partial registration if bring-up bails out early
struct Unwind<'a> {
    registrar: &'a dyn Registrar,
    device_name: &'a str,
    registration: Registration,
}

impl Unwind<'_> {
    fn finish(mut self) -> Registration {
        std::mem::take(&mut self.registration)
    }
}

impl Drop for Unwind<'_> {
    fn drop(&mut self) {
        self.registration.release(self.registrar, self.device_name);
    }
}

/// A registered, reachable device
pub struct CharDevice {
    config: DeviceConfig,
    endpoint: Arc<Endpoint>,
    registrar: Arc<dyn Registrar>,
    diag: Arc<dyn Diagnostics>,
    registration: Registration,
}

impl CharDevice {
    /// Bring the device up under `config.root` with a [`FsRegistrar`],
    /// reporting through the `log` facade
    pub fn load(config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        let registrar = FsRegistrar::new(&config.root).map_err(|e| {
            ChardevError::registration(RegistrationStage::Major, &config.device_name, e)
        })?;
        Self::initialize(config, Arc::new(registrar), Arc::new(LogDiagnostics))
    }

    /// Create the endpoint and register it with `registrar`
    pub fn initialize(
        config: DeviceConfig,
        registrar: Arc<dyn Registrar>,
        diag: Arc<dyn Diagnostics>,
    ) -> Result<Self> {
        config.validate()?;
        let name = config.device_name.as_str();
        diag.info(format_args!("{}: initializing the device", name));

        let endpoint = Arc::new(Endpoint::new(name, config.capacity, diag.clone()));
        let mut unwind = Unwind {
            registrar: &*registrar,
            device_name: name,
            registration: Registration::default(),
        };

        let fops: Arc<dyn FileOperations> = endpoint.clone();
        let major = registrar.register_chrdev(name, fops).map_err(|e| {
            diag.alert(format_args!("{} failed to register a major number", name));
            e
        })?;
        unwind.registration.major = Some(major);
        diag.info(format_args!("{}: registered with major number {}", name, major));

        let class = registrar.class_create(&config.class_name).map_err(|e| {
            diag.alert(format_args!("{} failed to register a class", name));
            e
        })?;
        diag.info(format_args!(
            "{}: device class '{}' registered",
            name,
            class.name()
        ));

        let devnum = DevNum::new(major, DEVICE_MINOR);
        let created = registrar.device_create(&class, devnum, name);
        unwind.registration.class = Some(class);
        let node = created.map_err(|e| {
            diag.alert(format_args!("{} failed to create the device", name));
            e
        })?;
        diag.info(format_args!(
            "{}: device node created at {}",
            name,
            node.display()
        ));
        unwind.registration.node = Some((devnum, node));

        let registration = unwind.finish();
        Ok(Self {
            endpoint,
            registrar,
            diag,
            registration,
            config,
        })
    }

    /// Withdraw the node, the class and the major number
    pub fn shutdown(self) {
        drop(self);
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn registrar(&self) -> &Arc<dyn Registrar> {
        &self.registrar
    }

    pub fn devnum(&self) -> Option<DevNum> {
        self.registration.node.as_ref().map(|(devnum, _)| *devnum)
    }

    /// Path of the published node
    pub fn node_path(&self) -> Option<&Path> {
        self.registration
            .node
            .as_ref()
            .map(|(_, path)| path.as_path())
    }

    /// Shorthand for opening the endpoint directly
    pub fn open(&self) -> OpenFile {
        self.endpoint.open()
    }
}

impl Drop for CharDevice {
    fn drop(&mut self) {
        self.registration
            .release(&*self.registrar, &self.config.device_name);
        self.diag.info(format_args!(
            "{}: goodbye",
            self.config.device_name
        ));
    }
}

impl std::fmt::Debug for CharDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharDevice")
            .field("name", &self.config.device_name)
            .field("devnum", &self.devnum())
            .field("node", &self.node_path())
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
