//! Device registration
//!
//! A [`Registrar`] makes an endpoint reachable: it hands out a major number,
//! groups devices into classes and publishes a named node bound to the
//! endpoint's [`FileOperations`]. [`FsRegistrar`] does this in a directory
//! tree:
//!
//! ```text
//! <root>/chrdev/<major>          claims the major, holds the driver name
//! <root>/class/<class>/          one directory per class
//! <root>/class/<class>/<device>  "<major>:<minor>"
//! <root>/dev/<device>            "<major>:<minor>", the published node
//! ```

use crate::endpoint::FileOperations;
use crate::error::{ChardevError, RegistrationStage, Result};
use parking_lot::Mutex;
use rustix::fd::OwnedFd;
use rustix::fs::{mkdirat, openat, unlinkat, AtFlags, Mode, OFlags, CWD};
use rustix::io::Errno;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Highest major handed out by dynamic allocation
pub const DYNAMIC_MAJOR_START: u32 = 254;

/// Lowest major handed out by dynamic allocation
pub const DYNAMIC_MAJOR_END: u32 = 234;

/// Device number: a major identifying the driver and a minor for the instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevNum {
    pub major: u32,
    pub minor: u32,
}

impl DevNum {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for DevNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

impl FromStr for DevNum {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        let (major, minor) = s.trim().split_once(':').ok_or(())?;
        Ok(Self {
            major: major.parse().map_err(|_| ())?,
            minor: minor.parse().map_err(|_| ())?,
        })
    }
}

/// A device class returned by [`Registrar::class_create`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceClass {
    name: String,
}

impl DeviceClass {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Publishes and withdraws devices.
///
/// Release calls never fail; anything left behind is logged and skipped.
pub trait Registrar: Send + Sync {
    /// Allocate a major number bound to `fops`
    fn register_chrdev(&self, name: &str, fops: Arc<dyn FileOperations>) -> Result<u32>;

    fn unregister_chrdev(&self, major: u32, name: &str);

    fn class_create(&self, name: &str) -> Result<DeviceClass>;

    fn class_destroy(&self, class: &DeviceClass);

    /// Publish a node for `devnum`, returning its path
    fn device_create(&self, class: &DeviceClass, devnum: DevNum, name: &str) -> Result<PathBuf>;

    fn device_destroy(&self, class: &DeviceClass, devnum: DevNum);

    /// Operation table behind a published node
    fn lookup(&self, node: &Path) -> Option<Arc<dyn FileOperations>>;
}

struct NodeEntry {
    name: String,
    path: PathBuf,
}

#[derive(Default)]
struct Tables {
    drivers: HashMap<u32, Arc<dyn FileOperations>>,
    nodes: HashMap<DevNum, NodeEntry>,
}

/// Registrar backed by a directory tree
pub struct FsRegistrar {
    root: PathBuf,
    tables: Mutex<Tables>,
}

impl FsRegistrar {
    /// Use `root` as the registration tree, creating it if needed
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        for sub in ["chrdev", "class", "dev"] {
            ensure_dir(&root.join(sub))?;
        }
        Ok(Self {
            root,
            tables: Mutex::new(Tables::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn major_path(&self, major: u32) -> PathBuf {
        self.root.join("chrdev").join(major.to_string())
    }

    fn class_path(&self, class: &str) -> PathBuf {
        self.root.join("class").join(class)
    }

    fn node_path(&self, name: &str) -> PathBuf {
        self.root.join("dev").join(name)
    }
}

impl Registrar for FsRegistrar {
    fn register_chrdev(&self, name: &str, fops: Arc<dyn FileOperations>) -> Result<u32> {
        for major in (DYNAMIC_MAJOR_END..=DYNAMIC_MAJOR_START).rev() {
            let path = self.major_path(major);
            match create_exclusive(&path, name.as_bytes()) {
                Ok(()) => {
                    self.tables.lock().drivers.insert(major, fops);
                    log::debug!("claimed major {} for '{}'", major, name);
                    return Ok(major);
                }
                Err(Errno::EXIST) => continue,
                Err(e) => {
                    return Err(ChardevError::registration(RegistrationStage::Major, name, e))
                }
            }
        }
        Err(ChardevError::registration(
            RegistrationStage::Major,
            name,
            Errno::BUSY,
        ))
    }

    fn unregister_chrdev(&self, major: u32, name: &str) {
        self.tables.lock().drivers.remove(&major);
        remove_logged(&self.major_path(major), AtFlags::empty(), name);
    }

    fn class_create(&self, name: &str) -> Result<DeviceClass> {
        mkdirat(CWD, &self.class_path(name), Mode::from_raw_mode(0o755))
            .map_err(|e| ChardevError::registration(RegistrationStage::Class, name, e))?;
        Ok(DeviceClass {
            name: name.to_string(),
        })
    }

    fn class_destroy(&self, class: &DeviceClass) {
        remove_logged(&self.class_path(&class.name), AtFlags::REMOVEDIR, &class.name);
    }

    fn device_create(&self, class: &DeviceClass, devnum: DevNum, name: &str) -> Result<PathBuf> {
        let contents = format!("{}\n", devnum);
        let node = self.node_path(name);
        create_exclusive(&node, contents.as_bytes())
            .map_err(|e| ChardevError::registration(RegistrationStage::Node, name, e))?;

        let class_entry = self.class_path(&class.name).join(name);
        if let Err(e) = create_exclusive(&class_entry, contents.as_bytes()) {
            remove_logged(&node, AtFlags::empty(), name);
            return Err(ChardevError::registration(RegistrationStage::Node, name, e));
        }

        self.tables.lock().nodes.insert(
            devnum,
            NodeEntry {
                name: name.to_string(),
                path: node.clone(),
            },
        );
        Ok(node)
    }

    fn device_destroy(&self, class: &DeviceClass, devnum: DevNum) {
        let Some(entry) = self.tables.lock().nodes.remove(&devnum) else {
            log::warn!("no device registered as {}", devnum);
            return;
        };
        remove_logged(&entry.path, AtFlags::empty(), &entry.name);
        remove_logged(
            &self.class_path(&class.name).join(&entry.name),
            AtFlags::empty(),
            &entry.name,
        );
    }

    fn lookup(&self, node: &Path) -> Option<Arc<dyn FileOperations>> {
        let contents = std::fs::read_to_string(node).ok()?;
        let devnum: DevNum = contents.parse().ok()?;
        self.tables.lock().drivers.get(&devnum.major).cloned()
    }
}

impl fmt::Debug for FsRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.lock();
        f.debug_struct("FsRegistrar")
            .field("root", &self.root)
            .field("majors", &tables.drivers.keys().collect::<Vec<_>>())
            .field("nodes", &tables.nodes.len())
            .finish()
    }
}

fn ensure_dir(path: &Path) -> io::Result<()> {
    match mkdirat(CWD, path, Mode::from_raw_mode(0o755)) {
        Ok(()) | Err(Errno::EXIST) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Create `path` only if it does not exist yet and fill it with `contents`
fn create_exclusive(path: &Path, contents: &[u8]) -> std::result::Result<(), Errno> {
    let fd: OwnedFd = openat(
        CWD,
        path,
        OFlags::CREATE | OFlags::EXCL | OFlags::WRONLY | OFlags::CLOEXEC,
        Mode::RUSR | Mode::WUSR | Mode::RGRP | Mode::ROTH,
    )?;

    let mut rest = contents;
    while !rest.is_empty() {
        match rustix::io::write(&fd, rest) {
            Ok(n) => rest = &rest[n..],
            Err(Errno::INTR) => continue,
            Err(e) => {
                drop(fd);
                let _ = unlinkat(CWD, path, AtFlags::empty());
                return Err(e);
            }
        }
    }
    Ok(())
}

fn remove_logged(path: &Path, flags: AtFlags, name: &str) {
    if let Err(e) = unlinkat(CWD, path, flags) {
        log::warn!("failed to remove {} for '{}': {}", path.display(), name, e);
    }
}
