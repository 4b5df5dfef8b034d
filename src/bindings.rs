//! C Bindings for simple_chardev
//!
//! Provides a raw C API for loading the device and driving it through
//! open/read/write/release. Read and write return a byte count, or a
//! negative errno (`-EFAULT` for an inaccessible buffer).

use crate::config::DeviceConfig;
use crate::device::CharDevice;
use crate::endpoint::OpenFile;
use crate::transfer::RawRegion;
use rustix::io::Errno;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::ptr;

// Opaque handles
pub struct ChardevDeviceHandle(CharDevice);
pub struct ChardevFileHandle(OpenFile);

#[repr(C)]
pub struct ChardevConfig {
    /// Registration root directory
    pub root: *const c_char,
    /// Buffer capacity; 0 selects the default
    pub capacity: usize,
}

fn einval() -> isize {
    -(Errno::INVAL.raw_os_error() as isize)
}

/// Load the device
///
/// Returns null if the root is not valid UTF-8 or registration fails.
///
/// # Safety
/// `config.root` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn chardev_device_load(config: ChardevConfig) -> *mut ChardevDeviceHandle {
    if config.root.is_null() {
        return ptr::null_mut();
    }

    let root = match CStr::from_ptr(config.root).to_str() {
        Ok(s) => s,
        Err(_) => return ptr::null_mut(),
    };

    let mut rust_config = DeviceConfig::with_root(root);
    if config.capacity != 0 {
        rust_config.capacity = config.capacity;
    }

    match CharDevice::load(rust_config) {
        Ok(device) => Box::into_raw(Box::new(ChardevDeviceHandle(device))),
        Err(e) => {
            log::error!("chardev_device_load: {}", e);
            ptr::null_mut()
        }
    }
}

/// Unload the device, withdrawing its node
///
/// # Safety
/// `handle` must come from `chardev_device_load` and not be used afterwards
#[no_mangle]
pub unsafe extern "C" fn chardev_device_unload(handle: *mut ChardevDeviceHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Open the device
///
/// # Safety
/// `device` must be a live device handle
#[no_mangle]
pub unsafe extern "C" fn chardev_open(device: *mut ChardevDeviceHandle) -> *mut ChardevFileHandle {
    if device.is_null() {
        return ptr::null_mut();
    }
    let device = &(*device).0;
    Box::into_raw(Box::new(ChardevFileHandle(device.open())))
}

/// Read up to `len` bytes into `buf`
///
/// Returns the bytes read, 0 at end of data, or a negative errno.
///
/// # Safety
/// Handles must be live; `buf`, if non-null, must be writable for `len` bytes
#[no_mangle]
pub unsafe extern "C" fn chardev_read(
    device: *mut ChardevDeviceHandle,
    file: *mut ChardevFileHandle,
    buf: *mut u8,
    len: usize,
) -> isize {
    if device.is_null() || file.is_null() {
        return einval();
    }
    let device = &(*device).0;
    let file = &mut (*file).0;
    let mut region = RawRegion::new(buf, len);
    match device.endpoint().read(file, &mut region, len) {
        Ok(n) => n as isize,
        Err(e) => e.to_code(),
    }
}

/// Write `len` bytes from `buf`
///
/// Returns the bytes accepted or a negative errno.
///
/// # Safety
/// Handles must be live; `buf`, if non-null, must be readable for `len` bytes
#[no_mangle]
pub unsafe extern "C" fn chardev_write(
    device: *mut ChardevDeviceHandle,
    file: *mut ChardevFileHandle,
    buf: *const u8,
    len: usize,
) -> isize {
    if device.is_null() || file.is_null() {
        return einval();
    }
    let device = &(*device).0;
    let file = &mut (*file).0;
    let region = RawRegion::new_const(buf, len);
    match device.endpoint().write(file, &region) {
        Ok(n) => n as isize,
        Err(e) => e.to_code(),
    }
}

/// Close a file
///
/// # Safety
/// Handles must be live; `file` must not be used afterwards
#[no_mangle]
pub unsafe extern "C" fn chardev_release(
    device: *mut ChardevDeviceHandle,
    file: *mut ChardevFileHandle,
) -> c_int {
    if device.is_null() || file.is_null() {
        return -Errno::INVAL.raw_os_error();
    }
    let device = &(*device).0;
    let file = Box::from_raw(file).0;
    device.endpoint().release(file);
    0
}
