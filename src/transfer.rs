//! Copies across the caller/device memory boundary
//!
//! Every read and write moves bytes through one of these traits. A copy
//! either completes or fails with [`ChardevError::TransferFault`]; the device
//! treats a failure as a failure of the whole operation.

use crate::error::{ChardevError, Result, TransferDirection};
use std::ptr::NonNull;

/// Caller memory that a write copies from
pub trait CallerSource {
    /// Number of bytes the caller offers
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `dst` with the first `dst.len()` bytes of the caller's data
    fn copy_from_caller(&self, dst: &mut [u8]) -> Result<()>;
}

/// Caller memory that a read copies into
pub trait CallerSink {
    /// Deliver `src` to the caller
    fn copy_to_caller(&mut self, src: &[u8]) -> Result<()>;
}

impl CallerSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_from_caller(&self, dst: &mut [u8]) -> Result<()> {
        let src = self.get(..dst.len()).ok_or(ChardevError::TransferFault {
            direction: TransferDirection::FromCaller,
            len: dst.len(),
        })?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl CallerSource for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn copy_from_caller(&self, dst: &mut [u8]) -> Result<()> {
        self.as_slice().copy_from_caller(dst)
    }
}

impl CallerSink for [u8] {
    fn copy_to_caller(&mut self, src: &[u8]) -> Result<()> {
        let len = src.len();
        let dst = self.get_mut(..len).ok_or(ChardevError::TransferFault {
            direction: TransferDirection::ToCaller,
            len,
        })?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl CallerSink for Vec<u8> {
    fn copy_to_caller(&mut self, src: &[u8]) -> Result<()> {
        self.extend_from_slice(src);
        Ok(())
    }
}

impl<const N: usize> CallerSource for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn copy_from_caller(&self, dst: &mut [u8]) -> Result<()> {
        self[..].copy_from_caller(dst)
    }
}

impl<const N: usize> CallerSink for [u8; N] {
    fn copy_to_caller(&mut self, src: &[u8]) -> Result<()> {
        self[..].copy_to_caller(src)
    }
}

impl<T: CallerSource + ?Sized> CallerSource for &T {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn copy_from_caller(&self, dst: &mut [u8]) -> Result<()> {
        (**self).copy_from_caller(dst)
    }
}

impl<T: CallerSink + ?Sized> CallerSink for &mut T {
    fn copy_to_caller(&mut self, src: &[u8]) -> Result<()> {
        (**self).copy_to_caller(src)
    }
}

/// A caller region given as a raw pointer and length, e.g. from C.
///
/// A null pointer is an inaccessible region: any non-empty copy through it
/// faults.
#[derive(Debug, Clone, Copy)]
pub struct RawRegion {
    ptr: Option<NonNull<u8>>,
    len: usize,
}

impl RawRegion {
    /// Wrap a caller region
    ///
    /// # Safety
    /// If `ptr` is non-null it must be valid for reads and writes of `len`
    /// bytes for as long as the region is used, and must not alias the
    /// device buffer.
    pub unsafe fn new(ptr: *mut u8, len: usize) -> Self {
        Self {
            ptr: NonNull::new(ptr),
            len,
        }
    }

    /// Wrap a read-only caller region
    ///
    /// # Safety
    /// Same as [`RawRegion::new`], except only reads are required to be
    /// valid. The region must only be used as a [`CallerSource`].
    pub unsafe fn new_const(ptr: *const u8, len: usize) -> Self {
        Self::new(ptr as *mut u8, len)
    }

    fn checked(&self, direction: TransferDirection, len: usize) -> Result<Option<NonNull<u8>>> {
        if len == 0 {
            return Ok(None);
        }
        match self.ptr {
            Some(ptr) if len <= self.len => Ok(Some(ptr)),
            _ => Err(ChardevError::TransferFault { direction, len }),
        }
    }
}

impl CallerSource for RawRegion {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_from_caller(&self, dst: &mut [u8]) -> Result<()> {
        if let Some(ptr) = self.checked(TransferDirection::FromCaller, dst.len())? {
            // SAFETY: `new` guarantees `len` readable bytes; `checked` bounds the copy
            unsafe {
                std::ptr::copy_nonoverlapping(ptr.as_ptr(), dst.as_mut_ptr(), dst.len());
            }
        }
        Ok(())
    }
}

impl CallerSink for RawRegion {
    fn copy_to_caller(&mut self, src: &[u8]) -> Result<()> {
        if let Some(ptr) = self.checked(TransferDirection::ToCaller, src.len())? {
            // SAFETY: `new` guarantees `len` writable bytes; `checked` bounds the copy
            unsafe {
                std::ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
            }
        }
        Ok(())
    }
}
