//! The device endpoint
//!
//! One [`Endpoint`] owns the shared buffer. Callers [`open`](Endpoint::open)
//! it to get an [`OpenFile`] with a private read cursor, then read and write
//! through that file until they [`release`](Endpoint::release) it.
//!
//! # Consistency
//!
//! The buffer and its content length sit behind one `RwLock`. A write
//! stages the caller's bytes first and takes the exclusive lock only to
//! commit them, so a failed copy never touches committed state. A read
//! copies out under the shared lock, so it always sees exactly one
//! completed write.

use crate::buffer::MessageBuffer;
use crate::diag::Diagnostics;
use crate::error::Result;
use crate::transfer::{CallerSink, CallerSource};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An open session on an endpoint.
///
/// Holds the read cursor. Reads advance it; writes leave it alone.
#[derive(Debug)]
pub struct OpenFile {
    id: u64,
    offset: usize,
}

impl OpenFile {
    /// Identifier unique among files opened on the same endpoint
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current read position
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// The operation table a registrar binds to a published node
pub trait FileOperations: Send + Sync {
    fn open(&self) -> OpenFile;

    /// Read up to `len` bytes into `dst`, returning the count delivered.
    /// Zero means end of data.
    fn read(&self, file: &mut OpenFile, dst: &mut dyn CallerSink, len: usize) -> Result<usize>;

    /// Replace the buffer with `src`, returning the count accepted
    fn write(&self, file: &mut OpenFile, src: &dyn CallerSource) -> Result<usize>;

    fn release(&self, file: OpenFile);
}

/// Shared-buffer byte device
pub struct Endpoint {
    name: String,
    capacity: usize,
    state: RwLock<MessageBuffer>,
    next_file_id: AtomicU64,
    diag: Arc<dyn Diagnostics>,
}

impl Endpoint {
    /// Create an endpoint with an empty buffer of `capacity` bytes.
    ///
    /// `name` only prefixes diagnostic messages.
    pub fn new(name: &str, capacity: usize, diag: Arc<dyn Diagnostics>) -> Self {
        let state = MessageBuffer::new(capacity);
        Self {
            name: name.to_string(),
            capacity: state.capacity(),
            state: RwLock::new(state),
            next_file_id: AtomicU64::new(1),
            diag,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Buffer size including the terminator slot
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid bytes from the last committed write
    pub fn content_len(&self) -> usize {
        self.state.read().len()
    }

    /// Copy of the valid bytes
    pub fn snapshot(&self) -> Vec<u8> {
        self.state.read().contents().to_vec()
    }

    /// Open a new file with its cursor at 0. Never fails.
    pub fn open(&self) -> OpenFile {
        let id = self.next_file_id.fetch_add(1, Ordering::Relaxed);
        self.diag
            .info(format_args!("{}: device has been opened", self.name));
        OpenFile { id, offset: 0 }
    }

    /// Read up to `len` bytes at the file's cursor into `dst`.
    ///
    /// Returns 0 once the cursor reaches the content length. Only the
    /// delivered range is copied, and the cursor moves only if the copy
    /// succeeded.
    pub fn read<D>(&self, file: &mut OpenFile, dst: &mut D, len: usize) -> Result<usize>
    where
        D: CallerSink + ?Sized,
    {
        let state = self.state.read();
        let window = state.window(file.offset, len);
        if window.is_empty() {
            return Ok(0);
        }

        let count = window.len();
        if let Err(err) = dst.copy_to_caller(window) {
            drop(state);
            self.diag.info(format_args!(
                "{}: failed to send {} characters to the user",
                self.name, count
            ));
            return Err(err);
        }
        drop(state);

        file.offset += count;
        self.diag.info(format_args!(
            "{}: sent {} characters to the user",
            self.name, count
        ));
        Ok(count)
    }

    /// Read up to `len` bytes into a new vector
    pub fn read_to_vec(&self, file: &mut OpenFile, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read(file, &mut out, len)?;
        Ok(out)
    }

    /// Replace the buffer contents with the caller's bytes.
    ///
    /// Input that would not leave room for the terminator is truncated to
    /// `capacity - 1` bytes. Returns the number of bytes accepted. On a
    /// transfer fault the previous contents stay committed.
    pub fn write<S>(&self, _file: &mut OpenFile, src: &S) -> Result<usize>
    where
        S: CallerSource + ?Sized,
    {
        let accepted = src.len().min(self.capacity - 1);
        let mut staged = vec![0u8; accepted];
        src.copy_from_caller(&mut staged)?;

        let committed = self.state.write().commit(&staged);
        debug_assert_eq!(committed, accepted);

        self.diag.info(format_args!(
            "{}: received {} characters from the user",
            self.name, committed
        ));
        Ok(committed)
    }

    /// Close a file. The buffer keeps its contents.
    pub fn release(&self, file: OpenFile) {
        drop(file);
        self.diag
            .info(format_args!("{}: device successfully closed", self.name));
    }
}

impl FileOperations for Endpoint {
    fn open(&self) -> OpenFile {
        Endpoint::open(self)
    }

    fn read(&self, file: &mut OpenFile, dst: &mut dyn CallerSink, len: usize) -> Result<usize> {
        Endpoint::read(self, file, dst, len)
    }

    fn write(&self, file: &mut OpenFile, src: &dyn CallerSource) -> Result<usize> {
        Endpoint::write(self, file, src)
    }

    fn release(&self, file: OpenFile) {
        Endpoint::release(self, file)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("content_len", &self.content_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::{NullDiagnostics, RecordingDiagnostics, Severity};
    use crate::error::{ChardevError, TransferDirection};
    use proptest::prelude::*;
    use std::thread;

    const CAPACITY: usize = 1024;

    fn endpoint() -> Endpoint {
        Endpoint::new("test", CAPACITY, Arc::new(NullDiagnostics))
    }

    /// Source that offers bytes it cannot deliver
    struct BrokenSource(usize);

    impl CallerSource for BrokenSource {
        fn len(&self) -> usize {
            self.0
        }

        fn copy_from_caller(&self, dst: &mut [u8]) -> Result<()> {
            // scribble first, then fail
            dst.fill(0xEE);
            Err(ChardevError::TransferFault {
                direction: TransferDirection::FromCaller,
                len: dst.len(),
            })
        }
    }

    struct BrokenSink;

    impl CallerSink for BrokenSink {
        fn copy_to_caller(&mut self, src: &[u8]) -> Result<()> {
            Err(ChardevError::TransferFault {
                direction: TransferDirection::ToCaller,
                len: src.len(),
            })
        }
    }

    #[test]
    fn test_write_then_read_fresh_handle() {
        let dev = endpoint();
        let mut writer = dev.open();
        assert_eq!(dev.write(&mut writer, b"Hello, device!").unwrap(), 14);

        let mut reader = dev.open();
        let mut buf = [0u8; 64];
        let n = dev.read(&mut reader, &mut buf[..], 64).unwrap();
        assert_eq!(n, 14);
        assert_eq!(&buf[..n], b"Hello, device!");
        assert_eq!(reader.offset(), 14);
    }

    #[test]
    fn test_oversized_write_truncates() {
        let dev = endpoint();
        let mut file = dev.open();
        let data = vec![b'z'; CAPACITY + 10];
        assert_eq!(dev.write(&mut file, &data).unwrap(), CAPACITY - 1);
        assert_eq!(dev.content_len(), CAPACITY - 1);

        // exactly `capacity` bytes also needs the terminator slot
        let data = vec![b'y'; CAPACITY];
        assert_eq!(dev.write(&mut file, &data).unwrap(), CAPACITY - 1);
    }

    #[test]
    fn test_partial_reads_then_eof() {
        let dev = endpoint();
        let mut file = dev.open();
        dev.write(&mut file, b"abcdefg").unwrap();

        let mut reader = dev.open();
        assert_eq!(dev.read_to_vec(&mut reader, 3).unwrap(), b"abc");
        assert_eq!(dev.read_to_vec(&mut reader, 3).unwrap(), b"def");
        assert_eq!(dev.read_to_vec(&mut reader, 3).unwrap(), b"g");
        assert_eq!(reader.offset(), 7);

        for _ in 0..3 {
            assert_eq!(dev.read_to_vec(&mut reader, 3).unwrap(), b"");
            assert_eq!(reader.offset(), 7);
        }
    }

    #[test]
    fn test_zero_length_read() {
        let dev = endpoint();
        let mut file = dev.open();
        dev.write(&mut file, b"abc").unwrap();
        assert_eq!(dev.read(&mut file, &mut [0u8; 0], 0).unwrap(), 0);
        assert_eq!(file.offset(), 0);
    }

    #[test]
    fn test_write_replaces_content() {
        let dev = endpoint();
        let mut file = dev.open();
        dev.write(&mut file, b"AA").unwrap();
        dev.write(&mut file, b"B").unwrap();

        let mut reader = dev.open();
        let mut buf = [0u8; 2];
        assert_eq!(dev.read(&mut reader, &mut buf, 2).unwrap(), 1);
        assert_eq!(&buf[..1], b"B");
    }

    #[test]
    fn test_write_does_not_move_cursor() {
        let dev = endpoint();
        let mut file = dev.open();
        dev.write(&mut file, b"0123456789").unwrap();
        assert_eq!(dev.read_to_vec(&mut file, 4).unwrap(), b"0123");

        dev.write(&mut file, b"abcdefghij").unwrap();
        assert_eq!(file.offset(), 4);
        assert_eq!(dev.read_to_vec(&mut file, 100).unwrap(), b"efghij");
    }

    #[test]
    fn test_release_keeps_buffer() {
        let dev = endpoint();
        let mut file = dev.open();
        dev.write(&mut file, b"X").unwrap();
        dev.release(file);

        let mut again = dev.open();
        assert_eq!(dev.read_to_vec(&mut again, 1).unwrap(), b"X");
    }

    #[test]
    fn test_write_fault_keeps_committed_state() {
        let dev = endpoint();
        let mut file = dev.open();
        dev.write(&mut file, b"committed").unwrap();

        let err = dev.write(&mut file, &BrokenSource(5)).unwrap_err();
        assert!(matches!(err, ChardevError::TransferFault { .. }));
        assert_eq!(dev.content_len(), 9);

        let mut reader = dev.open();
        assert_eq!(dev.read_to_vec(&mut reader, 64).unwrap(), b"committed");
    }

    #[test]
    fn test_read_fault_keeps_cursor() {
        let dev = endpoint();
        let mut file = dev.open();
        dev.write(&mut file, b"data").unwrap();

        assert!(dev.read(&mut file, &mut BrokenSink, 4).is_err());
        assert_eq!(file.offset(), 0);

        // a sink too small for the clamped window also faults
        let mut tiny = [0u8; 2];
        assert!(dev.read(&mut file, &mut tiny[..], 4).is_err());
        assert_eq!(file.offset(), 0);

        assert_eq!(dev.read_to_vec(&mut file, 4).unwrap(), b"data");
    }

    #[test]
    fn test_handles_have_independent_cursors() {
        let dev = endpoint();
        let mut a = dev.open();
        let mut b = dev.open();
        assert_ne!(a.id(), b.id());

        dev.write(&mut a, b"shared").unwrap();
        assert_eq!(dev.read_to_vec(&mut a, 3).unwrap(), b"sha");
        assert_eq!(dev.read_to_vec(&mut b, 6).unwrap(), b"shared");
        assert_eq!(dev.read_to_vec(&mut a, 6).unwrap(), b"red");
    }

    #[test]
    fn test_through_operation_table() {
        let dev: Arc<dyn FileOperations> = Arc::new(endpoint());
        let mut file = dev.open();
        let data: &[u8] = b"via table";
        assert_eq!(dev.write(&mut file, &data).unwrap(), 9);

        let mut out = Vec::new();
        assert_eq!(dev.read(&mut file, &mut out, 3).unwrap(), 3);
        assert_eq!(out, b"via");
        dev.release(file);
    }

    #[test]
    fn test_diagnostics() {
        let diag = Arc::new(RecordingDiagnostics::new());
        let dev = Endpoint::new("chardev", 16, diag.clone());

        let mut file = dev.open();
        dev.write(&mut file, b"hey").unwrap();
        dev.read_to_vec(&mut file, 10).unwrap();
        dev.read_to_vec(&mut file, 10).unwrap();
        dev.release(file);

        assert_eq!(
            diag.messages(Severity::Info),
            vec![
                "chardev: device has been opened",
                "chardev: received 3 characters from the user",
                "chardev: sent 3 characters to the user",
                "chardev: device successfully closed",
            ]
        );
        assert!(diag.messages(Severity::Alert).is_empty());
    }

    #[test]
    fn test_concurrent_writes_never_mix() {
        let dev = Arc::new(endpoint());
        let payloads: Vec<Vec<u8>> = (0u8..4)
            .map(|i| vec![b'a' + i; 100 + i as usize * 50])
            .collect();

        let writers: Vec<_> = payloads
            .iter()
            .cloned()
            .map(|payload| {
                let dev = dev.clone();
                thread::spawn(move || {
                    let mut file = dev.open();
                    for _ in 0..500 {
                        dev.write(&mut file, &payload).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let dev = dev.clone();
            let payloads = payloads.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let mut file = dev.open();
                    let seen = dev.read_to_vec(&mut file, CAPACITY).unwrap();
                    assert!(seen.is_empty() || payloads.contains(&seen));
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
    }

    proptest! {
        #[test]
        fn prop_fitting_write_reads_back(data in proptest::collection::vec(any::<u8>(), 0..CAPACITY)) {
            let dev = endpoint();
            let mut file = dev.open();
            prop_assert_eq!(dev.write(&mut file, &data).unwrap(), data.len());

            let mut fresh = dev.open();
            let mut buf = vec![0u8; data.len()];
            prop_assert_eq!(dev.read(&mut fresh, &mut buf[..], data.len()).unwrap(), data.len());
            prop_assert_eq!(buf, data);
        }

        #[test]
        fn prop_oversized_write_truncates(extra in 1usize..4096) {
            let dev = endpoint();
            let mut file = dev.open();
            let data = vec![0x5a; CAPACITY + extra];
            prop_assert_eq!(dev.write(&mut file, &data).unwrap(), CAPACITY - 1);
            prop_assert_eq!(dev.content_len(), CAPACITY - 1);
        }

        #[test]
        fn prop_cursor_is_monotonic(
            len in 0usize..200,
            chunks in proptest::collection::vec(0usize..64, 1..40),
        ) {
            let dev = endpoint();
            let mut file = dev.open();
            dev.write(&mut file, &vec![7u8; len]).unwrap();

            let mut reader = dev.open();
            let mut total = 0;
            for chunk in chunks {
                let before = reader.offset();
                let got = dev.read_to_vec(&mut reader, chunk).unwrap();
                prop_assert_eq!(reader.offset(), before + got.len());
                prop_assert!(reader.offset() <= len);
                total += got.len();
            }
            prop_assert_eq!(total, reader.offset());
        }
    }
}
