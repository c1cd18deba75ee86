//! Bounded, append-only byte sink used to cap captured child output.
//!
//! The byte container is a private field behind a mutex, not a subtype of a
//! generic buffer — a prior version of this idea that embedded a generic
//! buffer type was bypassable via downcasting, so the public surface here is
//! deliberately narrow: `append`, `bytes`, `len`, `to_string_lossy`.

use std::sync::{Arc, Mutex};

use crate::sink::OutputSink;

/// Default cap applied when a caller does not override `ExecutorOptions::buffer_size`.
pub const DEFAULT_BUFFER_CAP: usize = 10 * 1024 * 1024;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[error("buffer full")]
    Closed,
    #[error("output exceeded maximum buffer size")]
    CapacityExceeded,
}

struct State {
    bytes: Vec<u8>,
    cap: usize,
    closed: bool,
}

/// An append-only byte sink that rejects writes once a hard cap is reached.
///
/// Cloning shares the same underlying storage (`Arc`), so a handle can be
/// cloned into a reader task while the original stays with the caller that
/// wants to read the final bytes back out.
#[derive(Clone)]
pub struct BoundedBuffer {
    inner: Arc<Mutex<State>>,
}

impl BoundedBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                bytes: Vec::new(),
                cap,
                closed: false,
            })),
        }
    }

    /// Append `data`, truncating and closing the buffer if it would exceed
    /// `cap`. Returns the number of bytes actually appended.
    pub fn append(&self, data: &[u8]) -> Result<usize, BufferError> {
        let mut state = self.inner.lock().unwrap();
        if state.closed {
            return Err(BufferError::Closed);
        }
        let remaining = state.cap - state.bytes.len();
        if data.len() <= remaining {
            state.bytes.extend_from_slice(data);
            Ok(data.len())
        } else {
            state.bytes.extend_from_slice(&data[..remaining]);
            state.closed = true;
            Err(BufferError::CapacityExceeded)
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.inner.lock().unwrap().bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }
}

impl OutputSink for BoundedBuffer {
    fn write(&self, data: &[u8]) -> std::io::Result<()> {
        match self.append(data) {
            Ok(_) => Ok(()),
            Err(BufferError::Closed) => {
                Err(std::io::Error::other("buffer full"))
            }
            Err(BufferError::CapacityExceeded) => Err(std::io::Error::other(
                "output exceeded maximum buffer size",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_under_cap_succeed() {
        let buf = BoundedBuffer::new(16);
        assert_eq!(buf.append(b"hello").unwrap(), 5);
        assert_eq!(buf.bytes(), b"hello");
        assert!(!buf.is_closed());
    }

    #[test]
    fn writing_exactly_cap_bytes_does_not_close() {
        let buf = BoundedBuffer::new(5);
        assert_eq!(buf.append(b"hello").unwrap(), 5);
        assert!(!buf.is_closed());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn writing_past_cap_truncates_and_closes() {
        let buf = BoundedBuffer::new(5);
        let err = buf.append(b"hello world").unwrap_err();
        assert_eq!(err, BufferError::CapacityExceeded);
        assert_eq!(buf.bytes(), b"hello");
        assert!(buf.is_closed());
    }

    #[test]
    fn further_writes_after_close_are_rejected_and_append_nothing() {
        let buf = BoundedBuffer::new(5);
        let _ = buf.append(b"hello world");
        let err = buf.append(b"more").unwrap_err();
        assert_eq!(err, BufferError::Closed);
        assert_eq!(buf.bytes(), b"hello");
    }

    #[test]
    fn cap_plus_one_across_multiple_writes_closes_on_the_write_that_overflows() {
        let buf = BoundedBuffer::new(5);
        assert!(buf.append(b"he").is_ok());
        assert!(buf.append(b"ll").is_ok());
        // third write pushes total to 6 bytes against a cap of 5.
        let err = buf.append(b"oo").unwrap_err();
        assert_eq!(err, BufferError::CapacityExceeded);
        assert_eq!(buf.bytes(), b"hello");
    }

    #[test]
    fn clone_shares_storage() {
        let buf = BoundedBuffer::new(16);
        let handle = buf.clone();
        handle.append(b"abc").unwrap();
        assert_eq!(buf.bytes(), b"abc");
    }
}
