//! Output sinks and stdin sources a caller can attach to a descriptor.

use std::io::{self, Read};
use std::sync::{Arc, Mutex};

/// A synchronous byte sink a caller can wire to a descriptor's stdout/stderr.
///
/// Implementations must be cheap to call from a reader task and must not
/// block on anything but local work — the pipe-reading loop calls `write`
/// once per chunk read from the child.
pub trait OutputSink: Send + Sync {
    fn write(&self, data: &[u8]) -> io::Result<()>;
}

/// Fans a single write out to every sink in the list, in order.
///
/// Used by capture mode to feed the bounded buffer and any caller-supplied
/// sink from the same stream of chunks.
pub struct MultiSink(Vec<Arc<dyn OutputSink>>);

impl MultiSink {
    pub fn new(sinks: Vec<Arc<dyn OutputSink>>) -> Self {
        Self(sinks)
    }
}

impl OutputSink for MultiSink {
    fn write(&self, data: &[u8]) -> io::Result<()> {
        for sink in &self.0 {
            sink.write(data)?;
        }
        Ok(())
    }
}

/// The bytes fed to a child's stdin once it is spawned.
///
/// `Bytes` covers the common finite case (a prompt payload known up front);
/// `Reader` covers an open-ended/infinite stream by pulling chunks from a
/// blocking `Read` on a dedicated blocking task.
#[derive(Clone)]
pub enum StdinSource {
    Bytes(Arc<[u8]>),
    Reader(Arc<Mutex<dyn Read + Send>>),
}

impl StdinSource {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        StdinSource::Bytes(Arc::from(data.into().into_boxed_slice()))
    }

    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        StdinSource::Reader(Arc::new(Mutex::new(reader)))
    }
}

impl std::fmt::Debug for StdinSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StdinSource::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            StdinSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BoundedBuffer;

    #[test]
    fn multi_sink_fans_out_to_every_member() {
        let a = BoundedBuffer::new(64);
        let b = BoundedBuffer::new(64);
        let multi = MultiSink::new(vec![
            Arc::new(a.clone()) as Arc<dyn OutputSink>,
            Arc::new(b.clone()) as Arc<dyn OutputSink>,
        ]);
        multi.write(b"hello").unwrap();
        assert_eq!(a.bytes(), b"hello");
        assert_eq!(b.bytes(), b"hello");
    }

    #[test]
    fn stdin_source_from_bytes_round_trips() {
        let source = StdinSource::from_bytes(b"piped input\n".to_vec());
        match source {
            StdinSource::Bytes(b) => assert_eq!(&*b, b"piped input\n"),
            StdinSource::Reader(_) => panic!("expected Bytes variant"),
        }
    }
}
