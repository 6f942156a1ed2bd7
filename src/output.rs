//! Text output targets shared by the console reporter and the health poller

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Writer that can be shared between tasks
pub type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Wrap any writer for sharing
pub fn shared(writer: impl Write + Send + 'static) -> SharedWriter {
    Arc::new(Mutex::new(Box::new(writer)))
}

pub fn stdout() -> SharedWriter {
    shared(io::stdout())
}

pub fn stderr() -> SharedWriter {
    shared(io::stderr())
}

/// In-memory writer whose contents stay readable after it is handed out
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    /// Drain the buffer
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.inner.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// A [`SharedWriter`] appending to this buffer
    pub fn writer(&self) -> SharedWriter {
        shared(self.clone())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_buffer() {
        let buffer = SharedBuffer::new();
        let writer = buffer.writer();
        writeln!(writer.lock(), "hello").unwrap();

        assert_eq!(buffer.contents(), "hello\n");
        assert_eq!(buffer.take(), "hello\n");
        assert!(buffer.contents().is_empty());
    }
}
