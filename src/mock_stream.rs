use std::cell::RefCell;
use std::cmp::min;
use std::io::{Error, ErrorKind, Read, Result, Write};
use std::rc::Rc;

/// A scripted stream: reads come from a fixed buffer, writes are captured.
///
/// The captured writes are shared so that tests can still inspect them after the client has
/// dropped the stream.
#[derive(Debug, Default)]
pub struct MockStream {
    read_buf: Vec<u8>,
    read_pos: usize,
    written_buf: Rc<RefCell<Vec<u8>>>,
    err_on_read: bool,
    err_on_write: bool,
    eof_on_read: bool,
    read_delay: usize,
}

impl MockStream {
    pub fn new(read_buf: Vec<u8>) -> MockStream {
        MockStream::default().with_buf(read_buf)
    }

    pub fn with_buf(mut self, read_buf: Vec<u8>) -> MockStream {
        self.read_buf = read_buf;
        self
    }

    pub fn with_eof(mut self) -> MockStream {
        self.eof_on_read = true;
        self
    }

    pub fn with_err(mut self) -> MockStream {
        self.err_on_read = true;
        self
    }

    pub fn with_write_err(mut self) -> MockStream {
        self.err_on_write = true;
        self
    }

    /// Hand out bytes one at a time for the first read, like a slow peer.
    pub fn with_delay(mut self) -> MockStream {
        self.read_delay = 1;
        self
    }

    pub fn written(&self) -> Rc<RefCell<Vec<u8>>> {
        Rc::clone(&self.written_buf)
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.eof_on_read {
            return Ok(0);
        }
        if self.err_on_read {
            return Err(Error::new(ErrorKind::Other, "MockStream Error"));
        }
        if self.read_pos >= self.read_buf.len() {
            return Ok(0);
        }
        let mut write_len = min(buf.len(), self.read_buf.len() - self.read_pos);
        if self.read_delay > 0 {
            self.read_delay -= 1;
            write_len = min(write_len, 1);
        }
        let max_pos = self.read_pos + write_len;
        buf[..write_len].copy_from_slice(&self.read_buf[self.read_pos..max_pos]);
        self.read_pos = max_pos;
        Ok(write_len)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.err_on_write {
            return Err(Error::new(ErrorKind::BrokenPipe, "MockStream Error"));
        }
        self.written_buf.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
