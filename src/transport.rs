use bufstream::BufStream;
use std::io::{self, BufRead, Read, Write};
use std::result;
use tracing::{debug, trace};

use super::error::{Error, ErrorKind, Result};
use super::parse::{parse_status, unstuff};
use super::types::State;

const CR: u8 = 0x0d;
const LF: u8 = 0x0a;
const TERMINATOR: &[u8] = b".";

/// Longest line accepted from the server, including its line ending.
pub(crate) const MAX_LINE_LEN: usize = 64 * 1024;

/// Line framing over the byte stream of a single connection.
///
/// The stream is dropped as soon as a read or write fails, or when [`close`](Self::close) is
/// called. Every later call fails with [`ErrorKind::InvalidState`].
#[derive(Debug)]
pub(crate) struct Transport<T: Read + Write> {
    stream: Option<BufStream<T>>,
}

impl<T: Read + Write> Transport<T> {
    pub(crate) fn new(stream: T) -> Self {
        Transport {
            stream: Some(BufStream::new(stream)),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    pub(crate) fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("POP3 stream closed");
        }
    }

    fn stream(&mut self, op: &'static str) -> Result<&mut BufStream<T>> {
        self.stream
            .as_mut()
            .ok_or_else(|| Error::new(op, ErrorKind::InvalidState(State::Closed)))
    }

    fn fail(&mut self, op: &'static str, kind: ErrorKind) -> Error {
        if kind.is_fatal() {
            debug!(operation = op, error = %kind, "POP3 transport failure");
            self.close();
        }
        Error::new(op, kind)
    }

    /// Writes `line` followed by CRLF and flushes.
    pub(crate) fn write_line(&mut self, op: &'static str, line: &str) -> Result<()> {
        let stream = self.stream(op)?;
        let written = write_crlf_line(stream, line.as_bytes());
        written.map_err(|e| self.fail(op, ErrorKind::Write(e)))
    }

    /// Reads one status line and returns the text after `+OK`.
    ///
    /// `-ERR` lines become [`ErrorKind::Rejected`], anything else [`ErrorKind::Format`].
    pub(crate) fn read_status(&mut self, op: &'static str) -> Result<String> {
        let mut buf = Vec::new();
        let read = read_capped_line(self.stream(op)?, &mut buf);
        match read {
            Ok(0) => return Err(self.fail(op, ErrorKind::ConnectionLost)),
            Ok(_) => {}
            Err(e) => return Err(self.fail(op, ErrorKind::Read(e))),
        }

        // Status text is 7-bit in practice; stray 8-bit bytes become U+FFFD.
        let line = String::from_utf8_lossy(trim_line_ending(&buf));
        trace!("S: {}", line);
        parse_status(&line)
            .map(str::to_string)
            .map_err(|kind| Error::new(op, kind))
    }

    /// Reads the lines of a multi-line block, up to and excluding the terminating `.` line.
    ///
    /// Line endings are stripped and byte-stuffing is undone. If the stream fails or ends before
    /// the terminator, nothing read so far is returned.
    pub(crate) fn read_block_lines(&mut self, op: &'static str) -> Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        loop {
            let mut buf = Vec::new();
            let read = read_capped_line(self.stream(op)?, &mut buf);
            match read {
                Ok(0) => {
                    let eof = io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended before end of multi-line response",
                    );
                    return Err(self.fail(op, ErrorKind::BlockRead(eof)));
                }
                Ok(_) => {}
                Err(e) => return Err(self.fail(op, ErrorKind::BlockRead(e))),
            }

            let line = trim_line_ending(&buf);
            if line == TERMINATOR {
                break;
            }
            lines.push(unstuff(line).to_vec());
        }
        trace!("S: <{} lines>", lines.len());
        Ok(lines)
    }
}

/// Reads up to and including the next LF, failing with `InvalidData` once a line exceeds
/// [`MAX_LINE_LEN`].
fn read_capped_line<R: BufRead>(r: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    let read = r.by_ref().take(MAX_LINE_LEN as u64).read_until(LF, buf)?;
    if read == MAX_LINE_LEN && buf.last() != Some(&LF) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line longer than {} bytes", MAX_LINE_LEN),
        ));
    }
    Ok(read)
}

fn write_crlf_line<W: Write>(w: &mut W, line: &[u8]) -> io::Result<()> {
    w.write_all(line)?;
    w.write_all(&[CR, LF])?;
    w.flush()
}

/// Concatenates block lines, each followed by a single LF.
pub(crate) fn join_block(lines: Vec<Vec<u8>>) -> Vec<u8> {
    let mut block = Vec::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        block.extend_from_slice(&line);
        block.push(LF);
    }
    block
}

/// Strips a trailing CRLF, or a bare LF from servers that send one.
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(&[LF]).unwrap_or(line);
    line.strip_suffix(&[CR]).unwrap_or(line)
}

pub(crate) fn validate_line(text: &str) -> result::Result<(), ErrorKind> {
    if let Some(c) = text.chars().find(|&c| c == '\r' || c == '\n') {
        return Err(ErrorKind::InvalidArgument(format!(
            "line break {:?} in command argument",
            c
        )));
    }
    Ok(())
}
