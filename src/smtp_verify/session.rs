use std::io;
use std::time::{Duration, Instant};

use tracing::debug;

use super::error::ReplyError;
use super::transport::{Connector, Transport};
use super::types::SmtpReply;

const MAX_LINE_LEN: usize = 4096;

/// One SMTP connection in strict send/receive lockstep. Bytes read past the
/// end of a reply stay buffered for the next [`read_reply`](Self::read_reply).
pub(crate) struct SmtpSession<T: Transport> {
    host: String,
    transport: T,
    buffer: Vec<u8>,
    closed: bool,
}

impl<T: Transport> SmtpSession<T> {
    pub(crate) fn new(host: &str, transport: T) -> Self {
        Self {
            host: host.to_string(),
            transport,
            buffer: Vec::new(),
            closed: false,
        }
    }

    pub(crate) fn connect<C>(
        connector: &C,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> io::Result<Self>
    where
        C: Connector<Stream = T> + ?Sized,
    {
        let transport = connector.connect(host, port, timeout)?;
        Ok(Self::new(host, transport))
    }

    /// Commands carrying a bare CR or LF are refused before anything is
    /// written, so one call can never put two commands on the wire.
    pub(crate) fn send_command(&mut self, command: &str) -> io::Result<()> {
        if command.contains(['\r', '\n']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "line break inside SMTP command",
            ));
        }
        debug!(host = %self.host, "C: {command}");
        let mut line = command.as_bytes().to_vec();
        line.extend_from_slice(b"\r\n");
        self.transport.write_all(&line)?;
        self.transport.flush()
    }

    /// Wait up to `timeout` in total for a complete reply. Continuation lines
    /// (`250-...`) are collected until a line with a space, or nothing, after
    /// the code.
    pub(crate) fn read_reply(&mut self, timeout: Duration) -> Result<SmtpReply, ReplyError> {
        let deadline = Instant::now() + timeout;
        let mut lines = Vec::new();
        loop {
            let line = self.read_line(deadline)?;
            let (code, last, text) = parse_reply_line(&line)?;
            lines.push(text.to_string());
            if last {
                let reply = SmtpReply { code, lines };
                debug!(host = %self.host, "S: {reply}");
                return Ok(reply);
            }
        }
    }

    /// Shut the transport down. Safe to call more than once.
    pub(crate) fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.transport.shutdown() {
            debug!(host = %self.host, error = %err, "shutdown failed");
        }
    }

    fn read_line(&mut self, deadline: Instant) -> Result<String, ReplyError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            if self.buffer.len() > MAX_LINE_LEN {
                return Err(ReplyError::Malformed(format!(
                    "line exceeds {MAX_LINE_LEN} bytes"
                )));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ReplyError::Timeout);
            }
            self.transport
                .set_read_timeout(Some(remaining))
                .map_err(ReplyError::io)?;

            let mut chunk = [0u8; 512];
            match self.transport.read(&mut chunk) {
                Ok(0) => return Err(ReplyError::ConnectionClosed),
                Ok(read) => self.buffer.extend_from_slice(&chunk[..read]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(ReplyError::io(err)),
            }
        }
    }
}

impl<T: Transport> Drop for SmtpSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn parse_reply_line(line: &str) -> Result<(u16, bool, &str), ReplyError> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(ReplyError::Malformed(format!("not a status line: '{line}'")));
    }
    let code = line[..3]
        .parse::<u16>()
        .map_err(|_| ReplyError::Malformed(format!("invalid status code: '{line}'")))?;
    match bytes.get(3) {
        None => Ok((code, true, "")),
        Some(b' ') => Ok((code, true, &line[4..])),
        Some(b'-') => Ok((code, false, &line[4..])),
        Some(_) => Err(ReplyError::Malformed(format!("bad separator: '{line}'"))),
    }
}
