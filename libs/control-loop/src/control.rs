use std::io::{ErrorKind, Read};
use std::path::Path;

use tokio::net::unix::pipe;

use crate::error::AgentError;
use crate::failover::Transition;

/// Operator code: switch to the backup cluster.
pub const FAIL_OVER_CODE: i64 = 999;
/// Operator code: switch back to the primary cluster.
pub const FAIL_BACK_CODE: i64 = 998;

// ═══════════════════════════════════════════════════════════════
//  Commands
// ═══════════════════════════════════════════════════════════════

/// Producer interpretation of a control code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerCommand {
    FailOver,
    FailBack,
    /// New target rate in messages per second. 0 pauses submission.
    SetRate(u32),
}

impl ProducerCommand {
    pub fn from_code(code: i64) -> Self {
        match code {
            FAIL_OVER_CODE => ProducerCommand::FailOver,
            FAIL_BACK_CODE => ProducerCommand::FailBack,
            n => ProducerCommand::SetRate(n.clamp(0, u32::MAX as i64) as u32),
        }
    }

    pub fn transition(self) -> Option<Transition> {
        match self {
            ProducerCommand::FailOver => Some(Transition::FailOver),
            ProducerCommand::FailBack => Some(Transition::FailBack),
            ProducerCommand::SetRate(_) => None,
        }
    }
}

/// Consumer interpretation of a control code. The consumer has no rate
/// to set, so every other value is a protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerCommand {
    FailOver,
    FailBack,
    Invalid(i64),
}

impl ConsumerCommand {
    pub fn from_code(code: i64) -> Self {
        match code {
            FAIL_OVER_CODE => ConsumerCommand::FailOver,
            FAIL_BACK_CODE => ConsumerCommand::FailBack,
            n => ConsumerCommand::Invalid(n),
        }
    }

    pub fn transition(self) -> Result<Transition, AgentError> {
        match self {
            ConsumerCommand::FailOver => Ok(Transition::FailOver),
            ConsumerCommand::FailBack => Ok(Transition::FailBack),
            ConsumerCommand::Invalid(n) => Err(AgentError::UnrecognizedCode(n)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  ControlChannel
// ═══════════════════════════════════════════════════════════════

/// Non-blocking reader of integer commands from the control pipe.
///
/// `R` must return `WouldBlock` instead of waiting when no bytes are
/// available. Each check yields at most one command; extra tokens stay
/// buffered for the following checks.
pub struct ControlChannel<R> {
    reader: R,
    pending: Vec<u8>,
}

impl ControlChannel<std::fs::File> {
    /// Open the FIFO at `path` read-write (so a missing writer never
    /// reads as end-of-file) in non-blocking mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let open_err = |source: std::io::Error| AgentError::ControlOpen {
            path: path.display().to_string(),
            source,
        };
        let receiver = pipe::OpenOptions::new()
            .read_write(true)
            .open_receiver(path)
            .map_err(open_err)?;
        let fd = receiver.into_nonblocking_fd().map_err(open_err)?;
        tracing::debug!(path = %path.display(), "control channel opened");
        Ok(Self::new(std::fs::File::from(fd)))
    }
}

impl<R: Read> ControlChannel<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
        }
    }

    /// Zero-wait check for one command code.
    ///
    /// Returns `Ok(None)` when nothing is readable or only whitespace
    /// arrived. A token that is not an integer is fatal.
    pub fn poll_code(&mut self) -> Result<Option<i64>, AgentError> {
        self.fill()?;
        let Some(token) = self.take_token() else {
            return Ok(None);
        };
        let code = std::str::from_utf8(&token)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| AgentError::MalformedCommand(String::from_utf8_lossy(&token).into_owned()))?;
        tracing::debug!(code, "control code received");
        Ok(Some(code))
    }

    /// Drain every byte available right now.
    fn fill(&mut self) -> Result<(), AgentError> {
        let mut buf = [0u8; 256];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(AgentError::ControlRead(e)),
            }
        }
    }

    /// Pop the first whitespace-delimited token. The end of the buffered
    /// bytes counts as a delimiter.
    fn take_token(&mut self) -> Option<Vec<u8>> {
        let start = self.pending.iter().position(|b| !b.is_ascii_whitespace());
        let Some(start) = start else {
            self.pending.clear();
            return None;
        };
        let end = self.pending[start..]
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .map_or(self.pending.len(), |i| start + i);
        let token = self.pending[start..end].to_vec();
        self.pending.drain(..end);
        Some(token)
    }
}
