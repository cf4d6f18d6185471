use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Child;
use tracing::{debug, warn};

/// Longer lines are split into chunks of this size
pub const MAX_LINE_BYTES: usize = 8 * 1024;

/// Consecutive read errors tolerated before a pipe is abandoned
const MAX_READ_ERRORS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of captured service output
#[derive(Debug, Clone, Serialize)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub at: DateTime<Local>,
    pub line: String,
}

/// Bounded ring of the most recent output lines of a service
///
/// Clones share the same buffer. The buffer outlives individual processes so
/// the output of a crashed instance stays readable after a restart.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    lines: Arc<Mutex<VecDeque<OutputLine>>>,
    capacity: usize,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, stream: OutputStream, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(OutputLine {
            stream,
            at: Local::now(),
            line,
        });
    }

    /// Copy of the buffered lines, oldest first
    pub fn lines(&self) -> Vec<OutputLine> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Take the child's stdout/stderr pipes and drain them into `buffer`
///
/// Reader tasks end on their own once the process closes its pipes.
pub fn capture_output(name: &str, child: &mut Child, buffer: &OutputBuffer) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump(
            name.to_string(),
            OutputStream::Stdout,
            stdout,
            buffer.clone(),
        ));
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump(
            name.to_string(),
            OutputStream::Stderr,
            stderr,
            buffer.clone(),
        ));
    }
}

/// Drain one pipe until EOF
///
/// Bytes are decoded lossily so undecodable output never stops the reader;
/// a closed pipe would kill the child on its next write.
async fn pump<R>(name: String, stream: OutputStream, reader: R, buffer: OutputBuffer)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut chunk = Vec::with_capacity(256);
    let mut errors = 0;

    loop {
        chunk.clear();
        let limit = MAX_LINE_BYTES as u64;

        match (&mut reader).take(limit).read_until(b'\n', &mut chunk).await {
            Ok(0) => break,
            Ok(_) => {
                errors = 0;
                let line = decode_line(&chunk);
                debug!(service = %name, ?stream, "{}", line);
                buffer.push(stream, line);
            }
            Err(e) => {
                errors += 1;
                if errors >= MAX_READ_ERRORS {
                    warn!("Giving up on {:?} of service {}: {}", stream, name, e);
                    break;
                }
                debug!(service = %name, ?stream, "Read error: {}", e);
            }
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
