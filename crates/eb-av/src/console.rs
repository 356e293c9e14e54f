//! ffmpeg diagnostic-stream parsing.
//!
//! ffmpeg writes one `\n`-terminated line per log message on stderr but
//! rewrites its progress line in place with a bare `\r`. [`ConsoleLineCodec`]
//! treats both as line ends so a progress update is delivered as soon as it
//! is printed. [`parse_progress`] turns a `frame=...` line into an
//! [`EncodingProgress`], and [`RingLogBuffer`] keeps the tail of the stream
//! for error reporting.

use std::collections::VecDeque;
use std::sync::LazyLock;
use std::time::Duration;

use bytes::BytesMut;
use regex::Regex;
use tokio_util::codec::Decoder;

use eb_core::EncodingProgress;

/// Default number of diagnostic lines kept by [`RingLogBuffer`].
pub const DEFAULT_RING_CAPACITY: usize = 5;

static BLANKS_AFTER_EQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\s+").expect("literal regex"));
static SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)([a-zA-Z]+)").expect("literal regex"));

/// Why a progress line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    #[error("invalid key=value pair: {0:?}")]
    MalformedToken(String),
    #[error("invalid size: {0:?}")]
    InvalidSize(String),
}

// ---------------------------------------------------------------------------
// Line splitting
// ---------------------------------------------------------------------------

/// Splits a byte stream on `\n`, `\r\n` and lone `\r`.
///
/// A `\r` that is the last buffered byte ends a line immediately instead of
/// waiting to see whether `\n` follows; the stray `\n`, if it arrives, then
/// yields an empty line which is skipped. Lines are decoded as lossy UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLineCodec;

impl ConsoleLineCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ConsoleLineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        loop {
            let Some(end) = src.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                return Ok(None);
            };
            let terminator_len = if src[end] == b'\r' && src.get(end + 1) == Some(&b'\n') {
                2
            } else {
                1
            };
            let line = src.split_to(end + terminator_len);
            if end == 0 {
                continue;
            }
            return Ok(Some(String::from_utf8_lossy(&line[..end]).into_owned()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split_to(src.len());
        Ok(Some(String::from_utf8_lossy(&rest).into_owned()))
    }
}

// ---------------------------------------------------------------------------
// Ring buffer
// ---------------------------------------------------------------------------

/// Fixed-capacity log of the most recent lines. Newest overwrites oldest.
#[derive(Debug, Clone)]
pub struct RingLogBuffer {
    capacity: usize,
    lines: VecDeque<String>,
}

impl RingLogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Retained lines, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Retained lines joined with `\n`, oldest first.
    pub fn joined(&self) -> String {
        self.iter().collect::<Vec<_>>().join("\n")
    }
}

impl Default for RingLogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Progress parsing
// ---------------------------------------------------------------------------

/// Whether ffmpeg printed this line as a progress update.
pub fn is_progress_line(line: &str) -> bool {
    line.starts_with("frame")
}

/// Parse a progress line such as
/// `frame=   85 fps=0.0 q=28.0 size=       0kB time=00:00:01.04 bitrate=   0.4kbits/s speed=   2x`.
///
/// Values that fail to parse (`N/A`, negative times) leave the field at its
/// default. Only a token that is not a single `key=value` pair fails the line.
pub fn parse_progress(line: &str) -> Result<EncodingProgress, ConsoleError> {
    let collapsed = BLANKS_AFTER_EQ.replace_all(line.trim(), "=");
    let mut progress = EncodingProgress::default();

    for token in collapsed.split_whitespace() {
        let mut parts = token.split('=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ConsoleError::MalformedToken(token.to_string()));
        };

        match key {
            "frame" => {
                if let Ok(n) = value.parse() {
                    progress.frames = n;
                }
            }
            "fps" => {
                if let Some(n) = parse_fps(value) {
                    progress.fps = n;
                }
            }
            "q" => {
                if let Ok(q) = value.parse() {
                    progress.quality = q;
                }
            }
            "size" => {
                if let Ok(kb) = parse_size(value) {
                    progress.size = kb;
                }
            }
            "time" => {
                if let Some(t) = parse_clock(value) {
                    progress.time = t;
                }
            }
            "bitrate" => progress.bitrate = value.to_string(),
            "speed" => {
                if let Ok(s) = value.trim_end_matches('x').parse() {
                    progress.speed = s;
                }
            }
            _ => {}
        }
    }

    Ok(progress)
}

fn parse_fps(value: &str) -> Option<i32> {
    value
        .parse::<i32>()
        .ok()
        .or_else(|| value.parse::<f32>().ok().map(|f| f as i32))
}

/// Parse `HH:MM:SS[.ff]` into whole seconds.
fn parse_clock(value: &str) -> Option<Duration> {
    let mut fields = value.split(':');
    let hours: u64 = fields.next()?.parse().ok()?;
    let minutes: u64 = fields.next()?.parse().ok()?;
    let seconds = fields.next()?;
    if fields.next().is_some() {
        return None;
    }
    let whole: u64 = seconds.split('.').next()?.parse().ok()?;
    Some(Duration::from_secs(hours * 3600 + minutes * 60 + whole))
}

/// Convert an ffmpeg size (`10kB`, `3MiB`) into kilobytes.
pub fn parse_size(raw: &str) -> Result<i64, ConsoleError> {
    let invalid = || ConsoleError::InvalidSize(raw.to_string());
    let caps = SIZE.captures(raw).ok_or_else(invalid)?;
    let amount: i64 = caps[1].parse().map_err(|_| invalid())?;
    let multiplier = match caps[2].to_lowercase().as_str() {
        "kb" | "kib" => 1,
        "mb" | "mib" => 1024,
        "gb" | "gib" => 1024 * 1024,
        _ => return Err(invalid()),
    };
    amount.checked_mul(multiplier).ok_or_else(invalid)
}
