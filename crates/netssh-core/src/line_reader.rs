//! Line reader (C4): wraps a non-blocking shell channel, maintaining a rolling
//! tail buffer bounded by both chunk count and character budget so regex
//! matching on long-running command output never re-scans the whole transcript.
//! Grounded on `base_connection.rs`'s `read_channel`/`send_command` read loop
//! (the `VecDeque<String>` "past N reads" buffer, `normalize_linefeeds`,
//! `strip_ansi_escape_codes`) and `channel.rs`'s non-blocking read error handling.

use crate::error::CoreError;
use crate::patterns::{ANSI_ESCAPE_PATTERN, CRLF_PATTERN};
use regex::Regex;
use ssh2::Channel;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::debug;

/// Upper bound on the total characters retained across the sliding window;
/// matches the order of magnitude `base_connection.rs` uses for its own
/// "past N reads" cap, scaled down since reads are normalized per-chunk here.
const TAIL_CHAR_BUDGET: usize = 262_144;
/// Upper bound on the number of chunks kept regardless of their size.
const TAIL_CHUNK_BUDGET: usize = 64;
const READ_CHUNK_SIZE: usize = 16384;

/// Result of a `read_until` call.
pub enum ReadOutcome {
    Matched { buf: String, matched_at: usize },
    TimedOut { buf: String },
}

/// A rolling byte buffer over a shell channel's stdout, normalized to `\n` line
/// endings as bytes arrive and tracking the last-activity instant for quiet
/// detection.
pub struct LineReader {
    tail: VecDeque<String>,
    tail_chars: usize,
    last_activity: Instant,
    raw_buf: [u8; READ_CHUNK_SIZE],
}

impl LineReader {
    pub fn new() -> Self {
        Self {
            tail: VecDeque::with_capacity(TAIL_CHUNK_BUDGET),
            tail_chars: 0,
            last_activity: Instant::now(),
            raw_buf: [0u8; READ_CHUNK_SIZE],
        }
    }

    /// Removes CSI escape sequences. Never increases byte length.
    pub fn strip_ansi(data: &str) -> String {
        ANSI_ESCAPE_PATTERN.replace_all(data, "").to_string()
    }

    /// Converts CRLF (and bare CR) to bare LF. Idempotent.
    pub fn normalize_crlf(data: &str) -> String {
        CRLF_PATTERN.replace_all(data, "\n").to_string()
    }

    fn push_chunk(&mut self, chunk: String) {
        self.tail_chars += chunk.chars().count();
        self.tail.push_back(chunk);
        while self.tail.len() > TAIL_CHUNK_BUDGET || self.tail_chars > TAIL_CHAR_BUDGET {
            if let Some(front) = self.tail.pop_front() {
                self.tail_chars = self.tail_chars.saturating_sub(front.chars().count());
            } else {
                break;
            }
        }
        self.last_activity = Instant::now();
    }

    /// The current tail as one contiguous string (sliding window only — older
    /// data evicted per the chunk/char budget above, never the whole transcript).
    pub fn tail_str(&self) -> String {
        self.tail.iter().map(String::as_str).collect()
    }

    fn drain_available(&mut self, channel: &mut Channel) -> Result<bool, CoreError> {
        let mut read_any = false;
        loop {
            match channel.read(&mut self.raw_buf) {
                Ok(0) => {
                    if channel.eof() {
                        return Err(CoreError::ChannelOpFailed(
                            "channel stream closed by remote device".into(),
                        ));
                    }
                    break;
                }
                Ok(n) => {
                    read_any = true;
                    let chunk = match std::str::from_utf8(&self.raw_buf[..n]) {
                        Ok(s) => s.to_string(),
                        Err(_) => String::from_utf8_lossy(&self.raw_buf[..n]).to_string(),
                    };
                    let chunk = Self::normalize_crlf(&chunk);
                    self.push_chunk(chunk);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(CoreError::IoError(e)),
            }
        }
        Ok(read_any)
    }

    /// Returns as soon as `predicate(tail)` is true, else on `hard_deadline`.
    pub fn read_until(
        &mut self,
        channel: &mut Channel,
        predicate: impl Fn(&str) -> Option<usize>,
        poll_interval: Duration,
        hard_deadline: Duration,
    ) -> Result<ReadOutcome, CoreError> {
        let start = Instant::now();
        loop {
            self.drain_available(channel)?;
            let tail = self.tail_str();
            if let Some(idx) = predicate(&tail) {
                return Ok(ReadOutcome::Matched {
                    buf: tail,
                    matched_at: idx,
                });
            }
            if start.elapsed() >= hard_deadline {
                return Ok(ReadOutcome::TimedOut { buf: tail });
            }
            std::thread::sleep(poll_interval);
        }
    }

    /// Returns once no new bytes have arrived for `quiet_after` AND the tail
    /// matches `prompt`, otherwise keeps polling until `hard_deadline`.
    pub fn read_quiet(
        &mut self,
        channel: &mut Channel,
        prompt: &Regex,
        quiet_after: Duration,
        poll_interval: Duration,
        hard_deadline: Duration,
    ) -> Result<ReadOutcome, CoreError> {
        let start = Instant::now();
        loop {
            let read_any = self.drain_available(channel)?;
            let tail = self.tail_str();
            let quiet_long_enough = self.last_activity.elapsed() >= quiet_after;
            if !read_any && quiet_long_enough && prompt.is_match(&tail) {
                let matched_at = prompt.find(&tail).map(|m| m.start()).unwrap_or(tail.len());
                return Ok(ReadOutcome::Matched {
                    buf: tail,
                    matched_at,
                });
            }
            if start.elapsed() >= hard_deadline {
                return Ok(ReadOutcome::TimedOut { buf: tail });
            }
            std::thread::sleep(poll_interval);
        }
    }

    /// Writes `data` (already newline-terminated by the caller when needed).
    pub fn write(&mut self, channel: &mut Channel, data: &str) -> Result<(), CoreError> {
        channel
            .write_all(data.as_bytes())
            .map_err(|e| CoreError::ChannelOpFailed(format!("write: {}", e)))?;
        channel
            .flush()
            .map_err(|e| CoreError::ChannelOpFailed(format!("flush: {}", e)))
    }

    /// Drops a leading echoed command line from captured output, tolerating
    /// carriage-return fragmentation (the echoed line may arrive split across
    /// reads before normalization collapses it onto one line).
    pub fn strip_echoed_command(output: &str, command: &str) -> String {
        let trimmed = output.trim_start_matches('\n');
        if let Some(rest) = trimmed.strip_prefix(command) {
            rest.trim_start_matches('\n').to_string()
        } else {
            output.to_string()
        }
    }

    /// Clears the sliding window. Used between commands so the next command's
    /// prompt match isn't confused by the prior command's trailing prompt line
    /// still sitting in the tail.
    pub fn reset(&mut self) {
        self.tail.clear();
        self.tail_chars = 0;
        self.last_activity = Instant::now();
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_crlf_is_idempotent() {
        let once = LineReader::normalize_crlf("a\r\nb\r\nc");
        let twice = LineReader::normalize_crlf(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "a\nb\nc");
    }

    #[test]
    fn strip_ansi_never_grows() {
        let input = "\x1b[31mred\x1b[0m text";
        let out = LineReader::strip_ansi(input);
        assert!(out.len() <= input.len());
        assert_eq!(out, "red text");
    }

    #[test]
    fn strip_echoed_command_removes_leading_echo() {
        let out = LineReader::strip_echoed_command("show version\nVRP (R) software\n", "show version");
        assert_eq!(out, "VRP (R) software\n");
    }

    #[test]
    fn strip_echoed_command_leaves_output_untouched_when_no_match() {
        let out = LineReader::strip_echoed_command("unexpected output\n", "show version");
        assert_eq!(out, "unexpected output\n");
    }
}
