//! Timing-based response framing
//!
//! The oscillator firmware prints a variable number of diagnostic lines after
//! each command and never marks the end of its reply. A reply is therefore
//! considered complete once the line has been quiet for a short gap after at
//! least one line arrived. If nothing arrives before the overall timeout the
//! reply is empty, which is not an error.
//!
//! ```text
//!            line                  quiet >= quiescence
//!   Idle ──────────────▶ Collecting ─────────────────▶ Done
//!    │                      │ line (refresh clock)
//!    └──── timeout ─────────┴──────── timeout ────────▶ Done
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use tracing::trace;

/// Overall reply window used by the firmware's host tools
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Delay between byte-available checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Timing parameters for collecting one reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingConfig {
    /// Upper bound on the whole exchange
    pub timeout: Duration,
    /// Silence after the last line that ends the reply
    pub quiescence: Duration,
    /// Sleep between polls while nothing is buffered
    pub poll_interval: Duration,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_RESPONSE_TIMEOUT,
            quiescence: DEFAULT_POLL_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl FramingConfig {
    /// Config with a custom overall timeout and default gap/poll interval
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Lines collected for one command, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    lines: Vec<String>,
}

impl Response {
    /// Build a response from already-decoded lines
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// The collected lines
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// True when the device said nothing
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// True when any line contains `token`
    pub fn contains(&self, token: &str) -> bool {
        self.lines.iter().any(|line| line.contains(token))
    }

    /// All lines joined with `\n`
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lines.is_empty() {
            write!(f, "<no response>")
        } else {
            write!(f, "{}", self.lines.join(" | "))
        }
    }
}

/// Framing state for a reply in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Command sent, nothing kept yet
    Idle,
    /// At least one line kept, waiting for the line to go quiet
    Collecting,
    /// Reply complete
    Done,
}

/// Reply collector driven by caller-supplied timestamps
///
/// The caller reads whole lines from its channel and hands them over with
/// [`push_line`](Self::push_line); whenever the channel has nothing buffered
/// it calls [`poll`](Self::poll) and sleeps for the poll interval until the
/// state reaches [`FrameState::Done`].
#[derive(Debug)]
pub struct ResponseCollector {
    config: FramingConfig,
    started: Instant,
    last_activity: Instant,
    state: FrameState,
    lines: Vec<String>,
}

impl ResponseCollector {
    /// Start collecting a reply for a command written at `now`
    pub fn new(config: FramingConfig, now: Instant) -> Self {
        Self {
            config,
            started: now,
            last_activity: now,
            state: FrameState::Idle,
            lines: Vec::new(),
        }
    }

    /// Current framing state
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Timing parameters in use
    pub fn config(&self) -> &FramingConfig {
        &self.config
    }

    /// Feed one raw line read from the channel
    ///
    /// Undecodable and blank lines are dropped, but still count as line
    /// activity for the quiescence clock.
    pub fn push_line(&mut self, raw: &[u8], now: Instant) {
        if self.state == FrameState::Done {
            return;
        }
        self.last_activity = now;

        match std::str::from_utf8(raw) {
            Ok(text) => {
                let line = text.trim();
                if !line.is_empty() {
                    trace!("rx line: {:?}", line);
                    self.lines.push(line.to_string());
                    self.state = FrameState::Collecting;
                }
            }
            Err(_) => trace!("dropping undecodable line ({} bytes)", raw.len()),
        }

        if self.timed_out(now) {
            self.state = FrameState::Done;
        }
    }

    /// Advance the state machine while the channel has nothing buffered
    pub fn poll(&mut self, now: Instant) -> FrameState {
        self.state = match self.state {
            FrameState::Idle if self.timed_out(now) => FrameState::Done,
            FrameState::Collecting
                if self.timed_out(now)
                    || now.saturating_duration_since(self.last_activity)
                        >= self.config.quiescence =>
            {
                FrameState::Done
            }
            state => state,
        };
        self.state
    }

    /// Consume the collector and return the lines kept so far
    pub fn finish(self) -> Response {
        Response::new(self.lines)
    }

    fn timed_out(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.config.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FramingConfig {
        FramingConfig {
            timeout: Duration::from_millis(100),
            quiescence: Duration::from_millis(10),
            poll_interval: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_silent_device_times_out_empty() {
        let t0 = Instant::now();
        let mut collector = ResponseCollector::new(config(), t0);

        assert_eq!(collector.poll(t0 + Duration::from_millis(50)), FrameState::Idle);
        assert_eq!(collector.poll(t0 + Duration::from_millis(100)), FrameState::Done);

        let response = collector.finish();
        assert!(response.is_empty());
    }

    #[test]
    fn test_quiescence_ends_reply() {
        let t0 = Instant::now();
        let mut collector = ResponseCollector::new(config(), t0);

        collector.push_line(b"Freq: 900.000 MHz\r\n", t0 + Duration::from_millis(3));
        assert_eq!(collector.state(), FrameState::Collecting);
        collector.push_line(b"Power: +5 dBm\r\n", t0 + Duration::from_millis(6));

        // Not quiet long enough yet
        assert_eq!(
            collector.poll(t0 + Duration::from_millis(12)),
            FrameState::Collecting
        );
        assert_eq!(collector.poll(t0 + Duration::from_millis(16)), FrameState::Done);

        let response = collector.finish();
        assert_eq!(response.lines(), ["Freq: 900.000 MHz", "Power: +5 dBm"]);
    }

    #[test]
    fn test_undecodable_and_blank_lines_dropped() {
        let t0 = Instant::now();
        let mut collector = ResponseCollector::new(config(), t0);

        collector.push_line(&[0xFF, 0xFE, b'\n'], t0);
        collector.push_line(b"   \r\n", t0);
        assert_eq!(collector.state(), FrameState::Idle);

        collector.push_line(b"Prog: R0=0x00580000\n", t0);
        assert_eq!(collector.finish().lines(), ["Prog: R0=0x00580000"]);
    }

    #[test]
    fn test_chatty_device_bounded_by_timeout() {
        let t0 = Instant::now();
        let mut collector = ResponseCollector::new(config(), t0);

        for ms in (0..=100).step_by(5) {
            collector.push_line(b"debug", t0 + Duration::from_millis(ms));
        }
        assert_eq!(collector.state(), FrameState::Done);
    }

    #[test]
    fn test_lines_after_done_ignored() {
        let t0 = Instant::now();
        let mut collector = ResponseCollector::new(config(), t0);
        collector.push_line(b"ok", t0);
        collector.poll(t0 + Duration::from_millis(20));

        collector.push_line(b"late", t0 + Duration::from_millis(21));
        assert_eq!(collector.finish().lines(), ["ok"]);
    }

    #[test]
    fn test_response_contains_and_display() {
        let response = Response::new(vec!["ERR: out of range".into()]);
        assert!(response.contains("ERR"));
        assert!(!response.contains("MHz"));
        assert_eq!(response.to_string(), "ERR: out of range");
        assert_eq!(Response::default().to_string(), "<no response>");
    }
}
