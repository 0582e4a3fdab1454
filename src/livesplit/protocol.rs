//! LiveSplit Server text protocol

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Commands understood by the LiveSplit Server component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerCommand {
    StartTimer,
    Split,
    Reset,
    PauseGameTime,
    UnpauseGameTime,
    GetCurrentTime,
    GetFinalTime,
    GetCurrentTimerPhase,
}

impl TimerCommand {
    /// Wire name of the command
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerCommand::StartTimer => "starttimer",
            TimerCommand::Split => "split",
            TimerCommand::Reset => "reset",
            TimerCommand::PauseGameTime => "pausegametime",
            TimerCommand::UnpauseGameTime => "unpausegametime",
            TimerCommand::GetCurrentTime => "getcurrenttime",
            TimerCommand::GetFinalTime => "getfinaltime",
            TimerCommand::GetCurrentTimerPhase => "getcurrenttimerphase",
        }
    }

    /// Whether the server answers this command with a line
    pub fn expects_response(&self) -> bool {
        matches!(
            self,
            TimerCommand::GetCurrentTime
                | TimerCommand::GetFinalTime
                | TimerCommand::GetCurrentTimerPhase
        )
    }

    /// Bytes sent on the wire, CRLF terminated
    pub fn to_line(&self) -> String {
        format!("{}\r\n", self.as_str())
    }
}

impl std::fmt::Display for TimerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The timer's own run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerPhase {
    NotRunning,
    Running,
    Paused,
    Ended,
}

/// Unrecognized phase string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPhase(pub String);

impl std::fmt::Display for UnknownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown timer phase '{}'", self.0)
    }
}

impl std::error::Error for UnknownPhase {}

impl FromStr for TimerPhase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NotRunning" => Ok(TimerPhase::NotRunning),
            "Running" => Ok(TimerPhase::Running),
            "Paused" => Ok(TimerPhase::Paused),
            "Ended" => Ok(TimerPhase::Ended),
            other => Err(UnknownPhase(other.to_string())),
        }
    }
}

/// Parse `H:MM:SS.cc`, `MM:SS.cc` or `SS.cc`.
///
/// The fractional part is in hundredths of a second. Anything else is `None`.
pub fn parse_time(time: &str) -> Option<Duration> {
    let time = time.trim();
    let colons = time.matches(':').count();

    let parts = time
        .split([':', '.'])
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;

    let (hours, minutes, seconds, centis) = match (colons, parts.as_slice()) {
        (0, &[s, cs]) => (0, 0, s, cs),
        (1, &[m, s, cs]) => (0, m, s, cs),
        (2, &[h, m, s, cs]) => (h, m, s, cs),
        _ => return None,
    };

    let total_secs = hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    let millis = centis.checked_mul(10)?;

    Some(Duration::from_secs(total_secs) + Duration::from_millis(millis))
}

/// Recognizes a reset performed on the timer itself.
///
/// A `NotRunning` observation directly after `Running` or `Ended` is a reset.
#[derive(Debug, Clone, Default)]
pub struct ResetDetector {
    previous: Option<TimerPhase>,
}

impl ResetDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a phase observation; returns true on a reset edge
    pub fn observe(&mut self, phase: TimerPhase) -> bool {
        let reset = phase == TimerPhase::NotRunning
            && matches!(self.previous, Some(TimerPhase::Running | TimerPhase::Ended));
        self.previous = Some(phase);
        reset
    }

    pub fn previous(&self) -> Option<TimerPhase> {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("12.34"), Some(Duration::from_millis(12_340)));
        assert_eq!(parse_time("1:02.50"), Some(Duration::from_millis(62_500)));
        assert_eq!(
            parse_time("2:03:04.05"),
            Some(Duration::from_millis(2 * 3_600_000 + 3 * 60_000 + 4_000 + 50))
        );
        assert_eq!(parse_time(" 0.00\r\n"), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_time_malformed() {
        assert_eq!(parse_time("abc"), None);
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("12"), None);
        assert_eq!(parse_time("1:2:3:4.5"), None);
        assert_eq!(parse_time("1:.50"), None);
        assert_eq!(parse_time("-1.00"), None);
    }

    #[test]
    fn test_phase_parse() {
        assert_eq!("Running".parse::<TimerPhase>(), Ok(TimerPhase::Running));
        assert_eq!("NotRunning\r\n".parse::<TimerPhase>(), Ok(TimerPhase::NotRunning));
        assert!("Stopped".parse::<TimerPhase>().is_err());
    }

    #[test]
    fn test_command_lines() {
        assert_eq!(TimerCommand::PauseGameTime.to_line(), "pausegametime\r\n");
        assert!(!TimerCommand::Split.expects_response());
        assert!(TimerCommand::GetCurrentTimerPhase.expects_response());
    }

    #[test]
    fn test_reset_after_running() {
        let mut detector = ResetDetector::new();
        assert!(!detector.observe(TimerPhase::NotRunning));
        assert!(!detector.observe(TimerPhase::Running));
        assert!(detector.observe(TimerPhase::NotRunning));
        assert!(!detector.observe(TimerPhase::NotRunning));
    }

    #[test]
    fn test_reset_after_ended() {
        let mut detector = ResetDetector::new();
        detector.observe(TimerPhase::Ended);
        assert!(detector.observe(TimerPhase::NotRunning));
    }

    #[test]
    fn test_pause_resume_is_not_reset() {
        let mut detector = ResetDetector::new();
        let phases = [TimerPhase::Running, TimerPhase::Paused, TimerPhase::Running];
        assert!(phases.iter().all(|&p| !detector.observe(p)));
        assert_eq!(detector.previous(), Some(TimerPhase::Running));
    }
}
