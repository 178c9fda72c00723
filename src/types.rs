use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Canonical action identifier type used throughout the crate.
pub type ActionId = String;

/// Status of a single action.
///
/// `Ready` is a derived view computed by the dependency engine and is never
/// stored. `Running` is stored only while an executor call is in flight, so
/// that an interrupted run can be detected on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Blocked,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Ready => "ready",
            Status::Running => "running",
            Status::Succeeded => "succeeded",
            Status::Failed => "failed",
            Status::Blocked => "blocked",
        }
    }

    /// Whether this status may appear in a persisted snapshot.
    pub fn is_persistable(self) -> bool {
        !matches!(self, Status::Ready)
    }

    /// `Failed` and `Blocked` both stop every downstream action.
    pub fn is_obstruction(self) -> bool {
        matches!(self, Status::Failed | Status::Blocked)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Pending
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "ready" => Ok(Status::Ready),
            "running" => Ok(Status::Running),
            "succeeded" | "done" => Ok(Status::Succeeded),
            "failed" => Ok(Status::Failed),
            "blocked" => Ok(Status::Blocked),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Order in which the actions of one ready batch are dispatched.
///
/// - `Declared`: dependency (topological) order of the plan.
/// - `Shuffled`: random order, to shake out dependencies nobody declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOrder {
    Declared,
    Shuffled,
}

impl Default for DispatchOrder {
    fn default() -> Self {
        DispatchOrder::Declared
    }
}

impl FromStr for DispatchOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "declared" => Ok(DispatchOrder::Declared),
            "shuffled" => Ok(DispatchOrder::Shuffled),
            other => Err(format!(
                "invalid dispatch_order: {other} (expected \"declared\" or \"shuffled\")"
            )),
        }
    }
}

/// How a ready batch is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One action at a time, waiting for each result.
    Sequential,
    /// Every action of the batch at once, joined before recomputing.
    Concurrent,
}

impl Default for DispatchMode {
    fn default() -> Self {
        DispatchMode::Sequential
    }
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(DispatchMode::Sequential),
            "concurrent" => Ok(DispatchMode::Concurrent),
            other => Err(format!(
                "invalid dispatch_mode: {other} (expected \"sequential\" or \"concurrent\")"
            )),
        }
    }
}

/// Parse a duration string such as `"500ms"`, `"30s"`, `"10m"` or `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_suffixes() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration(" 1h "), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("18446744073709551615h").is_err());
        assert!(parse_duration("307445734561825861m").is_err());
    }

    #[test]
    fn status_round_trips_through_its_label() {
        for status in [
            Status::Pending,
            Status::Ready,
            Status::Running,
            Status::Succeeded,
            Status::Failed,
            Status::Blocked,
        ] {
            assert_eq!(status.as_str().parse::<Status>(), Ok(status));
        }
        assert!(!Status::Ready.is_persistable());
        assert!(Status::Blocked.is_obstruction());
    }
}
