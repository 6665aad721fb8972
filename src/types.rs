// src/types.rs

//! Small value types shared between the watcher, the supervisor and config.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Kind of filesystem operation carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Write,
    Create,
    Remove,
    /// Permission / timestamp changes only.
    Metadata,
    /// Open, read or close without modification.
    Access,
    Other,
}

impl ChangeKind {
    /// Whether this kind of operation can change file contents.
    pub fn modifies_content(self) -> bool {
        matches!(self, ChangeKind::Write | ChangeKind::Create | ChangeKind::Remove)
    }
}

/// A single raw change reported by the filesystem monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

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
        .ok_or_else(|| format!("duration '{s}' is too large"))
}

/// Human-friendly rendering used in status lines and the stats report.
pub struct HumanDuration(pub Duration);

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.0;
        if d.as_secs() >= 3600 {
            let secs = d.as_secs();
            write!(f, "{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        } else if d.as_secs() >= 60 {
            let secs = d.as_secs();
            write!(f, "{}m{}s", secs / 60, secs % 60)
        } else if d.as_millis() >= 1000 {
            write!(f, "{:.2}s", d.as_secs_f64())
        } else {
            write!(f, "{}ms", d.as_millis())
        }
    }
}
