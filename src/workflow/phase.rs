//! Phase numbering, slugs, and phase directory lookup.

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::error::WorkflowError;
use crate::core::paths::{list_entries, safe_join, PHASES_DIR};

/// A roadmap phase number: an integer phase or an insertion after one.
///
/// Ordering is numeric: `6 < 6.1 < 6.2 < 7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseNumber {
    /// Primary sequence phase (`6`)
    Integer(u32),
    /// Inserted phase between `base` and `base + 1` (`6.1`)
    Decimal { base: u32, sub: u32 },
}

impl PhaseNumber {
    /// Integer part of the phase number.
    pub fn base(&self) -> u32 {
        match *self {
            Self::Integer(n) | Self::Decimal { base: n, .. } => n,
        }
    }

    /// Whether this is a primary-sequence phase.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer(_))
    }

    /// Directory name prefix: `06` or `06.1`.
    pub fn dir_prefix(&self) -> String {
        match *self {
            Self::Integer(n) => pad_phase(n),
            Self::Decimal { base, sub } => format!("{}.{sub}", pad_phase(base)),
        }
    }

    fn sort_key(&self) -> (u32, u32) {
        match *self {
            Self::Integer(n) => (n, 0),
            Self::Decimal { base, sub } => (base, sub),
        }
    }
}

impl Ord for PhaseNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for PhaseNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PhaseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal { base, sub } => write!(f, "{base}.{sub}"),
        }
    }
}

impl FromStr for PhaseNumber {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WorkflowError::Precondition(format!("Invalid phase number: '{s}'"));
        let s = s.trim();

        match s.split_once('.') {
            None => s.parse().map(Self::Integer).map_err(|_| invalid()),
            Some((base, sub)) => {
                let base = base.parse().map_err(|_| invalid())?;
                let sub: u32 = sub.parse().map_err(|_| invalid())?;
                if sub == 0 {
                    return Err(invalid());
                }
                Ok(Self::Decimal { base, sub })
            }
        }
    }
}

impl Serialize for PhaseNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::Integer(n) => serializer.serialize_u32(n),
            Self::Decimal { .. } => serializer.collect_str(self),
        }
    }
}

impl From<u32> for PhaseNumber {
    fn from(n: u32) -> Self {
        Self::Integer(n)
    }
}

/// Pad a phase number to two digits.
pub fn pad_phase(n: u32) -> String {
    format!("{n:02}")
}

/// Generate a directory-friendly slug from a phase name.
///
/// Lowercase ASCII alphanumerics separated by single hyphens; running the
/// result through again returns it unchanged.
pub fn generate_slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Locate a phase's artifact directory (`phases/{prefix}-*`).
pub fn find_phase_dir(planning_dir: &Path, number: PhaseNumber) -> Option<PathBuf> {
    let phases_dir = planning_dir.join(PHASES_DIR);
    let prefix = format!("{}-", number.dir_prefix());

    list_entries(&phases_dir)
        .into_iter()
        .filter(|name| name.starts_with(&prefix))
        .filter_map(|name| safe_join(&phases_dir, name).ok())
        .find(|path| path.is_dir())
}
