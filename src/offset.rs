//! Timeline offsets.
//!
//! An `Offset` is a point on the rendering timeline in seconds. The special
//! `BEFORE_ZERO` offset holds the baseline tree and is never addressable by
//! callers.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// A totally ordered point on the timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Offset(f64);

impl Offset {
    /// The baseline sentinel, ordered before every other offset.
    pub const BEFORE_ZERO: Offset = Offset(f64::NEG_INFINITY);

    /// Time zero, always present on a fresh timeline.
    pub const ZERO: Offset = Offset(0.0);

    /// Validate a caller-supplied offset. Negative, NaN and infinite values
    /// are rejected.
    pub fn new(seconds: f64) -> Result<Offset, SessionError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(SessionError::InvalidOffset { offset: seconds });
        }
        // Fold -0.0 into 0.0 so total ordering agrees with equality.
        Ok(Offset(seconds + 0.0))
    }

    pub fn seconds(self) -> f64 {
        self.0
    }

    pub fn is_before_zero(self) -> bool {
        self.0 == f64::NEG_INFINITY
    }

    /// Offset `seconds` later than this one.
    pub fn after(self, seconds: f64) -> Result<Offset, SessionError> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(SessionError::InvalidOffset { offset: self.0 + seconds });
        }
        Offset::new(self.0 + seconds)
    }
}

impl PartialEq for Offset {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Offset {}

impl PartialOrd for Offset {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Offset {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_before_zero() {
            write!(f, "-inf")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
