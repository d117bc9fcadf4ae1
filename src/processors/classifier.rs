//! Peak-based event classification on a normalized signal.
//!
//! The classifier re-baselines the signal on its first sample, optionally
//! restricts the search to a distance window, and selects one representative
//! peak according to the [`ClassificationMode`].

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::peaks::{find_peaks, Peak, PeakCriteria};
use crate::core::trace::SignalPoint;

/// Default minimum prominence for event peaks.
pub const DEFAULT_PROMINENCE: f64 = 3.0;

/// Errors that can occur during classification.
#[derive(Debug, Error, PartialEq)]
pub enum ClassifierError {
    #[error("invalid classification mode '{0}' (expected 'E' or 'C')")]
    InvalidMode(String),

    #[error("invalid distance range [{min}, {max}]")]
    InvalidRange { min: f64, max: f64 },

    #[error("invalid {name} threshold: {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
}

/// Result type for classifier operations.
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Tie-break policy between candidate peaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClassificationMode {
    /// Earliest peak along the fiber (`'E'`).
    #[default]
    #[serde(rename = "E", alias = "edge")]
    EdgeEvent,
    /// Highest peak in the window (`'C'`).
    #[serde(rename = "C", alias = "continuous")]
    ContinuousEvent,
}

impl ClassificationMode {
    pub fn tag(self) -> char {
        match self {
            ClassificationMode::EdgeEvent => 'E',
            ClassificationMode::ContinuousEvent => 'C',
        }
    }
}

impl TryFrom<char> for ClassificationMode {
    type Error = ClassifierError;

    fn try_from(tag: char) -> Result<Self> {
        match tag.to_ascii_uppercase() {
            'E' => Ok(ClassificationMode::EdgeEvent),
            'C' => Ok(ClassificationMode::ContinuousEvent),
            _ => Err(ClassifierError::InvalidMode(tag.to_string())),
        }
    }
}

impl FromStr for ClassificationMode {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "e" | "edge" => Ok(ClassificationMode::EdgeEvent),
            "c" | "continuous" => Ok(ClassificationMode::ContinuousEvent),
            _ => Err(ClassifierError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for ClassificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationMode::EdgeEvent => write!(f, "edge"),
            ClassificationMode::ContinuousEvent => write!(f, "continuous"),
        }
    }
}

/// A classified event: position along the fiber and height above the first sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub position: f64,
    pub magnitude: f64,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.position, self.magnitude)
    }
}

/// Parameters of one classification call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierParams {
    pub mode: ClassificationMode,
    /// Inclusive `(min, max)` distance window.
    pub x_range: Option<(f64, f64)>,
    pub prominence: f64,
    pub height_threshold: Option<f64>,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            mode: ClassificationMode::EdgeEvent,
            x_range: None,
            prominence: DEFAULT_PROMINENCE,
            height_threshold: None,
        }
    }
}

impl ClassifierParams {
    pub fn new(mode: ClassificationMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn with_prominence(mut self, prominence: f64) -> Self {
        self.prominence = prominence;
        self
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height_threshold = Some(height);
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some((min, max)) = self.x_range {
            if min.is_nan() || max.is_nan() || min > max {
                return Err(ClassifierError::InvalidRange { min, max });
            }
        }
        if !self.prominence.is_finite() || self.prominence < 0.0 {
            return Err(ClassifierError::InvalidThreshold {
                name: "prominence",
                value: self.prominence,
            });
        }
        if let Some(h) = self.height_threshold {
            if h.is_nan() {
                return Err(ClassifierError::InvalidThreshold {
                    name: "height",
                    value: h,
                });
            }
        }
        Ok(())
    }
}

/// Locate one representative event in `signal`.
///
/// Amplitudes are measured relative to `signal[0]` regardless of any baseline
/// correction already applied to the trace. With a distance window, only
/// points inside `[min, max]` are searched.
///
/// # Returns
///
/// `Ok(None)` when the signal (or the window) is empty or no peak passes the
/// prominence and height filters.
///
/// # Errors
///
/// Fails on an inverted or NaN window, a negative or non-finite prominence,
/// or a NaN height threshold.
pub fn classify(signal: &[SignalPoint], params: &ClassifierParams) -> Result<Option<Event>> {
    params.validate()?;

    let Some(first) = signal.first() else {
        return Ok(None);
    };
    let base = first.attenuation;

    let region: Vec<(f64, f64)> = signal
        .iter()
        .filter(|p| match params.x_range {
            Some((min, max)) => p.distance >= min && p.distance <= max,
            None => true,
        })
        .map(|p| (p.distance, p.attenuation - base))
        .collect();

    if region.is_empty() {
        debug!("classification window {:?} contains no points", params.x_range);
        return Ok(None);
    }

    let heights: Vec<f64> = region.iter().map(|&(_, y)| y).collect();
    let criteria = PeakCriteria {
        prominence: params.prominence,
        height: params.height_threshold,
    };
    let candidates = find_peaks(&heights, &criteria);

    debug!(
        "{} candidate peaks in {} points ({} mode)",
        candidates.len(),
        region.len(),
        params.mode
    );

    let chosen = match params.mode {
        ClassificationMode::EdgeEvent => earliest(&candidates, &region),
        ClassificationMode::ContinuousEvent => highest(&candidates),
    };

    Ok(chosen.map(|peak| Event {
        position: region[peak.index].0,
        magnitude: peak.height,
    }))
}

/// Smallest position wins; the earlier index wins ties.
fn earliest<'a>(candidates: &'a [Peak], region: &[(f64, f64)]) -> Option<&'a Peak> {
    candidates
        .iter()
        .min_by(|a, b| region[a.index].0.total_cmp(&region[b.index].0))
}

/// Greatest height wins; the earlier index wins ties.
fn highest(candidates: &[Peak]) -> Option<&Peak> {
    candidates.iter().fold(None, |best: Option<&Peak>, peak| match best {
        Some(b) if b.height >= peak.height => Some(b),
        _ => Some(peak),
    })
}
