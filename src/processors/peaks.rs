//! Local-maximum search with topographic prominence.

/// A detected peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Index into the searched sequence.
    pub index: usize,
    /// Value at the peak.
    pub height: f64,
    /// Height above the higher of the two bounding valleys.
    pub prominence: f64,
}

/// Thresholds a local maximum must meet to be reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakCriteria {
    /// Minimum prominence (inclusive).
    pub prominence: f64,
    /// Minimum height (inclusive); `None` disables the height filter.
    pub height: Option<f64>,
}

impl Default for PeakCriteria {
    fn default() -> Self {
        Self {
            prominence: 0.0,
            height: None,
        }
    }
}

/// Indices of all local maxima in `y`.
///
/// A maximum must rise strictly from its left neighbour and fall strictly to
/// the next differing sample on its right. A flat run counts once, at its
/// middle sample (the lower middle for even-length runs). The first and last
/// samples are never maxima.
pub fn local_maxima(y: &[f64]) -> Vec<usize> {
    let n = y.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let i_max = n - 1;
    let mut i = 1;
    while i < i_max {
        if y[i - 1] < y[i] {
            let mut ahead = i + 1;
            while ahead < i_max && y[ahead] == y[i] {
                ahead += 1;
            }
            if y[ahead] < y[i] {
                let left_edge = i;
                let right_edge = ahead - 1;
                peaks.push((left_edge + right_edge) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    peaks
}

/// Prominence of the sample at `peak`.
///
/// Walks outward in both directions until the signal rises strictly above the
/// peak (or ends), tracking the lowest point on each side. The reference level
/// is the higher of those two minima.
pub fn peak_prominence(y: &[f64], peak: usize) -> f64 {
    let height = y[peak];

    let mut left_min = height;
    for &v in y[..=peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &y[peak..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}

/// Find all peaks of `y` meeting `criteria`, in index order.
///
/// # Example
///
/// ```
/// use otdr_trace::processors::peaks::{find_peaks, PeakCriteria};
///
/// let y = [0.0, 1.0, 0.0, 5.0, 0.0];
/// let criteria = PeakCriteria { prominence: 3.0, height: None };
/// let peaks = find_peaks(&y, &criteria);
/// assert_eq!(peaks.len(), 1);
/// assert_eq!(peaks[0].index, 3);
/// ```
pub fn find_peaks(y: &[f64], criteria: &PeakCriteria) -> Vec<Peak> {
    local_maxima(y)
        .into_iter()
        .map(|index| Peak {
            index,
            height: y[index],
            prominence: peak_prominence(y, index),
        })
        .filter(|p| p.prominence >= criteria.prominence)
        .filter(|p| criteria.height.map_or(true, |h| p.height >= h))
        .collect()
}
