//! Trace model: raw OTDR readings and the normalized signal derived from them.
//!
//! A [`Trace`] owns the raw `(position, amplitude)` pairs produced by a decoder
//! and a derived `(distance, attenuation)` signal. The signal always has one
//! point per reading and is rebuilt from scratch by [`Trace::extract_axis`].

use std::path::{Path, PathBuf};

use super::sections::{find_section, Section, SectionError, TraceMetadata, DATA_POINTS_SECTION};

/// A single acquisition sample in source units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Time or distance axis value.
    pub position: f64,
    /// Backscatter amplitude.
    pub amplitude: f64,
}

impl RawSample {
    #[inline]
    pub fn new(position: f64, amplitude: f64) -> Self {
        Self { position, amplitude }
    }
}

impl From<(f64, f64)> for RawSample {
    fn from((position, amplitude): (f64, f64)) -> Self {
        Self::new(position, amplitude)
    }
}

/// One point of the normalized signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalPoint {
    pub distance: f64,
    pub attenuation: f64,
}

impl SignalPoint {
    #[inline]
    pub fn new(distance: f64, attenuation: f64) -> Self {
        Self {
            distance,
            attenuation,
        }
    }
}

/// A named vertical marker on a signal plot.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub name: String,
    pub position: f64,
}

/// Parallel x/y series handed to exporters and plotting callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSeries {
    /// Distance axis.
    pub positions: Vec<f64>,
    /// Attenuation axis, same length as `positions`.
    pub attenuations: Vec<f64>,
    /// Optional named vertical markers.
    pub markers: Vec<Marker>,
}

impl SignalSeries {
    /// Number of points in the series.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Adds a named vertical marker at `position`.
    pub fn with_marker(mut self, name: impl Into<String>, position: f64) -> Self {
        self.markers.push(Marker {
            name: name.into(),
            position,
        });
        self
    }

    /// Iterates over `(position, attenuation)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.positions
            .iter()
            .copied()
            .zip(self.attenuations.iter().copied())
    }
}

/// An OTDR trace: immutable readings plus the derived signal.
#[derive(Debug, Clone)]
pub struct Trace {
    readings: Vec<RawSample>,
    baseline_offset: f64,
    signal: Vec<SignalPoint>,
    metadata: TraceMetadata,
    source_path: Option<PathBuf>,
}

impl Trace {
    /// Creates a trace from readings in acquisition order.
    ///
    /// The signal starts out uncorrected, so `signal().len() == readings().len()`
    /// holds from construction on.
    pub fn new(readings: Vec<RawSample>) -> Self {
        let mut trace = Self {
            readings,
            baseline_offset: 0.0,
            signal: Vec::new(),
            metadata: TraceMetadata::default(),
            source_path: None,
        };
        trace.extract_axis(false);
        trace
    }

    /// Builds a trace from decoded sections.
    ///
    /// # Errors
    ///
    /// Returns [`SectionError::MissingSection`] if no `DataPts` section exists.
    pub fn from_sections(sections: &[Section]) -> Result<Self, SectionError> {
        let readings = match find_section(sections, DATA_POINTS_SECTION) {
            Some(Section::DataPts(points)) => points.samples.clone(),
            _ => {
                return Err(SectionError::MissingSection(
                    DATA_POINTS_SECTION.to_string(),
                ))
            }
        };

        let mut trace = Self::new(readings);
        trace.metadata = TraceMetadata::from_sections(sections);
        Ok(trace)
    }

    /// Attaches the file the trace was loaded from.
    pub fn with_source_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Recomputes the signal from the readings.
    ///
    /// With `adjust` set and at least one reading, the first reading's amplitude
    /// becomes the baseline offset; otherwise the offset is zero. An empty trace
    /// is always accepted and yields an empty signal.
    pub fn extract_axis(&mut self, adjust: bool) {
        self.baseline_offset = match self.readings.first() {
            Some(first) if adjust => first.amplitude,
            _ => 0.0,
        };

        let offset = self.baseline_offset;
        self.signal = self
            .readings
            .iter()
            .map(|r| SignalPoint::new(r.position, r.amplitude - offset))
            .collect();
    }

    #[inline]
    pub fn readings(&self) -> &[RawSample] {
        &self.readings
    }

    #[inline]
    pub fn signal(&self) -> &[SignalPoint] {
        &self.signal
    }

    /// Offset subtracted from every amplitude by the last extraction.
    #[inline]
    pub fn baseline_offset(&self) -> f64 {
        self.baseline_offset
    }

    /// Distance projection of the signal.
    pub fn positions(&self) -> Vec<f64> {
        self.signal.iter().map(|p| p.distance).collect()
    }

    /// Attenuation projection of the signal.
    pub fn attenuations(&self) -> Vec<f64> {
        self.signal.iter().map(|p| p.attenuation).collect()
    }

    /// Signal as parallel series without markers.
    pub fn series(&self) -> SignalSeries {
        SignalSeries {
            positions: self.positions(),
            attenuations: self.attenuations(),
            markers: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    #[inline]
    pub fn metadata(&self) -> &TraceMetadata {
        &self.metadata
    }

    #[inline]
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sections::{DataPoints, FieldValue};
    use std::collections::BTreeMap;

    fn sample_trace() -> Trace {
        Trace::new(vec![
            RawSample::new(0.0, 12.5),
            RawSample::new(1.0, 13.0),
            RawSample::new(2.0, 11.75),
            RawSample::new(3.0, 10.0),
        ])
    }

    #[test]
    fn test_signal_length_matches_readings() {
        let mut trace = sample_trace();
        assert_eq!(trace.signal().len(), trace.readings().len());

        trace.extract_axis(true);
        assert_eq!(trace.signal().len(), 4);

        trace.extract_axis(false);
        assert_eq!(trace.signal().len(), 4);
    }

    #[test]
    fn test_extract_without_adjust_copies_amplitudes() {
        let mut trace = sample_trace();
        trace.extract_axis(false);

        assert_eq!(trace.baseline_offset(), 0.0);
        for (reading, point) in trace.readings().iter().zip(trace.signal()) {
            assert_eq!(point.distance, reading.position);
            assert_eq!(point.attenuation, reading.amplitude);
        }
    }

    #[test]
    fn test_extract_with_adjust_zeroes_first_point() {
        let mut trace = sample_trace();
        trace.extract_axis(true);

        assert_eq!(trace.baseline_offset(), 12.5);
        assert_eq!(trace.signal()[0].attenuation, 0.0);
        assert_eq!(trace.signal()[1].attenuation, 0.5);
        assert_eq!(trace.signal()[3].attenuation, -2.5);
    }

    #[test]
    fn test_adjust_on_empty_trace_is_safe() {
        let mut trace = Trace::new(Vec::new());
        trace.extract_axis(true);

        assert!(trace.signal().is_empty());
        assert_eq!(trace.baseline_offset(), 0.0);
        assert!(trace.series().is_empty());
    }

    #[test]
    fn test_extract_is_idempotent() {
        let mut trace = sample_trace();
        trace.extract_axis(true);
        let first = trace.signal().to_vec();
        trace.extract_axis(true);
        assert_eq!(trace.signal(), first.as_slice());
    }

    #[test]
    fn test_switching_adjust_recomputes_signal() {
        let mut trace = sample_trace();
        trace.extract_axis(true);
        trace.extract_axis(false);

        assert_eq!(trace.attenuations(), vec![12.5, 13.0, 11.75, 10.0]);
        assert_eq!(trace.readings()[0].amplitude, 12.5);
    }

    #[test]
    fn test_series_and_markers() {
        let trace = sample_trace();
        let series = trace.series().with_marker("event", 2.0);

        assert_eq!(series.len(), 4);
        assert_eq!(series.positions, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(series.markers.len(), 1);
        assert_eq!(series.markers[0].name, "event");

        let pairs: Vec<(f64, f64)> = series.points().collect();
        assert_eq!(pairs[1], (1.0, 13.0));
    }

    #[test]
    fn test_from_sections_requires_data_points() {
        let mut fields = BTreeMap::new();
        fields.insert("cable_id".to_string(), FieldValue::Text("C-01".to_string()));
        let sections = vec![Section::Other {
            name: "GenParams".to_string(),
            fields,
        }];

        let err = Trace::from_sections(&sections).unwrap_err();
        assert!(matches!(err, SectionError::MissingSection(ref name) if name == "DataPts"));
    }

    #[test]
    fn test_from_sections_reads_samples_and_metadata() {
        let mut fields = BTreeMap::new();
        fields.insert("fiber_id".to_string(), FieldValue::Text("F-7".to_string()));
        let sections = vec![
            Section::Other {
                name: "GenParams".to_string(),
                fields,
            },
            Section::DataPts(DataPoints {
                samples: vec![RawSample::new(0.0, 1.0), RawSample::new(0.5, 2.0)],
            }),
        ];

        let trace = Trace::from_sections(&sections).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.metadata().fiber_id.as_deref(), Some("F-7"));
    }
}
