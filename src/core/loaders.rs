//! Trace loaders and the decoder registry.
//!
//! Input files are dispatched on their extension to a [`SectionDecoder`]
//! registered for that [`TraceFormat`]. Built-in decoders cover:
//! - Pre-converted CSV/TSV traces (`position,amplitude` rows)
//! - JSON section dumps produced by an external SOR decoder
//!
//! Binary `.sor` / `.msor` decoding is left to an external decoder that the
//! embedding application registers with [`DecoderRegistry::register`].

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::sections::{DataPoints, FieldValue, Section, SectionError, DATA_POINTS_SECTION};
use super::trace::{RawSample, Trace};

/// Errors that can occur during trace loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("No decoder registered for {0} files")]
    NoDecoder(TraceFormat),

    #[error(transparent)]
    Section(#[from] SectionError),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Input formats recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceFormat {
    /// Bellcore SOR binary trace.
    Sor,
    /// Multi-trace SOR container.
    Msor,
    /// Pre-converted comma-separated trace.
    Csv,
    /// Pre-converted tab-separated trace.
    Tsv,
    /// JSON dump of decoded sections.
    SectionDump,
}

impl TraceFormat {
    /// Detects the format from a file extension (case-insensitive).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "sor" => Ok(TraceFormat::Sor),
            "msor" => Ok(TraceFormat::Msor),
            "csv" => Ok(TraceFormat::Csv),
            "tsv" => Ok(TraceFormat::Tsv),
            "json" => Ok(TraceFormat::SectionDump),
            other => Err(LoaderError::UnsupportedFormat(format!(".{other}"))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            TraceFormat::Sor => "sor",
            TraceFormat::Msor => "msor",
            TraceFormat::Csv => "csv",
            TraceFormat::Tsv => "tsv",
            TraceFormat::SectionDump => "json",
        }
    }
}

impl fmt::Display for TraceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

/// Turns an input byte stream into named sections.
pub trait SectionDecoder: Send + Sync {
    fn decode(&self, reader: &mut dyn Read) -> Result<Vec<Section>>;
}

/// Decoder for delimited `position<sep>amplitude` text traces.
///
/// Rows with fewer than two fields or with non-numeric values (including a
/// header row) are skipped.
#[derive(Debug, Clone, Copy)]
pub struct DelimitedDecoder {
    delimiter: u8,
}

impl DelimitedDecoder {
    pub fn csv() -> Self {
        Self { delimiter: b',' }
    }

    pub fn tsv() -> Self {
        Self { delimiter: b'\t' }
    }
}

impl SectionDecoder for DelimitedDecoder {
    fn decode(&self, reader: &mut dyn Read) -> Result<Vec<Section>> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .delimiter(self.delimiter)
            .from_reader(reader);

        let mut samples = Vec::new();
        let mut skipped = 0usize;

        for result in csv_reader.records() {
            let record = result?;
            if record.len() < 2 {
                skipped += 1;
                continue;
            }

            let position = record.get(0).and_then(|s| s.parse::<f64>().ok());
            let amplitude = record.get(1).and_then(|s| s.parse::<f64>().ok());

            match (position, amplitude) {
                (Some(x), Some(y)) => samples.push(RawSample::new(x, y)),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("skipped {} non-numeric rows", skipped);
        }

        Ok(vec![Section::DataPts(DataPoints { samples })])
    }
}

/// Decoder for JSON section dumps.
///
/// Expected layout:
///
/// ```json
/// [
///   { "name": "GenParams", "cable_id": "C-01", "wavelength": 1550 },
///   { "name": "DataPts", "data_points": [[0.0, 12.5], [0.25, 12.4]] }
/// ]
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionDumpDecoder;

impl SectionDecoder for SectionDumpDecoder {
    fn decode(&self, reader: &mut dyn Read) -> Result<Vec<Section>> {
        let root: JsonValue = serde_json::from_reader(reader)?;
        let records = root.as_array().ok_or_else(|| SectionError::Malformed {
            name: "<root>".to_string(),
            reason: "expected a top-level array of sections".to_string(),
        })?;

        records
            .iter()
            .enumerate()
            .map(|(i, record)| json_to_section(i, record))
            .collect()
    }
}

fn json_to_section(index: usize, record: &JsonValue) -> Result<Section> {
    let obj = record.as_object().ok_or_else(|| SectionError::Malformed {
        name: format!("#{index}"),
        reason: "section is not an object".to_string(),
    })?;

    let name = obj
        .get("name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| SectionError::Malformed {
            name: format!("#{index}"),
            reason: "missing 'name' key".to_string(),
        })?
        .to_string();

    if name == DATA_POINTS_SECTION {
        let points = obj
            .get("data_points")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| SectionError::Malformed {
                name: name.clone(),
                reason: "missing 'data_points' array".to_string(),
            })?;

        let samples = points
            .iter()
            .enumerate()
            .map(|(j, pair)| json_to_sample(&name, j, pair))
            .collect::<std::result::Result<Vec<_>, SectionError>>()?;

        return Ok(Section::DataPts(DataPoints { samples }));
    }

    let fields = obj
        .iter()
        .filter(|(key, _)| key.as_str() != "name")
        .map(|(key, val)| (key.clone(), json_to_field(val)))
        .collect();

    Ok(Section::Other { name, fields })
}

fn json_to_sample(
    section: &str,
    index: usize,
    pair: &JsonValue,
) -> std::result::Result<RawSample, SectionError> {
    let malformed = || SectionError::Malformed {
        name: section.to_string(),
        reason: format!("data_points[{index}] is not a numeric pair"),
    };

    let values = pair.as_array().ok_or_else(malformed)?;
    if values.len() < 2 {
        return Err(malformed());
    }
    let x = values[0].as_f64().ok_or_else(malformed)?;
    let y = values[1].as_f64().ok_or_else(malformed)?;
    Ok(RawSample::new(x, y))
}

fn json_to_field(val: &JsonValue) -> FieldValue {
    match val {
        JsonValue::String(s) => FieldValue::Text(s.clone()),
        JsonValue::Number(n) => n
            .as_f64()
            .map(FieldValue::Number)
            .unwrap_or_else(|| FieldValue::Text(n.to_string())),
        JsonValue::Bool(b) => FieldValue::Flag(*b),
        JsonValue::Array(items) => FieldValue::List(items.iter().map(json_to_field).collect()),
        JsonValue::Null => FieldValue::Null,
        JsonValue::Object(_) => FieldValue::Text(val.to_string()),
    }
}

/// Maps each input format to the decoder that handles it.
pub struct DecoderRegistry {
    decoders: HashMap<TraceFormat, Box<dyn SectionDecoder>>,
}

impl DecoderRegistry {
    /// Creates a registry with no decoders.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in text decoders.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(TraceFormat::Csv, DelimitedDecoder::csv());
        registry.register(TraceFormat::Tsv, DelimitedDecoder::tsv());
        registry.register(TraceFormat::SectionDump, SectionDumpDecoder);
        registry
    }

    /// Registers (or replaces) the decoder for `format`.
    pub fn register<D: SectionDecoder + 'static>(&mut self, format: TraceFormat, decoder: D) {
        self.decoders.insert(format, Box::new(decoder));
    }

    pub fn supports(&self, format: TraceFormat) -> bool {
        self.decoders.contains_key(&format)
    }

    /// Whether `path` has an extension with a registered decoder.
    pub fn supports_path<P: AsRef<Path>>(&self, path: P) -> bool {
        TraceFormat::from_path(path)
            .map(|f| self.supports(f))
            .unwrap_or(false)
    }

    /// Decodes `reader` with the decoder registered for `format`.
    pub fn decode(&self, format: TraceFormat, reader: &mut dyn Read) -> Result<Vec<Section>> {
        let decoder = self
            .decoders
            .get(&format)
            .ok_or(LoaderError::NoDecoder(format))?;
        decoder.decode(reader)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Decode all sections of a trace file.
///
/// # Errors
///
/// Returns an error if the file does not exist, its extension is not
/// recognised, no decoder is registered for it, or decoding fails.
pub fn load_sections<P: AsRef<Path>>(path: P, registry: &DecoderRegistry) -> Result<Vec<Section>> {
    let path = path.as_ref();
    let format = TraceFormat::from_path(path)?;

    if !path.is_file() {
        return Err(LoaderError::FileNotFound(path.to_path_buf()));
    }
    if !registry.supports(format) {
        return Err(LoaderError::NoDecoder(format));
    }

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let sections = registry.decode(format, &mut reader)?;

    debug!("{}: decoded {} sections", path.display(), sections.len());
    Ok(sections)
}

/// Load a trace file into a [`Trace`] with an uncorrected signal.
///
/// # Arguments
///
/// * `path` - Trace file (`.sor`, `.msor`, `.csv`, `.tsv` or `.json` section dump)
/// * `registry` - Decoders available for each format
///
/// # Errors
///
/// In addition to the [`load_sections`] errors, fails with
/// [`SectionError::MissingSection`] when the file has no `DataPts` section.
pub fn load_trace<P: AsRef<Path>>(path: P, registry: &DecoderRegistry) -> Result<Trace> {
    let path = path.as_ref();
    let sections = load_sections(path, registry)?;
    let trace = Trace::from_sections(&sections)?.with_source_path(path);

    info!("{}: loaded {} readings", path.display(), trace.len());
    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, Builder, NamedTempFile};

    fn temp_with_suffix(suffix: &str) -> NamedTempFile {
        Builder::new().suffix(suffix).tempfile().unwrap()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(TraceFormat::from_path("a/b/trace.SOR").unwrap(), TraceFormat::Sor);
        assert_eq!(TraceFormat::from_path("trace.msor").unwrap(), TraceFormat::Msor);
        assert_eq!(TraceFormat::from_path("trace.Csv").unwrap(), TraceFormat::Csv);
        assert_eq!(TraceFormat::from_path("dump.json").unwrap(), TraceFormat::SectionDump);
        assert!(matches!(
            TraceFormat::from_path("trace.txt"),
            Err(LoaderError::UnsupportedFormat(ref ext)) if ext == ".txt"
        ));
    }

    #[test]
    fn test_load_csv_with_header() -> Result<()> {
        let mut file = temp_with_suffix(".csv");
        writeln!(file, "distance,attenuation").unwrap();
        writeln!(file, "0.0,10.5").unwrap();
        writeln!(file, "1.5,9.25").unwrap();
        file.flush().unwrap();

        let trace = load_trace(file.path(), &DecoderRegistry::with_defaults())?;
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.readings()[0], RawSample::new(0.0, 10.5));
        assert_eq!(trace.readings()[1], RawSample::new(1.5, 9.25));
        assert_eq!(trace.source_path(), Some(file.path()));

        Ok(())
    }

    #[test]
    fn test_load_csv_skips_bad_rows() -> Result<()> {
        let mut file = temp_with_suffix(".csv");
        writeln!(file, "0.0,1.0").unwrap();
        writeln!(file, "oops,2.0").unwrap();
        writeln!(file, "3.0").unwrap();
        writeln!(file, "4.0,5.0,extra").unwrap();
        file.flush().unwrap();

        let trace = load_trace(file.path(), &DecoderRegistry::with_defaults())?;
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.readings()[1], RawSample::new(4.0, 5.0));

        Ok(())
    }

    #[test]
    fn test_load_empty_csv_gives_empty_trace() -> Result<()> {
        let file = temp_with_suffix(".csv");
        let trace = load_trace(file.path(), &DecoderRegistry::with_defaults())?;
        assert!(trace.is_empty());
        Ok(())
    }

    #[test]
    fn test_load_tsv() -> Result<()> {
        let mut file = temp_with_suffix(".tsv");
        writeln!(file, "0.5\t-1.25").unwrap();
        file.flush().unwrap();

        let trace = load_trace(file.path(), &DecoderRegistry::with_defaults())?;
        assert_eq!(trace.readings(), &[RawSample::new(0.5, -1.25)]);
        Ok(())
    }

    #[test]
    fn test_load_section_dump() -> Result<()> {
        let mut file = temp_with_suffix(".json");
        write!(
            file,
            r#"[
                {{"name": "GenParams", "cable_id": "CAB-1", "wavelength": 1310}},
                {{"name": "DataPts", "data_points": [[0.0, 4.0], [2.0, 3.5]]}}
            ]"#
        )
        .unwrap();
        file.flush().unwrap();

        let trace = load_trace(file.path(), &DecoderRegistry::with_defaults())?;
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.metadata().cable_id.as_deref(), Some("CAB-1"));
        assert_eq!(trace.metadata().wavelength.as_deref(), Some("1310"));

        Ok(())
    }

    #[test]
    fn test_section_dump_without_data_points() {
        let mut file = temp_with_suffix(".json");
        write!(file, r#"[{{"name": "Map", "version": 200}}]"#).unwrap();
        file.flush().unwrap();

        let result = load_trace(file.path(), &DecoderRegistry::with_defaults());
        assert!(matches!(
            result,
            Err(LoaderError::Section(SectionError::MissingSection(ref name))) if name == "DataPts"
        ));
    }

    #[test]
    fn test_section_dump_malformed_pair() {
        let mut file = temp_with_suffix(".json");
        write!(file, r#"[{{"name": "DataPts", "data_points": [[0.0]]}}]"#).unwrap();
        file.flush().unwrap();

        let result = load_sections(file.path(), &DecoderRegistry::with_defaults());
        assert!(matches!(
            result,
            Err(LoaderError::Section(SectionError::Malformed { .. }))
        ));
    }

    #[test]
    fn test_sor_requires_registered_decoder() {
        let mut file = temp_with_suffix(".sor");
        file.write_all(b"Map\0").unwrap();
        file.flush().unwrap();

        let registry = DecoderRegistry::with_defaults();
        assert!(!registry.supports_path(file.path()));
        assert!(matches!(
            load_trace(file.path(), &registry),
            Err(LoaderError::NoDecoder(TraceFormat::Sor))
        ));
    }

    struct FixedDecoder;

    impl SectionDecoder for FixedDecoder {
        fn decode(&self, _reader: &mut dyn Read) -> Result<Vec<Section>> {
            Ok(vec![Section::DataPts(DataPoints {
                samples: vec![RawSample::new(0.0, 7.0), RawSample::new(1.0, 6.0)],
            })])
        }
    }

    #[test]
    fn test_registered_sor_decoder_is_used() -> Result<()> {
        let mut file = temp_with_suffix(".sor");
        file.write_all(b"binary").unwrap();
        file.flush().unwrap();

        let mut registry = DecoderRegistry::with_defaults();
        registry.register(TraceFormat::Sor, FixedDecoder);

        assert!(registry.supports_path(file.path()));
        let trace = load_trace(file.path(), &registry)?;
        assert_eq!(trace.len(), 2);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.csv");

        assert!(matches!(
            load_trace(&path, &DecoderRegistry::with_defaults()),
            Err(LoaderError::FileNotFound(_))
        ));
    }
}
