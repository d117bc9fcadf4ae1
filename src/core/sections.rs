//! Decoded OTDR sections.
//!
//! Decoders hand over a list of named sections. Only `DataPts` is typed; every
//! other block is kept as a name plus loosely-typed fields so that untyped
//! records stop here instead of leaking into the trace model.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use super::trace::RawSample;

/// Name of the section that carries the sample pairs.
pub const DATA_POINTS_SECTION: &str = "DataPts";

/// General parameters block (cable, fiber, wavelength, ...).
pub const GENERAL_PARAMS_SECTION: &str = "GenParams";

/// Supplier parameters block (instrument vendor and model).
pub const SUPPLIER_PARAMS_SECTION: &str = "SupParams";

/// Errors raised while interpreting decoded sections.
#[derive(Error, Debug)]
pub enum SectionError {
    #[error("required section '{0}' is missing")]
    MissingSection(String),

    #[error("malformed section '{name}': {reason}")]
    Malformed { name: String, reason: String },
}

/// A loosely-typed field value from a non-data section.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Flag(bool),
    List(Vec<FieldValue>),
    Null,
}

impl FieldValue {
    /// Interprets the value as display text when it is a string or number.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            FieldValue::Number(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Number(v) => write!(f, "{v}"),
            FieldValue::Flag(b) => write!(f, "{b}"),
            FieldValue::List(items) => write!(f, "[{} items]", items.len()),
            FieldValue::Null => write!(f, "<null>"),
        }
    }
}

/// Sample pairs of the `DataPts` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataPoints {
    pub samples: Vec<RawSample>,
}

/// One decoded section.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    DataPts(DataPoints),
    Other {
        name: String,
        fields: BTreeMap<String, FieldValue>,
    },
}

impl Section {
    pub fn name(&self) -> &str {
        match self {
            Section::DataPts(_) => DATA_POINTS_SECTION,
            Section::Other { name, .. } => name,
        }
    }

    /// Field lookup for non-data sections.
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        match self {
            Section::DataPts(_) => None,
            Section::Other { fields, .. } => fields.get(key),
        }
    }
}

/// Returns the first section named `name`.
pub fn find_section<'a>(sections: &'a [Section], name: &str) -> Option<&'a Section> {
    sections.iter().find(|s| s.name() == name)
}

/// Optional descriptive fields of a trace.
///
/// Each field is `Some` only when the owning section exists and the field is
/// present as non-empty text or a number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceMetadata {
    pub cable_id: Option<String>,
    pub fiber_id: Option<String>,
    pub wavelength: Option<String>,
    pub location_a: Option<String>,
    pub location_b: Option<String>,
    pub operator: Option<String>,
    pub comment: Option<String>,
    pub supplier: Option<String>,
    pub otdr: Option<String>,
    pub serial_number: Option<String>,
}

impl TraceMetadata {
    pub fn from_sections(sections: &[Section]) -> Self {
        let general = find_section(sections, GENERAL_PARAMS_SECTION);
        let supplier = find_section(sections, SUPPLIER_PARAMS_SECTION);

        let text = |section: Option<&Section>, key: &str| {
            section
                .and_then(|s| s.field(key))
                .and_then(FieldValue::as_text)
        };

        Self {
            cable_id: text(general, "cable_id"),
            fiber_id: text(general, "fiber_id"),
            wavelength: text(general, "wavelength"),
            location_a: text(general, "location_a"),
            location_b: text(general, "location_b"),
            operator: text(general, "operator"),
            comment: text(general, "comment"),
            supplier: text(supplier, "supplier"),
            otdr: text(supplier, "otdr"),
            serial_number: text(supplier, "serial_number"),
        }
    }

    /// Present fields as `(label, value)` pairs, in a fixed order.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("Cable ID", &self.cable_id),
            ("Fiber ID", &self.fiber_id),
            ("Wavelength", &self.wavelength),
            ("Location A", &self.location_a),
            ("Location B", &self.location_b),
            ("Operator", &self.operator),
            ("Comment", &self.comment),
            ("Supplier", &self.supplier),
            ("OTDR", &self.otdr),
            ("Serial number", &self.serial_number),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_deref().map(|v| (label, v)))
        .collect()
    }
}
