//! OTDR trace extraction, export and peak-based event classification.
//!
//! This crate provides tools for:
//! - Loading OTDR traces through a registry of per-format section decoders
//! - Deriving a baseline-corrected distance/attenuation signal
//! - Exporting signals as CSV or TSV
//! - Locating edge and continuous events by peak prominence
//! - Processing many trace files in parallel
//!
//! # Example
//!
//! ```no_run
//! use otdr_trace::core::loaders::{load_trace, DecoderRegistry};
//! use otdr_trace::processors::classifier::{classify, ClassificationMode, ClassifierParams};
//!
//! let mut trace = load_trace("trace.csv", &DecoderRegistry::with_defaults()).unwrap();
//! trace.extract_axis(true);
//! let event = classify(trace.signal(), &ClassifierParams::new(ClassificationMode::EdgeEvent)).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{BatchConfig, ClassifierConfig, ExportConfig, ExtractConfig, PipelineConfig};
pub use crate::core::loaders::{DecoderRegistry, SectionDecoder, TraceFormat};
pub use crate::core::trace::{RawSample, SignalPoint, SignalSeries, Trace};
pub use processors::classifier::{ClassificationMode, ClassifierParams, Event};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
