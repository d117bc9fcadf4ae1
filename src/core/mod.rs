//! Core data types and I/O operations.

pub mod loaders;
pub mod sections;
pub mod trace;
pub mod writers;

pub use loaders::{load_sections, load_trace, DecoderRegistry, LoaderError, SectionDecoder, TraceFormat};
pub use sections::{Section, SectionError, TraceMetadata};
pub use trace::{RawSample, SignalPoint, SignalSeries, Trace};
pub use writers::{dump, write_signal, ExportFormat, WriteError};
