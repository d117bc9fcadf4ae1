//! Signal processing modules.

pub mod batch;
pub mod classifier;
pub mod peaks;

// Re-export key types for convenience
pub use batch::{process_batch, process_batch_with, BatchError, BatchOptions, BatchReport, FileOutcome};
pub use classifier::{classify, ClassificationMode, ClassifierError, ClassifierParams, Event};
pub use peaks::{find_peaks, Peak, PeakCriteria};
