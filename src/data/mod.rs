pub mod merge;
pub mod normalize;
pub mod record;
pub mod source;
pub mod stats;

// Re-export key types for convenience
pub use merge::{merge_datasets, merge_variables};
pub use normalize::{ingest, normalize, IngestOutcome};
pub use record::{Domain, EpochMillis, Point, RawRecord, Series, Variable, VariableId};
pub use source::{load_records, FileInfo, LoadedFile};
pub use stats::{compute_stats, VariableStats, WindowStats};
