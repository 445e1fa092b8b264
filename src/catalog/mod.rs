mod models;
pub mod normalize;

pub use models::{Category, CategoryId, RawCategory, RecordEnvelope};
pub use normalize::{normalize_records, parse_records, NormalizeError, NormalizedBatch, RejectedRecord};
