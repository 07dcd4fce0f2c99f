// Pipeline processing: schema checks, aggregation and join, cleaning, derived metrics

pub mod aggregate;
pub mod derive;
pub mod quality;
pub mod schema;

pub use aggregate::JoinedFacts;
pub use derive::{DerivedRows, SentinelCounts};
pub use quality::{IntegrityReport, IntegrityWarning};
