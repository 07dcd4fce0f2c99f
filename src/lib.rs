pub mod analysis;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod types;

pub use error::{ErrorKind, Result, SummaryError};
pub use types::{FactKind, GrainKey, VendorBrandSummary};
