//! commlog-features - Per-user features from phone communication logs
//!
//! Turns each user's call logs, SMS logs and contact lists (across all of their
//! devices) into one flat row of statistics for credit-risk modeling:
//! ingestion → feature registry → row merging → table output.
//!
//! ## Modules
//!
//! - **Core**: [`sequence`] and [`average`] helpers, the [`features`]
//!   aggregators and the [`registry`] that names them
//! - **Collaborators**: [`timestamp`] normalization, [`ingest`] of the on-disk
//!   user tree, [`table`] output, [`pipeline`] orchestration and [`config`]

pub mod average;
pub mod config;
pub mod context;
pub mod error;
pub mod features;
pub mod ingest;
pub mod pipeline;
pub mod profanity;
pub mod registry;
pub mod sequence;
pub mod table;
pub mod timestamp;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use average::safe_average;
pub use config::ExtractorConfig;
pub use context::ExtractionContext;
pub use error::FeatureError;
pub use features::{FeatureGroup, FeatureValue, Scalar};
pub use pipeline::{user_json_to_features, FeatureExtractor};
pub use registry::{build_feature, FeatureName, FeatureRegistry};
pub use sequence::{find_next_valid, find_next_valid_by, ScanDirection};
pub use table::{FeatureRow, FeatureTable};
pub use types::{CallRecord, ContactRecord, DeviceRecord, RecordTime, SmsRecord, UserRecord};

/// Crate version, reported by the CLI and FFI
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name shown in CLI reports
pub const PRODUCER_NAME: &str = "commlog-features";
