//! Read-only inputs shared by every aggregator during one extraction run

use chrono::{Local, NaiveDateTime};

use crate::profanity::ProfanitySet;

/// Settings and reference data handed to each aggregator alongside the user
/// record. Nothing in here is mutated while features are being built.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    /// Only count SMS with a valid timestamp when computing daily SMS rates
    pub require_valid_datetime: bool,
    /// "Now" for age-based features, fixed once per run
    pub reference_time: NaiveDateTime,
    /// Words flagged as derogatory in message bodies
    pub profanity: ProfanitySet,
}

impl Default for ExtractionContext {
    fn default() -> Self {
        Self {
            require_valid_datetime: true,
            reference_time: Local::now().naive_local(),
            profanity: ProfanitySet::builtin(),
        }
    }
}

impl ExtractionContext {
    pub fn with_reference_time(mut self, reference_time: NaiveDateTime) -> Self {
        self.reference_time = reference_time;
        self
    }

    pub fn with_require_valid_datetime(mut self, require: bool) -> Self {
        self.require_valid_datetime = require;
        self
    }

    pub fn with_profanity(mut self, profanity: ProfanitySet) -> Self {
        self.profanity = profanity;
        self
    }
}
