//! Pipeline orchestration
//!
//! Runs every registered aggregator over each user and collects the flattened
//! rows into a [`FeatureTable`].

use tracing::{debug, info, info_span};

use crate::context::ExtractionContext;
use crate::error::FeatureError;
use crate::features::FeatureValue;
use crate::ingest::{parse_user_json, DataDirectory};
use crate::registry::{FeatureName, FeatureRegistry};
use crate::table::{FeatureRow, FeatureTable};
use crate::types::UserRecord;

/// Compute the standard features for one user given as JSON.
///
/// # Arguments
/// * `user_json` - `{"status": ..., "devices": [{"call_log": [...], "sms_log": [...], "contacts": [...]}]}`
/// * `user_id` - Identifier written into the row
///
/// # Returns
/// The feature row as a JSON object
///
/// # Example
/// ```ignore
/// let row_json = user_json_to_features(r#"{"devices": []}"#, "42")?;
/// ```
pub fn user_json_to_features(user_json: &str, user_id: &str) -> Result<String, FeatureError> {
    let user = parse_user_json(user_json)?;
    let row = FeatureExtractor::default().extract_row(user_id, &user);
    Ok(serde_json::to_string(&row)?)
}

/// Runs a [`FeatureRegistry`] against users under one [`ExtractionContext`]
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    registry: FeatureRegistry,
    context: ExtractionContext,
}

impl FeatureExtractor {
    pub fn new(registry: FeatureRegistry, context: ExtractionContext) -> Self {
        Self { registry, context }
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ExtractionContext {
        &self.context
    }

    /// Every registered feature for one user, in registry order
    pub fn extract_user(&self, user: &UserRecord) -> Vec<(FeatureName, FeatureValue)> {
        self.registry
            .names()
            .iter()
            .filter_map(|name| {
                self.registry
                    .build_feature(name.as_str(), user, &self.context)
                    .map(|value| (*name, value))
            })
            .collect()
    }

    /// One flattened output row
    pub fn extract_row(&self, user_id: &str, user: &UserRecord) -> FeatureRow {
        let _span = info_span!("user", user_id).entered();
        let mut row = FeatureRow::new(user_id, user.status.clone());
        for (name, value) in self.extract_user(user) {
            row.merge(name, value);
        }
        debug!(devices = user.devices.len(), columns = row.values().len(), "Built feature row");
        row
    }

    /// Build rows for every user. Output order follows input order.
    pub fn extract_all(&self, users: &[(String, UserRecord)]) -> FeatureTable {
        info!(users = users.len(), features = self.registry.len(), "Extracting features");
        self.rows(users).into_iter().collect()
    }

    #[cfg(feature = "parallel")]
    fn rows(&self, users: &[(String, UserRecord)]) -> Vec<FeatureRow> {
        use rayon::prelude::*;

        users
            .par_iter()
            .map(|(user_id, user)| self.extract_row(user_id, user))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn rows(&self, users: &[(String, UserRecord)]) -> Vec<FeatureRow> {
        users
            .iter()
            .map(|(user_id, user)| self.extract_row(user_id, user))
            .collect()
    }

    /// Load every roster user from a data directory and extract their rows
    pub fn extract_directory(&self, data: &DataDirectory) -> Result<FeatureTable, FeatureError> {
        let users = data.load_users()?;
        Ok(self.extract_all(&users))
    }
}
