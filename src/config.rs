//! Extraction run configuration
//!
//! Loaded from an optional JSON file; every field has a default so a partial
//! file (or none at all) is fine. Command-line flags are applied on top by the
//! binary.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::ExtractionContext;
use crate::error::FeatureError;
use crate::ingest::{DataDirectory, USER_STATUS_FILENAME};
use crate::pipeline::FeatureExtractor;
use crate::profanity::ProfanitySet;
use crate::registry::{FeatureName, FeatureRegistry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    /// Root of the user tree
    pub data_dir: PathBuf,
    /// Roster CSV, relative to `data_dir`
    pub roster_file: String,
    /// Output table path; `None` writes to stdout
    pub output: Option<PathBuf>,
    pub require_valid_datetime: bool,
    /// Newline-separated word list replacing the built-in profanity set
    pub bad_words_file: Option<PathBuf>,
    /// Include experimental features after the standard ones
    pub experimental: bool,
    /// Restrict output to these features, in this order
    pub features: Option<Vec<FeatureName>>,
    /// Fixed "now" for age features; defaults to the local clock at startup
    pub reference_time: Option<NaiveDateTime>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            roster_file: USER_STATUS_FILENAME.to_string(),
            output: None,
            require_valid_datetime: true,
            bad_words_file: None,
            experimental: false,
            features: None,
            reference_time: None,
        }
    }
}

impl ExtractorConfig {
    pub fn load(path: &Path) -> Result<Self, FeatureError> {
        let text = fs::read_to_string(path).map_err(|e| FeatureError::io(path, e))?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, FeatureError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn data_directory(&self) -> DataDirectory {
        DataDirectory::new(&self.data_dir).with_roster_file(&self.roster_file)
    }

    /// Feature list, then the experimental features when enabled
    pub fn registry(&self) -> Result<FeatureRegistry, FeatureError> {
        match &self.features {
            Some(features) => {
                let mut features = features.clone();
                if self.experimental {
                    for extra in FeatureName::EXPERIMENTAL {
                        if !features.contains(&extra) {
                            features.push(extra);
                        }
                    }
                }
                FeatureRegistry::with_features(features)
            }
            None if self.experimental => Ok(FeatureRegistry::extended()),
            None => Ok(FeatureRegistry::standard()),
        }
    }

    pub fn context(&self) -> Result<ExtractionContext, FeatureError> {
        let mut context =
            ExtractionContext::default().with_require_valid_datetime(self.require_valid_datetime);
        if let Some(path) = &self.bad_words_file {
            let profanity = ProfanitySet::from_file(path)?;
            if profanity.is_empty() {
                return Err(FeatureError::Config(format!(
                    "bad words file {} has no words",
                    path.display()
                )));
            }
            context = context.with_profanity(profanity);
        }
        if let Some(reference_time) = self.reference_time {
            context = context.with_reference_time(reference_time);
        }
        Ok(context)
    }

    pub fn extractor(&self) -> Result<FeatureExtractor, FeatureError> {
        Ok(FeatureExtractor::new(self.registry()?, self.context()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = ExtractorConfig::from_json(r#"{"data_dir": "/srv/users", "experimental": true}"#)
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/users"));
        assert_eq!(config.roster_file, "user_status.csv");
        assert!(config.require_valid_datetime);
        assert!(config.experimental);
        assert_eq!(config.registry().unwrap(), FeatureRegistry::extended());
    }

    #[test]
    fn test_unknown_fields_and_features_are_rejected() {
        assert!(ExtractorConfig::from_json(r#"{"data_directory": "x"}"#).is_err());
        assert!(ExtractorConfig::from_json(r#"{"features": ["num_friends"]}"#).is_err());
    }

    #[test]
    fn test_feature_subset_with_experimental() {
        let config = ExtractorConfig::from_json(
            r#"{"features": ["call_stats", "num_contacts"], "experimental": true}"#,
        )
        .unwrap();

        assert_eq!(
            config.registry().unwrap().names(),
            &[
                FeatureName::CallStats,
                FeatureName::NumContacts,
                FeatureName::AgeOfContactsStats
            ]
        );
    }

    #[test]
    fn test_context_loads_bad_words_file() {
        let dir = tempfile::tempdir().unwrap();
        let words = dir.path().join("words.txt");
        fs::write(&words, "pumpkin\n\nturnip\n").unwrap();

        let config = ExtractorConfig {
            bad_words_file: Some(words.clone()),
            require_valid_datetime: false,
            reference_time: NaiveDateTime::parse_from_str("2018-01-01 00:00:00", "%Y-%m-%d %H:%M:%S")
                .ok(),
            ..Default::default()
        };
        let context = config.context().unwrap();

        assert!(!context.require_valid_datetime);
        assert!(context.profanity.contains("turnip"));
        assert!(!context.profanity.contains("jerk"));
        assert_eq!(context.profanity.len(), 2);
        assert_eq!(context.reference_time, config.reference_time.unwrap());

        fs::write(&words, "\n").unwrap();
        assert!(matches!(config.context(), Err(FeatureError::Config(_))));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let result = ExtractorConfig::load(Path::new("/nonexistent/commfeat.json"));
        assert!(matches!(result, Err(FeatureError::Io { .. })));
    }
}
