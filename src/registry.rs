//! Feature registry and dispatcher
//!
//! The set of producible columns is declared here and nowhere else. Adding a
//! feature means adding a [`FeatureName`] variant; the exhaustive match in
//! [`FeatureName::aggregator`] refuses to compile until it has an
//! implementation.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::ExtractionContext;
use crate::error::FeatureError;
use crate::features::{calls, contacts, interactions, sms, Aggregator, FeatureValue};
use crate::types::UserRecord;

/// Every feature this crate knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureName {
    #[serde(rename = "num_contacts")]
    NumContacts,
    #[serde(rename = "num_#_calls")]
    NumPoundCalls,
    #[serde(rename = "num_#_sms")]
    NumPoundSms,
    #[serde(rename = "num_*_calls")]
    NumStarCalls,
    #[serde(rename = "num_*_sms")]
    NumStarSms,
    #[serde(rename = "ave_duration(s)")]
    AveDuration,
    #[serde(rename = "call_stats")]
    CallStats,
    #[serde(rename = "ave_daily_sms_count")]
    AveDailySmsCount,
    #[serde(rename = "ave_message_body_length")]
    AveMessageBodyLength,
    #[serde(rename = "interaction_stats")]
    InteractionStats,
    #[serde(rename = "sms_message_stats")]
    SmsMessageStats,
    /// Depends on `date_added`, which few devices report reliably
    #[serde(rename = "age_of_contacts_stats")]
    AgeOfContactsStats,
}

impl FeatureName {
    /// The standard feature list, in output column order
    pub const CANONICAL: [FeatureName; 11] = [
        FeatureName::NumContacts,
        FeatureName::NumPoundCalls,
        FeatureName::NumPoundSms,
        FeatureName::NumStarCalls,
        FeatureName::NumStarSms,
        FeatureName::AveDuration,
        FeatureName::CallStats,
        FeatureName::AveDailySmsCount,
        FeatureName::AveMessageBodyLength,
        FeatureName::InteractionStats,
        FeatureName::SmsMessageStats,
    ];

    /// Features that are implemented but kept out of the standard list
    pub const EXPERIMENTAL: [FeatureName; 1] = [FeatureName::AgeOfContactsStats];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::NumContacts => "num_contacts",
            FeatureName::NumPoundCalls => "num_#_calls",
            FeatureName::NumPoundSms => "num_#_sms",
            FeatureName::NumStarCalls => "num_*_calls",
            FeatureName::NumStarSms => "num_*_sms",
            FeatureName::AveDuration => "ave_duration(s)",
            FeatureName::CallStats => "call_stats",
            FeatureName::AveDailySmsCount => "ave_daily_sms_count",
            FeatureName::AveMessageBodyLength => "ave_message_body_length",
            FeatureName::InteractionStats => "interaction_stats",
            FeatureName::SmsMessageStats => "sms_message_stats",
            FeatureName::AgeOfContactsStats => "age_of_contacts_stats",
        }
    }

    pub fn aggregator(&self) -> Aggregator {
        match self {
            FeatureName::NumContacts => contacts::num_contacts,
            FeatureName::NumPoundCalls => calls::num_pound_calls,
            FeatureName::NumPoundSms => sms::num_pound_sms,
            FeatureName::NumStarCalls => calls::num_star_calls,
            FeatureName::NumStarSms => sms::num_star_sms,
            FeatureName::AveDuration => calls::ave_duration,
            FeatureName::CallStats => calls::call_stats,
            FeatureName::AveDailySmsCount => sms::ave_daily_sms_count,
            FeatureName::AveMessageBodyLength => sms::ave_message_body_length,
            FeatureName::InteractionStats => interactions::interaction_stats,
            FeatureName::SmsMessageStats => sms::sms_message_stats,
            FeatureName::AgeOfContactsStats => contacts::age_of_contacts_stats,
        }
    }

    fn all() -> impl Iterator<Item = FeatureName> {
        Self::CANONICAL.into_iter().chain(Self::EXPERIMENTAL)
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureName {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureName::all()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| FeatureError::UnknownFeature(s.to_string()))
    }
}

/// Ordered set of features to build for each user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRegistry {
    features: Vec<FeatureName>,
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl FeatureRegistry {
    /// The canonical feature list
    pub fn standard() -> Self {
        Self {
            features: FeatureName::CANONICAL.to_vec(),
        }
    }

    /// Canonical features followed by the experimental ones
    pub fn extended() -> Self {
        Self {
            features: FeatureName::all().collect(),
        }
    }

    /// A registry restricted to the given features, in the given order.
    ///
    /// Listing a feature twice is rejected.
    pub fn with_features(features: Vec<FeatureName>) -> Result<Self, FeatureError> {
        let registry = Self { features };
        registry.validate()?;
        Ok(registry)
    }

    /// Check that names are unique and that every name resolves back to its
    /// own entry.
    pub fn validate(&self) -> Result<(), FeatureError> {
        let mut seen = HashSet::new();
        for name in &self.features {
            if !seen.insert(name.as_str()) {
                return Err(FeatureError::Config(format!(
                    "feature {name} is registered more than once"
                )));
            }
            if name.as_str().parse::<FeatureName>()? != *name {
                return Err(FeatureError::Config(format!(
                    "feature {name} does not resolve to itself"
                )));
            }
        }
        Ok(())
    }

    pub fn names(&self) -> &[FeatureName] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<FeatureName> {
        self.features.iter().copied().find(|f| f.as_str() == name)
    }

    /// Build one feature by name.
    ///
    /// An unregistered name is logged and yields `None` so that one bad name
    /// does not cost the caller the rest of the row.
    pub fn build_feature(
        &self,
        name: &str,
        user: &UserRecord,
        ctx: &ExtractionContext,
    ) -> Option<FeatureValue> {
        match self.lookup(name) {
            Some(feature) => Some((feature.aggregator())(user, ctx)),
            None => {
                warn!(feature = name, "Feature extractor does not exist");
                None
            }
        }
    }
}

/// Build one feature by name from the standard registry
pub fn build_feature(name: &str, user: &UserRecord, ctx: &ExtractionContext) -> Option<FeatureValue> {
    static STANDARD: OnceLock<FeatureRegistry> = OnceLock::new();
    STANDARD
        .get_or_init(FeatureRegistry::standard)
        .build_feature(name, user, ctx)
}
