//! Address book aggregators

use crate::average::safe_average;
use crate::context::ExtractionContext;
use crate::features::{FeatureGroup, FeatureValue, Scalar};
use crate::types::UserRecord;

/// Total number of contacts across all devices.
///
/// The same person saved on two devices counts twice.
pub fn num_contacts(user: &UserRecord, _ctx: &ExtractionContext) -> FeatureValue {
    let total: usize = user.devices.iter().map(|d| d.contacts.len()).sum();
    Scalar::from(total).into()
}

/// Average and maximum age in seconds of contacts with a valid `date_added`,
/// measured against the run's reference time.
pub fn age_of_contacts_stats(user: &UserRecord, ctx: &ExtractionContext) -> FeatureValue {
    let ages: Vec<f64> = user
        .contacts()
        .filter_map(|c| c.date_added.datetime())
        .map(|added| (ctx.reference_time - added).num_milliseconds() as f64 / 1000.0)
        .collect();

    let max_age = ages.iter().copied().reduce(f64::max);

    FeatureGroup::new()
        .with("ave_age", safe_average(ages.iter().sum(), ages.len()))
        .with("max_age", max_age)
        .into()
}
