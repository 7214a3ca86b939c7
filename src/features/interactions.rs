//! Interaction aggregators
//!
//! An interaction is any SMS or call, whether or not its timestamp is valid.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::average::safe_average;
use crate::context::ExtractionContext;
use crate::features::{FeatureGroup, FeatureValue};
use crate::types::{RecordTime, UserRecord};

#[derive(Default)]
struct InteractionTally {
    counterparts: HashSet<String>,
    counterparts_per_day: HashMap<NaiveDate, HashSet<String>>,
    total_interactions: usize,
}

impl InteractionTally {
    /// Record one interaction; returns true if its timestamp was valid
    fn record(&mut self, address: Option<&str>, when: &RecordTime) -> bool {
        self.total_interactions += 1;

        let address = address.unwrap_or("").to_lowercase();
        if !address.is_empty() {
            self.counterparts.insert(address.clone());
        }

        let Some(day) = when.date() else {
            return false;
        };
        if !address.is_empty() {
            self.counterparts_per_day
                .entry(day)
                .or_default()
                .insert(address);
        }
        true
    }
}

/// Counterparts reached and daily interaction rates across calls and SMS.
///
/// Addresses are compared case-insensitively. An active day is a date with at
/// least one validly timestamped interaction with a non-empty counterpart.
pub fn interaction_stats(user: &UserRecord, _ctx: &ExtractionContext) -> FeatureValue {
    let mut tally = InteractionTally::default();
    let mut valid_sms: usize = 0;
    let mut valid_calls: usize = 0;

    for device in &user.devices {
        for sms in &device.sms_log {
            if tally.record(sms.sms_address.as_deref(), &sms.datetime) {
                valid_sms += 1;
            }
        }
        for call in &device.call_log {
            if tally.record(call.phone_number.as_deref(), &call.datetime) {
                valid_calls += 1;
            }
        }
    }

    let num_days = tally.counterparts_per_day.len();
    let daily_counterparts: usize = tally.counterparts_per_day.values().map(HashSet::len).sum();

    FeatureGroup::new()
        .with("total_num_contacts_interacted_with", tally.counterparts.len())
        .with("total_interactions", tally.total_interactions)
        .with("ave_daily_sms", safe_average(valid_sms as f64, num_days))
        .with("ave_daily_calls", safe_average(valid_calls as f64, num_days))
        .with(
            "ave_daily_contacts_interacted_with",
            safe_average(daily_counterparts as f64, num_days),
        )
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::*;
    use crate::features::Scalar;
    use crate::types::DurationValue;
    use pretty_assertions::assert_eq;

    fn zero() -> DurationValue {
        DurationValue::Integer(0)
    }

    #[test]
    fn test_interaction_stats_across_devices() {
        let ctx = ExtractionContext::default();
        let record = user(vec![
            device(
                vec![
                    call("0711", zero(), at(1, 9)),
                    call("0722", zero(), RecordTime::Invalid),
                ],
                vec![
                    sms("Safaricom", "hi", at(1, 10)),
                    sms("SAFARICOM", "hi", at(2, 10)),
                ],
                vec![],
            ),
            device(
                vec![call("0711", zero(), at(2, 12))],
                vec![sms("0733", "hey", RecordTime::Absent)],
                vec![],
            ),
        ]);

        let expected = FeatureGroup::new()
            .with("total_num_contacts_interacted_with", 4usize)
            .with("total_interactions", 6usize)
            .with("ave_daily_sms", 1.0)
            .with("ave_daily_calls", 1.0)
            // day 1: {safaricom, 0711}, day 2: {safaricom, 0711}
            .with("ave_daily_contacts_interacted_with", 2.0);
        assert_eq!(interaction_stats(&record, &ctx), FeatureValue::Group(expected));
    }

    #[test]
    fn test_days_without_counterpart_are_not_active() {
        let ctx = ExtractionContext::default();
        let mut anonymous = sms("", "hello", at(3, 8));
        anonymous.sms_address = None;
        let record = user(vec![device(
            vec![call("0711", zero(), at(1, 9))],
            vec![anonymous],
            vec![],
        )]);

        let value = interaction_stats(&record, &ctx);
        let group = value.group().unwrap();
        assert_eq!(group.get("total_interactions"), Some(Scalar::Int(2)));
        assert_eq!(group.get("total_num_contacts_interacted_with"), Some(Scalar::Int(1)));
        // Only day 1 is active, but the anonymous SMS is still a valid SMS
        assert_eq!(group.get("ave_daily_sms"), Some(Scalar::Float(1.0)));
        assert_eq!(group.get("ave_daily_calls"), Some(Scalar::Float(1.0)));
    }

    #[test]
    fn test_empty_user_has_zero_totals_and_null_rates() {
        let ctx = ExtractionContext::default();
        let expected = FeatureGroup::new()
            .with("total_num_contacts_interacted_with", 0usize)
            .with("total_interactions", 0usize)
            .with("ave_daily_sms", None::<f64>)
            .with("ave_daily_calls", None::<f64>)
            .with("ave_daily_contacts_interacted_with", None::<f64>);
        assert_eq!(
            interaction_stats(&user(vec![]), &ctx),
            FeatureValue::Group(expected)
        );
    }

    #[test]
    fn test_total_interactions_is_sms_plus_calls() {
        let ctx = ExtractionContext::default();
        for (calls, texts) in [(0usize, 0usize), (3, 0), (0, 4), (2, 5)] {
            let record = user(vec![
                device(
                    vec![call("x", zero(), RecordTime::Invalid); calls],
                    vec![sms("y", "z", at(1, 1)); texts],
                    vec![],
                ),
                device(vec![call("q", zero(), at(2, 2)); calls], vec![], vec![]),
            ]);

            let value = interaction_stats(&record, &ctx);
            assert_eq!(
                value.group().unwrap().get("total_interactions"),
                Some(Scalar::Int((2 * calls + texts) as i64))
            );
        }
    }
}
