//! Call log aggregators

use std::collections::HashSet;

use tracing::warn;

use crate::average::safe_average;
use crate::context::ExtractionContext;
use crate::features::{FeatureGroup, FeatureValue, Scalar};
use crate::types::{CallRecord, UserRecord};

/// Calls whose number contains `#` (USSD and service codes)
pub fn num_pound_calls(user: &UserRecord, _ctx: &ExtractionContext) -> FeatureValue {
    Scalar::from(count_numbers_containing(user, '#')).into()
}

/// Calls whose number contains `*`
pub fn num_star_calls(user: &UserRecord, _ctx: &ExtractionContext) -> FeatureValue {
    Scalar::from(count_numbers_containing(user, '*')).into()
}

fn count_numbers_containing(user: &UserRecord, needle: char) -> usize {
    user.calls()
        .filter(|call| call.phone_number.as_deref().unwrap_or("").contains(needle))
        .count()
}

/// Average call duration in seconds over every call on every device.
///
/// Durations that do not coerce to an integer add nothing to the total but the
/// call still counts toward the denominator. With no calls at all the result
/// is `0.0`, not null. The total saturates at `i64::MAX`.
pub fn ave_duration(user: &UserRecord, _ctx: &ExtractionContext) -> FeatureValue {
    let mut total_duration: i64 = 0;
    let mut num_calls: usize = 0;

    for call in user.calls() {
        num_calls += 1;
        match &call.duration {
            None => {}
            Some(raw) => match raw.coerce() {
                Some(seconds) => total_duration = total_duration.saturating_add(seconds),
                None => warn!(
                    feature = "ave_duration(s)",
                    duration = ?raw,
                    "Skipping call duration that is not an integer"
                ),
            },
        }
    }

    if num_calls == 0 {
        return Scalar::Float(0.0).into();
    }
    Scalar::from(safe_average(total_duration as f64, num_calls)).into()
}

/// Call totals plus per-active-day call and duration averages.
///
/// Only calls with a valid timestamp contribute to the daily averages; an
/// active day is a calendar date with at least one such call.
pub fn call_stats(user: &UserRecord, _ctx: &ExtractionContext) -> FeatureValue {
    let mut total_calls: usize = 0;
    let mut total_duration: i64 = 0;
    let mut valid_calls: usize = 0;
    let mut valid_duration: i64 = 0;
    let mut active_days = HashSet::new();

    for call in user.calls() {
        let seconds = lenient_duration(call);
        total_calls += 1;
        total_duration = total_duration.saturating_add(seconds);

        if let Some(day) = call.datetime.date() {
            active_days.insert(day);
            valid_calls += 1;
            valid_duration = valid_duration.saturating_add(seconds);
        }
    }

    let num_days = active_days.len();
    FeatureGroup::new()
        .with("calls", total_calls)
        .with("duration(s)", total_duration)
        .with("ave_daily_calls", safe_average(valid_calls as f64, num_days))
        .with(
            "ave_daily_duration(s)",
            safe_average(valid_duration as f64, num_days),
        )
        .into()
}

/// Duration with every missing, blank or unusable value read as zero
fn lenient_duration(call: &CallRecord) -> i64 {
    match &call.duration {
        None => 0,
        Some(raw) if raw.is_blank() => 0,
        Some(raw) => raw.coerce().unwrap_or_else(|| {
            warn!(
                feature = "call_stats",
                duration = ?raw,
                "Treating call duration that is not an integer as zero"
            );
            0
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::*;
    use crate::types::{DurationValue, RecordTime};
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> DurationValue {
        DurationValue::Text(s.to_string())
    }

    #[test]
    fn test_single_pound_call() {
        let ctx = ExtractionContext::default();
        let record = user(vec![device(
            vec![call("123#456", text("60"), at(1, 10))],
            vec![],
            vec![],
        )]);

        assert_eq!(num_pound_calls(&record, &ctx), FeatureValue::Scalar(Scalar::Int(1)));
        assert_eq!(num_star_calls(&record, &ctx), FeatureValue::Scalar(Scalar::Int(0)));

        let expected = FeatureGroup::new()
            .with("calls", 1usize)
            .with("duration(s)", 60i64)
            .with("ave_daily_calls", 1.0)
            .with("ave_daily_duration(s)", 60.0);
        assert_eq!(call_stats(&record, &ctx), FeatureValue::Group(expected));
    }

    #[test]
    fn test_special_character_counts_ignore_missing_numbers() {
        let ctx = ExtractionContext::default();
        let mut no_number = call("", DurationValue::Integer(1), RecordTime::Absent);
        no_number.phone_number = None;
        let record = user(vec![
            device(
                vec![
                    call("*144#", DurationValue::Integer(0), RecordTime::Invalid),
                    call("0722000111", DurationValue::Integer(5), RecordTime::Invalid),
                    no_number,
                ],
                vec![],
                vec![],
            ),
            device(
                vec![call("*100*2#", DurationValue::Integer(0), RecordTime::Absent)],
                vec![],
                vec![],
            ),
        ]);

        assert_eq!(num_pound_calls(&record, &ctx), FeatureValue::Scalar(Scalar::Int(2)));
        assert_eq!(num_star_calls(&record, &ctx), FeatureValue::Scalar(Scalar::Int(2)));
    }

    #[test]
    fn test_ave_duration_skips_uncoercible_but_counts_call() {
        let ctx = ExtractionContext::default();
        let mut no_duration = call("1", DurationValue::Integer(0), RecordTime::Absent);
        no_duration.duration = None;
        let record = user(vec![device(
            vec![
                call("1", text("30"), RecordTime::Absent),
                call("2", text("n/a"), RecordTime::Absent),
                call("3", DurationValue::Real(30.7), RecordTime::Absent),
                no_duration,
            ],
            vec![],
            vec![],
        )]);

        assert_eq!(ave_duration(&record, &ctx), FeatureValue::Scalar(Scalar::Float(15.0)));
    }

    #[test]
    fn test_ave_duration_without_calls_is_zero() {
        let ctx = ExtractionContext::default();
        assert_eq!(
            ave_duration(&user(vec![]), &ctx),
            FeatureValue::Scalar(Scalar::Float(0.0))
        );
        assert_eq!(
            ave_duration(&user(vec![device(vec![], vec![], vec![])]), &ctx),
            FeatureValue::Scalar(Scalar::Float(0.0))
        );
    }

    #[test]
    fn test_call_stats_buckets_valid_calls_by_day_across_devices() {
        let ctx = ExtractionContext::default();
        let record = user(vec![
            device(
                vec![
                    call("a", DurationValue::Integer(10), at(1, 8)),
                    call("b", DurationValue::Integer(20), at(1, 22)),
                    call("c", DurationValue::Other, RecordTime::Invalid),
                ],
                vec![],
                vec![],
            ),
            device(
                vec![
                    call("d", text("30"), at(2, 9)),
                    call("e", text("bogus"), at(1, 9)),
                    call("f", text(""), RecordTime::Absent),
                ],
                vec![],
                vec![],
            ),
        ]);

        let value = call_stats(&record, &ctx);
        let group = value.group().unwrap();
        assert_eq!(group.get("calls"), Some(Scalar::Int(6)));
        assert_eq!(group.get("duration(s)"), Some(Scalar::Int(60)));
        // 4 valid calls over 2 days, 60 valid seconds over 2 days
        assert_eq!(group.get("ave_daily_calls"), Some(Scalar::Float(2.0)));
        assert_eq!(group.get("ave_daily_duration(s)"), Some(Scalar::Float(30.0)));
    }

    #[test]
    fn test_call_stats_without_valid_timestamps_has_null_averages() {
        let ctx = ExtractionContext::default();
        let record = user(vec![device(
            vec![call("a", DurationValue::Integer(10), RecordTime::Invalid)],
            vec![],
            vec![],
        )]);

        let expected = FeatureGroup::new()
            .with("calls", 1usize)
            .with("duration(s)", 10i64)
            .with("ave_daily_calls", None::<f64>)
            .with("ave_daily_duration(s)", None::<f64>);
        assert_eq!(call_stats(&record, &ctx), FeatureValue::Group(expected));
    }

    #[test]
    fn test_huge_durations_saturate_instead_of_overflowing() {
        let ctx = ExtractionContext::default();
        let record = user(vec![device(
            vec![
                call("a", DurationValue::Integer(i64::MAX), at(1, 8)),
                call("b", DurationValue::Integer(1), at(1, 9)),
            ],
            vec![],
            vec![],
        )]);

        let value = call_stats(&record, &ctx);
        let group = value.group().unwrap();
        assert_eq!(group.get("duration(s)"), Some(Scalar::Int(i64::MAX)));
        assert_eq!(
            group.get("ave_daily_duration(s)"),
            Some(Scalar::Float(i64::MAX as f64))
        );
        assert_eq!(
            ave_duration(&record, &ctx),
            FeatureValue::Scalar(Scalar::Float(i64::MAX as f64 / 2.0))
        );

        // Reals this large coerce to i64::MAX
        let reals = user(vec![device(
            vec![
                call("a", DurationValue::Real(1e300), RecordTime::Absent),
                call("b", DurationValue::Real(1e300), RecordTime::Absent),
            ],
            vec![],
            vec![],
        )]);
        assert_eq!(
            ave_duration(&reals, &ctx),
            FeatureValue::Scalar(Scalar::Float(i64::MAX as f64 / 2.0))
        );
        assert_eq!(
            call_stats(&reals, &ctx).group().unwrap().get("duration(s)"),
            Some(Scalar::Int(i64::MAX))
        );
    }

    #[test]
    fn test_call_aggregators_are_repeatable() {
        let ctx = ExtractionContext::default();
        let record = user(vec![device(
            vec![call("*1#", text("12"), at(3, 3))],
            vec![],
            vec![],
        )]);

        assert_eq!(call_stats(&record, &ctx), call_stats(&record, &ctx));
        assert_eq!(ave_duration(&record, &ctx), ave_duration(&record, &ctx));
    }
}
