//! SMS log aggregators

use std::collections::HashSet;

use tracing::debug;

use crate::average::safe_average;
use crate::context::ExtractionContext;
use crate::features::{FeatureGroup, FeatureValue, Scalar};
use crate::sequence::{find_next_valid_by, ScanDirection};
use crate::types::{SmsRecord, UserRecord};

/// Bodies this short or shorter are not scanned for bad words
const MIN_SCANNED_BODY_CHARS: usize = 2;

/// SMS whose address contains `#`
pub fn num_pound_sms(user: &UserRecord, _ctx: &ExtractionContext) -> FeatureValue {
    Scalar::from(count_addresses_containing(user, '#')).into()
}

/// SMS whose address contains `*`
pub fn num_star_sms(user: &UserRecord, _ctx: &ExtractionContext) -> FeatureValue {
    Scalar::from(count_addresses_containing(user, '*')).into()
}

fn count_addresses_containing(user: &UserRecord, needle: char) -> usize {
    user.sms()
        .filter(|sms| sms.sms_address.as_deref().unwrap_or("").contains(needle))
        .count()
}

/// Average number of SMS per active day.
///
/// Each device's log is walked from its first to its last validly timestamped
/// message (the last one excluded). When `require_valid_datetime` is set, only
/// validly timestamped messages are considered at all; otherwise a message
/// without a valid timestamp is counted but assumed to fall on a day that has
/// already been seen.
///
/// A device that has a valid timestamp but fewer than two messages makes the
/// whole feature null: there is not enough data to estimate a rate.
pub fn ave_daily_sms_count(user: &UserRecord, ctx: &ExtractionContext) -> FeatureValue {
    let mut sms_count: usize = 0;
    let mut active_days = HashSet::new();

    for device in &user.devices {
        let sms_log: Vec<&SmsRecord> = if ctx.require_valid_datetime {
            device
                .sms_log
                .iter()
                .filter(|sms| sms.datetime.is_valid())
                .collect()
        } else {
            device.sms_log.iter().collect()
        };

        // A start index of 0 is always within range
        let Some(first) = find_next_valid_by(&sms_log, 0, ScanDirection::Forward, |s| &s.datetime)
            .ok()
            .flatten()
        else {
            continue;
        };

        if sms_log.len() < 2 {
            debug!(
                sms = sms_log.len(),
                "Too few SMS on a device to compute a daily rate"
            );
            return Scalar::Null.into();
        }

        let last = find_next_valid_by(&sms_log, 0, ScanDirection::Reverse, |s| &s.datetime)
            .ok()
            .flatten()
            .unwrap_or(first);

        for sms in &sms_log[first..last] {
            if let Some(day) = sms.datetime.date() {
                active_days.insert(day);
            }
            sms_count += 1;
        }
    }

    Scalar::from(safe_average(sms_count as f64, active_days.len())).into()
}

/// Average character length of non-empty message bodies
pub fn ave_message_body_length(user: &UserRecord, _ctx: &ExtractionContext) -> FeatureValue {
    let mut sms_count: usize = 0;
    let mut body_length: usize = 0;

    for body in user.sms().filter_map(|sms| sms.message_body.as_deref()) {
        if !body.is_empty() {
            body_length += body.chars().count();
            sms_count += 1;
        }
    }

    Scalar::from(safe_average(body_length as f64, sms_count)).into()
}

/// Bad-word usage across message bodies longer than two characters.
///
/// Bodies are split on single spaces. Each distinct flagged word counts once
/// per message.
pub fn sms_message_stats(user: &UserRecord, ctx: &ExtractionContext) -> FeatureValue {
    let mut num_bad_words_used: usize = 0;
    let mut total_words: usize = 0;
    let mut derogatory_sms_count: usize = 0;

    for body in user.sms().filter_map(|sms| sms.message_body.as_deref()) {
        if body.chars().count() <= MIN_SCANNED_BODY_CHARS {
            continue;
        }

        let words: Vec<&str> = body.split(' ').collect();
        total_words += words.len();

        let bad_words_used = words
            .into_iter()
            .filter(|word| ctx.profanity.contains(word))
            .collect::<HashSet<_>>()
            .len();
        num_bad_words_used += bad_words_used;
        if bad_words_used > 0 {
            derogatory_sms_count += 1;
        }
    }

    FeatureGroup::new()
        .with("num_bad_words_used", num_bad_words_used)
        .with(
            "ratio_of_bad_words_used",
            safe_average(num_bad_words_used as f64, total_words),
        )
        .with("num_derogatory_sms", derogatory_sms_count)
        .into()
}
