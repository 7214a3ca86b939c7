//! Aggregator library
//!
//! Every aggregator is a pure function from a [`UserRecord`] (plus the
//! read-only [`ExtractionContext`]) to a [`FeatureValue`]. Aggregators flatten
//! all devices together, never fail, and share no state, so they may run in
//! any order or in parallel.
//!
//! - [`contacts`]: address book size and contact age
//! - [`calls`]: call counts, durations and daily call rates
//! - [`sms`]: SMS counts, daily SMS rate, body length and bad-word usage
//! - [`interactions`]: counterparts reached over calls and SMS combined

pub mod calls;
pub mod contacts;
pub mod interactions;
pub mod sms;

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::context::ExtractionContext;
use crate::types::UserRecord;

/// Signature shared by every aggregator
pub type Aggregator = fn(&UserRecord, &ExtractionContext) -> FeatureValue;

/// A single output cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    /// Missing value, rendered as an empty cell
    Null,
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Null => None,
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<usize> for Scalar {
    fn from(v: usize) -> Self {
        Scalar::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            // Debug keeps the decimal point on whole numbers (1.0, not 1)
            Scalar::Float(v) => write!(f, "{v:?}"),
            Scalar::Null => Ok(()),
        }
    }
}

/// Named sub-values produced together by one aggregator.
///
/// Keys keep their insertion order so output columns are stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureGroup {
    entries: Vec<(&'static str, Scalar)>,
}

impl FeatureGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sub-value, replacing any earlier value under the same key
    pub fn with(mut self, key: &'static str, value: impl Into<Scalar>) -> Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<Scalar> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Scalar)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FeatureGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// What an aggregator returns: one cell, or a group of named cells
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Scalar(Scalar),
    Group(FeatureGroup),
}

impl FeatureValue {
    pub fn scalar(&self) -> Option<Scalar> {
        match self {
            FeatureValue::Scalar(s) => Some(*s),
            FeatureValue::Group(_) => None,
        }
    }

    pub fn group(&self) -> Option<&FeatureGroup> {
        match self {
            FeatureValue::Group(g) => Some(g),
            FeatureValue::Scalar(_) => None,
        }
    }
}

impl From<Scalar> for FeatureValue {
    fn from(v: Scalar) -> Self {
        FeatureValue::Scalar(v)
    }
}

impl From<FeatureGroup> for FeatureValue {
    fn from(g: FeatureGroup) -> Self {
        FeatureValue::Group(g)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Record builders shared by the aggregator tests

    use chrono::{NaiveDate, NaiveDateTime};

    use crate::types::{
        CallRecord, ContactRecord, DeviceRecord, DurationValue, RecordTime, SmsRecord, UserRecord,
    };

    pub fn at(day: u32, hour: u32) -> RecordTime {
        RecordTime::Valid(datetime(day, hour))
    }

    pub fn datetime(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    pub fn call(number: &str, duration: DurationValue, when: RecordTime) -> CallRecord {
        CallRecord {
            phone_number: Some(number.to_string()),
            duration: Some(duration),
            datetime: when,
        }
    }

    pub fn sms(address: &str, body: &str, when: RecordTime) -> SmsRecord {
        SmsRecord {
            sms_address: Some(address.to_string()),
            message_body: Some(body.to_string()),
            datetime: when,
        }
    }

    pub fn contact(added: RecordTime) -> ContactRecord {
        ContactRecord {
            date_added: added,
            last_time_contacted: RecordTime::Absent,
        }
    }

    pub fn device(
        call_log: Vec<CallRecord>,
        sms_log: Vec<SmsRecord>,
        contacts: Vec<ContactRecord>,
    ) -> DeviceRecord {
        DeviceRecord {
            call_log,
            sms_log,
            contacts,
        }
    }

    pub fn user(devices: Vec<DeviceRecord>) -> UserRecord {
        UserRecord {
            status: Some("repaid".to_string()),
            devices,
        }
    }
}
