//! Normalized per-user communication records
//!
//! These types are the input to every aggregator. They are built once per user
//! by the ingestion layer and never mutated afterwards.

use chrono::{NaiveDate, NaiveDateTime};

/// A record timestamp after upstream normalization.
///
/// Only [`RecordTime::Valid`] takes part in day bucketing and date ordering.
/// Records carrying any other variant are still counted in raw totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordTime {
    /// Successfully parsed wall-clock timestamp
    Valid(NaiveDateTime),
    /// The field was present but could not be parsed
    Invalid,
    /// The field was not present at all
    #[default]
    Absent,
}

impl RecordTime {
    pub fn is_valid(&self) -> bool {
        matches!(self, RecordTime::Valid(_))
    }

    pub fn datetime(&self) -> Option<NaiveDateTime> {
        match self {
            RecordTime::Valid(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Calendar date used for active-day bucketing
    pub fn date(&self) -> Option<NaiveDate> {
        self.datetime().map(|dt| dt.date())
    }
}

impl From<NaiveDateTime> for RecordTime {
    fn from(dt: NaiveDateTime) -> Self {
        RecordTime::Valid(dt)
    }
}

/// A call duration exactly as supplied by the device log.
///
/// Coercion to an integer is left to each aggregator because the aggregators
/// treat values that do not coerce differently.
#[derive(Debug, Clone, PartialEq)]
pub enum DurationValue {
    Integer(i64),
    Real(f64),
    Text(String),
    /// JSON null, booleans, arrays or objects
    Other,
}

impl DurationValue {
    /// Integer value if this duration coerces cleanly.
    ///
    /// Reals truncate toward zero; text must be a base-10 integer once
    /// surrounding whitespace is trimmed.
    pub fn coerce(&self) -> Option<i64> {
        match self {
            DurationValue::Integer(v) => Some(*v),
            DurationValue::Real(v) if v.is_finite() => Some(v.trunc() as i64),
            DurationValue::Real(_) => None,
            DurationValue::Text(s) => s.trim().parse::<i64>().ok(),
            DurationValue::Other => None,
        }
    }

    /// True for values that mean "nothing recorded" (null, empty text, zero)
    pub fn is_blank(&self) -> bool {
        match self {
            DurationValue::Integer(v) => *v == 0,
            DurationValue::Real(v) => *v == 0.0,
            DurationValue::Text(s) => s.is_empty(),
            DurationValue::Other => true,
        }
    }
}

/// One phone call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallRecord {
    pub phone_number: Option<String>,
    pub duration: Option<DurationValue>,
    pub datetime: RecordTime,
}

/// One SMS message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmsRecord {
    pub sms_address: Option<String>,
    pub message_body: Option<String>,
    pub datetime: RecordTime,
}

/// One address book entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactRecord {
    pub date_added: RecordTime,
    pub last_time_contacted: RecordTime,
}

/// Everything collected from a single physical device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceRecord {
    pub call_log: Vec<CallRecord>,
    pub sms_log: Vec<SmsRecord>,
    pub contacts: Vec<ContactRecord>,
}

/// All devices belonging to one user, plus their repayment status.
///
/// Records are never deduplicated across devices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRecord {
    pub status: Option<String>,
    pub devices: Vec<DeviceRecord>,
}

impl UserRecord {
    pub fn calls(&self) -> impl Iterator<Item = &CallRecord> {
        self.devices.iter().flat_map(|d| d.call_log.iter())
    }

    pub fn sms(&self) -> impl Iterator<Item = &SmsRecord> {
        self.devices.iter().flat_map(|d| d.sms_log.iter())
    }

    pub fn contacts(&self) -> impl Iterator<Item = &ContactRecord> {
        self.devices.iter().flat_map(|d| d.contacts.iter())
    }
}
