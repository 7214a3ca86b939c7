//! Loading user records from disk or JSON
//!
//! Expected layout under the data directory:
//!
//! ```text
//! user_status.csv              user_id,status
//! user-{user_id}/
//!     device-1/
//!         collated_call_log.txt      JSON array of calls
//!         collated_contact_list.txt  JSON array of contacts
//!         collated_sms_log.txt       JSON array of SMS
//!     device-2/ ...
//! ```
//!
//! Raw fields are normalized here: timestamps go through
//! [`parse_timestamp`], non-string addresses become `None`, durations are kept
//! raw for the aggregators to coerce.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FeatureError;
use crate::timestamp::parse_timestamp;
use crate::types::{
    CallRecord, ContactRecord, DeviceRecord, DurationValue, RecordTime, SmsRecord, UserRecord,
};

pub const CALL_LOG_FILENAME: &str = "collated_call_log.txt";
pub const CONTACT_LIST_FILENAME: &str = "collated_contact_list.txt";
pub const SMS_LOG_FILENAME: &str = "collated_sms_log.txt";
pub const USER_STATUS_FILENAME: &str = "user_status.csv";

/// Keep `Some(Value::Null)` for an explicit null so it can be told apart from
/// a missing key
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
struct RawCall {
    #[serde(default, deserialize_with = "present")]
    phone_number: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    duration: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    datetime: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSms {
    #[serde(default, deserialize_with = "present")]
    sms_address: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    message_body: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    datetime: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawContact {
    #[serde(default, deserialize_with = "present")]
    date_added: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    last_time_contacted: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDevice {
    #[serde(default)]
    call_log: Vec<RawCall>,
    #[serde(default)]
    sms_log: Vec<RawSms>,
    #[serde(default)]
    contacts: Vec<RawContact>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    devices: Vec<RawDevice>,
}

fn record_time(raw: Option<&Value>) -> RecordTime {
    raw.map_or(RecordTime::Absent, parse_timestamp)
}

fn text_field(field: &'static str, raw: Option<Value>) -> Option<String> {
    match raw? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => {
            warn!(field, value = %other, "Ignoring non-string field");
            None
        }
    }
}

fn duration_value(raw: Value) -> DurationValue {
    match raw {
        Value::Number(n) => match n.as_i64() {
            Some(v) => DurationValue::Integer(v),
            None => n.as_f64().map_or(DurationValue::Other, DurationValue::Real),
        },
        Value::String(s) => DurationValue::Text(s),
        _ => DurationValue::Other,
    }
}

impl From<RawCall> for CallRecord {
    fn from(raw: RawCall) -> Self {
        CallRecord {
            datetime: record_time(raw.datetime.as_ref()),
            phone_number: text_field("phone_number", raw.phone_number),
            duration: raw.duration.map(duration_value),
        }
    }
}

impl From<RawSms> for SmsRecord {
    fn from(raw: RawSms) -> Self {
        SmsRecord {
            datetime: record_time(raw.datetime.as_ref()),
            sms_address: text_field("sms_address", raw.sms_address),
            message_body: text_field("message_body", raw.message_body),
        }
    }
}

impl From<RawContact> for ContactRecord {
    fn from(raw: RawContact) -> Self {
        ContactRecord {
            date_added: record_time(raw.date_added.as_ref()),
            last_time_contacted: record_time(raw.last_time_contacted.as_ref()),
        }
    }
}

impl From<RawDevice> for DeviceRecord {
    fn from(raw: RawDevice) -> Self {
        DeviceRecord {
            call_log: raw.call_log.into_iter().map(Into::into).collect(),
            sms_log: raw.sms_log.into_iter().map(Into::into).collect(),
            contacts: raw.contacts.into_iter().map(Into::into).collect(),
        }
    }
}

/// Parse one user document: `{"status": ..., "devices": [{"call_log": [...],
/// "sms_log": [...], "contacts": [...]}]}`
pub fn parse_user_json(json: &str) -> Result<UserRecord, FeatureError> {
    let raw: RawUser = serde_json::from_str(json)?;
    Ok(UserRecord {
        status: raw.status,
        devices: raw.devices.into_iter().map(Into::into).collect(),
    })
}

/// Read a JSON array log file. A missing file is an empty log; a file that
/// cannot be read or parsed is logged and also treated as empty.
fn read_log<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    if !path.is_file() {
        return Vec::new();
    }
    let parsed = fs::read_to_string(path)
        .map_err(|e| FeatureError::io(path, e))
        .and_then(|text| serde_json::from_str::<Vec<T>>(&text).map_err(FeatureError::from));
    match parsed {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read device log, using empty log");
            Vec::new()
        }
    }
}

/// Load one device directory
pub fn load_device(device_dir: &Path) -> DeviceRecord {
    RawDevice {
        call_log: read_log(&device_dir.join(CALL_LOG_FILENAME)),
        sms_log: read_log(&device_dir.join(SMS_LOG_FILENAME)),
        contacts: read_log(&device_dir.join(CONTACT_LIST_FILENAME)),
    }
    .into()
}

/// Load every device directory under a user folder, ordered by name.
///
/// A folder that is missing or cannot be listed is logged and gives a user
/// with no devices.
pub fn load_user_devices(user_dir: &Path) -> Vec<DeviceRecord> {
    let device_dirs = match list_device_dirs(user_dir) {
        Ok(dirs) => dirs,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %user_dir.display(), "User folder not found, user has no devices");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %user_dir.display(), error = %e, "Could not read user folder, user has no devices");
            return Vec::new();
        }
    };

    debug!(path = %user_dir.display(), devices = device_dirs.len(), "Loading user devices");
    device_dirs.iter().map(|dir| load_device(dir)).collect()
}

fn list_device_dirs(user_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut device_dirs = Vec::new();
    for entry in fs::read_dir(user_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            device_dirs.push(path);
        }
    }
    device_dirs.sort();
    Ok(device_dirs)
}

/// One row of the user status roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub user_id: String,
    pub status: Option<String>,
}

/// Read the `user_id,status` roster. Duplicate user ids keep their first row.
pub fn read_roster(path: &Path) -> Result<Vec<RosterEntry>, FeatureError> {
    let file = fs::File::open(path).map_err(|e| FeatureError::io(path, e))?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader.headers()?.clone();
    let user_idx = headers
        .iter()
        .position(|h| h.trim() == "user_id")
        .ok_or_else(|| FeatureError::MissingColumn("user_id".to_string()))?;
    let status_idx = headers.iter().position(|h| h.trim() == "status");

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(user_id) = record.get(user_idx).map(str::trim).filter(|id| !id.is_empty()) else {
            warn!(line = ?record.position().map(|p| p.line()), "Roster row without a user id");
            continue;
        };
        if !seen.insert(user_id.to_string()) {
            warn!(user_id, "Duplicate roster row ignored");
            continue;
        }
        let status = status_idx
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        entries.push(RosterEntry {
            user_id: user_id.to_string(),
            status,
        });
    }
    Ok(entries)
}

/// A data directory laid out as described in the module docs
#[derive(Debug, Clone)]
pub struct DataDirectory {
    root: PathBuf,
    roster_file: String,
}

impl DataDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            roster_file: USER_STATUS_FILENAME.to_string(),
        }
    }

    pub fn with_roster_file(mut self, roster_file: impl Into<String>) -> Self {
        self.roster_file = roster_file.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn roster_path(&self) -> PathBuf {
        self.root.join(&self.roster_file)
    }

    pub fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join(format!("user-{user_id}"))
    }

    pub fn read_roster(&self) -> Result<Vec<RosterEntry>, FeatureError> {
        read_roster(&self.roster_path())
    }

    pub fn load_user(&self, entry: &RosterEntry) -> UserRecord {
        UserRecord {
            status: entry.status.clone(),
            devices: load_user_devices(&self.user_dir(&entry.user_id)),
        }
    }

    /// Load every user listed in the roster, in roster order
    pub fn load_users(&self) -> Result<Vec<(String, UserRecord)>, FeatureError> {
        let roster = self.read_roster()?;
        let users: Vec<_> = roster
            .iter()
            .map(|entry| (entry.user_id.clone(), self.load_user(entry)))
            .collect();
        debug!(users = users.len(), "Loaded user records");
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_user_json_normalizes_fields() {
        let json = r#"{
            "status": "defaulted",
            "devices": [{
                "call_log": [
                    {"phone_number": "0711", "duration": "60", "datetime": 1490004000000},
                    {"phone_number": 711, "duration": null, "datetime": "garbage"},
                    {"duration": 12.5}
                ],
                "sms_log": [
                    {"sms_address": "MPESA", "message_body": "Confirmed", "datetime": "2017-03-20T10:00:00Z"},
                    {"sms_address": null, "message_body": ["x"]}
                ],
                "contacts": [{"date_added": "0"}, {}]
            }]
        }"#;

        let user = parse_user_json(json).unwrap();
        assert_eq!(user.status.as_deref(), Some("defaulted"));
        let device = &user.devices[0];
        let ten_am = NaiveDate::from_ymd_opt(2017, 3, 20)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();

        assert_eq!(
            device.call_log[0],
            CallRecord {
                phone_number: Some("0711".to_string()),
                duration: Some(DurationValue::Text("60".to_string())),
                datetime: RecordTime::Valid(ten_am),
            }
        );
        assert_eq!(
            device.call_log[1],
            CallRecord {
                phone_number: None,
                duration: Some(DurationValue::Other),
                datetime: RecordTime::Invalid,
            }
        );
        assert_eq!(
            device.call_log[2],
            CallRecord {
                phone_number: None,
                duration: Some(DurationValue::Real(12.5)),
                datetime: RecordTime::Absent,
            }
        );
        assert_eq!(device.sms_log[0].datetime, RecordTime::Valid(ten_am));
        assert_eq!(device.sms_log[1].sms_address, None);
        assert_eq!(device.sms_log[1].message_body, None);
        assert_eq!(device.contacts[0].date_added, RecordTime::Invalid);
        assert_eq!(device.contacts[1].date_added, RecordTime::Absent);
    }

    #[test]
    fn test_parse_user_json_defaults() {
        let user = parse_user_json("{}").unwrap();
        assert_eq!(user, UserRecord::default());
        assert!(parse_user_json("[1, 2]").is_err());
    }

    #[test]
    fn test_read_roster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(&path, "status,user_id\nrepaid,1\ndefaulted, 2 \n,3\nrepaid,1\n").unwrap();

        let roster = read_roster(&path).unwrap();
        assert_eq!(
            roster,
            vec![
                RosterEntry {
                    user_id: "1".to_string(),
                    status: Some("repaid".to_string())
                },
                RosterEntry {
                    user_id: "2".to_string(),
                    status: Some("defaulted".to_string())
                },
                RosterEntry {
                    user_id: "3".to_string(),
                    status: None
                },
            ]
        );
    }

    #[test]
    fn test_read_roster_requires_user_id_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(&path, "id,status\n1,repaid\n").unwrap();

        assert!(matches!(
            read_roster(&path),
            Err(FeatureError::MissingColumn(c)) if c == "user_id"
        ));
        assert!(matches!(
            read_roster(&dir.path().join("missing.csv")),
            Err(FeatureError::Io { .. })
        ));
    }

    #[test]
    fn test_load_device_tolerates_missing_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CALL_LOG_FILENAME),
            r#"[{"phone_number": "*144#", "duration": 3}]"#,
        )
        .unwrap();
        fs::write(dir.path().join(SMS_LOG_FILENAME), "not json").unwrap();

        let device = load_device(dir.path());
        assert_eq!(device.call_log.len(), 1);
        assert!(device.sms_log.is_empty());
        assert!(device.contacts.is_empty());
    }

    #[test]
    fn test_missing_user_folder_has_no_devices() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataDirectory::new(dir.path());
        let user = data.load_user(&RosterEntry {
            user_id: "42".to_string(),
            status: Some("repaid".to_string()),
        });

        assert_eq!(user.status.as_deref(), Some("repaid"));
        assert!(user.devices.is_empty());
    }

    #[test]
    fn test_unreadable_user_folder_has_no_devices() {
        let dir = tempfile::tempdir().unwrap();
        // Listing a plain file as a folder fails with an I/O error
        let not_a_folder = dir.path().join("user-7");
        fs::write(&not_a_folder, "x").unwrap();
        assert!(list_device_dirs(&not_a_folder).is_err());
        assert!(load_user_devices(&not_a_folder).is_empty());

        fs::write(dir.path().join(USER_STATUS_FILENAME), "user_id,status\n7,repaid\n").unwrap();
        let users = DataDirectory::new(dir.path()).load_users().unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].1.devices.is_empty());
    }

    #[test]
    fn test_device_folders_are_sorted_and_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["phone-b", "phone-a"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let dirs = list_device_dirs(dir.path()).unwrap();
        assert_eq!(
            dirs,
            vec![dir.path().join("phone-a"), dir.path().join("phone-b")]
        );
    }
}
