//! Flattening feature values into rows and writing the output table

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::error::FeatureError;
use crate::features::{FeatureValue, Scalar};
use crate::registry::FeatureName;

/// One user's flattened features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub user_id: String,
    pub status: Option<String>,
    values: Vec<(&'static str, Scalar)>,
}

impl FeatureRow {
    pub fn new(user_id: impl Into<String>, status: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            status,
            values: Vec::new(),
        }
    }

    /// Merge one feature result into the row.
    ///
    /// Scalars are stored under the feature name, groups are spread under their
    /// own keys. A column that is already present is overwritten.
    pub fn merge(&mut self, name: FeatureName, value: FeatureValue) {
        match value {
            FeatureValue::Scalar(scalar) => self.set(name.as_str(), scalar),
            FeatureValue::Group(group) => {
                for (key, scalar) in group.iter() {
                    self.set(key, scalar);
                }
            }
        }
    }

    fn set(&mut self, column: &'static str, value: Scalar) {
        match self.values.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => {
                warn!(user_id = %self.user_id, column, "Column produced twice, keeping the last value");
                entry.1 = value;
            }
            None => self.values.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<Scalar> {
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| *v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(c, _)| *c)
    }

    pub fn values(&self) -> &[(&'static str, Scalar)] {
        &self.values
    }
}

impl Serialize for FeatureRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 2))?;
        map.serialize_entry("user_id", &self.user_id)?;
        map.serialize_entry("status", &self.status)?;
        for (column, value) in &self.values {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// All rows of one run plus the union of their columns in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<&'static str>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: FeatureRow) {
        let known: HashSet<&str> = self.columns.iter().copied().collect();
        let new_columns: Vec<_> = row.columns().filter(|c| !known.contains(c)).collect();
        self.columns.extend(new_columns);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table as CSV: `user_id,status` then every feature column.
    /// Missing and null values are empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), FeatureError> {
        let mut out = csv::Writer::from_writer(writer);

        let mut header = vec!["user_id", "status"];
        header.extend(self.columns.iter().copied());
        out.write_record(&header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(row.user_id.clone());
            record.push(row.status.clone().unwrap_or_default());
            for column in &self.columns {
                record.push(row.get(column).map(|v| v.to_string()).unwrap_or_default());
            }
            out.write_record(&record)?;
        }

        out.flush().map_err(|e| FeatureError::io("<csv output>", e))?;
        Ok(())
    }

    pub fn write_csv_file(&self, path: &Path) -> Result<(), FeatureError> {
        let file = std::fs::File::create(path).map_err(|e| FeatureError::io(path, e))?;
        self.write_csv(std::io::BufWriter::new(file))
    }

    /// Rows as a JSON array of objects
    pub fn to_json(&self, pretty: bool) -> Result<String, FeatureError> {
        let json = if pretty {
            serde_json::to_string_pretty(&self.rows)?
        } else {
            serde_json::to_string(&self.rows)?
        };
        Ok(json)
    }
}

impl FromIterator<FeatureRow> for FeatureTable {
    fn from_iter<I: IntoIterator<Item = FeatureRow>>(iter: I) -> Self {
        let mut table = FeatureTable::new();
        for row in iter {
            table.push(row);
        }
        table
    }
}
