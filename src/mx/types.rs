use std::fmt;

use serde::{Deserialize, Serialize};

/// A mail exchanger advertised for a domain. Lower `preference` wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

impl fmt::Display for MxRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.preference, self.exchange)
    }
}

/// Result of a strict lookup. `NoRecords` means the domain answered but
/// publishes no exchanger, which is different from a failed lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "records", rename_all = "snake_case")]
pub enum MxStatus {
    Records(Vec<MxRecord>),
    NoRecords,
}

impl MxStatus {
    pub(crate) fn from_records(records: Vec<MxRecord>) -> Self {
        if records.is_empty() {
            Self::NoRecords
        } else {
            Self::Records(records)
        }
    }

    pub fn records(&self) -> &[MxRecord] {
        match self {
            Self::Records(records) => records,
            Self::NoRecords => &[],
        }
    }

    /// Most preferred exchanger, if any.
    pub fn primary(&self) -> Option<&MxRecord> {
        self.records().first()
    }

    pub fn into_records(self) -> Vec<MxRecord> {
        match self {
            Self::Records(records) => records,
            Self::NoRecords => Vec::new(),
        }
    }
}
