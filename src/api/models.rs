use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_with::{PickFirst, TimestampMilliSeconds, serde_as};

use crate::{
    error::{Error, Result},
    prelude::*,
};

/// Server-side state of the usage computation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[serde(from = "String", into = "String")]
pub enum PollStatus {
    #[display("PENDING")]
    Pending,

    #[display("COMPLETE")]
    Complete,

    #[display("ERROR")]
    Error,

    /// Any other terminal status, kept verbatim.
    #[display("{_0}")]
    Other(String),
}

impl From<String> for PollStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "PENDING" => Self::Pending,
            "COMPLETE" => Self::Complete,
            "ERROR" => Self::Error,
            _ => Self::Other(status),
        }
    }
}

impl From<PollStatus> for String {
    fn from(status: PollStatus) -> Self {
        status.to_string()
    }
}

impl PollStatus {
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Decoded poll response.
#[must_use]
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PollEnvelope {
    pub status: PollStatus,

    /// Series groups in the order the service sent them, keyed by group name (e.g. `ELECTRIC`).
    #[serde(rename = "data")]
    #[serde_as(as = "serde_with::Map<_, _>")]
    pub groups: Vec<(String, Vec<UsageRecord>)>,
}

#[derive(Deserialize)]
struct RawEnvelope<'a> {
    status: PollStatus,

    #[serde(borrow, default)]
    data: Option<&'a RawValue>,
}

#[serde_as]
#[derive(Deserialize)]
struct Groups(#[serde_as(as = "serde_with::Map<_, _>")] Vec<(String, Vec<UsageRecord>)>);

impl PollEnvelope {
    /// Decode the raw poll response body.
    pub fn from_json(raw: &str) -> Result<Self> {
        Self::decode(crate::api::POLL_PATH, raw)
    }

    pub(crate) fn decode(endpoint: &str, raw: &str) -> Result<Self> {
        let envelope: RawEnvelope = parse(endpoint, raw)?;
        if envelope.status.is_pending() {
            if envelope.data.is_some() {
                warn!("discarding the data of a pending response");
            }
            return Ok(Self { status: envelope.status, groups: Vec::new() });
        }

        let groups = match envelope.data {
            Some(data) => parse::<Groups>(endpoint, data.get())?.0,
            None => Vec::new(),
        };
        if envelope.status == PollStatus::Complete && groups.is_empty() {
            return Err(Error::Decode {
                endpoint: endpoint.to_owned(),
                reason: "complete response without any series group".to_owned(),
            });
        }
        Ok(Self { status: envelope.status, groups })
    }

    /// Number of usage records over all the groups.
    #[must_use]
    pub fn n_records(&self) -> usize {
        self.groups.iter().map(|(_, records)| records.len()).sum()
    }

    /// Flatten the groups, preserving the order.
    #[must_use]
    pub fn into_records(self) -> Vec<UsageRecord> {
        self.groups.into_iter().flat_map(|(_, records)| records).collect()
    }
}

fn parse<'a, T: Deserialize<'a>>(endpoint: &str, raw: &'a str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|error| Error::Decode { endpoint: endpoint.to_owned(), reason: error.to_string() })
}

#[must_use]
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub service_location_number: String,
    pub account_number: String,

    #[serde_as(as = "PickFirst<(TimestampMilliSeconds<i64>, _)>")]
    pub start_date_time: DateTime<Utc>,

    #[serde_as(as = "PickFirst<(TimestampMilliSeconds<i64>, _)>")]
    pub end_date_time: DateTime<Utc>,

    pub time_frame: String,
    pub industry: String,
    pub unit_of_measure: String,
    pub connect_date: String,
    pub has_daily: bool,
    pub has_hourly: bool,

    #[serde(rename = "type")]
    pub kind: String,

    pub series: Vec<Series>,
}

impl UsageRecord {
    /// Sum of all the values over all the series.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.series.iter().flat_map(|series| &series.data_points).map(|point| point.value).sum()
    }
}

/// Time-ordered readings of a single meter channel.
#[must_use]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(rename = "meterNumber")]
    pub meter_number: String,

    #[serde(rename = "isNet", default)]
    pub is_net: bool,

    #[serde(rename = "channel")]
    pub channel: i64,

    #[serde(rename = "data")]
    pub data_points: Vec<DataPoint>,
}

#[must_use]
#[serde_as]
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde_as(as = "PickFirst<(TimestampMilliSeconds<i64>, _)>")]
    #[serde(rename = "x")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "y")]
    pub value: f64,
}
