use std::collections::BTreeSet;

use bon::bon;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, serde_as};

use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeFrame {
    #[default]
    #[display("hourly")]
    Hourly,

    #[display("daily")]
    Daily,

    #[display("monthly")]
    Monthly,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, derive_more::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Industry {
    #[display("electric")]
    Electric,

    #[display("gas")]
    Gas,

    #[display("water")]
    Water,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Screen {
    #[default]
    UsageExplorer,
}

/// Half-open usage window.
#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The window of the given length, ending now.
    pub fn last(duration: TimeDelta, now: DateTime<Utc>) -> Self {
        Self { start: now - duration, end: now }
    }
}

/// Usage poll request body.
///
/// Timestamps stay as [`DateTime`] and only turn into epoch milliseconds upon serialization.
#[must_use]
#[serde_as]
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    time_frame: TimeFrame,
    user_id: String,
    screen: Screen,
    include_demand: bool,
    service_location_number: String,
    account_number: String,
    industries: BTreeSet<Industry>,

    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    start_date_time: DateTime<Utc>,

    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    end_date_time: DateTime<Utc>,
}

#[bon]
impl Query {
    #[builder]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        #[builder(into)] user_id: String,
        #[builder(into)] service_location_number: String,
        #[builder(into)] account_number: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        #[builder(default)] time_frame: TimeFrame,
        #[builder(default = BTreeSet::from([Industry::Electric]))] industries: BTreeSet<Industry>,
        #[builder(default)] screen: Screen,
        #[builder(default)] include_demand: bool,
    ) -> Result<Self> {
        if start >= end {
            return Err(Error::Validation(format!(
                "the start ({start}) must be earlier than the end ({end})"
            )));
        }
        for (name, value) in [
            ("user ID", &user_id),
            ("service location number", &service_location_number),
            ("account number", &account_number),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("the {name} is empty")));
            }
        }
        if industries.is_empty() {
            return Err(Error::Validation("no industries requested".to_owned()));
        }
        Ok(Self {
            time_frame,
            user_id,
            screen,
            include_demand,
            service_location_number,
            account_number,
            industries,
            start_date_time: start,
            end_date_time: end,
        })
    }
}

impl Query {
    pub const fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_date_time, self.end_date_time)
    }

    #[must_use]
    pub const fn time_frame(&self) -> TimeFrame {
        self.time_frame
    }

    /// Wire representation of the query.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|error| Error::Validation(error.to_string()))
    }
}
