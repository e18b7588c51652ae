#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

pub mod api;
pub mod clock;
pub mod error;
mod prelude;

pub use self::{
    api::{
        Api,
        credentials::{Credentials, Password},
        models::{DataPoint, PollEnvelope, PollStatus, Series, UsageRecord},
        poll::{PollOptions, Poller},
        query::{Industry, Query, Screen, TimeFrame, TimeWindow},
        session::{Session, authenticate},
    },
    clock::{Clock, TokioClock},
    error::Error,
};
