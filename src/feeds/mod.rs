//! Result parsers for the two remote feeds.
//!
//! Parsers are pure: raw body in, typed value or [`ParseError`] out. A parse
//! failure costs the poller one tick and nothing else.

pub mod position;
pub mod release;

pub use position::{parse_position, Sample};
pub use release::{compare_versions, parse_release, ReleaseFeed, ReleaseInfo, UpdateStatus};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("expected a JSON object at the top level")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` has the wrong type")]
    WrongType(&'static str),
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::MalformedJson(e.to_string())
    }
}
