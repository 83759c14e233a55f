use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::ParseError;

/// One reading from the orbital-position feed.
///
/// Only samples with `valid == true` are ever stored or published; the
/// default value is the "nothing received yet" placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    /// Degrees, -90..90.
    pub latitude: f64,
    /// Degrees, -180..180.
    pub longitude: f64,
    /// Kilometres above the surface.
    pub altitude: f64,
    /// Kilometres per hour.
    pub velocity: f64,
    /// Unix epoch seconds as reported by the feed, 0 if absent.
    pub timestamp: i64,
    pub valid: bool,
}

impl Sample {
    /// Feed timestamp as a UTC instant. `None` when the feed sent none.
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        if self.timestamp == 0 {
            return None;
        }
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Parses a position-feed body.
///
/// `latitude` and `longitude` are required numbers. `altitude`, `velocity`
/// and `timestamp` are optional; when present they must have the right type.
pub fn parse_position(body: &str) -> Result<Sample, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;

    let latitude = required_f64(object, "latitude")?;
    let longitude = required_f64(object, "longitude")?;
    let altitude = optional_f64(object, "altitude")?.unwrap_or(0.0);
    let velocity = optional_f64(object, "velocity")?.unwrap_or(0.0);
    let timestamp = match object.get("timestamp") {
        None | Some(Value::Null) => 0,
        Some(v) => v.as_i64().ok_or(ParseError::WrongType("timestamp"))?,
    };

    Ok(Sample {
        latitude,
        longitude,
        altitude,
        velocity,
        timestamp,
        valid: true,
    })
}

fn required_f64(object: &Map<String, Value>, field: &'static str) -> Result<f64, ParseError> {
    optional_f64(object, field)?.ok_or(ParseError::MissingField(field))
}

fn optional_f64(object: &Map<String, Value>, field: &'static str) -> Result<Option<f64>, ParseError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or(ParseError::WrongType(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED_BODY: &str = r#"{
        "name": "iss",
        "id": 25544,
        "latitude": 50.11496269845,
        "longitude": 118.07900427317,
        "altitude": 408.05526028199,
        "velocity": 27635.971970874,
        "visibility": "daylight",
        "timestamp": 1364069476
    }"#;

    #[test]
    fn test_observed_at() {
        let sample = parse_position(FEED_BODY).unwrap();
        let observed = sample.observed_at().unwrap();
        assert_eq!(observed.to_rfc3339(), "2013-03-23T20:11:16+00:00");

        assert_eq!(Sample::default().observed_at(), None);
    }

    #[test]
    fn test_parse_full_feed_body() {
        let sample = parse_position(FEED_BODY).unwrap_or_else(|e| panic!("parse failed: {e}"));

        assert!(sample.valid);
        assert!((sample.latitude - 50.11496269845).abs() < 1e-9);
        assert!((sample.longitude - 118.07900427317).abs() < 1e-9);
        assert!((sample.altitude - 408.05526028199).abs() < 1e-9);
        assert!((sample.velocity - 27635.971970874).abs() < 1e-6);
        assert_eq!(sample.timestamp, 1364069476);
    }

    #[test]
    fn test_optional_fields_default_to_zero() {
        let sample = parse_position(r#"{"latitude": -12.5, "longitude": 45}"#)
            .unwrap_or_else(|e| panic!("parse failed: {e}"));

        assert!(sample.valid);
        assert_eq!(sample.latitude, -12.5);
        assert_eq!(sample.longitude, 45.0);
        assert_eq!(sample.altitude, 0.0);
        assert_eq!(sample.velocity, 0.0);
        assert_eq!(sample.timestamp, 0);
    }

    #[test]
    fn test_missing_latitude_is_rejected() {
        assert_eq!(
            parse_position(r#"{"longitude": 10.0, "altitude": 400.0}"#),
            Err(ParseError::MissingField("latitude"))
        );
    }

    #[test]
    fn test_missing_longitude_is_rejected() {
        assert_eq!(
            parse_position(r#"{"latitude": 10.0}"#),
            Err(ParseError::MissingField("longitude"))
        );
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        assert_eq!(
            parse_position(r#"{"latitude": "north", "longitude": 1.0}"#),
            Err(ParseError::WrongType("latitude"))
        );
        assert_eq!(
            parse_position(r#"{"latitude": 1.0, "longitude": 1.0, "timestamp": 1.5}"#),
            Err(ParseError::WrongType("timestamp"))
        );
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(matches!(
            parse_position(r#"{"latitude": 1.0,"#),
            Err(ParseError::MalformedJson(_))
        ));
        assert_eq!(parse_position("[1, 2]"), Err(ParseError::NotAnObject));
    }
}
