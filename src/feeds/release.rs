use std::cmp::Ordering;

use serde_json::Value;

use super::ParseError;

/// Version of this build, compared against the latest published release.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

const MIN_VERSION_PARTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    UpdateAvailable,
    UpToDate,
    /// The check never learned the latest version (network failure, bad
    /// payload, or no `tag_name`). Never reported to the user as "up to date".
    Inconclusive,
}

/// Fields extracted from the release feed, before comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseFeed {
    /// `tag_name` with any leading `v` removed; empty when absent.
    pub latest_version: String,
    pub release_url: String,
    pub release_notes: String,
    pub download_url: Option<String>,
}

/// Terminal result of one update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub current_version: String,
    pub latest_version: String,
    pub update_available: bool,
    pub status: UpdateStatus,
    pub release_url: String,
    pub release_notes: String,
    pub download_url: Option<String>,
}

impl ReleaseInfo {
    pub fn inconclusive(current_version: &str) -> Self {
        Self::from_feed(current_version, ReleaseFeed::default())
    }

    /// Compares `current_version` with the feed's latest version.
    pub fn from_feed(current_version: &str, feed: ReleaseFeed) -> Self {
        let status = if feed.latest_version.is_empty() {
            UpdateStatus::Inconclusive
        } else if compare_versions(current_version, &feed.latest_version) == Ordering::Less {
            UpdateStatus::UpdateAvailable
        } else {
            UpdateStatus::UpToDate
        };

        Self {
            current_version: current_version.to_string(),
            latest_version: feed.latest_version,
            update_available: status == UpdateStatus::UpdateAvailable,
            status,
            release_url: feed.release_url,
            release_notes: feed.release_notes,
            download_url: feed.download_url,
        }
    }
}

/// Parses a release-feed body.
///
/// Only malformed JSON is an error. Missing or mistyped fields are left
/// empty, and a missing `tag_name` makes the eventual result inconclusive.
pub fn parse_release(body: &str) -> Result<ReleaseFeed, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;

    let string_field = |name: &str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let latest_version = match string_field("tag_name") {
        Some(tag) => tag.strip_prefix('v').map(str::to_string).unwrap_or(tag),
        None => {
            log::warn!("release feed has no tag_name; version comparison skipped");
            String::new()
        }
    };

    let download_url = object
        .get("assets")
        .and_then(Value::as_array)
        .and_then(|assets| assets.first())
        .and_then(|asset| asset.get("browser_download_url"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ReleaseFeed {
        latest_version,
        release_url: string_field("html_url").unwrap_or_default(),
        release_notes: string_field("body").unwrap_or_default(),
        download_url,
    })
}

/// Compares two dotted numeric versions, ignoring a leading `v`/`V`.
///
/// Each component contributes its leading digits only, so `1.2.3-rc1`
/// reads as `1.2.3`. Each side is zero-padded to at least three
/// components, then only the components both sides have are compared, so
/// `1.0.0.1` equals `1.0.0`.
pub fn compare_versions(lhs: &str, rhs: &str) -> Ordering {
    let left = padded_parts(lhs);
    let right = padded_parts(rhs);

    left
        .iter()
        .zip(right.iter())
        .map(|(l, r)| l.cmp(r))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn padded_parts(version: &str) -> Vec<u64> {
    let mut parts = version_parts(version);
    if parts.len() < MIN_VERSION_PARTS {
        parts.resize(MIN_VERSION_PARTS, 0);
    }
    parts
}

fn version_parts(version: &str) -> Vec<u64> {
    let trimmed = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);

    trimmed
        .split('.')
        .filter_map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                None
            } else {
                Some(digits.parse::<u64>().unwrap_or(u64::MAX))
            }
        })
        .collect()
}
