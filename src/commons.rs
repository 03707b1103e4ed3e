//! Wikimedia Commons image resolution.
//!
//! Two-stage lookup against the Commons MediaWiki API (no key required):
//! a free-text search restricted to the file namespace, then a batched
//! `imageinfo` query for the returned page ids. The first candidate, in
//! the API's own ranking order, that carries a direct URL wins; no
//! further relevance filtering.
//!
//! Resolution failures of any kind (transport, non-2xx, malformed JSON,
//! zero results) are logged and collapse to `None`; one product's missing
//! illustration must never abort the run for the others.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// MediaWiki API endpoint for Wikimedia Commons.
pub const COMMONS_API: &str = "https://commons.wikimedia.org/w/api.php";

/// Maximum number of search hits considered per query.
const SEARCH_LIMIT: &str = "6";

/// Timeout for the two metadata queries.
const METADATA_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for the image download itself.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum CommonsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A resolved candidate image: where to get it and whom to credit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageDescriptor {
    /// Direct URL to the original file.
    pub url: String,
    /// Commons page title, e.g. `File:Blue widget.jpg`.
    pub title: String,
    /// Flattened extmetadata values keyed by field name
    /// (`Artist`, `LicenseShortName`, `LicenseUrl`, ...).
    pub metadata: HashMap<String, String>,
}

/// Seam between the pipeline and the network.
///
/// The production implementation is [`CommonsClient`]; tests drive the
/// pipeline with a stub instead.
pub trait ImageSource {
    /// Find a candidate image for a free-text query.
    fn resolve(&self, query: &str) -> Option<ImageDescriptor>;

    /// Download `url` to `dest`, creating parent directories.
    fn download(&self, url: &str, dest: &Path) -> Result<(), CommonsError>;
}

/// Blocking HTTP client for the Commons API.
pub struct CommonsClient {
    http: reqwest::blocking::Client,
    endpoint: String,
}

impl CommonsClient {
    pub fn new() -> Result<Self, CommonsError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("autopress/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: COMMONS_API.to_string(),
        })
    }

    /// The fallible body of [`ImageSource::resolve`].
    fn lookup(&self, query: &str) -> Result<Option<ImageDescriptor>, CommonsError> {
        let search: SearchResponse = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "search"),
                ("srsearch", query),
                ("srnamespace", "6"),
                ("srlimit", SEARCH_LIMIT),
            ])
            .timeout(METADATA_TIMEOUT)
            .send()?
            .error_for_status()?
            .json()?;

        let page_ids: Vec<u64> = search
            .query
            .map(|q| q.search.into_iter().map(|hit| hit.pageid).collect())
            .unwrap_or_default();
        if page_ids.is_empty() {
            return Ok(None);
        }

        let joined = page_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join("|");
        let info: InfoResponse = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("prop", "imageinfo"),
                ("iiprop", "url|extmetadata"),
                ("pageids", joined.as_str()),
            ])
            .timeout(METADATA_TIMEOUT)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(first_candidate(&page_ids, info))
    }
}

impl ImageSource for CommonsClient {
    fn resolve(&self, query: &str) -> Option<ImageDescriptor> {
        info!(query, "searching Wikimedia Commons");
        match self.lookup(query) {
            Ok(Some(descriptor)) => {
                info!(url = %descriptor.url, "found image");
                Some(descriptor)
            }
            Ok(None) => {
                info!(query, "no usable Commons results");
                None
            }
            Err(e) => {
                warn!(query, error = %e, "Commons search failed");
                None
            }
        }
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), CommonsError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut response = self
            .http
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()?
            .error_for_status()?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response, &mut file)?;
        Ok(())
    }
}

/// Pick the first page, in search-ranking order, with retrievable info.
///
/// The `pages` map in the imageinfo response is keyed by page id but
/// unordered; `order` restores the search API's ranking.
fn first_candidate(order: &[u64], info: InfoResponse) -> Option<ImageDescriptor> {
    let mut pages = info.query?.pages;
    for id in order {
        let Some(page) = pages.remove(&id.to_string()) else {
            continue;
        };
        let Some(first) = page.imageinfo.and_then(|infos| infos.into_iter().next()) else {
            continue;
        };
        let Some(url) = first.url else {
            continue;
        };
        return Some(ImageDescriptor {
            url,
            title: page.title.unwrap_or_default(),
            metadata: flatten_metadata(first.extmetadata),
        });
    }
    None
}

/// Reduce `{"Artist": {"value": "..."}}` to `{"Artist": "..."}`.
///
/// Commons occasionally emits non-string values (booleans, numbers);
/// those are stringified, nulls dropped.
fn flatten_metadata(raw: Option<HashMap<String, ExtValue>>) -> HashMap<String, String> {
    raw.unwrap_or_default()
        .into_iter()
        .filter_map(|(key, ext)| match ext.value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

// Response shapes for the two API calls. Only the fields we touch.

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    pageid: u64,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    query: Option<InfoQuery>,
}

#[derive(Debug, Deserialize)]
struct InfoQuery {
    #[serde(default)]
    pages: HashMap<String, InfoPage>,
}

#[derive(Debug, Deserialize)]
struct InfoPage {
    title: Option<String>,
    imageinfo: Option<Vec<ImageInfo>>,
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
    url: Option<String>,
    extmetadata: Option<HashMap<String, ExtValue>>,
}

#[derive(Debug, Deserialize)]
struct ExtValue {
    #[serde(default)]
    value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_extracts_page_ids_in_order() {
        let raw = r#"{"query": {"search": [
            {"ns": 6, "title": "File:A.jpg", "pageid": 42},
            {"ns": 6, "title": "File:B.jpg", "pageid": 7}
        ]}}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        let ids: Vec<u64> = parsed
            .query
            .unwrap()
            .search
            .into_iter()
            .map(|h| h.pageid)
            .collect();
        assert_eq!(ids, vec![42, 7]);
    }

    #[test]
    fn empty_search_response_has_no_hits() {
        let parsed: SearchResponse = serde_json::from_str(r#"{"query": {"search": []}}"#).unwrap();
        assert!(parsed.query.unwrap().search.is_empty());

        let parsed: SearchResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.query.is_none());
    }

    #[test]
    fn first_candidate_follows_search_order_not_map_order() {
        let raw = r#"{"query": {"pages": {
            "7":  {"pageid": 7,  "title": "File:B.jpg",
                   "imageinfo": [{"url": "https://upload.example/b.jpg", "extmetadata": {}}]},
            "42": {"pageid": 42, "title": "File:A.jpg",
                   "imageinfo": [{"url": "https://upload.example/a.jpg", "extmetadata": {}}]}
        }}}"#;
        let info: InfoResponse = serde_json::from_str(raw).unwrap();
        let descriptor = first_candidate(&[42, 7], info).unwrap();
        assert_eq!(descriptor.url, "https://upload.example/a.jpg");
        assert_eq!(descriptor.title, "File:A.jpg");
    }

    #[test]
    fn pages_without_imageinfo_are_skipped() {
        let raw = r#"{"query": {"pages": {
            "42": {"pageid": 42, "title": "File:A.jpg"},
            "7":  {"pageid": 7,  "title": "File:B.jpg",
                   "imageinfo": [{"url": "https://upload.example/b.jpg"}]}
        }}}"#;
        let info: InfoResponse = serde_json::from_str(raw).unwrap();
        let descriptor = first_candidate(&[42, 7], info).unwrap();
        assert_eq!(descriptor.url, "https://upload.example/b.jpg");
    }

    #[test]
    fn no_candidate_when_every_page_lacks_a_url() {
        let raw = r#"{"query": {"pages": {
            "42": {"pageid": 42, "title": "File:A.jpg", "imageinfo": [{}]}
        }}}"#;
        let info: InfoResponse = serde_json::from_str(raw).unwrap();
        assert!(first_candidate(&[42], info).is_none());
    }

    #[test]
    fn metadata_values_are_flattened() {
        let raw = r#"{"query": {"pages": {
            "42": {"pageid": 42, "title": "File:A.jpg", "imageinfo": [{
                "url": "https://upload.example/a.jpg",
                "extmetadata": {
                    "Artist": {"value": "Jane Painter", "source": "commons-desc-page"},
                    "LicenseShortName": {"value": "CC BY-SA 4.0"},
                    "Restrictions": {"value": null}
                }
            }]}
        }}}"#;
        let info: InfoResponse = serde_json::from_str(raw).unwrap();
        let descriptor = first_candidate(&[42], info).unwrap();
        assert_eq!(
            descriptor.metadata.get("Artist").map(String::as_str),
            Some("Jane Painter")
        );
        assert_eq!(
            descriptor.metadata.get("LicenseShortName").map(String::as_str),
            Some("CC BY-SA 4.0")
        );
        assert!(!descriptor.metadata.contains_key("Restrictions"));
    }
}
