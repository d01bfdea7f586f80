//! JSON documents served by a Chronicling-America-compatible site.

use serde::{Deserialize, Serialize};

/// One entry of the paginated `batches.json` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetadata {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "URL")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchesList {
    #[serde(default, alias = "Batches")]
    pub batches: Vec<BatchMetadata>,
    /// URL of the next page; absent, null, or empty on the last page.
    #[serde(default, alias = "Next")]
    pub next: Option<String>,
}

impl BatchesList {
    pub fn next_page(&self) -> Option<&str> {
        self.next.as_deref().filter(|next| !next.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TitleRef {
    #[serde(alias = "URL")]
    pub url: String,
    #[serde(default, alias = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueMetadata {
    #[serde(alias = "URL")]
    pub url: String,
    pub date_issued: String,
    #[serde(alias = "Title")]
    pub title: TitleRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchDetail {
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Issues")]
    pub issues: Vec<IssueMetadata>,
    #[serde(default, alias = "LCCNs")]
    pub lccns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TitleDetail {
    #[serde(alias = "LCCN")]
    pub lccn: String,
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default)]
    pub place_of_publication: String,
}

pub fn parse_batches_list(bytes: &[u8]) -> Result<BatchesList, serde_json::Error> {
    serde_json::from_slice(bytes)
}

pub fn parse_batch(bytes: &[u8]) -> Result<BatchDetail, serde_json::Error> {
    serde_json::from_slice(bytes)
}

pub fn parse_title(bytes: &[u8]) -> Result<TitleDetail, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Issue URLs always end in `ed-<N>.json` with a one or two digit N.
pub fn edition_from_url(url: &str) -> Option<u32> {
    let base = url.trim_end_matches('/').rsplit('/').next()?;
    let digits = base.strip_prefix("ed-")?.strip_suffix(".json")?;
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
