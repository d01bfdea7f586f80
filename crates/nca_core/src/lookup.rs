use std::collections::HashMap;

use thiserror::Error;

use crate::finder::Finder;
use crate::schema::{IssueId, IssueKey, SearchKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("cannot index issue at {location:?} (database id {database_id}): no title")]
    MissingTitle { location: String, database_id: i64 },
}

type IssueMap = HashMap<String, Vec<IssueId>>;

/// Read-only indexes over one finder's issues, keyed by the full issue key
/// and by each truncation of it.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    full: IssueMap,
    no_edition: IssueMap,
    no_day: IssueMap,
    no_month: IssueMap,
    no_year: IssueMap,
}

impl Lookup {
    /// Indexes every issue in a single pass. Each list comes out ordered by
    /// full key, then by the issue's TSV dump, so repeated queries agree.
    pub fn build(finder: &Finder) -> Result<Self, LookupError> {
        let mut entries = Vec::with_capacity(finder.issues.len());
        for id in finder.issue_ids() {
            let key = finder.issue_key(id).ok_or_else(|| {
                let issue = finder.issue(id);
                LookupError::MissingTitle {
                    location: issue.location.clone(),
                    database_id: issue.database_id,
                }
            })?;
            entries.push((key.to_string(), finder.issue_tsv(id), id));
        }
        entries.sort();

        let mut lookup = Lookup::default();
        for (key, _, id) in entries {
            // lccn/YYYYMMDDEE: trim edition, day, month, then "/YYYY"
            let mut k = key.as_str();
            lookup.full.entry(k.to_string()).or_default().push(id);
            k = &k[..k.len() - 2];
            lookup.no_edition.entry(k.to_string()).or_default().push(id);
            k = &k[..k.len() - 2];
            lookup.no_day.entry(k.to_string()).or_default().push(id);
            k = &k[..k.len() - 2];
            lookup.no_month.entry(k.to_string()).or_default().push(id);
            k = &k[..k.len() - 5];
            lookup.no_year.entry(k.to_string()).or_default().push(id);
        }

        Ok(lookup)
    }

    /// Issues matching the given partial key; empty when nothing matches.
    pub fn issues(&self, key: &SearchKey) -> &[IssueId] {
        let map = if key.ed > 0 {
            &self.full
        } else if key.day > 0 {
            &self.no_edition
        } else if key.month > 0 {
            &self.no_day
        } else if key.year > 0 {
            &self.no_month
        } else {
            &self.no_year
        };
        map.get(&key.to_string()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn issues_for_key(&self, key: &IssueKey) -> &[IssueId] {
        self.full
            .get(key.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every distinct full key, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.full.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }
}
