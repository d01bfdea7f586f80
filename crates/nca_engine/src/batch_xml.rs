//! Reader for the `batch.xml` manifest in a staged batch's `data` folder.

use std::fs;
use std::io;
use std::path::Path;

use scraper::{Html, Selector};

/// One `<issue>` element: attributes plus the relative path it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchXmlIssue {
    pub lccn: String,
    pub issue_date: String,
    pub edition_order: String,
    pub content: String,
}

/// Parses the issue list out of batch XML text.
///
/// The HTML parser lowercases attribute names, hence `issuedate` and
/// `editionorder` below.
pub fn parse_batch_xml(xml: &str) -> Vec<BatchXmlIssue> {
    let doc = Html::parse_document(xml);
    let Ok(issue_sel) = Selector::parse("issue") else {
        return Vec::new();
    };

    doc.select(&issue_sel)
        .map(|node| {
            let attr = |name: &str| node.value().attr(name).unwrap_or_default().trim().to_string();
            BatchXmlIssue {
                lccn: attr("lccn"),
                issue_date: attr("issuedate"),
                edition_order: attr("editionorder"),
                content: node.text().collect::<String>().trim().to_string(),
            }
        })
        .collect()
}

/// Reads `<batch_dir>/data/batch.xml`.
pub fn read_batch_xml(batch_dir: &Path) -> io::Result<Vec<BatchXmlIssue>> {
    let xml = fs::read_to_string(batch_dir.join("data").join("batch.xml"))?;
    Ok(parse_batch_xml(&xml))
}
