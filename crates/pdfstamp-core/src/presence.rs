//! Collaboration layer interface
//!
//! Comments and presence are provided by an external service. The editor
//! only tells it which document is open and which page the user is on.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMeta {
    pub id: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub document_name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl DocumentMeta {
    pub fn pdf(id: &str, name: &str) -> Self {
        let document_name = if name.is_empty() {
            "PDF Document".to_string()
        } else {
            name.to_string()
        };
        Self {
            id: id.to_string(),
            metadata: DocumentMetadata {
                document_name,
                kind: "pdf".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub location_name: String,
}

impl Location {
    /// Location for a 1-indexed page
    pub fn page(page_number: usize) -> Self {
        Self {
            id: format!("pdf-page-{}", page_number),
            location_name: format!("Page {}", page_number),
        }
    }
}

pub trait PresenceSink {
    fn set_document(&mut self, document: &DocumentMeta);
    fn set_location(&mut self, location: &Location);
}
