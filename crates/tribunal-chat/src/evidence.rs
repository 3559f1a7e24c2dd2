//! Evidence filed by either party

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tribunal_api::{EvidenceRecord, Party, PolicyRecord};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A filed piece of evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(alias = "submittedBy")]
    pub submitted_by: Party,
    #[serde(alias = "submittedAt")]
    pub submitted_at: DateTime<Utc>,
    #[serde(default, alias = "isFactChecked")]
    pub is_fact_checked: bool,
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl Evidence {
    /// Statement sent to the arbitration service
    pub fn statement(&self) -> String {
        format!("{}: {}", self.title, self.description)
    }

    pub fn to_record(&self, policy: &PolicyRecord, submitter_id: Uuid) -> EvidenceRecord {
        EvidenceRecord {
            id: Uuid::new_v4(),
            policy_id: policy.id,
            submitter_id,
            content: self.statement(),
            created_at: self.submitted_at,
        }
    }
}

/// A submission before it is accepted
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvidence {
    pub title: String,
    pub description: String,
    pub submitted_by: Party,
    pub attachments: Vec<String>,
}

impl NewEvidence {
    pub fn new(party: Party, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            submitted_by: party,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, name: impl Into<String>) -> Self {
        self.attachments.push(name.into());
        self
    }
}

/// File types accepted as attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Pdf,
    Text,
    Document,
}

impl AttachmentKind {
    /// Classify a file by extension. None means the file is not accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "svg" => Some(AttachmentKind::Image),
            "pdf" => Some(AttachmentKind::Pdf),
            "txt" | "md" | "csv" | "log" => Some(AttachmentKind::Text),
            "doc" | "docx" => Some(AttachmentKind::Document),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Pdf => "pdf",
            AttachmentKind::Text => "text",
            AttachmentKind::Document => "document",
        }
    }
}

/// Format a byte count the way file pickers do: `0 Bytes`, `1.5 KB`, `2 MB`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exp = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && exp < UNITS.len() - 1 {
        value /= 1024.0;
        exp += 1;
    }

    // Two decimals, trailing zeros trimmed
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[exp])
}

/// Evidence on file for the dispute
#[derive(Debug, Clone)]
pub struct EvidenceLocker {
    records: Vec<Evidence>,
    next_id: u64,
}

impl EvidenceLocker {
    pub fn new(records: Vec<Evidence>) -> Self {
        let next_id = records
            .iter()
            .filter_map(|e| e.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        Self { records, next_id }
    }

    /// The built-in records of the sample dispute
    pub fn builtin() -> Self {
        let day = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).single().unwrap_or_default();
        let record = |id: &str, title: &str, description: &str, party, at, file: &str| Evidence {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            submitted_by: party,
            submitted_at: at,
            is_fact_checked: true,
            attachments: vec![file.to_string()],
        };

        Self::new(vec![
            record(
                "1",
                "Service Agreement Contract",
                "Original signed contract outlining service terms and expectations.",
                Party::Claimant,
                day(10),
                "contract.pdf",
            ),
            record(
                "2",
                "Payment Receipt",
                "Proof of payment for services rendered on January 5th, 2024.",
                Party::Claimant,
                day(12),
                "receipt.pdf",
            ),
            record(
                "3",
                "Service Delivery Confirmation",
                "Email confirmation showing successful completion of requested services.",
                Party::Defendant,
                day(14),
                "confirmation.pdf",
            ),
        ])
    }

    /// Load records from a JSON array
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let records: Vec<Evidence> = serde_json::from_str(&text)
            .map_err(|e| Error::Other(format!("Invalid evidence file {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), count = records.len(), "loaded evidence");
        Ok(Self::new(records))
    }

    pub fn list(&self) -> &[Evidence] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&Evidence> {
        self.records.iter().find(|e| e.id == id)
    }

    /// Records filed by `party`, oldest first
    pub fn by_party(&self, party: Party) -> impl Iterator<Item = &Evidence> {
        self.records.iter().filter(move |e| e.submitted_by == party)
    }

    /// Validate and file a submission. New records start unverified.
    pub fn submit(&mut self, submission: NewEvidence) -> Result<Evidence> {
        let title = submission.title.trim();
        let description = submission.description.trim();
        if title.is_empty() {
            return Err(Error::InvalidEvidence("title is required".into()));
        }
        if description.is_empty() {
            return Err(Error::InvalidEvidence("description is required".into()));
        }

        let attachments = submission
            .attachments
            .into_iter()
            .filter(|name| {
                let accepted = AttachmentKind::from_name(name).is_some();
                if !accepted {
                    tracing::warn!(file = %name, "dropping attachment of unsupported type");
                }
                accepted
            })
            .collect();

        let evidence = Evidence {
            id: self.next_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            submitted_by: submission.submitted_by,
            submitted_at: Utc::now(),
            is_fact_checked: false,
            attachments,
        };
        self.next_id += 1;
        self.records.push(evidence.clone());
        Ok(evidence)
    }
}

impl Default for EvidenceLocker {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_by_party() {
        let locker = EvidenceLocker::builtin();
        let claimant: Vec<_> = locker.by_party(Party::Claimant).map(|e| e.id.as_str()).collect();
        let defendant: Vec<_> = locker.by_party(Party::Defendant).map(|e| e.id.as_str()).collect();
        assert_eq!(claimant, vec!["1", "2"]);
        assert_eq!(defendant, vec!["3"]);
        assert!(locker.list().iter().all(|e| e.is_fact_checked));
        assert_eq!(locker.get("2").unwrap().submitted_at.timestamp(), 1705017600);
    }

    #[test]
    fn test_submit_rejects_blank_fields() {
        let mut locker = EvidenceLocker::builtin();
        let err = locker.submit(NewEvidence::new(Party::Claimant, "   ", "details"));
        assert!(matches!(err, Err(Error::InvalidEvidence(_))));
        let err = locker.submit(NewEvidence::new(Party::Claimant, "Receipt", "\n\t"));
        assert!(matches!(err, Err(Error::InvalidEvidence(_))));
        assert_eq!(locker.list().len(), 3);
    }

    #[test]
    fn test_submit_files_unverified_record() {
        let mut locker = EvidenceLocker::builtin();
        let evidence = locker
            .submit(
                NewEvidence::new(Party::Defendant, "  Refund log ", " Shows the refund was issued. ")
                    .with_attachment("log.txt")
                    .with_attachment("screenshot.PNG")
                    .with_attachment("payload.exe"),
            )
            .unwrap();

        assert_eq!(evidence.id, "4");
        assert_eq!(evidence.title, "Refund log");
        assert_eq!(evidence.description, "Shows the refund was issued.");
        assert!(!evidence.is_fact_checked);
        assert_eq!(evidence.attachments, vec!["log.txt", "screenshot.PNG"]);
        assert_eq!(locker.by_party(Party::Defendant).count(), 2);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1 MB");
        assert_eq!(format_file_size(1234567), "1.18 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024), "5 GB");
    }

    #[test]
    fn test_attachment_kind() {
        assert_eq!(AttachmentKind::from_name("scan.JPeG"), Some(AttachmentKind::Image));
        assert_eq!(AttachmentKind::from_name("contract.pdf"), Some(AttachmentKind::Pdf));
        assert_eq!(AttachmentKind::from_name("notes.docx"), Some(AttachmentKind::Document));
        assert_eq!(AttachmentKind::from_name("README"), None);
    }

    #[test]
    fn test_legacy_party_labels_in_files() {
        let evidence: Evidence = serde_json::from_str(
            r#"{"id":"9","title":"t","description":"d","submittedBy":"opposer","submittedAt":"2024-01-10T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(evidence.submitted_by, Party::Claimant);
        assert!(evidence.attachments.is_empty());
    }
}
