//! Wire types for the arbitration service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A side of the dispute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    /// The party bringing the complaint
    #[serde(alias = "opposer")]
    Claimant,
    /// The party answering it
    #[serde(alias = "defender")]
    Defendant,
}

impl Party {
    /// Both parties, claimant first
    pub const ALL: [Party; 2] = [Party::Claimant, Party::Defendant];

    /// Get a human-readable name for this party
    pub fn name(&self) -> &'static str {
        match self {
            Party::Claimant => "Claimant",
            Party::Defendant => "Defendant",
        }
    }

    /// Parse a party label, accepting the service's legacy names
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "claimant" | "opposer" | "c" => Some(Party::Claimant),
            "defendant" | "defender" | "d" => Some(Party::Defendant),
            _ => None,
        }
    }

    /// The other side
    pub fn opponent(&self) -> Self {
        match self {
            Party::Claimant => Party::Defendant,
            Party::Defendant => Party::Claimant,
        }
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Policy both parties agreed to, as the service expects it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl PolicyRecord {
    /// Create a policy record with fresh identifiers
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// One piece of evidence, as the service expects it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub submitter_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl EvidenceRecord {
    /// Create an evidence record filed against `policy` by `submitter_id`
    pub fn new(policy: &PolicyRecord, submitter_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            policy_id: policy.id,
            submitter_id,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Request body for the streaming arbitration endpoint.
///
/// The service still names the parties opposer/defender on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationRequest {
    pub policy: PolicyRecord,
    #[serde(rename = "opposer_evidences")]
    pub claimant_evidences: Vec<EvidenceRecord>,
    #[serde(rename = "defender_evidences")]
    pub defendant_evidences: Vec<EvidenceRecord>,
    pub user_query: String,
}

impl ArbitrationRequest {
    /// Create a request with no evidence on either side
    pub fn new(policy: PolicyRecord, user_query: impl Into<String>) -> Self {
        Self {
            policy,
            claimant_evidences: Vec::new(),
            defendant_evidences: Vec::new(),
            user_query: user_query.into(),
        }
    }

    /// Add a statement for `party`.
    ///
    /// Defendant statements are filed by the policy creator; claimant
    /// statements by `claimant_id`.
    pub fn with_evidence(mut self, party: Party, claimant_id: Uuid, content: impl Into<String>) -> Self {
        match party {
            Party::Claimant => {
                let record = EvidenceRecord::new(&self.policy, claimant_id, content);
                self.claimant_evidences.push(record);
            }
            Party::Defendant => {
                let record = EvidenceRecord::new(&self.policy, self.policy.creator_id, content);
                self.defendant_evidences.push(record);
            }
        }
        self
    }

    /// Evidence filed by `party`
    pub fn evidences(&self, party: Party) -> &[EvidenceRecord] {
        match party {
            Party::Claimant => &self.claimant_evidences,
            Party::Defendant => &self.defendant_evidences,
        }
    }

    /// Build a request around the built-in data-security case
    pub fn sample(user_query: impl Into<String>) -> Self {
        let policy = PolicyRecord::new(
            "Data Security and Access Control Policy",
            "Policy agreed upon by both IT management and security team: All employee access \
             to sensitive customer data must be logged and monitored. Any access to customer \
             payment information requires explicit written approval from the Data Protection \
             Officer (DPO) before access is granted. All access logs must be reviewed weekly by \
             the security team. No exceptions are permitted without formal risk assessment \
             documentation.",
        );
        let claimant_id = Uuid::new_v4();

        Self::new(policy, user_query)
            .with_evidence(
                Party::Claimant,
                claimant_id,
                "Security audit logs show that 15 employees accessed customer payment data \
                 without DPO approval.",
            )
            .with_evidence(
                Party::Claimant,
                claimant_id,
                "Weekly security log reviews have not been conducted for 6 weeks.",
            )
            .with_evidence(
                Party::Defendant,
                claimant_id,
                "We have implemented a new automated logging system that captures all data \
                 access attempts.",
            )
            .with_evidence(
                Party::Defendant,
                claimant_id,
                "Operational needs sometimes require flexible interpretation of policies.",
            )
    }
}

/// One `data:` payload of the arbitration event stream
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamPayload {
    /// "complete", "error", or absent for result chunks
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Error description for "error" payloads
    #[serde(default)]
    pub message: Option<String>,
    /// Partial decision fields
    #[serde(default)]
    pub arbitration_result: Option<ArbitrationResult>,
}

/// Partial decision. Every field may be missing from any given chunk.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ArbitrationResult {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub decision_type: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub decision_id: Option<String>,
}

/// Identifiers arrive as strings from some deployments and integers from others
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_accepts_legacy_labels() {
        let p: Party = serde_json::from_str("\"opposer\"").unwrap();
        assert_eq!(p, Party::Claimant);
        let p: Party = serde_json::from_str("\"defender\"").unwrap();
        assert_eq!(p, Party::Defendant);
        assert_eq!(serde_json::to_string(&Party::Claimant).unwrap(), "\"claimant\"");
        assert_eq!(Party::parse(" Defendant "), Some(Party::Defendant));
        assert_eq!(Party::parse("judge"), None);
    }

    #[test]
    fn test_request_uses_service_field_names() {
        let request = ArbitrationRequest::sample("I was overcharged");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["user_query"], "I was overcharged");
        assert_eq!(value["opposer_evidences"].as_array().unwrap().len(), 2);
        assert_eq!(value["defender_evidences"].as_array().unwrap().len(), 2);
        assert!(value.get("claimant_evidences").is_none());
        assert!(value["policy"]["created_at"].is_string());
    }

    #[test]
    fn test_sample_links_evidence_to_policy() {
        let request = ArbitrationRequest::sample("q");
        for record in request
            .evidences(Party::Claimant)
            .iter()
            .chain(request.evidences(Party::Defendant))
        {
            assert_eq!(record.policy_id, request.policy.id);
        }
        // Defendant statements come from the policy creator
        for record in request.evidences(Party::Defendant) {
            assert_eq!(record.submitter_id, request.policy.creator_id);
        }
        let claimant = request.evidences(Party::Claimant);
        assert_eq!(claimant[0].submitter_id, claimant[1].submitter_id);
        assert_ne!(claimant[0].submitter_id, request.policy.creator_id);
    }

    #[test]
    fn test_payload_numeric_decision_id() {
        let payload: StreamPayload = serde_json::from_str(
            r#"{"arbitration_result":{"decision_id":42,"confidence_score":0.87}}"#,
        )
        .unwrap();
        let result = payload.arbitration_result.unwrap();
        assert_eq!(result.decision_id.as_deref(), Some("42"));
        assert_eq!(result.confidence_score, Some(0.87));
        assert!(result.decision.is_none());
    }

    #[test]
    fn test_payload_rejects_object_decision_type() {
        let parsed = serde_json::from_str::<StreamPayload>(
            r#"{"arbitration_result":{"decision_type":{"nested":true}}}"#,
        );
        assert!(parsed.is_err());
    }
}
