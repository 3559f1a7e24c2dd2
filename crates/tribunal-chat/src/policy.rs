//! Refund policies both parties agreed to

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tribunal_api::PolicyRecord;
use uuid::Uuid;

use crate::error::{Error, Result};

/// An agreed policy.
///
/// `content` is light markup: `**Header**` lines, `• item` bullets, and plain
/// paragraphs, with blank lines between sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(alias = "agreedAt")]
    pub agreed_at: DateTime<Utc>,
    pub version: String,
}

/// Coarse grouping derived from a policy title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCategory {
    Eligibility,
    Restriction,
    Technical,
    Legal,
    General,
}

impl PolicyCategory {
    /// Classify by keywords in the title.
    ///
    /// "non-refundable" contains "refund", so restrictions are matched first.
    pub fn classify(title: &str) -> Self {
        let title = title.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| title.contains(w));

        if has(&["non-refundable", "abuse"]) {
            PolicyCategory::Restriction
        } else if has(&["refund", "eligibility"]) {
            PolicyCategory::Eligibility
        } else if has(&["technical", "support"]) {
            PolicyCategory::Technical
        } else if has(&["legal", "compliance"]) {
            PolicyCategory::Legal
        } else {
            PolicyCategory::General
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PolicyCategory::Eligibility => "eligibility",
            PolicyCategory::Restriction => "restriction",
            PolicyCategory::Technical => "technical",
            PolicyCategory::Legal => "legal",
            PolicyCategory::General => "general",
        }
    }
}

/// One rendered line of a policy section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyBlock {
    Bullet(String),
    Paragraph(String),
}

/// A run of blocks under an optional header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySection {
    pub heading: Option<String>,
    pub blocks: Vec<PolicyBlock>,
}

impl Policy {
    pub fn category(&self) -> PolicyCategory {
        PolicyCategory::classify(&self.title)
    }

    /// Split the content into sections
    pub fn sections(&self) -> Vec<PolicySection> {
        parse_sections(&self.content)
    }

    /// Wire form sent to the arbitration service
    pub fn to_record(&self) -> PolicyRecord {
        let mut description = format!("{} (version {})\n", self.title, self.version);
        description.push_str(self.content.trim());
        PolicyRecord {
            id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            name: self.title.clone(),
            description,
            created_at: self.agreed_at,
        }
    }
}

fn parse_sections(content: &str) -> Vec<PolicySection> {
    let mut sections = Vec::new();
    let mut current = PolicySection::default();

    let mut flush = |current: &mut PolicySection| {
        if current.heading.is_some() || !current.blocks.is_empty() {
            sections.push(std::mem::take(current));
        }
    };

    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            flush(&mut current);
            continue;
        }
        if let Some(heading) = line
            .strip_prefix("**")
            .and_then(|l| l.strip_suffix("**"))
            .filter(|h| !h.is_empty())
        {
            flush(&mut current);
            current.heading = Some(heading.to_string());
        } else if let Some(item) = line.strip_prefix("• ") {
            current.blocks.push(PolicyBlock::Bullet(item.to_string()));
        } else {
            current.blocks.push(PolicyBlock::Paragraph(line.to_string()));
        }
    }
    flush(&mut current);
    sections
}

/// Read-only set of policies
#[derive(Debug, Clone)]
pub struct PolicyCatalog {
    policies: Vec<Policy>,
}

impl PolicyCatalog {
    /// The built-in refund policy set
    pub fn builtin() -> Self {
        let agreed_at = Utc
            .with_ymd_and_hms(2024, 1, 15, 0, 0, 0)
            .single()
            .unwrap_or_default();

        let policies = BUILTIN_POLICIES
            .iter()
            .enumerate()
            .map(|(i, (title, content))| Policy {
                id: (i + 1).to_string(),
                title: title.to_string(),
                content: content.to_string(),
                agreed_at,
                version: "2.1".to_string(),
            })
            .collect();
        Self { policies }
    }

    pub fn from_policies(policies: Vec<Policy>) -> Self {
        Self { policies }
    }

    /// Load policies from a JSON array
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let policies: Vec<Policy> = serde_json::from_str(&text)
            .map_err(|e| Error::Other(format!("Invalid policy file {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), count = policies.len(), "loaded policies");
        Ok(Self { policies })
    }

    pub fn list(&self) -> &[Policy] {
        &self.policies
    }

    pub fn get(&self, id: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == id)
    }

    pub fn first(&self) -> Option<&Policy> {
        self.policies.first()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for PolicyCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

const BUILTIN_POLICIES: &[(&str, &str)] = &[
    (
        "Eligibility for Refunds",
        "**Digital Game Purchases**
• Refunds within 14 days if playtime < 2 hours
• Pre-orders refundable anytime before release
• If not downloaded/activated → full refund within 30 days

**DLC / Add-ons**
• Refunds within 14 days if unused or < 2 hours added playtime

**In-Game Purchases**
• Consumables non-refundable once used
• Refunds within 14 days if unused/unredeemed

**Subscriptions / Online Services**
• Refunds within 14 days if unused
• Pro-rated refunds for unused subscription time",
    ),
    (
        "Non-Refundable Cases",
        "**The following purchases are not eligible for refunds:**
• Accounts banned for cheating/fraud
• Services already delivered (e.g., coaching completed)
• Games purchased through third-party resellers
• Gift purchases already redeemed by recipient

**Additional Restrictions:**
• Products with evident misuse or violation of terms
• Items purchased during promotional periods with specific no-refund clauses
• Virtual currency that has been partially or fully spent",
    ),
    (
        "Technical Issues & Support",
        "**Technical Defect Refunds:**
• Refunds available if the product is unplayable due to technical defects
• Customer must attempt basic troubleshooting as directed by support
• Documentation of technical issues may be required

**Support Requirements:**
• Contact official support within 30 days of purchase
• Provide system specifications and error details
• Allow 48-72 hours for technical resolution attempts",
    ),
    (
        "Abuse Prevention Policy",
        "**Refund Abuse Prevention:**
• Repeated refund requests are automatically flagged for review
• Abuse patterns (e.g., finishing short games <2h and refunding) may remove eligibility
• No multiple refund requests for the same product
• Accounts with excessive refund rates may face restrictions

**Fair Use Guidelines:**
• Refund system is designed for legitimate cases only
• Pattern recognition identifies potential abuse
• Appeals process available for disputed restrictions",
    ),
    (
        "Refund Process & Timeline",
        "**Processing Details:**
• Refunds go to the original payment method (5–10 business days)
• Requests must be submitted via official support portal only
• Must provide transaction ID, reason, and evidence (if service-related)

**Required Information:**
• Original purchase confirmation or transaction ID
• Detailed reason for refund request
• Supporting evidence for service-related issues
• Account verification may be required

**Timeline Expectations:**
• Initial review: 1-3 business days
• Decision notification: 3-5 business days
• Processing time: 5-10 business days after approval",
    ),
    (
        "Regional & Legal Compliance",
        "**Consumer Protection Laws:**
• Local consumer protection laws (EU, UK, US, etc.) override these rules if they provide stronger protections
• Statutory rights are not affected by these policies
• Regional variations may apply based on local regulations

**Specific Regional Provisions:**
• **EU/UK:** 14-day withdrawal period for digital content
• **Australia:** Australian Consumer Law guarantees apply
• **US:** State-specific regulations may provide additional protections
• **Canada:** Provincial consumer protection acts take precedence

**Legal Disclaimer:**
These policies supplement but do not replace your statutory consumer rights under applicable law.",
    ),
];
