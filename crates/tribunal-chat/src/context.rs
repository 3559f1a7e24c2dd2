//! What gets sent alongside each complaint

use tribunal_api::{ArbitrationRequest, Party};
use uuid::Uuid;

use crate::{
    evidence::{Evidence, EvidenceLocker},
    policy::Policy,
};

/// Policy and evidence snapshot for a real case
#[derive(Debug, Clone, PartialEq)]
pub struct CaseFile {
    pub policy: Policy,
    pub evidence: Vec<Evidence>,
}

impl CaseFile {
    /// Snapshot the locker's current records under `policy`
    pub fn new(policy: Policy, locker: &EvidenceLocker) -> Self {
        Self {
            policy,
            evidence: locker.list().to_vec(),
        }
    }
}

/// Source of the policy and evidence in each arbitration request
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestContext {
    /// Built-in data-security dispute
    #[default]
    Sample,
    /// A selected policy and the evidence on file
    Case(CaseFile),
}

impl RequestContext {
    pub fn case(policy: Policy, locker: &EvidenceLocker) -> Self {
        RequestContext::Case(CaseFile::new(policy, locker))
    }

    /// Build a fresh request for `query`
    pub fn build_request(&self, query: &str) -> ArbitrationRequest {
        match self {
            RequestContext::Sample => ArbitrationRequest::sample(query),
            RequestContext::Case(case) => {
                let policy = case.policy.to_record();
                let claimant_id = Uuid::new_v4();
                let mut request = ArbitrationRequest::new(policy, query);

                for evidence in &case.evidence {
                    let submitter = match evidence.submitted_by {
                        Party::Claimant => claimant_id,
                        Party::Defendant => request.policy.creator_id,
                    };
                    let record = evidence.to_record(&request.policy, submitter);
                    match evidence.submitted_by {
                        Party::Claimant => request.claimant_evidences.push(record),
                        Party::Defendant => request.defendant_evidences.push(record),
                    }
                }
                request
            }
        }
    }

    pub fn label(&self) -> &str {
        match self {
            RequestContext::Sample => "sample case",
            RequestContext::Case(case) => &case.policy.title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyCatalog;

    #[test]
    fn test_case_request_splits_parties() {
        let catalog = PolicyCatalog::builtin();
        let locker = EvidenceLocker::builtin();
        let policy = catalog.get("1").unwrap().clone();
        let context = RequestContext::case(policy, &locker);

        let request = context.build_request("The game crashed on launch");
        assert_eq!(request.user_query, "The game crashed on launch");
        assert_eq!(request.policy.name, "Eligibility for Refunds");
        assert_eq!(request.claimant_evidences.len(), 2);
        assert_eq!(request.defendant_evidences.len(), 1);
        assert_eq!(
            request.defendant_evidences[0].submitter_id,
            request.policy.creator_id
        );
        assert!(request.claimant_evidences[0].content.starts_with("Service Agreement Contract: "));
        assert_eq!(context.label(), "Eligibility for Refunds");
    }

    #[test]
    fn test_each_request_is_fresh() {
        let context = RequestContext::Sample;
        let a = context.build_request("a");
        let b = context.build_request("b");
        assert_ne!(a.policy.id, b.policy.id);
        assert_eq!(a.claimant_evidences.len(), 2);
    }
}
