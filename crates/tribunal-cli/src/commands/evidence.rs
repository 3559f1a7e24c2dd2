//! /evidence and /submit commands

use super::CommandResult;
use tribunal_api::Party;
use tribunal_chat::{Evidence, EvidenceLocker, NewEvidence};

pub struct EvidenceCommand;

impl EvidenceCommand {
    /// List evidence, optionally for one party
    pub fn list(args: &str, locker: &EvidenceLocker) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(list_text(locker, None));
        }
        match Party::parse(args) {
            Some(party) => CommandResult::Message(list_text(locker, Some(party))),
            None => CommandResult::Message(format!(
                "Unknown party '{}'\nUse claimant or defendant",
                args
            )),
        }
    }

    /// Parse `/submit <party> <title> | <description> [| file, file]`
    pub fn submit(args: &str) -> CommandResult {
        match parse_submission(args) {
            Ok(submission) => CommandResult::Submit(submission),
            Err(msg) => CommandResult::Message(format!("{}\n{}", msg, SUBMIT_USAGE)),
        }
    }
}

const SUBMIT_USAGE: &str =
    "Usage: /submit <claimant|defendant> <title> | <description> [| file, file]";

fn parse_submission(args: &str) -> Result<NewEvidence, String> {
    let (party, rest) = args
        .split_once(char::is_whitespace)
        .ok_or_else(|| "Missing evidence title".to_string())?;
    let party = Party::parse(party).ok_or_else(|| format!("Unknown party '{}'", party))?;

    let mut fields = rest.split('|').map(str::trim);
    let title = fields.next().unwrap_or_default();
    let description = fields
        .next()
        .ok_or_else(|| "Missing evidence description".to_string())?;

    let mut submission = NewEvidence::new(party, title, description);
    if let Some(files) = fields.next() {
        for name in files.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            submission = submission.with_attachment(name);
        }
    }
    Ok(submission)
}

/// Evidence records, newest last
pub fn list_text(locker: &EvidenceLocker, party: Option<Party>) -> String {
    let records: Vec<&Evidence> = match party {
        Some(party) => locker.by_party(party).collect(),
        None => locker.list().iter().collect(),
    };
    if records.is_empty() {
        return match party {
            Some(party) => format!("No evidence from the {}", party.name().to_lowercase()),
            None => "No evidence on file".to_string(),
        };
    }

    let mut output = String::from("Evidence on file:\n");
    for evidence in records {
        output.push_str(&evidence_text(evidence));
        output.push('\n');
    }
    output.trim_end().to_string()
}

fn evidence_text(evidence: &Evidence) -> String {
    let checked = if evidence.is_fact_checked {
        "fact-checked"
    } else {
        "unverified"
    };
    let mut text = format!(
        "\n  [{}] {} ({}, {}, {})\n    {}\n",
        evidence.id,
        evidence.title,
        evidence.submitted_by,
        evidence.submitted_at.format("%Y-%m-%d"),
        checked,
        evidence.description
    );
    if !evidence.attachments.is_empty() {
        text.push_str(&format!("    Attachments: {}\n", evidence.attachments.join(", ")));
    }
    text
}
