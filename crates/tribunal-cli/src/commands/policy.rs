//! /policies command - list policies or show one

use super::CommandResult;
use tribunal_chat::{Policy, PolicyBlock, PolicyCatalog};

pub struct PolicyCommand;

impl PolicyCommand {
    pub fn execute(args: &str, catalog: &PolicyCatalog) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(list_text(catalog));
        }
        match catalog.get(args) {
            Some(policy) => CommandResult::Message(policy_text(policy)),
            None => CommandResult::Message(format!(
                "No policy with id '{}'\nUse /policies to list them",
                args
            )),
        }
    }
}

/// Table of every policy
pub fn list_text(catalog: &PolicyCatalog) -> String {
    if catalog.is_empty() {
        return "No policies on file".to_string();
    }

    let mut output = String::from("Agreed policies:\n");
    for policy in catalog.list() {
        output.push_str(&format!(
            "  {:<4} {:<36} {:<12} v{}\n",
            policy.id,
            policy.title,
            policy.category().label(),
            policy.version
        ));
    }
    output.push_str("\nShow one with: /policies <id>");
    output
}

/// Full text of one policy
pub fn policy_text(policy: &Policy) -> String {
    let mut output = format!(
        "{} [{}]\nVersion {} · agreed {}\n",
        policy.title,
        policy.category().label(),
        policy.version,
        policy.agreed_at.format("%Y-%m-%d")
    );

    for section in policy.sections() {
        output.push('\n');
        if let Some(heading) = &section.heading {
            output.push_str(heading);
            output.push('\n');
        }
        for block in &section.blocks {
            match block {
                PolicyBlock::Bullet(item) => output.push_str(&format!("  • {}\n", item)),
                PolicyBlock::Paragraph(text) => output.push_str(&format!("{}\n", text)),
            }
        }
    }
    output.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_names_every_policy() {
        let catalog = PolicyCatalog::builtin();
        let text = list_text(&catalog);
        for policy in catalog.list() {
            assert!(text.contains(&policy.title));
        }
    }

    #[test]
    fn test_unknown_policy() {
        let catalog = PolicyCatalog::builtin();
        match PolicyCommand::execute("99", &catalog) {
            CommandResult::Message(msg) => assert!(msg.starts_with("No policy with id '99'")),
            _ => panic!("expected a message"),
        }
    }

    #[test]
    fn test_policy_text_has_header() {
        let catalog = PolicyCatalog::builtin();
        let policy = catalog.get("1").unwrap();
        let text = policy_text(policy);
        assert!(text.starts_with("Eligibility for Refunds [eligibility]\nVersion 2.1 · agreed 2024-01-15"));
    }
}
