//! Slash commands for interactive mode

pub mod evidence;
pub mod policy;

pub use evidence::EvidenceCommand;
pub use policy::PolicyCommand;

use tribunal_chat::{EvidenceLocker, NewEvidence, PolicyCatalog, RequestContext, User};

/// What a command can see
pub struct CommandContext<'a> {
    pub catalog: &'a PolicyCatalog,
    pub locker: &'a EvidenceLocker,
    pub user: Option<&'a User>,
    pub request_context: &'a RequestContext,
}

/// Result of executing a slash command
pub enum CommandResult {
    /// Clear the conversation
    Clear,
    /// Show a message to the user (not sent to the service)
    Message(String),
    /// File new evidence
    Submit(NewEvidence),
    /// Change what later requests carry
    SetContext(RequestContext),
    /// Forget the wallet session
    Disconnect,
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, ctx: &CommandContext<'_>) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (command, args) = rest.split_once(' ').unwrap_or((rest, ""));
    let command = command.to_lowercase();
    let args = args.trim();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "clear" | "c" => CommandResult::Clear,

        "quit" | "exit" | "q" => CommandResult::Exit,

        "policies" | "policy" | "p" => PolicyCommand::execute(args, ctx.catalog),

        "evidence" | "e" => EvidenceCommand::list(args, ctx.locker),

        "submit" => EvidenceCommand::submit(args),

        "context" => context(args, ctx),

        "whoami" => CommandResult::Message(match ctx.user {
            Some(user) => format!("Connected as {} ({})", user.short_address(), user.address),
            None => "Not connected".to_string(),
        }),

        "disconnect" => CommandResult::Disconnect,

        _ => CommandResult::Unknown(command),
    })
}

fn context(args: &str, ctx: &CommandContext<'_>) -> CommandResult {
    let (mode, id) = args.split_once(' ').unwrap_or((args, ""));
    match mode {
        "" => CommandResult::Message(format!(
            "Requests carry: {}\nUse /context sample or /context case [policy id]",
            ctx.request_context.label()
        )),
        "sample" => CommandResult::SetContext(RequestContext::Sample),
        "case" => {
            let id = id.trim();
            let policy = if id.is_empty() {
                ctx.catalog.first()
            } else {
                ctx.catalog.get(id)
            };
            match policy {
                Some(policy) => {
                    CommandResult::SetContext(RequestContext::case(policy.clone(), ctx.locker))
                }
                None => CommandResult::Message(format!("No policy with id '{}'", id)),
            }
        }
        other => CommandResult::Message(format!(
            "Unknown context '{}'\nUse /context sample or /context case [policy id]",
            other
        )),
    }
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?              Show this help message
  /policies, /p [id]         List policies or show one
  /evidence, /e [party]      List evidence, optionally for claimant or defendant
  /submit <party> <title> | <description> [| file, file]
                             File new evidence
  /context [sample|case id]  Show or change what requests carry
  /whoami                    Show the connected wallet account
  /disconnect                Forget the wallet session
  /clear, /c                 Clear conversation history
  /quit, /exit, /q           Exit tribunal

Examples:
  /policies 2                Show the non-refundable cases policy
  /evidence defendant        Evidence filed by the defendant
  /submit claimant Receipt | Paid on Jan 5 | receipt.pdf
  /context case 1            Argue under the refund eligibility policy"#
        .to_string()
}
