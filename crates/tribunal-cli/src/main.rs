//! tribunal - dispute resolution client

mod commands;
mod config;
mod ui;
mod utils;
mod wallet;

use clap::Parser;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tribunal_api::{HttpArbitrationClient, Party, client::DEFAULT_ENDPOINT};
use tribunal_chat::{
    AccountChange, ChatEvent, ChatSession, Error as ChatError, EvidenceLocker, FileStore, Message,
    MessageKind, PolicyCatalog, RequestContext, Session, User,
};
use tribunal_tui::Theme;

use crate::utils::{TranscriptPrinter, decision_metadata};

/// tribunal - argue a dispute before an arbitration service
#[derive(Parser, Debug)]
#[command(name = "tribunal")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Send one complaint, print the decision, and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Print the agreed policies
    #[arg(long)]
    policies: bool,

    /// Print the evidence on file, optionally for one party
    #[arg(long, value_name = "PARTY", num_args = 0..=1, default_missing_value = "all")]
    evidence: Option<String>,

    /// Connect a wallet account
    #[arg(long)]
    connect: bool,

    /// Forget the saved wallet session
    #[arg(long)]
    disconnect: bool,

    /// Show the connected wallet account
    #[arg(long)]
    whoami: bool,

    /// Arbitration stream endpoint
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Send the built-in sample dispute instead of the configured case
    #[arg(long)]
    sample: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("tribunal=debug")
            .with_writer(io::stderr)
            .init();
    }

    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();
    let catalog = load_policies(&cfg)?;
    let mut locker = load_evidence(&cfg)?;

    if args.policies {
        println!("{}", commands::policy::list_text(&catalog));
        for policy in catalog.list() {
            println!("\n{}", "-".repeat(60));
            println!("{}", commands::policy::policy_text(policy));
        }
        return Ok(());
    }

    if let Some(party) = args.evidence.as_deref() {
        let party = match party {
            "all" => None,
            other => match Party::parse(other) {
                Some(party) => Some(party),
                None => {
                    eprintln!("Unknown party: {} (use claimant or defendant)", other);
                    std::process::exit(1);
                }
            },
        };
        println!("{}", commands::evidence::list_text(&locker, party));
        return Ok(());
    }

    let mut session = Session::new(
        wallet::from_config(&cfg.wallet),
        Box::new(FileStore::default()),
    );

    if args.disconnect {
        session.disconnect()?;
        println!("Disconnected.");
        return Ok(());
    }

    if args.whoami {
        match session.restore().await? {
            Some(user) => println!("Connected as {} ({})", user.short_address(), user.address),
            None => println!("Not connected. Connect with: tribunal --connect"),
        }
        return Ok(());
    }

    if args.connect {
        let user = require_session(&mut session).await;
        println!("Connected as {} ({})", user.short_address(), user.address);
        return Ok(());
    }

    let endpoint = args
        .endpoint
        .or(cfg.endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let client = HttpArbitrationClient::new(endpoint)?;

    let context = if args.sample || !cfg.uses_case_context() {
        RequestContext::Sample
    } else {
        case_context(&cfg, &catalog, &locker)
    };
    let mut chat = ChatSession::new(Arc::new(client)).with_context(context);

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&mut chat, &command).await;
    }

    require_session(&mut session).await;

    let use_tui = !args.no_tui && cfg.tui.unwrap_or(true);
    if use_tui {
        let theme = cfg
            .theme
            .as_deref()
            .and_then(Theme::by_name)
            .unwrap_or_else(Theme::dark);
        let exit = ui::run_tui(&mut chat, &mut session, &catalog, &mut locker, theme).await?;
        if exit == ui::Exit::Disconnected {
            println!("Wallet disconnected.");
        }
        return Ok(());
    }

    run_interactive(&mut chat, &mut session, &catalog, &mut locker).await
}

fn load_policies(cfg: &config::Config) -> anyhow::Result<PolicyCatalog> {
    Ok(match &cfg.policies_file {
        Some(path) => PolicyCatalog::from_file(&config::expand_path(path))?,
        None => PolicyCatalog::builtin(),
    })
}

fn load_evidence(cfg: &config::Config) -> anyhow::Result<EvidenceLocker> {
    Ok(match &cfg.evidence_file {
        Some(path) => EvidenceLocker::from_file(&config::expand_path(path))?,
        None => EvidenceLocker::builtin(),
    })
}

fn case_context(
    cfg: &config::Config,
    catalog: &PolicyCatalog,
    locker: &EvidenceLocker,
) -> RequestContext {
    let configured = cfg.policy.as_deref().and_then(|id| {
        let policy = catalog.get(id);
        if policy.is_none() {
            eprintln!("Warning: No policy with id '{}', using the first one", id);
        }
        policy
    });

    match configured.or_else(|| catalog.first()) {
        Some(policy) => RequestContext::case(policy.clone(), locker),
        None => {
            eprintln!("Warning: No policies on file, sending the sample case");
            RequestContext::Sample
        }
    }
}

/// Restore the saved session or connect a new one. Exits when neither works.
async fn require_session(session: &mut Session) -> User {
    match session.restore().await {
        Ok(Some(user)) => return user,
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "could not restore wallet session"),
    }

    match session.connect().await {
        Ok(user) => user,
        Err(e) => {
            eprintln!("Error: {}", e);
            if matches!(e, ChatError::Api(tribunal_api::Error::NoWallet)) {
                eprintln!();
                eprintln!("Configure a wallet in the [wallet] section of the config file.");
                eprintln!("Create one with: tribunal --init-config");
            }
            std::process::exit(1);
        }
    }
}

/// Re-snapshot the evidence of a case context after a submission
pub(crate) fn refresh_case_evidence(chat: &mut ChatSession, locker: &EvidenceLocker) {
    if let RequestContext::Case(case) = chat.context() {
        let refreshed = RequestContext::case(case.policy.clone(), locker);
        chat.set_context(refreshed);
    }
}

async fn run_command(chat: &mut ChatSession, command: &str) -> anyhow::Result<()> {
    println!("tribunal> {}", command);
    println!();

    let handle = tokio::spawn(print_transcript(chat.subscribe()));
    let result = chat.send_message(command).await;
    finish_transcript(handle, &result).await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Stream the response of one exchange to stdout
async fn print_transcript(mut rx: broadcast::Receiver<ChatEvent>) {
    let mut printer = TranscriptPrinter::new();
    let mut current = None;
    let mut latest: Option<Message> = None;

    loop {
        match rx.recv().await {
            Ok(ChatEvent::MessageAppended { message })
                if !message.is_user() && message.kind == MessageKind::Information =>
            {
                latest = Some(message);
            }
            Ok(ChatEvent::StreamStart { message_id }) => current = Some(message_id),
            Ok(ChatEvent::MessageUpdated { message }) if Some(message.id) == current => {
                if let Some(text) = printer.update(&message.text) {
                    print!("{}", text);
                    io::stdout().flush().ok();
                }
                latest = Some(message);
            }
            Ok(ChatEvent::StreamEnd { .. }) => {
                if let Some(message) = &latest {
                    // Untouched placeholders are printed here
                    if let Some(text) = printer.update(&message.text) {
                        print!("{}", text);
                    }
                }
                if let Some(rest) = printer.finish() {
                    print!("{}", rest);
                }
                println!();
                if let Some(metadata) = latest.as_ref().and_then(decision_metadata) {
                    println!("[{}]", metadata);
                }
                return;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "transcript printer fell behind");
            }
            Err(RecvError::Closed) => return,
        }
    }
}

/// Wait for the printer when the request produced a stream, else stop it
async fn finish_transcript(
    handle: tokio::task::JoinHandle<()>,
    result: &tribunal_chat::Result<tribunal_chat::Exchange>,
) {
    match result {
        Err(ChatError::EmptyInput) | Err(ChatError::Busy) => handle.abort(),
        _ => {
            let _ = handle.await;
        }
    }
}

async fn run_interactive(
    chat: &mut ChatSession,
    session: &mut Session,
    catalog: &PolicyCatalog,
    locker: &mut EvidenceLocker,
) -> anyhow::Result<()> {
    use crate::commands::{CommandContext, CommandResult, execute_command};

    if io::IsTerminal::is_terminal(&io::stderr()) {
        let account = session
            .user()
            .map(|u| u.short_address())
            .unwrap_or_default();
        eprintln!("tribunal ({}) {}", chat.context().label(), account);
        eprintln!("Type /help for commands.");
        eprintln!();
    }

    loop {
        for change in session.poll_account_changes() {
            match change {
                AccountChange::Switched(user) => {
                    println!("Wallet switched to {}", user.short_address());
                }
                AccountChange::Disconnected => {
                    println!("Wallet disconnected.");
                    return Ok(());
                }
                AccountChange::Unchanged => {}
            }
        }

        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            let ctx = CommandContext {
                catalog,
                locker: &*locker,
                user: session.user(),
                request_context: chat.context(),
            };
            if let Some(result) = execute_command(input, &ctx) {
                match result {
                    CommandResult::Clear => {
                        chat.clear();
                        println!("Cleared conversation.");
                    }
                    CommandResult::Exit => break,
                    CommandResult::Message(msg) => println!("{}", msg),
                    CommandResult::Submit(submission) => match locker.submit(submission) {
                        Ok(evidence) => {
                            chat.append_evidence_notice(&evidence);
                            refresh_case_evidence(chat, locker);
                            println!("Filed evidence [{}] {}", evidence.id, evidence.title);
                        }
                        Err(e) => println!("Could not file evidence: {}", e),
                    },
                    CommandResult::SetContext(context) => {
                        println!("Requests now carry: {}", context.label());
                        chat.set_context(context);
                    }
                    CommandResult::Disconnect => {
                        session.disconnect()?;
                        println!("Disconnected.");
                        break;
                    }
                    CommandResult::Unknown(cmd) => {
                        println!("Unknown command: /{}", cmd);
                        println!("Type /help for available commands.");
                    }
                }
                println!();
                continue;
            }
        }

        println!();
        let handle = tokio::spawn(print_transcript(chat.subscribe()));
        let result = chat.send_message(input).await;
        finish_transcript(handle, &result).await;

        if let Err(e) = result {
            eprintln!("Error: {}", e);
            chat.dismiss_error();
        }
        println!();
    }

    Ok(())
}
