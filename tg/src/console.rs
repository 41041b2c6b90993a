//! Interactive console transport
//!
//! Drives the whole stack from a terminal. Each line names the requester:
//!
//! ```text
//! @ash $trade Pikachu @ Light Ball    channel message from ash
//! @misty[Gold,Silver] $tradestatus    misty holds Gold and Silver
//! @brock! $queueclose                 brock is sudo
//! @ash #1234                          ash whispers a trade code
//! ```
//!
//! Lines starting with `/` drive the simulated worker instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use colored::Colorize;
use cooldownstore::CooldownStore;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use crate::config::Config;
use crate::desk::{
    AdmissionDesk, CommandRouter, MessageId, PayloadValidator, RequestContext, Requester, TransportError,
};
use crate::priority::{PriorityResolver, RoleCooldownConfig};
use crate::queue::{FixedWorkerPool, QueueAdmission, RoutineKind, TicketId};

/// Prints desk output to the terminal
pub struct ConsoleContext {
    private: bool,
    next_id: Arc<AtomicU64>,
}

impl ConsoleContext {
    fn new(private: bool, next_id: Arc<AtomicU64>) -> Self {
        Self { private, next_id }
    }

    fn next_id(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestContext for ConsoleContext {
    fn is_private(&self) -> bool {
        self.private
    }

    async fn reply(&self, text: &str) -> Result<MessageId, TransportError> {
        let id = self.next_id();
        let tag = if self.private { "[dm]".magenta() } else { "[channel]".bright_blue() };
        println!("{} {}", tag, text);
        Ok(id)
    }

    async fn send_private(&self, text: &str) -> Result<MessageId, TransportError> {
        let id = self.next_id();
        println!("{} {}", "[dm]".magenta(), text);
        Ok(id)
    }

    async fn delete_private(&self, id: MessageId) -> Result<(), TransportError> {
        println!("{}", format!("(deleted private message {})", id).dimmed());
        Ok(())
    }

    async fn delete_request(&self) -> Result<(), TransportError> {
        println!("{}", "(deleted request message)".dimmed());
        Ok(())
    }
}

/// Accepts any non-empty set text as-is
pub struct SetTextValidator;

impl PayloadValidator<String> for SetTextValidator {
    fn validate(&self, text: &str) -> Result<String, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("No set was provided".to_string());
        }
        Ok(text.to_string())
    }
}

/// What a console line carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleBody {
    /// Channel message
    Text(String),
    /// Privately whispered trade code
    Code(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub requester: Requester,
    pub body: ConsoleBody,
}

/// Parse `@<identity>[roles]! <text>` or `@<identity> #<code>`
pub fn parse_line(line: &str) -> Result<ConsoleLine, String> {
    let rest = line
        .trim()
        .strip_prefix('@')
        .ok_or_else(|| "Lines must start with @<identity>".to_string())?;

    let end = rest
        .find(|c: char| c == '[' || c == '!' || c.is_whitespace())
        .unwrap_or(rest.len());
    let (identity, mut rest) = rest.split_at(end);
    if identity.is_empty() {
        return Err("Missing identity after @".to_string());
    }

    let mut roles = Vec::new();
    if let Some(after) = rest.strip_prefix('[') {
        let close = after.find(']').ok_or_else(|| "Unclosed role list".to_string())?;
        roles = after[..close]
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect();
        rest = &after[close + 1..];
    }

    let is_sudo = rest.starts_with('!');
    if is_sudo {
        rest = &rest[1..];
    }

    let text = rest.trim();
    if text.is_empty() {
        return Err("Nothing to say".to_string());
    }

    let body = match text.strip_prefix('#') {
        Some(code) => ConsoleBody::Code(code.trim().to_string()),
        None => ConsoleBody::Text(text.to_string()),
    };

    let requester = Requester::new(identity)
        .with_roles(roles)
        .sudo(is_sudo)
        .subscriber(true);

    Ok(ConsoleLine { requester, body })
}

enum SlashResult {
    Continue,
    Quit,
}

/// Interactive console session
pub struct ConsoleSession {
    router: CommandRouter<String>,
    workers: Arc<FixedWorkerPool>,
    next_id: Arc<AtomicU64>,
}

impl ConsoleSession {
    /// Wire resolver, queue, desk and router from configuration
    pub fn from_config(config: &Config) -> Self {
        debug!(cooldown_file = %config.storage.cooldown_file.display(), "ConsoleSession::from_config: called");

        let roles = RoleCooldownConfig::from_settings(&config.priority);
        let store = CooldownStore::load(&config.storage.cooldown_file);
        let resolver = Arc::new(PriorityResolver::with_system_clock(roles, store));

        let workers = Arc::new(FixedWorkerPool::from_config(&config.queue));
        let queue = Arc::new(QueueAdmission::with_system_clock(workers.clone()));

        let desk = Arc::new(AdmissionDesk::new(resolver, queue, config.queue.max_trade_code));
        let router = CommandRouter::new(desk, Arc::new(SetTextValidator), config.commands.clone());

        Self {
            router,
            workers,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Run the console main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let readline = rl.readline(&format!("{} ", ">".bright_green()));

            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.handle_line(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        self.router.desk().resolver().flush().await;
        println!("Goodbye!");
        Ok(())
    }

    async fn handle_line(&self, input: &str) {
        let line = match parse_line(input) {
            Ok(line) => line,
            Err(e) => {
                println!("{} {}", "?".yellow(), e);
                return;
            }
        };

        let handled = match &line.body {
            ConsoleBody::Text(text) => {
                let ctx = ConsoleContext::new(false, self.next_id.clone());
                self.router.handle(&ctx, &line.requester, text).await
            }
            ConsoleBody::Code(code) => {
                let ctx = ConsoleContext::new(true, self.next_id.clone());
                self.router.handle_code(&ctx, &line.requester, code).await
            }
        };

        if !handled {
            println!("{}", "(ignored)".dimmed());
        }
    }

    async fn handle_slash_command(&self, input: &str) -> SlashResult {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");
        let queue = self.router.desk().queue();

        match cmd {
            "/help" | "/h" => {
                self.print_help();
            }
            "/quit" | "/q" | "/exit" => return SlashResult::Quit,
            "/queue" => {
                let entries = queue.snapshot().await;
                if entries.is_empty() {
                    println!("{}", "Queue is empty.".dimmed());
                }
                for (i, entry) in entries.iter().enumerate() {
                    println!(
                        "  {:>3}. {} {} [{}] {} code={}",
                        i + 1,
                        format!("#{}", entry.ticket).bright_cyan(),
                        entry.payload.trainer,
                        entry.tier,
                        entry.routine,
                        entry.payload.code
                    );
                }
            }
            "/work" => {
                let parsed = parts[1..]
                    .iter()
                    .map(|p| p.parse::<RoutineKind>())
                    .collect::<Result<Vec<_>, _>>();
                let routines = match parsed {
                    Ok(routines) => routines,
                    Err(e) => {
                        println!("{} {}", "?".yellow(), e);
                        return SlashResult::Continue;
                    }
                };
                match queue.take_next(&routines).await {
                    Some(entry) => {
                        info!(ticket = entry.ticket, identity = %entry.identity, "Console worker picked up entry");
                        println!(
                            "{} {} for {} ({}): {}",
                            "Working".green(),
                            format!("#{}", entry.ticket).bright_cyan(),
                            entry.payload.trainer,
                            entry.routine,
                            entry.payload.payload
                        );
                    }
                    None => println!("{}", "Nothing to work on.".dimmed()),
                }
            }
            "/done" => {
                let Some(ticket) = parts.get(1).and_then(|t| t.parse::<TicketId>().ok()) else {
                    println!("{} Usage: /done <ticket>", "?".yellow());
                    return SlashResult::Continue;
                };
                let cancelled = queue.is_cancel_requested(ticket).await;
                if queue.complete(ticket).await {
                    let note = if cancelled { " (cancelled by requester)" } else { "" };
                    println!("{} #{}{}", "✓ Completed".green(), ticket, note);
                } else {
                    println!("{} #{} is not being processed", "?".yellow(), ticket);
                }
            }
            "/workers" => match parts.get(1).and_then(|n| n.parse::<usize>().ok()) {
                Some(n) => {
                    self.workers.set_active_workers(n);
                    println!("{} {}", "Active workers:".bright_cyan(), n);
                }
                None => println!("{} Usage: /workers <count>", "?".yellow()),
            },
            "/stats" => {
                let stats = queue.stats().await;
                println!("{}", "Queue Stats:".bright_cyan());
                println!("  {:18} {}", "live entries", queue.len().await);
                println!("  {:18} {}", "admitted", stats.total_admitted);
                println!("  {:18} {}", "duplicates", stats.total_duplicates);
                println!("  {:18} {}", "completed", stats.total_completed);
                println!("  {:18} {}", "removed", stats.total_removed);
                println!("  {:18} {}", "peak depth", stats.peak_queue_depth);
                println!("  {:18} {}", "waiting for code", self.router.waiting_len().await);
                println!(
                    "  {:18} {}",
                    "cooldowns",
                    self.router.desk().resolver().cooldown_count().await
                );
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "TradeGate Console".bright_cyan().bold());
        println!("Command prefix: {}", self.router.config().prefix.yellow());
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Requester Lines:".bright_cyan());
        println!("  {:28} Channel message", "@<id> <text>".yellow());
        println!("  {:28} Message from a role holder", "@<id>[Role,Role] <text>".yellow());
        println!("  {:28} Message from a sudo user", "@<id>! <text>".yellow());
        println!("  {:28} Whisper a trade code", "@<id> #<code>".yellow());
        println!();
        println!("{}", "Worker Commands:".bright_cyan());
        println!("  {:28} Show waiting entries", "/queue".yellow());
        println!("  {:28} Take the next entry", "/work [routine...]".yellow());
        println!("  {:28} Complete a processing entry", "/done <ticket>".yellow());
        println!("  {:28} Set active worker count", "/workers <n>".yellow());
        println!("  {:28} Show queue statistics", "/stats".yellow());
        println!("  {:28} Show this help", "/help".yellow());
        println!("  {:28} Exit the console", "/quit".yellow());
        println!();
    }
}
