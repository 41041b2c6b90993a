//! Prefix command routing

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::CommandsConfig;
use crate::priority::Tier;
use crate::queue::{RequestKind, RoutineKind};

use super::context::{RequestContext, Requester};
use super::flow::{ALREADY_QUEUED_MESSAGE, AdmissionDesk, QUEUE_CLOSED_MESSAGE, say};
use super::waiting::WaitingList;

pub const LOCKED_MESSAGE: &str = "This command is locked for sudo users only!";
pub const NOT_PERMITTED_MESSAGE: &str = "Sorry, you are not permitted to use this command!";
pub const NOT_IN_QUEUE_MESSAGE: &str = "You are not in the queue.";
pub const WAITING_MESSAGE: &str = "Added you to the waiting list. Please whisper to me your trade code! Your request from the waiting list will be removed if you are too slow!";
pub const CLEARED_ALL_MESSAGE: &str = "Cleared all queues!";
pub const COOLDOWN_CLEARED_MESSAGE: &str = "User's Cooldown has been cleared.";
pub const ALL_COOLDOWNS_CLEARED_MESSAGE: &str = "All cooldowns have been cleared.";
pub const QUEUE_OPENED_MESSAGE: &str = "Users are now able to join the trade queue.";
pub const QUEUE_CLOSED_CHANGED_MESSAGE: &str = "Changed queue settings: Users will NOT be able to join the trade queue.";
pub const EMPTY_DECK_MESSAGE: &str = "Nobody is waiting in the queue.";

/// Turns a requester's free-form set text into a payload
pub trait PayloadValidator<P>: Send + Sync {
    /// Err carries the reason shown to the requester
    fn validate(&self, text: &str) -> Result<P, String>;
}

/// Routes prefixed chat commands to the desk, resolver and queue
pub struct CommandRouter<P> {
    desk: Arc<AdmissionDesk<P>>,
    validator: Arc<dyn PayloadValidator<P>>,
    config: CommandsConfig,
    waiting: Mutex<WaitingList<P>>,
}

impl<P: Clone + Send + Sync + 'static> CommandRouter<P> {
    pub fn new(desk: Arc<AdmissionDesk<P>>, validator: Arc<dyn PayloadValidator<P>>, config: CommandsConfig) -> Self {
        debug!(prefix = %config.prefix, "CommandRouter::new: called");
        let waiting = Mutex::new(WaitingList::new(config.waiting_list_capacity));
        Self {
            desk,
            validator,
            config,
            waiting,
        }
    }

    pub fn desk(&self) -> &Arc<AdmissionDesk<P>> {
        &self.desk
    }

    pub fn config(&self) -> &CommandsConfig {
        &self.config
    }

    pub async fn waiting_len(&self) -> usize {
        self.waiting.lock().await.len()
    }

    pub async fn is_waiting(&self, identity: &str) -> bool {
        self.waiting.lock().await.contains(identity)
    }

    /// Handle one channel message; returns whether it was a command
    pub async fn handle(&self, ctx: &dyn RequestContext, requester: &Requester, text: &str) -> bool {
        debug!(identity = %requester.identity, %text, "CommandRouter::handle: called");

        let Some(body) = text.trim().strip_prefix(self.config.prefix.as_str()) else {
            return false;
        };
        let (name, args) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        let name = name.to_lowercase();
        let args = args.trim();

        let requester = self.effective(requester);
        if !self.may_use_commands(&requester) {
            debug!(identity = %requester.identity, "CommandRouter::handle: requester ignored");
            return false;
        }

        match name.as_str() {
            "trade" | "t" => self.trade(ctx, &requester, args).await,
            "tradestatus" | "ts" => self.trade_status(ctx, &requester).await,
            "tradeclear" | "tc" => self.trade_clear(ctx, &requester).await,
            "tradeclearall" | "tca" => {
                if self.locked(ctx, &requester).await {
                    return true;
                }
                self.desk.queue().clear_all().await;
                self.waiting.lock().await.clear();
                say(ctx, CLEARED_ALL_MESSAGE).await;
            }
            "ondeck" | "od" => self.on_deck(ctx).await,
            "cooldownstatus" | "cs" => {
                let status = self
                    .desk
                    .resolver()
                    .check_status(&requester.identity, requester.roles.as_slice())
                    .await;
                say(ctx, &status.to_string()).await;
            }
            "cooldownclear" | "cc" => {
                if self.locked(ctx, &requester).await {
                    return true;
                }
                let target = if args.is_empty() { requester.identity.as_str() } else { args };
                let had_cooldown = self.desk.resolver().clear(target).await;
                info!(%target, had_cooldown, "Cooldown cleared by command");
                say(ctx, COOLDOWN_CLEARED_MESSAGE).await;
            }
            "cooldownclearall" | "cca" => {
                if self.locked(ctx, &requester).await {
                    return true;
                }
                let cleared = self.desk.resolver().clear_all().await;
                info!(cleared, "All cooldowns cleared by command");
                say(ctx, ALL_COOLDOWNS_CLEARED_MESSAGE).await;
            }
            "queueopen" | "qo" => {
                if self.locked(ctx, &requester).await {
                    return true;
                }
                self.desk.queue().set_open(true).await;
                say(ctx, QUEUE_OPENED_MESSAGE).await;
            }
            "queueclose" | "qc" => {
                if self.locked(ctx, &requester).await {
                    return true;
                }
                self.desk.queue().set_open(false).await;
                say(ctx, QUEUE_CLOSED_CHANGED_MESSAGE).await;
            }
            _ => {
                debug!(%name, "CommandRouter::handle: unknown command");
                return false;
            }
        }
        true
    }

    /// Handle a privately supplied trade code from a waiting requester
    ///
    /// Returns false when the text is not a code or the requester has
    /// nothing parked.
    pub async fn handle_code(&self, ctx: &dyn RequestContext, requester: &Requester, text: &str) -> bool {
        debug!(identity = %requester.identity, "CommandRouter::handle_code: called");

        let text = text.trim();
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }

        let requester = self.effective(requester);
        let mut waiting = self.waiting.lock().await;
        if !waiting.contains(&requester.identity) {
            debug!(identity = %requester.identity, "CommandRouter::handle_code: nothing parked");
            return false;
        }

        let code = match text.parse::<u32>() {
            Ok(code) if code <= self.desk.max_trade_code() => code,
            _ => {
                drop(waiting);
                say(ctx, &self.desk.invalid_code_message()).await;
                return true;
            }
        };

        let Some((_, payload)) = waiting.take(&requester.identity) else {
            return false;
        };
        drop(waiting);

        // Waiting-list trades do not consult priority roles; sudo only opens the gate
        self.desk
            .request_trade_at(
                ctx,
                &requester,
                payload,
                code,
                RoutineKind::LinkTrade,
                RequestKind::Specific,
                Tier::FREE,
            )
            .await;
        true
    }

    async fn trade(&self, ctx: &dyn RequestContext, requester: &Requester, args: &str) {
        let queue = self.desk.queue();
        if !requester.is_sudo && !queue.is_open().await {
            say(ctx, QUEUE_CLOSED_MESSAGE).await;
            return;
        }
        if queue.contains(&requester.identity).await {
            say(ctx, ALREADY_QUEUED_MESSAGE).await;
            return;
        }

        let payload = match self.validator.validate(args) {
            Ok(payload) => payload,
            Err(reason) => {
                debug!(identity = %requester.identity, %reason, "CommandRouter::trade: payload rejected");
                say(ctx, &format!("Skipping trade: {}", reason)).await;
                return;
            }
        };

        let evicted = self.waiting.lock().await.park(requester.clone(), payload);
        if let Some(evicted) = evicted {
            say(
                ctx,
                &format!(
                    "Removed {} from the waiting list. (list exceeded maximum count)",
                    evicted.display_name
                ),
            )
            .await;
        }
        say(ctx, WAITING_MESSAGE).await;
    }

    async fn trade_status(&self, ctx: &dyn RequestContext, requester: &Requester) {
        match self.desk.queue().position(&requester.identity).await {
            Some(position) => say(ctx, &position.to_string()).await,
            None => say(ctx, NOT_IN_QUEUE_MESSAGE).await,
        }
    }

    async fn trade_clear(&self, ctx: &dyn RequestContext, requester: &Requester) {
        let queue = self.desk.queue();
        if !requester.is_sudo && !queue.is_open().await {
            say(ctx, NOT_PERMITTED_MESSAGE).await;
            return;
        }

        self.waiting.lock().await.take(&requester.identity);
        let result = queue.remove(&requester.identity).await;
        say(ctx, result.message()).await;
    }

    async fn on_deck(&self, ctx: &dyn RequestContext) {
        let deck = self.desk.queue().on_deck(self.config.on_deck_count).await;
        if deck.is_empty() {
            say(ctx, EMPTY_DECK_MESSAGE).await;
            return;
        }

        let lines: Vec<String> = deck
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                format!(
                    "{}: {} (ID {}) {}",
                    i + 1,
                    entry.payload.trainer,
                    entry.ticket,
                    entry.routine
                )
            })
            .collect();
        say(ctx, &format!("Next up:\n{}", lines.join("\n"))).await;
    }

    /// Reply with the lock message unless the requester is sudo
    async fn locked(&self, ctx: &dyn RequestContext, requester: &Requester) -> bool {
        if requester.is_sudo {
            return false;
        }
        say(ctx, LOCKED_MESSAGE).await;
        true
    }

    fn effective(&self, requester: &Requester) -> Requester {
        let is_sudo = requester.is_sudo || self.config.is_sudo(&requester.identity);
        requester.clone().sudo(is_sudo)
    }

    fn may_use_commands(&self, requester: &Requester) -> bool {
        if self.config.is_blacklisted(&requester.identity) {
            return false;
        }
        !self.config.sub_only || requester.is_subscriber || requester.is_sudo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::desk::testing::RecordingContext;
    use crate::priority::{CooldownWindow, PriorityResolver, RoleCooldownConfig};
    use crate::queue::{FixedWorkerPool, QueueAdmission};
    use cooldownstore::CooldownStore;

    struct NonEmpty;

    impl PayloadValidator<String> for NonEmpty {
        fn validate(&self, text: &str) -> Result<String, String> {
            if text.is_empty() {
                Err("no set given".to_string())
            } else {
                Ok(text.to_string())
            }
        }
    }

    fn router(config: CommandsConfig) -> CommandRouter<String> {
        let clock = Arc::new(ManualClock::default());
        let roles = RoleCooldownConfig::new([("Gold", CooldownWindow::Minutes(60))], CooldownWindow::Minutes(60));
        let resolver = Arc::new(PriorityResolver::new(roles, CooldownStore::in_memory(), clock.clone()));
        let queue = Arc::new(QueueAdmission::new(Arc::new(FixedWorkerPool::new(1, 1.0)), clock));
        let desk = Arc::new(AdmissionDesk::new(resolver, queue, crate::MAX_TRADE_CODE));
        CommandRouter::new(desk, Arc::new(NonEmpty), config)
    }

    fn with_sudo(identity: &str) -> CommandsConfig {
        CommandsConfig {
            sudo: vec![identity.to_string()],
            ..Default::default()
        }
    }

    async fn last_reply(router: &CommandRouter<String>, requester: &Requester, text: &str) -> String {
        let ctx = RecordingContext::channel();
        assert!(router.handle(&ctx, requester, text).await, "{} not handled", text);
        ctx.replies().pop().unwrap()
    }

    #[tokio::test]
    async fn test_ignores_non_commands() {
        let router = router(CommandsConfig::default());
        let ctx = RecordingContext::channel();

        assert!(!router.handle(&ctx, &Requester::new("a"), "hello").await);
        assert!(!router.handle(&ctx, &Requester::new("a"), "$nonsense").await);
        assert!(ctx.replies().is_empty());
    }

    #[tokio::test]
    async fn test_trade_then_code() {
        let router = router(CommandsConfig::default());
        let ash = Requester::new("ash");

        assert_eq!(last_reply(&router, &ash, "$trade Pikachu @ Light Ball").await, WAITING_MESSAGE);
        assert!(router.is_waiting("ash").await);

        let whisper = RecordingContext::private();
        assert!(router.handle_code(&whisper, &ash, "0042").await);
        assert!(!router.is_waiting("ash").await);

        let entry = router.desk().queue().snapshot().await.remove(0);
        assert_eq!(entry.payload.code, 42);
        assert_eq!(entry.payload.payload, "Pikachu @ Light Ball");
        assert_eq!(entry.tier, Tier::FREE);
    }

    #[tokio::test]
    async fn test_waiting_list_code_ignores_roles() {
        let router = router(CommandsConfig::default());
        let gold = Requester::new("g").with_roles(["Gold"]);

        last_reply(&router, &gold, "$trade Mew").await;
        router.handle_code(&RecordingContext::private(), &gold, "1").await;

        assert_eq!(router.desk().queue().snapshot().await[0].tier, Tier::FREE);
        assert!(router.desk().resolver().cooldown_of("g").await.is_none());
    }

    #[tokio::test]
    async fn test_code_handling_edge_cases() {
        let router = router(CommandsConfig::default());
        let ash = Requester::new("ash");
        let whisper = RecordingContext::private();

        // Nothing parked yet
        assert!(!router.handle_code(&whisper, &ash, "1234").await);

        last_reply(&router, &ash, "$trade Eevee").await;
        assert!(!router.handle_code(&whisper, &ash, "not a code").await);

        assert!(router.handle_code(&whisper, &ash, "12345").await);
        assert_eq!(whisper.replies(), vec!["Trade code should be 0000-9999!"]);
        assert!(router.is_waiting("ash").await);
    }

    #[tokio::test]
    async fn test_invalid_payload() {
        let router = router(CommandsConfig::default());
        assert_eq!(
            last_reply(&router, &Requester::new("a"), "$trade").await,
            "Skipping trade: no set given"
        );
        assert_eq!(router.waiting_len().await, 0);
    }

    #[tokio::test]
    async fn test_waiting_list_eviction() {
        let router = router(CommandsConfig {
            waiting_list_capacity: 1,
            ..Default::default()
        });

        last_reply(&router, &Requester::new("a").with_display_name("Ash"), "$trade Mew").await;

        let ctx = RecordingContext::channel();
        router.handle(&ctx, &Requester::new("b"), "$trade Mew").await;
        assert_eq!(
            ctx.replies(),
            vec![
                "Removed Ash from the waiting list. (list exceeded maximum count)",
                WAITING_MESSAGE
            ]
        );
        assert!(!router.is_waiting("a").await);
    }

    #[tokio::test]
    async fn test_trade_status_and_clear() {
        let router = router(CommandsConfig::default());
        let ash = Requester::new("ash");

        assert_eq!(last_reply(&router, &ash, "$tradestatus").await, NOT_IN_QUEUE_MESSAGE);

        last_reply(&router, &ash, "$trade Mew").await;
        router.handle_code(&RecordingContext::private(), &ash, "7").await;

        assert_eq!(
            last_reply(&router, &ash, "$ts").await,
            "You are in the LinkTrade queue! Position: 1 (ID 1)"
        );
        assert_eq!(last_reply(&router, &ash, "$tradeclear").await, "Removed you from the queue.");
        assert_eq!(
            last_reply(&router, &ash, "$tradeclear").await,
            "Sorry, you are not currently in the queue."
        );
    }

    #[tokio::test]
    async fn test_sudo_only_commands_locked() {
        let router = router(CommandsConfig::default());
        let user = Requester::new("user");

        for command in ["$tradeclearall", "$cc", "$cca", "$queueopen", "$queueclose"] {
            assert_eq!(last_reply(&router, &user, command).await, LOCKED_MESSAGE);
        }
        assert!(router.desk().queue().is_open().await);
    }

    #[tokio::test]
    async fn test_sudo_list_unlocks_commands() {
        let router = router(with_sudo("owner"));
        let owner = Requester::new("owner");

        assert_eq!(last_reply(&router, &owner, "$queueclose").await, QUEUE_CLOSED_CHANGED_MESSAGE);
        assert!(!router.desk().queue().is_open().await);

        // Closed queue: regular users can neither trade nor clear
        let user = Requester::new("user");
        assert_eq!(last_reply(&router, &user, "$trade Mew").await, QUEUE_CLOSED_MESSAGE);
        assert_eq!(last_reply(&router, &user, "$tradeclear").await, NOT_PERMITTED_MESSAGE);

        assert_eq!(last_reply(&router, &owner, "$queueopen").await, QUEUE_OPENED_MESSAGE);
        assert_eq!(last_reply(&router, &owner, "$tradeclearall").await, CLEARED_ALL_MESSAGE);
    }

    #[tokio::test]
    async fn test_sudo_waiting_list_trade_stays_free_tier() {
        let router = router(with_sudo("owner"));
        let owner = Requester::new("owner");
        let gold = Requester::new("g").with_roles(["Gold"]);

        last_reply(&router, &gold, "$trade Mew").await;
        assert!(router.handle_code(&RecordingContext::private(), &gold, "1").await);

        assert_eq!(last_reply(&router, &owner, "$queueclose").await, QUEUE_CLOSED_CHANGED_MESSAGE);
        assert_eq!(last_reply(&router, &owner, "$trade Mew").await, WAITING_MESSAGE);
        assert!(router.handle_code(&RecordingContext::private(), &owner, "2").await);

        // Admitted through the closed queue, but behind the earlier free entry
        let queue = router.desk().queue();
        assert_eq!(queue.len().await, 2);
        let entry = queue.snapshot().await.remove(1);
        assert_eq!(entry.identity, "owner");
        assert_eq!(entry.tier, Tier::FREE);
        assert_eq!(queue.position("owner").await.unwrap().position, 2);
    }

    #[tokio::test]
    async fn test_cooldown_commands() {
        let router = router(with_sudo("owner"));
        let gold = Requester::new("g").with_roles(["Gold"]);
        let resolver = router.desk().resolver().clone();

        assert_eq!(
            last_reply(&router, &gold, "$cs").await,
            "You do not have a priority cooldown!"
        );

        resolver.evaluate("g", &["Gold"], false).await;
        assert!(
            last_reply(&router, &gold, "$cooldownstatus")
                .await
                .starts_with("You last traded 0.00 minutes ago!")
        );

        let owner = Requester::new("owner");
        assert_eq!(last_reply(&router, &owner, "$cc g").await, COOLDOWN_CLEARED_MESSAGE);
        assert!(resolver.cooldown_of("g").await.is_none());

        resolver.evaluate("g", &["Gold"], false).await;
        assert_eq!(last_reply(&router, &owner, "$cca").await, ALL_COOLDOWNS_CLEARED_MESSAGE);
        assert_eq!(resolver.cooldown_count().await, 0);
    }

    #[tokio::test]
    async fn test_on_deck() {
        let router = router(CommandsConfig {
            on_deck_count: 2,
            ..Default::default()
        });
        let anyone = Requester::new("x");

        assert_eq!(last_reply(&router, &anyone, "$ondeck").await, EMPTY_DECK_MESSAGE);

        for name in ["a", "b", "c"] {
            let requester = Requester::new(name).with_display_name(name.to_uppercase());
            last_reply(&router, &requester, "$trade Mew").await;
            router.handle_code(&RecordingContext::private(), &requester, "1").await;
        }

        assert_eq!(
            last_reply(&router, &anyone, "$od").await,
            "Next up:\n1: A (ID 1) LinkTrade\n2: B (ID 2) LinkTrade"
        );
    }

    #[tokio::test]
    async fn test_blacklist_and_sub_only() {
        let router = router(CommandsConfig {
            blacklist: vec!["spammer".to_string()],
            sub_only: true,
            sudo: vec!["owner".to_string()],
            ..Default::default()
        });
        let ctx = RecordingContext::channel();

        assert!(!router.handle(&ctx, &Requester::new("spammer").subscriber(true), "$ts").await);
        assert!(!router.handle(&ctx, &Requester::new("lurker"), "$ts").await);
        assert!(router.handle(&ctx, &Requester::new("fan").subscriber(true), "$ts").await);
        assert!(router.handle(&ctx, &Requester::new("owner"), "$ts").await);
    }
}
