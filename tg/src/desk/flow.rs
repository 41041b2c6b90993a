//! Admission desk: acknowledge, resolve, admit, relay

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::priority::{PriorityResolver, Tier};
use crate::queue::{AdmissionResult, Admitted, Eta, QueueAdmission, RequestKind, RoutineKind};

use super::context::{RequestContext, Requester};

pub const ACK_MESSAGE: &str = "I've added you to the queue! I'll message you here when your trade is starting.";
pub const PRIVATE_REQUIRED_MESSAGE: &str = "You must enable private messages in order to be queued!";
pub const ALREADY_QUEUED_MESSAGE: &str = "Sorry, you are already in the queue.";
pub const QUEUE_CLOSED_MESSAGE: &str = "Sorry, I am not currently accepting queue requests!";

/// Range hint for an out-of-range trade code, zero-padded to the width of `max_trade_code`
pub fn invalid_code_message(max_trade_code: u32) -> String {
    let width = max_trade_code.to_string().len();
    format!("Trade code should be {:0width$}-{}!", 0, max_trade_code, width = width)
}

/// What a worker needs to run one trade
#[derive(Debug, Clone, PartialEq)]
pub struct TradeTicket<P> {
    pub code: u32,
    /// Name shown to the worker and in on-deck listings
    pub trainer: String,
    pub payload: P,
}

/// How a trade request ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeskOutcome {
    Added(Admitted),
    AlreadyInQueue,
    QueueClosed,
    /// Code above the configured maximum; nothing was sent privately
    InvalidCode,
    /// Acknowledgement could not be delivered; nothing was queued
    PrivateMessagesDisabled,
}

impl DeskOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added(_))
    }
}

impl From<AdmissionResult> for DeskOutcome {
    fn from(result: AdmissionResult) -> Self {
        match result {
            AdmissionResult::Added(admitted) => Self::Added(admitted),
            AdmissionResult::AlreadyInQueue => Self::AlreadyInQueue,
            AdmissionResult::QueueClosed => Self::QueueClosed,
        }
    }
}

/// Runs the caller flow around PriorityResolver and QueueAdmission
pub struct AdmissionDesk<P> {
    resolver: Arc<PriorityResolver>,
    queue: Arc<QueueAdmission<TradeTicket<P>>>,
    max_trade_code: u32,
}

impl<P: Clone + Send + Sync> AdmissionDesk<P> {
    pub fn new(resolver: Arc<PriorityResolver>, queue: Arc<QueueAdmission<TradeTicket<P>>>, max_trade_code: u32) -> Self {
        debug!(max_trade_code, "AdmissionDesk::new: called");
        Self {
            resolver,
            queue,
            max_trade_code,
        }
    }

    pub fn resolver(&self) -> &Arc<PriorityResolver> {
        &self.resolver
    }

    pub fn queue(&self) -> &Arc<QueueAdmission<TradeTicket<P>>> {
        &self.queue
    }

    pub fn max_trade_code(&self) -> u32 {
        self.max_trade_code
    }

    pub fn invalid_code_message(&self) -> String {
        invalid_code_message(self.max_trade_code)
    }

    /// Queue a trade at the tier the requester's roles earn
    pub async fn request_trade(
        &self,
        ctx: &dyn RequestContext,
        requester: &Requester,
        payload: P,
        code: u32,
        routine: RoutineKind,
        request: RequestKind,
    ) -> DeskOutcome {
        debug!(identity = %requester.identity, code, %routine, "AdmissionDesk::request_trade: called");
        self.submit(ctx, requester, payload, code, routine, request, None).await
    }

    /// Queue a trade at a fixed tier, skipping role priority. A sudo
    /// requester still gets through a closed queue at that tier.
    #[allow(clippy::too_many_arguments)]
    pub async fn request_trade_at(
        &self,
        ctx: &dyn RequestContext,
        requester: &Requester,
        payload: P,
        code: u32,
        routine: RoutineKind,
        request: RequestKind,
        tier: Tier,
    ) -> DeskOutcome {
        debug!(identity = %requester.identity, code, %tier, "AdmissionDesk::request_trade_at: called");
        self.submit(ctx, requester, payload, code, routine, request, Some(tier)).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit(
        &self,
        ctx: &dyn RequestContext,
        requester: &Requester,
        payload: P,
        code: u32,
        routine: RoutineKind,
        request: RequestKind,
        fixed_tier: Option<Tier>,
    ) -> DeskOutcome {
        let identity = requester.identity.as_str();

        if code > self.max_trade_code {
            debug!(%identity, code, "AdmissionDesk::submit: code out of range");
            say(ctx, &self.invalid_code_message()).await;
            return DeskOutcome::InvalidCode;
        }

        let ack = match ctx.send_private(ACK_MESSAGE).await {
            Ok(id) => id,
            Err(e) => {
                warn!(%identity, error = %e, "Failed to send acknowledgement");
                say(ctx, &format!("{}!", e)).await;
                say(ctx, PRIVATE_REQUIRED_MESSAGE).await;
                return DeskOutcome::PrivateMessagesDisabled;
            }
        };

        let outcome = self.admit(requester, payload, code, routine, request, fixed_tier).await;
        let message = self.outcome_message(requester, routine, &outcome);

        say(ctx, &message).await;
        if !ctx.is_private()
            && let Err(e) = ctx.send_private(&message).await
        {
            warn!(%identity, error = %e, "Failed to relay admission result privately");
        }

        if outcome.is_added() {
            if !ctx.is_private()
                && let Err(e) = ctx.delete_request().await
            {
                warn!(%identity, error = %e, "Failed to delete request message");
            }
        } else if let Err(e) = ctx.delete_private(ack).await {
            warn!(%identity, error = %e, "Failed to delete acknowledgement");
        }

        outcome
    }

    /// Resolve and admit without burning a cooldown on a request that
    /// cannot be admitted anyway
    async fn admit(
        &self,
        requester: &Requester,
        payload: P,
        code: u32,
        routine: RoutineKind,
        request: RequestKind,
        fixed_tier: Option<Tier>,
    ) -> DeskOutcome {
        let identity = requester.identity.as_str();

        if self.queue.contains(identity).await {
            debug!(%identity, "AdmissionDesk::admit: already queued");
            return DeskOutcome::AlreadyInQueue;
        }

        if !requester.is_sudo && !self.queue.is_open().await {
            debug!(%identity, "AdmissionDesk::admit: queue closed");
            return DeskOutcome::QueueClosed;
        }

        let tier = match fixed_tier {
            Some(tier) => tier,
            None => {
                self.resolver
                    .evaluate(identity, requester.roles.as_slice(), requester.is_sudo)
                    .await
            }
        };

        let ticket = TradeTicket {
            code,
            trainer: requester.display_name.clone(),
            payload,
        };

        let result = self
            .queue
            .admit_gated(identity, tier, ticket, routine, request, requester.is_sudo)
            .await;
        info!(%identity, %tier, ?result, "Trade request processed");
        result.into()
    }

    /// Text relayed to the requester for an admission outcome
    pub fn outcome_message(&self, requester: &Requester, routine: RoutineKind, outcome: &DeskOutcome) -> String {
        match outcome {
            DeskOutcome::Added(admitted) => {
                let mut msg = format!(
                    "Added {} to the queue for trade type: {}; unique ID: {}. Your current position is: {}",
                    requester.mention(),
                    routine,
                    admitted.ticket,
                    admitted.position
                );
                match admitted.eta {
                    Eta::Minutes(minutes) => msg.push_str(&format!(
                        ". Trades usually take at least a minute, so please be ready in around {:.1} minutes.",
                        minutes
                    )),
                    Eta::WithinCycle => msg.push_str(". You should be up within the next trade cycle."),
                    Eta::Unknown => {}
                }
                msg
            }
            DeskOutcome::AlreadyInQueue => ALREADY_QUEUED_MESSAGE.to_string(),
            DeskOutcome::QueueClosed => QUEUE_CLOSED_MESSAGE.to_string(),
            DeskOutcome::InvalidCode => self.invalid_code_message(),
            DeskOutcome::PrivateMessagesDisabled => PRIVATE_REQUIRED_MESSAGE.to_string(),
        }
    }
}

/// Reply on the channel, logging transport failures
pub(crate) async fn say(ctx: &dyn RequestContext, text: &str) {
    if let Err(e) = ctx.reply(text).await {
        warn!(error = %e, "Failed to reply");
    }
}
