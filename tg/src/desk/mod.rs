//! Request desk
//!
//! The caller flow around priority resolution and queue admission:
//! private acknowledgement, tier resolution, admission, result relay and
//! rollback, plus chat command routing and the trade-code waiting list.

mod commands;
mod context;
mod flow;
mod waiting;

#[cfg(test)]
pub(crate) mod testing;

pub use commands::{CommandRouter, LOCKED_MESSAGE, PayloadValidator, WAITING_MESSAGE};
pub use context::{MessageId, RequestContext, Requester, TransportError};
pub use flow::{
    ACK_MESSAGE, ALREADY_QUEUED_MESSAGE, AdmissionDesk, DeskOutcome, PRIVATE_REQUIRED_MESSAGE, QUEUE_CLOSED_MESSAGE,
    TradeTicket, invalid_code_message,
};
pub use waiting::WaitingList;
