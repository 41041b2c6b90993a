//! Transport seam between the desk and a chat platform

use async_trait::async_trait;
use thiserror::Error;

/// Transport-assigned id of a sent message
pub type MessageId = u64;

/// Errors a transport can report
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Unable to send private messages to {0}")]
    PrivateMessagesDisabled(String),

    #[error("Message {0} not found")]
    MessageNotFound(MessageId),

    #[error("Missing permissions: {0}")]
    Forbidden(String),

    #[error("Transport failure: {0}")]
    Other(String),
}

/// The person behind a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    /// Stable user id, used as the cooldown and queue key
    pub identity: String,
    pub display_name: String,
    /// Role names held, in no particular order
    pub roles: Vec<String>,
    pub is_sudo: bool,
    pub is_subscriber: bool,
}

impl Requester {
    pub fn new(identity: impl Into<String>) -> Self {
        let identity = identity.into();
        Self {
            display_name: identity.clone(),
            identity,
            roles: Vec::new(),
            is_sudo: false,
            is_subscriber: false,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_roles<S: Into<String>>(mut self, roles: impl IntoIterator<Item = S>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn sudo(mut self, is_sudo: bool) -> Self {
        self.is_sudo = is_sudo;
        self
    }

    pub fn subscriber(mut self, is_subscriber: bool) -> Self {
        self.is_subscriber = is_subscriber;
        self
    }

    /// How the requester is addressed in channel messages
    pub fn mention(&self) -> String {
        format!("<@{}>", self.identity)
    }
}

/// Where a request came from and how to answer it
#[async_trait]
pub trait RequestContext: Send + Sync {
    /// Request arrived as a private message
    fn is_private(&self) -> bool;

    /// Post to the channel the request came from
    async fn reply(&self, text: &str) -> Result<MessageId, TransportError>;

    /// Message the requester privately
    async fn send_private(&self, text: &str) -> Result<MessageId, TransportError>;

    /// Delete a message previously sent with `send_private`
    async fn delete_private(&self, id: MessageId) -> Result<(), TransportError>;

    /// Delete the requester's originating message
    async fn delete_request(&self) -> Result<(), TransportError>;
}
