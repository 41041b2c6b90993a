//! In-memory transport for desk tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::context::{MessageId, RequestContext, TransportError};

#[derive(Default)]
struct Recorded {
    replies: Vec<String>,
    privates: Vec<String>,
    deleted_private: Vec<MessageId>,
    request_deleted: bool,
}

/// Records everything the desk sends
pub struct RecordingContext {
    private: bool,
    refuse_private: bool,
    next_id: AtomicU64,
    recorded: Mutex<Recorded>,
}

impl RecordingContext {
    pub fn channel() -> Self {
        Self {
            private: false,
            refuse_private: false,
            next_id: AtomicU64::new(1),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    pub fn private() -> Self {
        Self {
            private: true,
            ..Self::channel()
        }
    }

    pub fn refusing_private(mut self) -> Self {
        self.refuse_private = true;
        self
    }

    pub fn replies(&self) -> Vec<String> {
        self.recorded.lock().unwrap().replies.clone()
    }

    pub fn privates(&self) -> Vec<String> {
        self.recorded.lock().unwrap().privates.clone()
    }

    pub fn deleted_private(&self) -> Vec<MessageId> {
        self.recorded.lock().unwrap().deleted_private.clone()
    }

    pub fn request_deleted(&self) -> bool {
        self.recorded.lock().unwrap().request_deleted
    }

    fn next_id(&self) -> MessageId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestContext for RecordingContext {
    fn is_private(&self) -> bool {
        self.private
    }

    async fn reply(&self, text: &str) -> Result<MessageId, TransportError> {
        self.recorded.lock().unwrap().replies.push(text.to_string());
        Ok(self.next_id())
    }

    async fn send_private(&self, text: &str) -> Result<MessageId, TransportError> {
        if self.refuse_private {
            return Err(TransportError::PrivateMessagesDisabled("requester".to_string()));
        }
        self.recorded.lock().unwrap().privates.push(text.to_string());
        Ok(self.next_id())
    }

    async fn delete_private(&self, id: MessageId) -> Result<(), TransportError> {
        self.recorded.lock().unwrap().deleted_private.push(id);
        Ok(())
    }

    async fn delete_request(&self) -> Result<(), TransportError> {
        self.recorded.lock().unwrap().request_deleted = true;
        Ok(())
    }
}
