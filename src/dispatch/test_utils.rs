use crate::core::WebhookSender;
use crate::dispatch::DeliveryError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Fake webhook sender for testing.
pub struct FakeWebhookSender {
    // A queue of results for a given URL. The front of the queue is the next
    // result; an empty queue means success.
    scripted: Mutex<HashMap<String, VecDeque<Result<(), DeliveryError>>>>,
    fail_forever: Mutex<HashSet<String>>,
    // Every payload received, per URL, in call order.
    received: Mutex<HashMap<String, Vec<Vec<u8>>>>,
}

impl FakeWebhookSender {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(HashMap::new()),
            fail_forever: Mutex::new(HashSet::new()),
            received: Mutex::new(HashMap::new()),
        }
    }

    /// Queue one failed attempt for a URL.
    pub fn push_failure(&self, url: &str, status: u16) {
        self.scripted
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Err(DeliveryError::Status(status)));
    }

    /// Make every attempt against a URL fail.
    pub fn fail_forever(&self, url: &str) {
        self.fail_forever.lock().unwrap().insert(url.to_string());
    }

    /// Number of attempts made against a URL.
    pub fn call_count(&self, url: &str) -> usize {
        self.received
            .lock()
            .unwrap()
            .get(url)
            .map_or(0, |calls| calls.len())
    }

    /// The payloads received by a URL, in call order.
    pub fn payloads(&self, url: &str) -> Vec<Vec<u8>> {
        self.received
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for FakeWebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookSender for FakeWebhookSender {
    async fn send(&self, url: &str, payload: &[u8]) -> Result<(), DeliveryError> {
        self.received
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push(payload.to_vec());

        if self.fail_forever.lock().unwrap().contains(url) {
            return Err(DeliveryError::Status(503));
        }

        if let Some(queue) = self.scripted.lock().unwrap().get_mut(url) {
            if let Some(result) = queue.pop_front() {
                return result;
            }
        }
        Ok(())
    }
}
