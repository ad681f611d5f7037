use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A typed bus topic.
pub trait Topic: 'static {
    const NAME: &'static str;
    type Payload: Clone + Send + Sync + 'static;
}

/// Ask the upstream generator to retry with the failure context attached.
pub struct SendBackToAi;

impl Topic for SendBackToAi {
    const NAME: &'static str = "sendBackToAI";
    type Payload = SendBackPayload;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBackPayload {
    pub store_id: String,
    pub group_id: String,
    pub version_id: String,
    /// The exact code that failed.
    pub file: String,
    /// Formatted diagnostics.
    pub error: String,
}

/// Process-wide publish/subscribe bus.
///
/// Publishing is fire-and-forget: with no subscriber the event is dropped.
/// Slow subscribers lag rather than block publishers.
pub struct EventBus {
    capacity: usize,
    channels: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn publish<T: Topic>(&self, payload: T::Payload) -> usize {
        match self.sender::<T>().send(payload) {
            Ok(receivers) => {
                tracing::debug!(topic = T::NAME, receivers, "Event published");
                receivers
            }
            Err(_) => {
                tracing::debug!(topic = T::NAME, "No subscribers, event dropped");
                0
            }
        }
    }

    pub fn subscribe<T: Topic>(&self) -> broadcast::Receiver<T::Payload> {
        self.sender::<T>().subscribe()
    }

    fn sender<T: Topic>(&self) -> broadcast::Sender<T::Payload> {
        let key = TypeId::of::<T>();
        {
            let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
            if let Some(tx) = channels
                .get(&key)
                .and_then(|c| c.downcast_ref::<broadcast::Sender<T::Payload>>())
            {
                return tx.clone();
            }
        }

        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        let entry = channels.entry(key).or_insert_with(|| -> Box<dyn Any + Send + Sync> {
            Box::new(broadcast::channel::<T::Payload>(self.capacity).0)
        });
        if let Some(tx) = entry.downcast_ref::<broadcast::Sender<T::Payload>>() {
            return tx.clone();
        }
        let (tx, _) = broadcast::channel::<T::Payload>(self.capacity);
        *entry = Box::new(tx.clone());
        tx
    }
}
