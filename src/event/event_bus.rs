//! # Event Bus Implementation
//!
//! Two delivery paths share one publish call:
//!
//! - **Observers**: synchronous callbacks keyed by output name or wildcard,
//!   invoked in registration order (named observers before wildcard ones)
//! - **Broadcast channel**: asynchronous subscribers via [`EventReceiver`]
//!
//! The bus keeps an internal receiver so publishing never fails for lack of
//! subscribers; slow subscribers observe [`EventError::Lagged`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{debug, trace};

use crate::eval::context::{format_address, AddressSegment};
use crate::outputs::OutputValue;

/// Emitted once per completed generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationEvent {
    pub name: String,
    /// Dotted output address the value was written under.
    pub address: String,
    pub value: OutputValue,
    pub created_at: DateTime<Utc>,
}

impl GenerationEvent {
    pub fn new(name: &str, address: &[AddressSegment], value: OutputValue) -> Self {
        Self {
            name: name.to_string(),
            address: format_address(address),
            value,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Named(String),
    Any,
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        if name == "*" {
            EventKey::Any
        } else {
            EventKey::Named(name.to_string())
        }
    }
}

pub type Observer = Arc<dyn Fn(&GenerationEvent) + Send + Sync>;

pub struct EventBus {
    event_sender: broadcast::Sender<GenerationEvent>,
    observers: DashMap<EventKey, Vec<Observer>>,
    capacity: usize,
    _internal_receiver: broadcast::Receiver<GenerationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_sender, event_receiver) = broadcast::channel(capacity.max(1));
        Self {
            event_sender,
            observers: DashMap::new(),
            capacity,
            _internal_receiver: event_receiver,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.event_sender.subscribe())
    }

    pub fn on<K: Into<EventKey>>(&self, key: K, observer: Observer) {
        self.observers.entry(key.into()).or_default().push(observer);
    }

    pub fn publish(&self, event: GenerationEvent) {
        debug!(name = %event.name, address = %event.address, "Generation event published");
        for key in [EventKey::Named(event.name.clone()), EventKey::Any] {
            // Observers may register further observers; release the shard first.
            let observers = self
                .observers
                .get(&key)
                .map(|entry| entry.value().clone())
                .unwrap_or_default();
            for observer in observers {
                observer(&event);
            }
        }
        if let Err(e) = self.event_sender.send(event) {
            trace!("No broadcast subscribers: {}", e);
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("Event receiver lagged behind by {count} events")]
    Lagged { count: u64 },
    #[error("Event receive failed: {message}")]
    ReceiveFailed { message: String },
}

pub type EventResult<T> = Result<T, EventError>;

pub struct EventReceiver {
    receiver: broadcast::Receiver<GenerationEvent>,
}

impl EventReceiver {
    fn new(receiver: broadcast::Receiver<GenerationEvent>) -> Self {
        Self { receiver }
    }

    /// A lagged receiver reports how many events were overwritten and then
    /// resumes from the oldest event still buffered.
    pub async fn recv(&mut self) -> EventResult<GenerationEvent> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(count)) => Err(EventError::Lagged { count }),
            Err(e) => Err(EventError::ReceiveFailed {
                message: e.to_string(),
            }),
        }
    }

    /// Waits for the next event generated under `name`.
    pub async fn recv_named(&mut self, name: &str) -> EventResult<GenerationEvent> {
        loop {
            let event = self.recv().await?;
            if event.name == name {
                return Ok(event);
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = GenerationEvent> {
        BroadcastStream::new(self.receiver).filter_map(|event| event.ok())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn event(name: &str, value: &str) -> GenerationEvent {
        GenerationEvent::new(name, &[], OutputValue::text(value))
    }

    #[test]
    fn test_named_and_wildcard_observers() {
        let bus = EventBus::new(16);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let named = Arc::clone(&seen);
        bus.on(
            "answer",
            Arc::new(move |e: &GenerationEvent| {
                named.lock().unwrap().push(format!("named:{}", e.value.to_text()))
            }),
        );
        let any = Arc::clone(&seen);
        bus.on(
            EventKey::Any,
            Arc::new(move |e: &GenerationEvent| any.lock().unwrap().push(format!("any:{}", e.name))),
        );

        bus.publish(event("answer", "42"));
        bus.publish(event("other", "x"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["named:42", "any:answer", "any:other"]
        );
    }

    #[tokio::test]
    async fn test_basic_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(event("a", "1"));
        bus.publish(event("b", "2"));

        assert_eq!(rx.recv().await.unwrap().name, "a");
        assert_eq!(rx.recv_named("b").await.unwrap().value, OutputValue::text("2"));
    }

    #[tokio::test]
    async fn test_lagged_receiver() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.publish(event("a", &i.to_string()));
        }

        assert_eq!(rx.recv().await, Err(EventError::Lagged { count: 3 }));
        // buffered events survive the lag
        assert_eq!(rx.recv().await.unwrap().value, OutputValue::text("3"));
        assert_eq!(rx.recv().await.unwrap().value, OutputValue::text("4"));
    }

    #[test]
    fn test_wildcard_key() {
        assert_eq!(EventKey::from("*"), EventKey::Any);
        assert_eq!(EventKey::from("a"), EventKey::Named("a".to_string()));
    }
}
