use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::ServiceError;

pub mod outbox;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Fails with `EventError` once the receiving loop has shut down.
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("event channel closed: {}", e)))
    }
}

/// Post-write catalog events. Raised inside the write transaction through the
/// outbox and delivered to handlers asynchronously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ItemCreated(i64),
    /// `field` is either an item column (`name`, `short_description`) or an attribute code.
    ItemAttributeChanged {
        item_id: i64,
        field: String,
    },
    VariantPromotionChanged {
        item_id: i64,
        variant_id: i64,
    },
    AttributeChoiceCreated {
        attribute_id: i64,
        choice_id: i64,
    },
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ItemCreated(_) => "item_created",
            Event::ItemAttributeChanged { .. } => "item_attribute_changed",
            Event::VariantPromotionChanged { .. } => "variant_promotion_changed",
            Event::AttributeChoiceCreated { .. } => "attribute_choice_created",
        }
    }

    pub fn aggregate_type(&self) -> &'static str {
        match self {
            Event::ItemCreated(_)
            | Event::ItemAttributeChanged { .. }
            | Event::VariantPromotionChanged { .. } => "item",
            Event::AttributeChoiceCreated { .. } => "attribute",
        }
    }

    pub fn aggregate_id(&self) -> String {
        match self {
            Event::ItemCreated(item_id)
            | Event::ItemAttributeChanged { item_id, .. }
            | Event::VariantPromotionChanged { item_id, .. } => item_id.to_string(),
            Event::AttributeChoiceCreated { attribute_id, .. } => attribute_id.to_string(),
        }
    }
}

// Handlers implementing this trait process events asynchronously.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

/// Fans every received event out to all handlers until the channel closes.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!(handlers = handlers.len(), "Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!("Received event: {:?}", event);
        metrics::counter!("catalog.events.received", 1);

        let results = join_all(
            handlers
                .iter()
                .map(|handler| handler.handle_event(event.clone())),
        )
        .await;

        for result in results {
            if let Err(e) = result {
                metrics::counter!("catalog.events.handler_errors", 1);
                error!(
                    event_type = event.event_type(),
                    aggregate_id = %event.aggregate_id(),
                    "Event handler failed: {}",
                    e
                );
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<Event>>);

    #[async_trait]
    impl EventHandler for Recording {
        async fn handle_event(&self, event: Event) -> Result<(), String> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        async fn handle_event(&self, _event: Event) -> Result<(), String> {
            Err("nope".into())
        }
    }

    #[tokio::test]
    async fn process_events_reaches_every_handler() {
        let (tx, rx) = mpsc::channel(8);
        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(Failing), recording.clone()];

        let sender = EventSender::new(tx);
        sender.send(Event::ItemCreated(7)).await.unwrap();
        sender
            .send(Event::ItemAttributeChanged {
                item_id: 7,
                field: "name".into(),
            })
            .await
            .unwrap();
        drop(sender);

        process_events(rx, handlers).await;

        let seen = recording.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], Event::ItemCreated(7));
    }

    #[tokio::test]
    async fn sending_after_shutdown_is_an_event_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let result = EventSender::new(tx).send(Event::ItemCreated(1)).await;
        assert!(matches!(result, Err(ServiceError::EventError(_))));
    }

    #[test]
    fn aggregate_metadata() {
        let event = Event::AttributeChoiceCreated {
            attribute_id: 3,
            choice_id: 9,
        };
        assert_eq!(event.aggregate_type(), "attribute");
        assert_eq!(event.aggregate_id(), "3");
        assert_eq!(event.event_type(), "attribute_choice_created");
    }
}
