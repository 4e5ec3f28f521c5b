use crate::state_machine::states::{FileSelectionState, RootState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Broadcast publisher for orchestrator transitions
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<TransitionEvent>,
}

/// A transition of either the root machine or the file-selection child
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "machine", rename_all = "snake_case")]
pub enum TransitionEvent {
    Root {
        from: RootState,
        to: RootState,
        trigger: String,
        at: DateTime<Utc>,
    },
    FileSelection {
        to: FileSelectionState,
        at: DateTime<Utc>,
    },
}

impl TransitionEvent {
    pub fn root(from: RootState, to: RootState, trigger: impl Into<String>) -> Self {
        Self::Root {
            from,
            to,
            trigger: trigger.into(),
            at: Utc::now(),
        }
    }

    pub fn file_selection(to: FileSelectionState) -> Self {
        Self::FileSelection { to, at: Utc::now() }
    }

    /// Target state of a root transition
    pub fn root_target(&self) -> Option<RootState> {
        match self {
            Self::Root { to, .. } => Some(*to),
            Self::FileSelection { .. } => None,
        }
    }
}

impl EventPublisher {
    /// Publisher whose subscribers may lag by at most `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a transition, returning how many subscribers received it
    pub fn publish(&self, event: TransitionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::default();
        assert_eq!(publisher.subscriber_count(), 0);
        let delivered =
            publisher.publish(TransitionEvent::root(RootState::Idle, RootState::FileSelection, "START_NEW"));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_transitions() {
        let publisher = EventPublisher::new(8);
        let mut rx = publisher.subscribe();

        let delivered = publisher.publish(TransitionEvent::root(RootState::JobPolling, RootState::Done, "poll"));
        assert_eq!(delivered, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.root_target(), Some(RootState::Done));
    }
}
