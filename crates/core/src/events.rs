//! Lifecycle events
//!
//! Components publish [`PipelineEvent`]s through an [`EventSink`] handed to
//! them at construction. Publishing never blocks and never fails: with no
//! subscribers the event is dropped.

use serde::Serialize;
use tokio::sync::broadcast;

/// Default channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        component: &'static str,
        operation: String,
    },
    Completed {
        component: &'static str,
        operation: String,
        elapsed_ms: u64,
        items: usize,
    },
    Failed {
        component: &'static str,
        operation: String,
        error: String,
    },
    Progress {
        component: &'static str,
        completed: usize,
        total: usize,
    },
}

/// Non-blocking event publisher
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<broadcast::Sender<PipelineEvent>>,
}

impl EventSink {
    /// Create a sink with its own channel
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Subscribe to events; `None` if the sink is disabled
    pub fn subscribe(&self) -> Option<broadcast::Receiver<PipelineEvent>> {
        self.tx.as_ref().map(|tx| tx.subscribe())
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            // No receivers is fine
            let _ = tx.send(event);
        }
    }

    pub fn started(&self, component: &'static str, operation: impl Into<String>) {
        self.emit(PipelineEvent::Started {
            component,
            operation: operation.into(),
        });
    }

    pub fn completed(
        &self,
        component: &'static str,
        operation: impl Into<String>,
        elapsed_ms: u64,
        items: usize,
    ) {
        self.emit(PipelineEvent::Completed {
            component,
            operation: operation.into(),
            elapsed_ms,
            items,
        });
    }

    pub fn failed(&self, component: &'static str, operation: impl Into<String>, error: impl ToString) {
        self.emit(PipelineEvent::Failed {
            component,
            operation: operation.into(),
            error: error.to_string(),
        });
    }

    pub fn progress(&self, component: &'static str, completed: usize, total: usize) {
        self.emit(PipelineEvent::Progress {
            component,
            completed,
            total,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let sink = EventSink::new(8);
        let mut rx = sink.subscribe().unwrap();

        sink.started("chunker", "chunk");
        sink.completed("chunker", "chunk", 3, 2);

        assert_eq!(
            rx.recv().await.unwrap(),
            PipelineEvent::Started {
                component: "chunker",
                operation: "chunk".into()
            }
        );
        assert!(matches!(
            rx.recv().await.unwrap(),
            PipelineEvent::Completed { items: 2, .. }
        ));
    }

    #[test]
    fn test_disabled_sink_is_silent() {
        let sink = EventSink::disabled();
        assert!(sink.subscribe().is_none());
        sink.failed("search", "search", "boom");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let sink = EventSink::default();
        sink.progress("chunker", 1, 2);
        let sink = EventSink::new(1);
        sink.progress("chunker", 1, 2);
    }
}
