//! Progress events emitted during an analysis run.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::types::Task;

/// One step of an analysis run, in emission order.
///
/// Per run: `Progress(0)`, then for each file `FileStarted`, `Progress`,
/// zero or more `TaskFound`, `FileCompleted`; finally `Progress(100)` on
/// success.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEvent {
    Progress {
        percent: u8,
        message: String,
    },
    FileStarted {
        file_id: String,
        filename: String,
    },
    TaskFound {
        task: Task,
    },
    FileCompleted {
        file_id: String,
        filename: String,
        task_count: usize,
    },
}

/// Receiver of analysis events. `emit` must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AnalysisEvent);
}

/// Discards everything
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: AnalysisEvent) {}
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<AnalysisEvent> {
    fn emit(&self, event: AnalysisEvent) {
        // A closed receiver means nobody is listening any more
        let _ = self.send(event);
    }
}

/// Adapts a closure into a sink
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(AnalysisEvent) + Send + Sync,
{
    fn emit(&self, event: AnalysisEvent) {
        (self.0)(event)
    }
}

/// Keeps every event, in order
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AnalysisEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalysisEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: AnalysisEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Cooperative cancellation, checked between files
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AnalysisEvent::FileCompleted {
            file_id: "f1".into(),
            filename: "a.txt".into(),
            task_count: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "file_completed");
        assert_eq!(json["task_count"], 2);
    }

    #[test]
    fn test_closure_and_channel_sinks() {
        let seen = Mutex::new(0);
        let sink = FnSink(|_e: AnalysisEvent| *seen.lock().unwrap() += 1);
        sink.emit(AnalysisEvent::Progress { percent: 0, message: String::new() });
        assert_eq!(*seen.lock().unwrap(), 1);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.emit(AnalysisEvent::Progress { percent: 5, message: "x".into() });
        assert!(matches!(rx.try_recv(), Ok(AnalysisEvent::Progress { percent: 5, .. })));

        drop(rx);
        // Sending into a closed channel is silently dropped
        tx.emit(AnalysisEvent::Progress { percent: 6, message: "y".into() });
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
