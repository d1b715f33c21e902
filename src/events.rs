use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// Lifecycle steps of a test run as seen by WebSocket clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunEvent {
    TestRunRequested,
    TestExecutionStarted,
    TestExecutionCompleted,
    TestExecutionFailed,
    FlakyTestDetected,
}

impl RunEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunEvent::TestRunRequested => "test-run-requested",
            RunEvent::TestExecutionStarted => "test-execution-started",
            RunEvent::TestExecutionCompleted => "test-execution-completed",
            RunEvent::TestExecutionFailed => "test-execution-failed",
            RunEvent::FlakyTestDetected => "flaky-test-detected",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum WsMessage {
    Connection {
        message: String,
        timestamp: String,
    },
    TestEvent {
        run_id: String,
        event: RunEvent,
        data: Value,
        timestamp: String,
    },
}

impl WsMessage {
    pub fn connection() -> Self {
        WsMessage::Connection {
            message: "connected to test runner".to_string(),
            timestamp: timestamp(),
        }
    }

    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize websocket message");
                None
            }
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Fan-out of serialized run events to every connected WebSocket.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<String>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn publish(&self, run_id: &str, event: RunEvent, data: Value) {
        tracing::info!(run_id, event = event.as_str(), "test event");
        let message = WsMessage::TestEvent {
            run_id: run_id.to_string(),
            event,
            data,
            timestamp: timestamp(),
        };
        if let Some(json) = message.to_json() {
            // no subscribers is fine
            let _ = self.tx.send(json);
        }
    }
}
