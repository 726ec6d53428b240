//! Fan-out of tracing events to dashboard websocket clients.

use tokio::sync::broadcast;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Lines buffered per subscriber before a slow client starts lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Shared handle to the live log feed. Cloning is cheap; every clone
/// broadcasts into the same channel.
#[derive(Clone)]
pub struct LogStream {
    sender: broadcast::Sender<String>,
}

impl LogStream {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        LogStream { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Tracing layer that mirrors every event into this stream.
    pub fn layer(&self) -> BroadcastLayer {
        BroadcastLayer {
            sender: self.sender.clone(),
        }
    }
}

impl Default for LogStream {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BroadcastLayer {
    sender: broadcast::Sender<String>,
}

impl<S: Subscriber> Layer<S> for BroadcastLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let line = format!(
            "{} - {} - {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
            event.metadata().level(),
            visitor.rendered()
        );
        // Dropped when no dashboard is connected
        let _ = self.sender.send(line);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl MessageVisitor {
    fn rendered(&self) -> String {
        if self.fields.is_empty() {
            return self.message.clone();
        }
        let fields = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        if self.message.is_empty() {
            fields
        } else {
            format!("{} {}", self.message, fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}
