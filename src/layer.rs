use crate::handler::{Attr, Record, StoreHandler};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::span;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Targets whose events are never persisted. The store's own
/// diagnostics and the SQL driver's query logs would otherwise feed back
/// into the store.
const IGNORED_TARGETS: [&str; 2] = [env!("CARGO_CRATE_NAME"), "sqlx"];

/// `tracing_subscriber` layer that turns events into [`Record`]s and
/// hands them to a [`StoreHandler`] on a background task.
///
/// Fields of the spans an event is nested in are attached as attribute
/// groups named after each span, outermost first, so a field `id` on
/// span `request` ends up as `request.id` in the stored context.
pub struct StoreLayer {
    handler: StoreHandler,
    sender: mpsc::Sender<Record>,
    /// Records handed to the background task.
    pub enqueued_events: Arc<AtomicU64>,
    /// Records dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
    /// Records discarded because the writer task is gone.
    pub closed_events: Arc<AtomicU64>,
}

impl StoreLayer {
    /// Create the layer and spawn the task that drains its channel.
    ///
    /// **Parameters**
    /// - `handler`: decides which levels are accepted and writes records.
    /// - `buffer`: channel capacity; at least 16.
    ///
    /// **Returns**
    /// - The layer, plus the writer task's handle. The task ends once the
    ///   layer (and with it the channel sender) is dropped and every
    ///   queued record has been written.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(handler: StoreHandler, buffer: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Record>(buffer.max(16));
        let writer = handler.clone();

        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = writer.handle(record).await {
                    eprintln!("error persisting log record: {}", e);
                }
            }
        });

        (
            Self {
                handler,
                sender: tx,
                enqueued_events: Arc::new(AtomicU64::new(0)),
                dropped_events: Arc::new(AtomicU64::new(0)),
                closed_events: Arc::new(AtomicU64::new(0)),
            },
            handle,
        )
    }

    pub fn handler(&self) -> &StoreHandler {
        &self.handler
    }

    fn enqueue(&self, record: Record) {
        match self.sender.try_send(record) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log store channel full, dropping log record");
            }
            Err(TrySendError::Closed(_)) => {
                self.closed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log store writer has stopped, discarding log record");
            }
        }
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|prefix| {
        target == *prefix
            || target
                .strip_prefix(prefix)
                .map_or(false, |rest| rest.starts_with("::"))
    })
}

/// Span fields, stored in the span's extensions.
struct SpanAttrs(Vec<Attr>);

impl<S> Layer<S> for StoreLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = Vec::new();
        let mut message = None;
        attrs.record(&mut FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        });
        if let Some(message) = message {
            fields.push(Attr::new("message", message));
        }
        span.extensions_mut().insert(SpanAttrs(fields));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(SpanAttrs(fields)) = extensions.get_mut::<SpanAttrs>() {
            let mut message = None;
            values.record(&mut FieldVisitor {
                fields: &mut *fields,
                message: &mut message,
            });
            if let Some(message) = message {
                fields.push(Attr::new("message", message));
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_ignored(meta.target()) || !self.handler.enabled(meta.level()) {
            return;
        }

        let mut attrs = Vec::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                let extensions = span.extensions();
                if let Some(SpanAttrs(fields)) = extensions.get::<SpanAttrs>() {
                    attrs.push(Attr::group(span.name(), fields.clone()));
                }
            }
        }

        let mut message = None;
        event.record(&mut FieldVisitor {
            fields: &mut attrs,
            message: &mut message,
        });

        let record = Record {
            level: *meta.level(),
            message: message.unwrap_or_default(),
            attrs,
        };

        self.enqueue(record);
    }
}

/// Collects `tracing` fields as [`Attr`]s; the `message` field is kept apart.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut Vec<Attr>,
    pub message: &'a mut Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn push(&mut self, field: &Field, value: Value) {
        self.fields.push(Attr::new(field.name(), value));
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.push(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, Value::String(format!("{:?}", value)));
        }
    }
}
