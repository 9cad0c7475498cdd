//! Event formatter that renders the current unit's context.

use crate::context::{ContextSnapshot, ContextStore};
use std::fmt::Write as _;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// How the context is attached to a rendered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// `{key=value ...}` before the inner formatter's output.
    Prefix,
    /// A `"context"` object merged into the inner formatter's JSON line.
    JsonField,
}

/// Wraps an event formatter so every event carries the current context.
///
/// The context read is that of the unit emitting the event, so anything
/// propagated onto a worker shows up in the worker's log lines.
#[derive(Debug, Clone)]
pub struct ContextFormat<F> {
    inner: F,
    store: ContextStore,
    placement: Placement,
}

impl<F> ContextFormat<F> {
    /// Prefixes `inner`'s output with `{key=value ...}`, keys sorted.
    /// Nothing is written for an empty context.
    pub fn new(store: ContextStore, inner: F) -> Self {
        Self {
            inner,
            store,
            placement: Placement::Prefix,
        }
    }

    /// Adds a `"context"` object to each JSON line `inner` writes.
    ///
    /// `inner` must produce one JSON object per event.
    pub fn json(store: ContextStore, inner: F) -> Self {
        Self {
            inner,
            store,
            placement: Placement::JsonField,
        }
    }

    fn write_prefix(snapshot: &ContextSnapshot, writer: &mut Writer<'_>) -> std::fmt::Result {
        writer.write_char('{')?;
        for (i, (key, value)) in snapshot.to_sorted().into_iter().enumerate() {
            if i > 0 {
                writer.write_char(' ')?;
            }
            write!(writer, "{key}={value}")?;
        }
        writer.write_str("} ")
    }
}

impl<S, N, F> FormatEvent<S, N> for ContextFormat<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let snapshot = self.store.snapshot();
        if snapshot.is_empty() {
            return self.inner.format_event(ctx, writer, event);
        }

        match self.placement {
            Placement::Prefix => {
                Self::write_prefix(&snapshot, &mut writer)?;
                self.inner.format_event(ctx, writer.by_ref(), event)
            }
            Placement::JsonField => {
                let mut line = String::new();
                self.inner.format_event(ctx, Writer::new(&mut line), event)?;
                writer.write_str(&merge_json(&line, &snapshot))
            }
        }
    }
}

/// Inserts `snapshot` as `"context"` into a rendered JSON line.
///
/// Lines that are not a JSON object are returned unchanged.
fn merge_json(line: &str, snapshot: &ContextSnapshot) -> String {
    let Ok(serde_json::Value::Object(mut object)) = serde_json::from_str(line.trim_end()) else {
        return line.to_string();
    };
    let Ok(context) = serde_json::to_value(snapshot) else {
        return line.to_string();
    };
    object.insert("context".to_string(), context);
    let mut merged = serde_json::Value::Object(object).to_string();
    merged.push('\n');
    merged
}
