//! Aggregate contract and explicit event dispatch.

use std::collections::HashMap;
use std::fmt;

use crate::error::AggregateError;
use crate::event::Event;

/// In-memory object that folds stream events into state.
///
/// Kept object safe: the snapshot-aware stream holds registered aggregates
/// as trait objects.
pub trait Aggregate: Send + Sync {
    /// Stable name used to key snapshots. Changing it orphans previous
    /// snapshots and forces a full replay.
    fn type_name(&self) -> &str;

    /// Fold one event into state and advance the applied-event counter.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError`] when the event cannot be routed or its
    /// payload does not decode.
    fn apply_event(&mut self, event: &Event) -> Result<(), AggregateError>;

    /// Number of events folded into the current state, including those
    /// restored from a snapshot.
    fn applied_event_count(&self) -> i64;

    /// Serialized state for snapshotting.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::State`] when the state cannot be encoded.
    fn snapshot_state(&self) -> Result<serde_json::Value, AggregateError>;
}

type ApplyFn<S> = Box<dyn Fn(&mut S, &Event) -> Result<(), AggregateError> + Send + Sync>;

/// Name-to-function dispatch table routing events to apply functions.
///
/// Built by an explicit registration step, one `on` call per event name.
/// Unmatched names error unless `ignoring_unmatched` was chosen.
pub struct EventApplier<S> {
    handlers: HashMap<String, ApplyFn<S>>,
    ignore_unmatched: bool,
}

impl<S> EventApplier<S> {
    /// Empty table that rejects every event name.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            ignore_unmatched: false,
        }
    }

    /// Registers `apply` for events named `name`, replacing any previous
    /// registration under that name.
    #[must_use]
    pub fn on(
        mut self,
        name: &str,
        apply: impl Fn(&mut S, &Event) -> Result<(), AggregateError> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(name.to_owned(), Box::new(apply));
        self
    }

    /// Skip events with no registered apply function instead of erroring.
    /// Useful when a stream interleaves events for several aggregates.
    #[must_use]
    pub fn ignoring_unmatched(mut self) -> Self {
        self.ignore_unmatched = true;
        self
    }

    /// Whether an apply function is registered for `name`.
    #[must_use]
    pub fn handles(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Routes `event` by name to its apply function.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::UnroutableEvent`] for an unregistered name
    /// (unless the table ignores unmatched events), or whatever the apply
    /// function itself returns.
    pub fn apply(&self, state: &mut S, event: &Event) -> Result<(), AggregateError> {
        match self.handlers.get(event.name.as_str()) {
            Some(apply) => apply(state, event),
            None if self.ignore_unmatched => Ok(()),
            None => Err(AggregateError::UnroutableEvent {
                name: event.name.clone(),
            }),
        }
    }
}

impl<S> Default for EventApplier<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for EventApplier<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("EventApplier")
            .field("handlers", &names)
            .field("ignore_unmatched", &self.ignore_unmatched)
            .finish()
    }
}
