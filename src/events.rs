//! Endpoint lifecycle extension points.
//!
//! Each endpoint carries an [`EventStack`]; collaborators register handlers
//! that can observe or mutate the request at fixed stages of the build/execute
//! lifecycle. Handlers run in registration order. Re-entrant triggering of an
//! event from inside its own handler is prevented structurally: triggering
//! requires exclusive access to the stack.

use reqwest::Method;

use crate::data::EndpointData;
use crate::transport::{RequestDraft, WireResponse};
use crate::url::UrlArgs;

/// Lifecycle stages an endpoint fires events for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConfigureMethod,
    ConfigureUrl,
    ConfigurePayload,
    AfterConfiguredRequest,
    AfterResponse,
}

/// Stage-specific event payload handed to handlers.
pub enum Event<'a> {
    ConfigureMethod { method: &'a mut Method },
    ConfigureUrl { args: &'a mut UrlArgs },
    ConfigurePayload { data: &'a mut EndpointData },
    AfterConfiguredRequest { request: &'a mut RequestDraft },
    AfterResponse { response: &'a WireResponse },
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ConfigureMethod { .. } => EventKind::ConfigureMethod,
            Event::ConfigureUrl { .. } => EventKind::ConfigureUrl,
            Event::ConfigurePayload { .. } => EventKind::ConfigurePayload,
            Event::AfterConfiguredRequest { .. } => EventKind::AfterConfiguredRequest,
            Event::AfterResponse { .. } => EventKind::AfterResponse,
        }
    }
}

type Handler = Box<dyn FnMut(&mut Event<'_>) + Send>;

/// Handle returned from registration, usable to remove the handler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

/// Ordered registry of lifecycle handlers for one endpoint.
#[derive(Default)]
pub struct EventStack {
    handlers: Vec<(EventKind, HandlerId, Handler)>,
    next_id: u64,
}

impl std::fmt::Debug for EventStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStack")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl EventStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind; returns its removal handle.
    pub fn register<F>(&mut self, kind: EventKind, handler: F) -> HandlerId
    where
        F: FnMut(&mut Event<'_>) + Send + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((kind, id, Box::new(handler)));
        id
    }

    /// Remove a previously registered handler. Returns whether it existed.
    pub fn remove(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(_, hid, _)| *hid != id);
        before != self.handlers.len()
    }

    /// Run all handlers registered for the event's kind, in order.
    pub fn trigger(&mut self, event: &mut Event<'_>) {
        let kind = event.kind();
        for (handler_kind, _, handler) in self.handlers.iter_mut() {
            if *handler_kind == kind {
                handler(event);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
