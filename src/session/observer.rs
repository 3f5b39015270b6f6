//! Explicit observer interface for engine state changes
//!
//! Embedders subscribe to changes of the input text, the loading flag, and
//! the message sequence. Handlers are plain callbacks dispatched
//! synchronously on the engine's event loop; there is no channel or
//! background task involved.

use crate::session::message::ChatMessage;

/// Observable aspects of the engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverKind {
    /// The current input text
    UserInput,
    /// The loading flag
    Loading,
    /// The full message sequence
    Messages,
}

/// A state-change notification delivered to subscribed handlers
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    /// Input text changed
    UserInput(String),
    /// Loading flag changed
    Loading(bool),
    /// Message sequence changed
    Messages(Vec<ChatMessage>),
}

impl ObserverEvent {
    /// The kind of state this event describes
    pub fn kind(&self) -> ObserverKind {
        match self {
            Self::UserInput(_) => ObserverKind::UserInput,
            Self::Loading(_) => ObserverKind::Loading,
            Self::Messages(_) => ObserverKind::Messages,
        }
    }
}

/// Token returned by [`ObserverHub::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

type Handler = Box<dyn Fn(&ObserverEvent) + Send + Sync>;

/// Registry of state-change subscribers
#[derive(Default)]
pub struct ObserverHub {
    next_id: u64,
    handlers: Vec<(u64, ObserverKind, Handler)>,
}

impl ObserverHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`
    ///
    /// # Examples
    ///
    /// ```
    /// use parlance::session::{ObserverEvent, ObserverHub, ObserverKind};
    ///
    /// let mut hub = ObserverHub::new();
    /// let token = hub.subscribe(ObserverKind::Loading, |event| {
    ///     if let ObserverEvent::Loading(flag) = event {
    ///         println!("loading: {flag}");
    ///     }
    /// });
    /// assert!(hub.unsubscribe(token));
    /// ```
    pub fn subscribe(
        &mut self,
        kind: ObserverKind,
        handler: impl Fn(&ObserverEvent) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers.push((id, kind, Box::new(handler)));
        SubscriptionToken(id)
    }

    /// Remove the subscription identified by `token`
    ///
    /// Returns false when the token was already removed or never issued.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(id, _, _)| *id != token.0);
        self.handlers.len() != before
    }

    /// Dispatch `event` to every handler subscribed to its kind
    pub fn emit(&self, event: &ObserverEvent) {
        let kind = event.kind();
        for (_, subscribed, handler) in &self.handlers {
            if *subscribed == kind {
                handler(event);
            }
        }
    }

    /// Number of active subscriptions
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true when no handlers are subscribed
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
