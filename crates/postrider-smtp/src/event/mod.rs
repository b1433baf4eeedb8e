//! Command event fan-out.
//!
//! A session notifies registered listeners once per exchange direction:
//! after a command line is written and after a logical reply is read.
//! Dispatch is synchronous and on the calling task, in registration order.
//! A slow listener therefore blocks protocol progress; that is a documented
//! limitation, not an accident.

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::types::ReplyCode;

/// Observer of the command/reply traffic on a session.
///
/// Both methods default to no-ops, so a listener only implements the side it
/// cares about. Events carry the full formatted wire text, terminators
/// included.
pub trait CommandListener: Send {
    /// Called after a command line has been written to the channel.
    ///
    /// `token` is the command token (e.g. `MAIL FROM:`), `line` the complete
    /// wire line.
    fn on_command_sent(&self, token: &str, line: &str) {
        let _ = (token, line);
    }

    /// Called after a logical reply has been read and recorded.
    ///
    /// `text` is the full reply with protocol line terminators.
    fn on_reply_received(&self, code: ReplyCode, text: &str) {
        let _ = (code, text);
    }
}

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered listener registry.
///
/// Listeners are dispatched in registration order. A panicking listener is
/// caught and logged so the remaining listeners still observe the event and
/// the command caller never sees the failure.
#[derive(Default)]
pub struct CommandEvents {
    next_id: u64,
    listeners: Vec<(ListenerId, Box<dyn CommandListener>)>,
}

impl CommandEvents {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its handle.
    pub fn add(&mut self, listener: Box<dyn CommandListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Removes a listener. No-op if the handle was never registered or was
    /// already removed.
    pub fn remove(&mut self, id: ListenerId) {
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    /// Returns true if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Delivers a command-sent event to every listener in order.
    pub fn notify_command_sent(&self, token: &str, line: &str) {
        for (id, listener) in &self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_command_sent(token, line)));
            if outcome.is_err() {
                tracing::warn!(listener = id.0, "command listener panicked, continuing dispatch");
            }
        }
    }

    /// Delivers a reply-received event to every listener in order.
    pub fn notify_reply_received(&self, code: ReplyCode, text: &str) {
        for (id, listener) in &self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_reply_received(code, text)));
            if outcome.is_err() {
                tracing::warn!(listener = id.0, "reply listener panicked, continuing dispatch");
            }
        }
    }
}

impl std::fmt::Debug for CommandEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEvents")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recording {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl CommandListener for Recording {
        fn on_command_sent(&self, token: &str, _line: &str) {
            self.log.lock().unwrap().push(format!("{}:{token}", self.tag));
        }

        fn on_reply_received(&self, code: ReplyCode, _text: &str) {
            self.log.lock().unwrap().push(format!("{}:{code}", self.tag));
        }
    }

    struct Panicky;

    impl CommandListener for Panicky {
        fn on_command_sent(&self, _token: &str, _line: &str) {
            panic!("listener failure");
        }
    }

    #[test]
    fn dispatch_follows_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut events = CommandEvents::new();
        events.add(Box::new(Recording { tag: "a", log: Arc::clone(&log) }));
        events.add(Box::new(Recording { tag: "b", log: Arc::clone(&log) }));

        events.notify_command_sent("NOOP", "NOOP\r\n");
        events.notify_reply_received(ReplyCode::OK, "250 OK\r\n");

        assert_eq!(
            *log.lock().unwrap(),
            ["a:NOOP", "b:NOOP", "a:250", "b:250"]
        );
    }

    #[test]
    fn panicking_listener_does_not_stop_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut events = CommandEvents::new();
        events.add(Box::new(Panicky));
        events.add(Box::new(Recording { tag: "b", log: Arc::clone(&log) }));

        events.notify_command_sent("QUIT", "QUIT\r\n");

        assert_eq!(*log.lock().unwrap(), ["b:QUIT"]);
    }

    #[test]
    fn removal_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut events = CommandEvents::new();
        let first = events.add(Box::new(Recording { tag: "a", log: Arc::clone(&log) }));
        let second = events.add(Box::new(Recording { tag: "b", log: Arc::clone(&log) }));

        events.remove(first);
        events.remove(first);
        assert_eq!(events.len(), 1);

        events.notify_command_sent("NOOP", "NOOP\r\n");
        assert_eq!(*log.lock().unwrap(), ["b:NOOP"]);

        events.remove(second);
        assert!(events.is_empty());
        events.remove(second);
        assert!(events.is_empty());
    }
}
