//! Latest-wins coordination for search-as-you-type inputs.
//!
//! Cancellation is modeled as an explicit request generation rather than an
//! abort signal tied to an I/O primitive: each keystroke issues a ticket,
//! and only the response holding the latest ticket may be applied to visible
//! state. Stale in-flight responses are discarded, never applied out of
//! order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct SearchSession {
    generation: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, obsoleting every ticket issued before it.
    pub fn issue(&self) -> SearchTicket {
        SearchTicket {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Debounce window: sleeps, then reports whether the ticket survived.
    /// A `false` return means a newer keystroke arrived and this request
    /// should not be sent at all.
    pub async fn debounce(&self, ticket: SearchTicket, delay: Duration) -> bool {
        tokio::time::sleep(delay).await;
        self.is_current(ticket)
    }

    /// Gate for applying a completed response: returns the value only if no
    /// newer ticket has been issued meanwhile.
    pub fn accept<T>(&self, ticket: SearchTicket, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            None
        }
    }
}
