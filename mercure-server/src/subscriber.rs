//! Per-connection subscriber state: requested/authorized selectors, the
//! bounded inbox the transport fans updates into, and the one-shot
//! disconnect signal used to unwind the delivery loop.

use mercure_core::Update;
use tokio::sync::mpsc;

/// Default bounded-inbox capacity, per the "tens to hundreds" guidance for
/// slow-consumer backpressure. Overridable via `HubBuilder::subscriber_queue_capacity`.
pub const DEFAULT_INBOX_CAPACITY: usize = 100;

/// A registered subscriber. Cheap to clone: the inbox sender and
/// disconnect signal are both reference-counted channel handles.
#[derive(Clone)]
pub struct Subscriber {
    pub id: String,
    pub remote_addr: Option<String>,
    pub requested_selectors: Vec<String>,
    pub authorized_selectors: Vec<String>,
    pub all_topics: bool,
    pub last_event_id: Option<String>,
    inbox_tx: mpsc::Sender<Update>,
    disconnected_tx: tokio::sync::watch::Sender<bool>,
}

/// The receiving half returned alongside a [`Subscriber`] by [`Subscriber::new`];
/// owned exclusively by the handler's delivery loop.
pub struct SubscriberHandle {
    pub inbox_rx: mpsc::Receiver<Update>,
    pub disconnected_rx: tokio::sync::watch::Receiver<bool>,
}

impl Subscriber {
    pub fn new(
        id: impl Into<String>,
        remote_addr: Option<String>,
        requested_selectors: Vec<String>,
        authorized_selectors: Vec<String>,
        all_topics: bool,
        last_event_id: Option<String>,
        inbox_capacity: usize,
    ) -> (Self, SubscriberHandle) {
        let (inbox_tx, inbox_rx) = mpsc::channel(inbox_capacity.max(1));
        let (disconnected_tx, disconnected_rx) = tokio::sync::watch::channel(false);
        (
            Self {
                id: id.into(),
                remote_addr,
                requested_selectors,
                authorized_selectors,
                all_topics,
                last_event_id,
                inbox_tx,
                disconnected_tx,
            },
            SubscriberHandle {
                inbox_rx,
                disconnected_rx,
            },
        )
    }

    /// Non-blocking enqueue used by transports. Returns `false` (and the
    /// transport should treat the subscriber as gone) when the inbox is
    /// full or the receiver has been dropped (this is the fail-fast
    /// backpressure policy: never block dispatch to other subscribers over
    /// one slow consumer).
    pub fn try_enqueue(&self, update: Update) -> bool {
        self.inbox_tx.try_send(update).is_ok()
    }

    /// Signal disconnection. Safe to call more than once; only the first
    /// call has effect.
    pub fn disconnect(&self) {
        let _ = self.disconnected_tx.send(true);
    }

    pub fn is_disconnected(&self) -> bool {
        *self.disconnected_tx.borrow()
    }
}
