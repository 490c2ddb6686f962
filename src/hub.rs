use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;
use tokio::runtime::Handle;
use tracing::{debug, error, info, trace, warn};

use crate::channel::EventChannel;
use crate::config::HubConfig;
use crate::connection::{ConnectionState, StreamConnection};
use crate::error::HubError;
use crate::event::HubEvent;
use crate::message::Frame;
use crate::registry::Registry;
use crate::transport::{SseTransport, Transport};

type Subscriber = dyn Fn(&HubEvent) + Send + Sync;
type Observer = dyn Fn(ConnectionState) + Send + Sync;

/// Handle returned by [`EventHub::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Handle returned by [`EventHub::on_connection_state_change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Owns one server-push connection and fans its messages out to subscribers.
///
/// Clones share the same hub. Create one at the composition root and hand
/// clones to whatever needs to listen.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    transport: Arc<dyn Transport>,
    link: Mutex<Link>,
    subscribers: Mutex<HashMap<EventChannel, Registry<Subscriber>>>,
    next_subscription: AtomicU64,
}

/// Connection state, observers and the queue of pending state notices.
///
/// Observer ids, notice sequence numbers and connection generations share
/// one counter, so an observer only sees notices queued after it registered.
struct Link {
    state: ConnectionState,
    connection: Option<StreamConnection>,
    observers: Registry<Observer>,
    notices: VecDeque<Notice>,
    draining: bool,
    seq: u64,
}

struct Notice {
    seq: u64,
    /// `None` for a transition, `Some` for the replay to a new observer
    target: Option<u64>,
    state: ConnectionState,
}

impl Link {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn transition(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }

        debug!("Connection state {} -> {}", self.state, state);
        self.state = state;
        let seq = self.next_seq();
        self.notices.push_back(Notice {
            seq,
            target: None,
            state,
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| connection.generation == generation)
    }
}

impl EventHub {
    /// Create a hub backed by the server-sent events transport
    pub fn new(config: HubConfig) -> Result<Self, HubError> {
        Ok(Self::with_transport(SseTransport::new(&config)?))
    }

    /// Create a hub backed by a custom transport
    pub fn with_transport<T: Transport + 'static>(transport: T) -> Self {
        Self {
            inner: Arc::new(HubInner {
                transport: Arc::new(transport),
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    connection: None,
                    observers: Registry::new(),
                    notices: VecDeque::new(),
                    draining: false,
                    seq: 0,
                }),
                subscribers: Mutex::new(HashMap::new()),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    /// Start opening the event stream.
    ///
    /// Does nothing while a connection attempt is in flight or established.
    /// Failures are logged and leave the hub `Disconnected`; nothing is
    /// retried here.
    pub fn connect(&self) {
        {
            let mut link = self.inner.lock_link();

            if let Some(connection) = &link.connection
                && !connection.is_closed()
            {
                debug!("Event stream already {}, ignoring connect", link.state);
                return;
            }

            link.connection = None;
            link.transition(ConnectionState::Connecting);

            match Handle::try_current() {
                Ok(runtime) => {
                    let generation = link.next_seq();
                    let task = runtime.spawn(Arc::clone(&self.inner).run(generation));
                    link.connection = Some(StreamConnection { generation, task });
                }
                Err(e) => {
                    error!("Failed to start event stream: {}", HubError::from(e));
                    link.transition(ConnectionState::Disconnected);
                }
            }
        }

        self.inner.flush_notices();
    }

    /// Close the event stream if one is open
    pub fn disconnect(&self) {
        {
            let mut link = self.inner.lock_link();

            match link.connection.take() {
                Some(connection) => {
                    info!("Closing event stream");
                    connection.close();
                }
                None => debug!("No event stream to close"),
            }

            link.transition(ConnectionState::Disconnected);
        }

        self.inner.flush_notices();
    }

    /// Register a callback for every message on `channel`.
    ///
    /// Callbacks on a channel run in registration order. Each call registers
    /// a new entry, even for the same closure.
    pub fn subscribe<F>(&self, channel: EventChannel, callback: F) -> SubscriptionId
    where
        F: Fn(&HubEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);

        self.inner
            .lock_subscribers()
            .entry(channel)
            .or_insert_with(Registry::new)
            .insert(id, Arc::new(callback));

        debug!("Subscription {} added on {}", id, channel);
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, channel: EventChannel, subscription: SubscriptionId) {
        let removed = self
            .inner
            .lock_subscribers()
            .get_mut(&channel)
            .is_some_and(|registry| registry.remove(subscription.0));

        if removed {
            debug!("Subscription {} removed from {}", subscription.0, channel);
        }
    }

    /// Observe connection state. The observer is called right away with the
    /// current state, then once per change.
    pub fn on_connection_state_change<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        let id = {
            let mut link = self.inner.lock_link();
            let id = link.next_seq();
            let state = link.state;

            link.observers.insert(id, Arc::new(observer));
            link.notices.push_back(Notice {
                seq: id,
                target: Some(id),
                state,
            });
            id
        };

        self.inner.flush_notices();
        ObserverId(id)
    }

    pub fn off_connection_state_change(&self, observer: ObserverId) {
        if !self.inner.lock_link().observers.remove(observer.0) {
            debug!("Observer {} was not registered", observer.0);
        }
    }
}

impl HubInner {
    fn lock_link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, HashMap<EventChannel, Registry<Subscriber>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the transport and pump its frames until it fails or is replaced
    async fn run(self: Arc<Self>, generation: u64) {
        let mut frames = match self.transport.open().await {
            Ok(frames) => frames,
            Err(e) => {
                error!("Failed to open event stream: {}", e);
                self.connection_lost(generation);
                return;
            }
        };

        if !self.connection_opened(generation) {
            return;
        }

        loop {
            match frames.next().await {
                Some(Ok(frame)) => {
                    let current = self.lock_link().is_current(generation);
                    if !current {
                        return;
                    }
                    self.dispatch(&frame);
                }
                Some(Err(e)) => {
                    warn!("Event stream failed: {}", e);
                    break;
                }
                None => {
                    info!("Event stream closed by server");
                    break;
                }
            }
        }

        drop(frames);
        self.connection_lost(generation);
    }

    fn connection_opened(&self, generation: u64) -> bool {
        {
            let mut link = self.lock_link();
            if !link.is_current(generation) {
                debug!("Discarding stale event stream {}", generation);
                return false;
            }
            info!("Event stream connected");
            link.transition(ConnectionState::Connected);
        }

        self.flush_notices();
        true
    }

    fn connection_lost(&self, generation: u64) {
        {
            let mut link = self.lock_link();
            if !link.is_current(generation) {
                return;
            }
            link.connection = None;
            link.transition(ConnectionState::Disconnected);
        }

        self.flush_notices();
    }

    fn dispatch(&self, frame: &Frame) {
        trace!("Received {} message: {}", frame.event, frame.data);

        let Some(channel) = EventChannel::from_tag(&frame.event) else {
            debug!("Ignoring message with unrecognized type: {}", frame.event);
            return;
        };

        let event = match HubEvent::decode(channel, &frame.data) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping message: {}", e);
                return;
            }
        };

        let ids = self
            .lock_subscribers()
            .get(&channel)
            .map(|registry| registry.ids())
            .unwrap_or_default();

        for id in ids {
            // Skip anything unsubscribed by an earlier callback
            let subscriber = self
                .lock_subscribers()
                .get(&channel)
                .and_then(|registry| registry.get(id));
            let Some(subscriber) = subscriber else {
                continue;
            };

            if panic::catch_unwind(AssertUnwindSafe(|| subscriber(&event))).is_err() {
                error!("Subscription {} on {} panicked", id, channel);
            }
        }
    }

    /// Deliver queued state notices in order, outside the lock.
    ///
    /// Only one caller drains at a time; notices queued meanwhile, including
    /// from inside an observer, are picked up by the active drainer. An
    /// observer removed mid-drain receives nothing further.
    fn flush_notices(&self) {
        {
            let mut link = self.lock_link();
            if link.draining {
                return;
            }
            link.draining = true;
        }

        loop {
            let (state, targets) = {
                let mut link = self.lock_link();
                let Some(notice) = link.notices.pop_front() else {
                    link.draining = false;
                    return;
                };

                let targets = match notice.target {
                    Some(id) => vec![id],
                    None => link.observers.ids_before(notice.seq),
                };
                (notice.state, targets)
            };

            for id in targets {
                let observer = self.lock_link().observers.get(id);
                let Some(observer) = observer else {
                    continue;
                };

                if panic::catch_unwind(AssertUnwindSafe(|| observer(state))).is_err() {
                    error!("Connection observer {} panicked", id);
                }
            }
        }
    }
}
