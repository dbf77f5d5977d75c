//! ConnectionManager - owns the push channel.
//!
//! The lifecycle is decided by the pure state machine in `huddle-core`; this
//! module interprets its actions against a [`Transport`]:
//!
//! ```text
//! connect() ──► huddle-core ConnectionState ──► actions ──► Transport
//!                       ▲                                     │
//!                       └──── Dropped / ConnectFailed ◄─ driver task
//! ```
//!
//! Once connected, a driver task reads frames, sends heartbeats and watches
//! for silence. When the channel drops it waits the fixed reconnect delay and
//! tries again, calling the `on_connect` hook after every successful
//! handshake so the router can restore its subscriptions.
//!
//! Inbound `MESSAGE` frames are turned into [`Delivery`] values and handed to
//! the handler registered for their [`Topic`].

use dashmap::DashMap;
use serde::Serialize;
use std::future::pending;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use huddle_core::{Action, Channel, ConnectionEvent, ConnectionState, Event, ReconnectPolicy};
use huddle_types::stomp::{self, Command, Frame, HeartBeat, Inbound, HEARTBEAT_EOL, STOMP_VERSION};
use huddle_types::{ChatStatus, RawMessage, SubscriptionId};

use crate::config::ClientConfig;
use crate::error::ConnectionError;
use crate::transport::Transport;

/// Capacity of the lifecycle event broadcast.
const EVENT_CAPACITY: usize = 64;

/// How to reach and keep the push channel.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// WebSocket URL.
    pub url: String,
    /// Bearer token for CONNECT and SEND frames.
    pub token: String,
    /// Heartbeat intervals we advertise.
    pub heartbeat: HeartBeat,
    /// Handshake timeout.
    pub connect_timeout: Duration,
    /// Retry policy after drops and failed attempts.
    pub policy: ReconnectPolicy,
}

impl ConnectionSettings {
    /// Settings with default heartbeat, timeout and retry policy.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            heartbeat: HeartBeat::from_millis(4000, 4000),
            connect_timeout: Duration::from_secs(10),
            policy: ReconnectPolicy::default(),
        }
    }

    /// Settings from a loaded configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            url: config.server.ws_url.clone(),
            token: config.identity.token.clone(),
            heartbeat: config.connection.heartbeat(),
            connect_timeout: config.connection.connect_timeout(),
            policy: config.connection.reconnect_policy(),
        }
    }
}

/// Which handler an inbound delivery goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Group channel messages.
    Group,
    /// Inbox messages.
    Private,
    /// Membership notifications (`JOIN` status).
    Membership,
}

/// A decoded `MESSAGE` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Which handler it was routed to.
    pub topic: Topic,
    /// Channel it arrived on.
    pub channel: Channel,
    /// Subscription that received it, if the server said.
    pub subscription: Option<SubscriptionId>,
    /// Payload with backend field names still intact.
    pub payload: RawMessage,
}

/// Receives deliveries for one topic.
pub type Handler = Arc<dyn Fn(Delivery) + Send + Sync>;

/// Called after every successful handshake.
pub type ConnectHook = Arc<dyn Fn() + Send + Sync>;

/// Manages the push channel.
pub struct ConnectionManager<T: Transport + 'static> {
    shared: Arc<Shared<T>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

struct Shared<T> {
    transport: T,
    settings: ConnectionSettings,
    state: Mutex<ConnectionState>,
    negotiated: Mutex<(Option<Duration>, Option<Duration>)>,
    subscriptions: DashMap<SubscriptionId, Channel>,
    next_subscription: AtomicU64,
    handlers: DashMap<Topic, Handler>,
    on_connect: Mutex<Option<ConnectHook>>,
    events: broadcast::Sender<ConnectionEvent>,
}

#[derive(Debug, Clone, Copy)]
struct ReconnectTimer {
    delay: Duration,
    attempt: u32,
}

#[derive(Default)]
struct Outcome {
    timer: Option<ReconnectTimer>,
    error: Option<ConnectionError>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Transport + 'static> ConnectionManager<T> {
    /// Create a manager. Nothing happens until [`connect`](Self::connect).
    pub fn new(transport: T, settings: ConnectionSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                transport,
                settings,
                state: Mutex::new(ConnectionState::new()),
                negotiated: Mutex::new((None, None)),
                subscriptions: DashMap::new(),
                next_subscription: AtomicU64::new(0),
                handlers: DashMap::new(),
                on_connect: Mutex::new(None),
                events,
            }),
            driver: Mutex::new(None),
        }
    }

    /// Establish the channel.
    ///
    /// A failed first attempt is returned to the caller, but retries continue
    /// in the background according to the reconnect policy.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        if self.is_connected() {
            return Ok(());
        }
        self.stop_driver();
        let outcome = self.shared.drive(Event::ConnectRequested).await;
        if self.shared.state().is_connected() || outcome.timer.is_some() {
            let shared = Arc::clone(&self.shared);
            let handle = tokio::spawn(run_driver(shared, outcome.timer));
            *lock(&self.driver) = Some(handle);
        }
        match outcome.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Tear the channel down: stop retrying, UNSUBSCRIBE every live handle,
    /// send DISCONNECT, then close the socket.
    pub async fn disconnect(&self) {
        self.stop_driver();
        self.shared.drive(Event::DisconnectRequested).await;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Whether publishes and subscriptions may proceed.
    pub fn is_connected(&self) -> bool {
        self.shared.state().is_connected()
    }

    /// Listen for lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    /// Register the handler for `topic`, replacing any previous one.
    pub fn on(&self, topic: Topic, handler: Handler) {
        self.shared.handlers.insert(topic, handler);
    }

    /// Register the hook run after every successful handshake.
    pub fn on_connect(&self, hook: ConnectHook) {
        *lock(&self.shared.on_connect) = Some(hook);
    }

    /// Publish a JSON body to `destination`.
    ///
    /// Rejected with [`ConnectionError::NotConnected`] unless connected.
    pub async fn publish<B: Serialize + ?Sized>(
        &self,
        destination: &str,
        body: &B,
    ) -> Result<(), ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        let frame = Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .header("Authorization", self.shared.bearer())
            .body(serde_json::to_string(body)?);
        self.shared.transport.send(&frame.encode()).await?;
        debug!(destination, "published");
        Ok(())
    }

    /// Live subscriptions.
    pub fn subscriptions(&self) -> Vec<(SubscriptionId, Channel)> {
        self.shared
            .subscriptions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Subscribe to `channel`. Only the router calls this.
    pub(crate) async fn subscribe(
        &self,
        channel: Channel,
    ) -> Result<SubscriptionId, ConnectionError> {
        self.shared.subscribe(channel).await
    }

    /// Whether `id` is still live on the current connection.
    pub(crate) fn holds(&self, id: &SubscriptionId) -> bool {
        self.shared.subscriptions.contains_key(id)
    }

    /// Release a subscription. Frames for it are dropped from now on.
    pub(crate) async fn unsubscribe(&self, id: &SubscriptionId) -> Result<(), ConnectionError> {
        self.shared.unsubscribe(id).await
    }

    fn stop_driver(&self) {
        if let Some(handle) = lock(&self.driver).take() {
            handle.abort();
        }
    }
}

impl<T: Transport + 'static> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        self.stop_driver();
    }
}

impl<T: Transport + 'static> std::fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("subscriptions", &self.shared.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Shared<T> {
    fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.settings.token)
    }

    fn apply(&self, event: Event) -> Vec<Action> {
        let mut state = lock(&self.state);
        let (next, actions) = state.on_event(event, &self.settings.policy);
        *state = next;
        actions
    }

    /// Feed `event` to the state machine and execute the resulting actions,
    /// including the follow-up events they produce.
    async fn drive(&self, event: Event) -> Outcome {
        let mut outcome = Outcome::default();
        let mut pending = vec![event];
        while let Some(event) = pending.pop() {
            for action in self.apply(event) {
                match action {
                    Action::OpenTransport => match self.open().await {
                        Ok(()) => pending.push(Event::ConnectSucceeded),
                        Err(e) => {
                            pending.push(Event::ConnectFailed {
                                error: e.to_string(),
                            });
                            outcome.error = Some(e);
                        }
                    },
                    Action::CloseTransport => {
                        if let Err(e) = self.transport.close().await {
                            debug!(error = %e, "close failed");
                        }
                    }
                    Action::RestoreSubscriptions => {
                        let hook = lock(&self.on_connect).clone();
                        if let Some(hook) = hook {
                            hook();
                        }
                    }
                    Action::ReleaseSubscriptions => self.release_all().await,
                    Action::ForgetSubscriptions => self.subscriptions.clear(),
                    Action::StartReconnectTimer { delay, attempt } => {
                        outcome.timer = Some(ReconnectTimer { delay, attempt });
                    }
                    Action::CancelReconnect => outcome.timer = None,
                    Action::Emit(event) => self.emit(event),
                }
            }
        }
        outcome
    }

    fn emit(&self, event: ConnectionEvent) {
        match &event {
            ConnectionEvent::Connected => info!(url = %self.settings.url, "push channel connected"),
            ConnectionEvent::ConnectFailed { attempt, error } => {
                warn!(attempt, %error, "connection attempt failed")
            }
            ConnectionEvent::Disconnected { reason } => info!(%reason, "push channel down"),
        }
        // No listeners is fine.
        let _ = self.events.send(event);
    }

    /// Open the socket and run the STOMP handshake.
    async fn open(&self) -> Result<(), ConnectionError> {
        let connected = timeout(self.settings.connect_timeout, self.handshake())
            .await
            .map_err(|_| ConnectionError::Timeout)??;

        let server = match connected.get("heart-beat") {
            Some(value) => HeartBeat::parse(value)?,
            None => HeartBeat::default(),
        };
        let negotiated = self.settings.heartbeat.negotiate(&server);
        debug!(send = ?negotiated.0, expect = ?negotiated.1, "heartbeat negotiated");
        *lock(&self.negotiated) = negotiated;
        Ok(())
    }

    async fn handshake(&self) -> Result<Frame, ConnectionError> {
        self.transport.connect(&self.settings.url).await?;
        let connect = Frame::new(Command::Connect)
            .header("accept-version", STOMP_VERSION)
            .header("host", host_of(&self.settings.url))
            .header("heart-beat", self.settings.heartbeat.to_header())
            .header("Authorization", self.bearer());
        self.transport.send(&connect.encode()).await?;

        loop {
            let text = self.transport.recv().await?;
            match stomp::decode(&text)? {
                Inbound::Heartbeat => continue,
                Inbound::Frame(frame) => match frame.command {
                    Command::Connected => return Ok(frame),
                    Command::Error => {
                        let reason = frame.get("message").unwrap_or(frame.body.as_str());
                        return Err(ConnectionError::Rejected(reason.to_string()));
                    }
                    other => return Err(ConnectionError::UnexpectedFrame(other.to_string())),
                },
            }
        }
    }

    /// Read frames until the channel drops. Returns the reason.
    async fn pump(&self) -> String {
        let (send_every, expect_every) = *lock(&self.negotiated);
        let mut ticker = send_every.map(|every| {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let silence_limit = expect_every.map(|every| every * 2);
        let mut last_inbound = Instant::now();

        loop {
            let deadline = silence_limit.map(|limit| last_inbound + limit);
            tokio::select! {
                received = self.transport.recv() => match received {
                    Ok(text) => {
                        last_inbound = Instant::now();
                        if let Some(reason) = self.handle_inbound(&text) {
                            return reason;
                        }
                    }
                    Err(e) => return e.to_string(),
                },
                _ = tick(&mut ticker) => {
                    if let Err(e) = self.transport.send(HEARTBEAT_EOL).await {
                        return e.to_string();
                    }
                }
                _ = expire(deadline) => return "heartbeat timeout".to_string(),
            }
        }
    }

    /// Handle one inbound text message. `Some(reason)` ends the connection.
    fn handle_inbound(&self, text: &str) -> Option<String> {
        match stomp::decode(text) {
            Ok(Inbound::Heartbeat) => None,
            Ok(Inbound::Frame(frame)) => match frame.command {
                Command::Message => {
                    self.dispatch(frame);
                    None
                }
                Command::Error => {
                    let reason = frame.get("message").unwrap_or(frame.body.as_str());
                    Some(format!("server error: {reason}"))
                }
                other => {
                    debug!(command = %other, "ignoring frame");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                None
            }
        }
    }

    fn dispatch(&self, frame: Frame) {
        let Some(destination) = frame.get("destination") else {
            warn!("dropping MESSAGE without destination");
            return;
        };
        let Some(channel) = Channel::parse(destination) else {
            warn!(destination, "dropping MESSAGE for unknown destination");
            return;
        };
        let subscription = frame.get("subscription").map(SubscriptionId::from);
        let live = match &subscription {
            Some(id) => self
                .subscriptions
                .get(id)
                .is_some_and(|entry| entry.value() == &channel),
            None => self.subscriptions.iter().any(|entry| entry.value() == &channel),
        };
        if !live {
            debug!(destination, "dropping frame for released subscription");
            return;
        }

        let payload = match RawMessage::from_json(&frame.body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(destination, error = %e, "dropping malformed payload");
                return;
            }
        };
        let topic = match (payload.status(), &channel) {
            (Some(ChatStatus::Join), _) => Topic::Membership,
            (_, Channel::Group(_)) => Topic::Group,
            (_, Channel::Inbox(_)) => Topic::Private,
        };

        let handler = self.handlers.get(&topic).map(|h| Arc::clone(h.value()));
        match handler {
            Some(handler) => handler(Delivery {
                topic,
                channel,
                subscription,
                payload,
            }),
            None => debug!(?topic, "no handler registered"),
        }
    }

    async fn subscribe(&self, channel: Channel) -> Result<SubscriptionId, ConnectionError> {
        if !self.state().is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        let n = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        let id = SubscriptionId::from(format!("sub-{n}"));
        let destination = channel.destination();
        let frame = Frame::new(Command::Subscribe)
            .header("id", id.as_str())
            .header("destination", destination.as_str())
            .header("ack", "auto");

        // Registered first: the first frame may arrive before send() returns.
        self.subscriptions.insert(id.clone(), channel);
        if let Err(e) = self.transport.send(&frame.encode()).await {
            self.subscriptions.remove(&id);
            return Err(e.into());
        }
        debug!(%id, %destination, "subscribed");
        Ok(id)
    }

    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<(), ConnectionError> {
        if self.subscriptions.remove(id).is_none() {
            return Ok(());
        }
        if !self.transport.is_connected() {
            return Ok(());
        }
        let frame = Frame::new(Command::Unsubscribe).header("id", id.as_str());
        self.transport.send(&frame.encode()).await?;
        debug!(%id, "unsubscribed");
        Ok(())
    }

    /// UNSUBSCRIBE everything, then DISCONNECT.
    async fn release_all(&self) {
        let ids: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        self.subscriptions.clear();
        for id in ids {
            let frame = Frame::new(Command::Unsubscribe).header("id", id.as_str());
            if let Err(e) = self.transport.send(&frame.encode()).await {
                debug!(%id, error = %e, "unsubscribe during teardown failed");
            }
        }
        let frame = Frame::new(Command::Disconnect);
        if let Err(e) = self.transport.send(&frame.encode()).await {
            debug!(error = %e, "disconnect frame not sent");
        }
    }
}

/// Reads until the channel drops, then reconnects with the fixed delay.
async fn run_driver<T: Transport>(shared: Arc<Shared<T>>, mut timer: Option<ReconnectTimer>) {
    loop {
        if let Some(armed) = timer.take() {
            tokio::time::sleep(armed.delay).await;
            debug!(attempt = armed.attempt, "reconnecting");
            timer = shared
                .drive(Event::ReconnectTimer {
                    attempt: armed.attempt,
                })
                .await
                .timer;
            if timer.is_none() && !shared.state().is_connected() {
                error!(attempt = armed.attempt, "giving up on push channel");
                return;
            }
            continue;
        }

        if !shared.state().is_connected() {
            return;
        }
        let reason = shared.pump().await;
        timer = shared.drive(Event::Dropped { reason }).await.timer;
        if timer.is_none() {
            return;
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending::<()>().await,
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

/// Host part of a URL, for the CONNECT `host` header.
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?']).next().unwrap_or(rest);
    let authority = authority.rsplit('@').next().unwrap_or(authority);
    authority.split(':').next().unwrap_or(authority)
}
