//! ChatSession - one user's view of the engine.
//!
//! Owns the selector and the reconciled timeline, and coordinates the
//! loader, router, membership service and composer on every focus change.
//! Everything that arrives asynchronously (frames, snapshots, member
//! resyncs) is funnelled through one queue and applied by
//! [`ChatSession::next_update`], one event at a time. Handshakes restore
//! subscriptions directly through the router.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use huddle_core::{
    ComposeError, ConnectionEvent, ConnectionState, ConversationSelector, Destinations, Focus,
    FocusTicket, MergeOutcome, Timeline,
};
use huddle_types::{Conversation, GroupId, Message, ProjectId, UserId};

use crate::api::{ChatApi, RestApi};
use crate::composer::MessageComposer;
use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionSettings, Delivery, Topic};
use crate::error::{ClientError, ConnectionError, FetchError, MembershipError};
use crate::history::HistoryLoader;
use crate::membership::GroupMembershipService;
use crate::router::{Routed, SubscriptionRouter};
use crate::transport::{Transport, WsTransport};

/// Session behaviour knobs.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Destination prefix for publishes.
    pub app_prefix: String,
    /// strftime format of optimistic timestamps.
    pub timestamp_format: String,
    /// Keep the optimistic entry when a publish is rejected for lack of a
    /// connection.
    pub local_echo_when_disconnected: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            app_prefix: huddle_core::DEFAULT_APP_PREFIX.to_string(),
            timestamp_format: crate::composer::DEFAULT_TIMESTAMP_FORMAT.to_string(),
            local_echo_when_disconnected: false,
        }
    }
}

impl SessionOptions {
    /// Options from a loaded configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            app_prefix: config.server.app_prefix.clone(),
            timestamp_format: config.display.timestamp_format.clone(),
            local_echo_when_disconnected: config.display.local_echo_when_disconnected,
        }
    }
}

/// A dismissible, non-blocking error notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Handle for [`ChatSession::dismiss`].
    pub id: u64,
    /// Human-readable text.
    pub text: String,
}

/// Something the caller should render.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// The timeline changed; scroll to the tail if it grew.
    Timeline(MergeOutcome),
    /// An inbox message for a conversation that is not focused.
    Background {
        /// Sender.
        from: UserId,
        /// The message.
        message: Message,
    },
    /// Fresh member snapshot of the focused group.
    Members {
        /// The group.
        group_id: GroupId,
        /// Authoritative members.
        members: Vec<UserId>,
    },
    /// A new notice was raised.
    Notice(Notice),
    /// Connection lifecycle change.
    Connection(ConnectionEvent),
}

#[derive(Debug)]
enum SessionEvent {
    Delivery(Delivery),
    History {
        ticket: FocusTicket,
        result: Result<Vec<Message>, FetchError>,
    },
    Members {
        group: GroupId,
        result: Result<Vec<UserId>, MembershipError>,
    },
}

/// The engine as seen by one local user.
pub struct ChatSession<T: Transport + 'static, A: ChatApi + Clone + 'static> {
    me: UserId,
    connection: Arc<ConnectionManager<T>>,
    router: Arc<SubscriptionRouter<T>>,
    history: Arc<HistoryLoader<A>>,
    membership: Arc<GroupMembershipService<A>>,
    composer: MessageComposer<T>,
    selector: ConversationSelector,
    timeline: Timeline,
    draft: String,
    notices: Vec<Notice>,
    next_notice: u64,
    local_echo: bool,
    tx: mpsc::UnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    lifecycle: broadcast::Receiver<ConnectionEvent>,
}

impl ChatSession<WsTransport, RestApi> {
    /// Session over WebSocket and REST, configured from `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        let connection = Arc::new(ConnectionManager::new(
            WsTransport::new(),
            ConnectionSettings::from_config(config),
        ));
        let api = RestApi::new(&config.server.http_base_url, &config.identity.token);
        Self::new(
            connection,
            api,
            config.user_id(),
            SessionOptions::from_config(config),
        )
    }
}

impl<T: Transport + 'static, A: ChatApi + Clone + 'static> ChatSession<T, A> {
    /// Wire a session on top of `connection` and `api`.
    ///
    /// Registers the stream handlers and the on-connect hook.
    pub fn new(
        connection: Arc<ConnectionManager<T>>,
        api: A,
        me: UserId,
        options: SessionOptions,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        for topic in [Topic::Group, Topic::Private, Topic::Membership] {
            let tx = tx.clone();
            connection.on(
                topic,
                Arc::new(move |delivery: Delivery| {
                    let _ = tx.send(SessionEvent::Delivery(delivery));
                }),
            );
        }

        let router = Arc::new(SubscriptionRouter::new(Arc::clone(&connection), me.clone()));
        let hook_router = Arc::downgrade(&router);
        connection.on_connect(Arc::new(move || {
            let Some(router) = hook_router.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                if let Err(e) = router.resubscribe().await {
                    warn!(error = %e, "resubscribe failed");
                }
            });
        }));

        let lifecycle = connection.events();
        Self {
            router,
            history: Arc::new(HistoryLoader::new(api.clone(), me.clone())),
            membership: Arc::new(GroupMembershipService::new(api)),
            composer: MessageComposer::new(
                Arc::clone(&connection),
                me.clone(),
                Destinations::new(options.app_prefix),
                options.timestamp_format,
            ),
            me,
            connection,
            selector: ConversationSelector::new(),
            timeline: Timeline::new(),
            draft: String::new(),
            notices: Vec::new(),
            next_notice: 0,
            local_echo: options.local_echo_when_disconnected,
            tx,
            rx,
            lifecycle,
        }
    }

    /// Open the push channel. Retries continue in the background if the
    /// first attempt fails.
    pub async fn start(&self) -> Result<(), ConnectionError> {
        self.connection.connect().await
    }

    /// Ensure the project's group exists and focus it, or focus the private
    /// conversation with `peer` if one is given.
    pub async fn open_project(
        &mut self,
        project: &ProjectId,
        peer: Option<UserId>,
    ) -> Result<GroupId, ClientError> {
        let candidates = self.membership.candidate_members(project).await?;
        let group = self.membership.ensure_group(project, candidates).await?;
        let member_ids = self.membership.cached(&group).unwrap_or_default();

        let target = match peer {
            Some(peer_user_id) => Conversation::Private { peer_user_id },
            None => Conversation::Group {
                group_id: group.clone(),
                project_id: project.clone(),
                member_ids,
            },
        };
        self.focus(target).await?;
        Ok(group)
    }

    /// Focus `target`.
    ///
    /// Clears the timeline, starts the snapshot fetch (and, for groups, a
    /// member resync) and moves the live subscription. Results from any
    /// earlier focus are discarded when they arrive.
    pub async fn focus(&mut self, target: Conversation) -> Result<(), ConnectionError> {
        let transition = self.selector.focus(target.clone());
        self.timeline.clear();
        info!(
            from = ?transition.previous.as_ref().map(ToString::to_string),
            to = %target,
            generation = transition.ticket.generation(),
            "focus"
        );

        let history = Arc::clone(&self.history);
        let tx = self.tx.clone();
        let ticket = transition.ticket;
        tokio::spawn(async move {
            let result = history.fetch(ticket.target()).await;
            let _ = tx.send(SessionEvent::History { ticket, result });
        });

        if let Some(group) = target.group_id() {
            self.resync_members(group.clone());
        }
        self.router.focus(target).await
    }

    fn resync_members(&self, group: GroupId) {
        let membership = Arc::clone(&self.membership);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = membership.list_members(&group).await;
            let _ = tx.send(SessionEvent::Members { group, result });
        });
    }

    /// Wait for the next thing worth rendering.
    ///
    /// Returns `None` once the connection manager is gone.
    ///
    /// # Cancel safety
    ///
    /// Cancel safe. The only suspension points are the queue receives;
    /// an event, once taken, is applied without awaiting, so dropping this
    /// future (for example in a `select!`) never loses one.
    pub async fn next_update(&mut self) -> Option<Update> {
        loop {
            tokio::select! {
                Some(event) = self.rx.recv() => {
                    if let Some(update) = self.apply(event) {
                        return Some(update);
                    }
                }
                event = self.lifecycle.recv() => match event {
                    Ok(event) => return Some(Update::Connection(event)),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "lifecycle events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    fn apply(&mut self, event: SessionEvent) -> Option<Update> {
        match event {
            SessionEvent::Delivery(delivery) => self.apply_delivery(delivery),
            SessionEvent::History { ticket, result } => {
                if !self.selector.accepts(&ticket) {
                    debug!(
                        target = %ticket.target(),
                        generation = ticket.generation(),
                        "discarding stale history"
                    );
                    return None;
                }
                match result {
                    Ok(messages) => Some(Update::Timeline(self.timeline.merge(messages))),
                    Err(e) => {
                        warn!(error = %e, "history unavailable");
                        Some(Update::Notice(self.raise(e.to_string())))
                    }
                }
            }
            SessionEvent::Members { group, result } => match result {
                Ok(members) => {
                    let focused = self.selector.current().and_then(Conversation::group_id);
                    if focused != Some(&group) {
                        return None;
                    }
                    self.selector.update_members(&group, members.clone());
                    Some(Update::Members {
                        group_id: group,
                        members,
                    })
                }
                Err(e) => {
                    warn!(%group, error = %e, "member resync failed");
                    Some(Update::Notice(self.raise(e.to_string())))
                }
            },
        }
    }

    fn apply_delivery(&mut self, delivery: Delivery) -> Option<Update> {
        match self.router.route(delivery) {
            Routed::Timeline(message) => {
                let outcome = self.timeline.merge_one(message);
                if outcome.changed() {
                    Some(Update::Timeline(outcome))
                } else {
                    debug!("live message already present");
                    None
                }
            }
            Routed::Background { from, message } => Some(Update::Background { from, message }),
            Routed::Membership { group_id, user_id } => {
                debug!(%group_id, %user_id, "member joined");
                self.resync_members(group_id);
                None
            }
            Routed::Dropped(reason) => {
                debug!(reason, "delivery dropped");
                None
            }
        }
    }

    fn raise(&mut self, text: String) -> Notice {
        self.next_notice += 1;
        let notice = Notice {
            id: self.next_notice,
            text,
        };
        self.notices.push(notice.clone());
        notice
    }

    /// Replace the outgoing draft.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Current outgoing draft.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Send the draft to the focused conversation.
    ///
    /// On success the draft is cleared and the optimistic entry merged. On
    /// failure the draft is kept.
    pub async fn send_draft(&mut self) -> Result<MergeOutcome, ClientError> {
        let target = self.selector.current().cloned();
        let composed = self.composer.compose(&self.draft, target.as_ref())?;
        let target = target.ok_or(ComposeError::NoTarget)?;

        match self.composer.publish(&composed, &target).await {
            Ok(()) => {}
            Err(ConnectionError::NotConnected) if self.local_echo => {
                warn!(%target, "not connected, message kept locally only");
            }
            Err(e) => return Err(e.into()),
        }

        self.draft.clear();
        Ok(self.timeline.merge_one(composed.optimistic))
    }

    /// Set the draft to `text` and send it.
    pub async fn send(&mut self, text: &str) -> Result<MergeOutcome, ClientError> {
        self.set_draft(text);
        self.send_draft().await
    }

    /// Add `user` to the focused group.
    pub async fn add_member(&mut self, user: &UserId) -> Result<Vec<UserId>, ClientError> {
        let group = self.focused_group()?;
        let members = self.membership.add_member(&group, user).await?;
        self.selector.update_members(&group, members.clone());
        Ok(members)
    }

    /// Remove `user` from the focused group.
    pub async fn remove_member(&mut self, user: &UserId) -> Result<Vec<UserId>, ClientError> {
        let group = self.focused_group()?;
        let members = self.membership.remove_member(&group, user).await?;
        self.selector.update_members(&group, members.clone());
        Ok(members)
    }

    fn focused_group(&self) -> Result<GroupId, ClientError> {
        self.selector
            .current()
            .and_then(Conversation::group_id)
            .cloned()
            .ok_or(ClientError::Compose(ComposeError::NoTarget))
    }

    /// Member snapshot of the focused group.
    pub fn members(&self) -> &[UserId] {
        match self.selector.current() {
            Some(Conversation::Group { member_ids, .. }) => member_ids,
            _ => &[],
        }
    }

    /// Outstanding notices.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Dismiss a notice. Returns whether it existed.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    /// The reconciled timeline of the focused conversation.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Focus state.
    pub fn focus_state(&self) -> Focus {
        self.selector.state()
    }

    /// Focused conversation.
    pub fn focused(&self) -> Option<&Conversation> {
        self.selector.current()
    }

    /// Local user.
    pub fn me(&self) -> &UserId {
        &self.me
    }

    /// Push channel state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Release every subscription and close the channel.
    pub async fn shutdown(&mut self) {
        info!("session shutting down");
        self.connection.disconnect().await;
    }
}
