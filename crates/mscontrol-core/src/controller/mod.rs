//! Media Session Controller
//!
//! One controller drives the media of one call leg. It is a single
//! sequential consumer: control messages from the call-control layer,
//! completion events from the media provider and diagnostic queries all
//! arrive on the same inbox and are handled one at a time, in the order
//! they were enqueued. Nothing outside the loop touches controller state,
//! so no locking is involved.
//!
//! The inbox capacity bounds control messages and queries only. A provider
//! completing an operation never waits for room, so it cannot stall a
//! controller that is itself waiting on the provider.
//!
//! ```text
//! call-control ──ControlMessage──▶ ┌────────────┐ ──provider calls──▶ MediaProvider
//!                                  │ controller │                          │
//! observers ◀──MediaServerResponse─│   inbox    │ ◀──ProviderEvent── CompletionSink
//!                                  └────────────┘
//! ```
//!
//! Messages that are not valid in the current state are dropped after a
//! debug log. Provider failures while issuing an operation are reported as
//! responses and never change the session state; only a failed SDP
//! negotiation moves the session to [`MediaSessionState::Failed`].

mod context;
mod events;
mod media_group;
mod mixer;
mod session;
mod states;

pub use context::ActiveOperation;
pub use states::{MediaSessionState, LEGAL_TRANSITIONS};

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::{MediaControlError, Result};
use crate::messages::{ControlMessage, Inbox, MediaServerResponse, Recipient, RecipientId};
use crate::provider::MediaProvider;
use crate::types::{ControllerId, MediaServerInfo};
use context::SessionContext;
use states::{SessionFsm, Trigger};

/// Point-in-time view of a controller, answered in inbox order
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub id: ControllerId,
    pub state: MediaSessionState,
    pub active_operation: ActiveOperation,
    pub conferencing: bool,
    pub outbound: bool,
    pub has_session: bool,
    pub has_connection: bool,
    pub has_media_group: bool,
    pub has_mixer: bool,
    pub local_sdp: Option<String>,
    pub remote_sdp: Option<String>,
    pub observers: usize,
    /// Whoever joined this leg to its current mixer
    pub bridge_owner: Option<RecipientId>,
    /// A call recording (StartRecording) is awaiting its stop
    pub call_recording: bool,
}

/// Handle used to talk to a running controller
#[derive(Debug, Clone)]
pub struct ControllerRef {
    id: ControllerId,
    tx: mpsc::UnboundedSender<Inbox>,
    permits: Arc<Semaphore>,
}

impl ControllerRef {
    pub fn id(&self) -> &ControllerId {
        &self.id
    }

    /// Enqueue a control message on behalf of `sender`.
    ///
    /// Waits while the inbox is full.
    pub async fn tell(&self, sender: &Recipient, message: ControlMessage) -> Result<()> {
        let permit = self.reserve().await?;
        self.tx
            .send(Inbox::Control {
                sender: sender.clone(),
                message,
                permit,
            })
            .map_err(|_| MediaControlError::ChannelClosed)
    }

    /// Query the controller state.
    ///
    /// The query is queued behind everything sent before it, so the snapshot
    /// reflects all of those messages having been handled.
    pub async fn snapshot(&self) -> Result<ControllerSnapshot> {
        let permit = self.reserve().await?;
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Inbox::Snapshot { reply, permit })
            .map_err(|_| MediaControlError::ChannelClosed)?;
        rx.await.map_err(|_| MediaControlError::ChannelClosed)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn reserve(&self) -> Result<OwnedSemaphorePermit> {
        if self.tx.is_closed() {
            return Err(MediaControlError::ChannelClosed);
        }
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| MediaControlError::ChannelClosed)
    }
}

/// Per-call media session controller
#[derive(Debug)]
pub struct MediaSessionController {
    fsm: SessionFsm,
    ctx: SessionContext,
    inbox: mpsc::UnboundedReceiver<Inbox>,
}

impl MediaSessionController {
    /// Create a controller and the handle that feeds it.
    ///
    /// The controller does nothing until [`run`](Self::run) is awaited.
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        server_info: MediaServerInfo,
        config: ControllerConfig,
    ) -> (Self, ControllerRef) {
        let (tx, rx) = mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(config.inbox_capacity.max(1)));
        let id = ControllerId::new();
        let ctx = SessionContext::new(id.clone(), provider, server_info, config, tx.downgrade());
        let controller = Self {
            fsm: states::build_fsm(),
            ctx,
            inbox: rx,
        };
        (controller, ControllerRef { id, tx, permits })
    }

    /// Create a controller and run it on a new tokio task
    pub fn spawn(
        provider: Arc<dyn MediaProvider>,
        server_info: MediaServerInfo,
        config: ControllerConfig,
    ) -> ControllerRef {
        let (controller, handle) = Self::new(provider, server_info, config);
        tokio::spawn(controller.run());
        handle
    }

    pub fn id(&self) -> &ControllerId {
        &self.ctx.id
    }

    pub fn state(&self) -> MediaSessionState {
        self.fsm.state()
    }

    /// Process the inbox until every [`ControllerRef`] and outstanding
    /// completion sink has been dropped
    pub async fn run(mut self) {
        info!(controller = %self.ctx.id, "Media session controller started");

        while let Some(item) = self.inbox.recv().await {
            match item {
                Inbox::Control {
                    sender,
                    message,
                    permit,
                } => {
                    drop(permit);
                    debug!(
                        controller = %self.ctx.id,
                        state = %self.fsm.state(),
                        "Processing message {}", message.name()
                    );
                    self.handle_message(sender, message).await;
                }
                Inbox::Provider(event) => {
                    debug!(
                        controller = %self.ctx.id,
                        state = %self.fsm.state(),
                        "Processing {} event {:?}", event.category(), event.kind
                    );
                    self.handle_provider_event(event).await;
                }
                Inbox::Snapshot { reply, permit } => {
                    drop(permit);
                    let _ = reply.send(self.snapshot());
                }
            }
        }

        info!(controller = %self.ctx.id, state = %self.fsm.state(), "Media session controller stopped");
    }

    async fn handle_message(&mut self, sender: Recipient, message: ControlMessage) {
        match message {
            ControlMessage::Observe { observer } => self.on_observe(observer),
            ControlMessage::StopObserving { observer } => self.on_stop_observing(observer),
            ControlMessage::CreateMediaSession(create) => {
                self.on_create_media_session(sender, create).await
            }
            ControlMessage::CloseMediaSession => self.on_close_media_session().await,
            ControlMessage::UpdateMediaSession {
                session_description,
            } => self.on_update_media_session(session_description).await,
            ControlMessage::CreateMediaGroup => self.on_create_media_group(sender).await,
            ControlMessage::DestroyMediaGroup => self.on_destroy_media_group(sender).await,
            ControlMessage::StopMediaGroup => self.on_stop_media_group().await,
            ControlMessage::Mute => self.on_mute().await,
            ControlMessage::Unmute => self.on_unmute().await,
            ControlMessage::StartRecording(start) => self.on_start_recording(sender, start).await,
            ControlMessage::StopRecording(stop) => self.on_stop_recording(stop).await,
            ControlMessage::Play(play) => self.on_play(sender, play).await,
            ControlMessage::Collect(collect) => self.on_collect(sender, collect).await,
            ControlMessage::Record(record) => {
                self.on_record(sender, record).await;
            }
            ControlMessage::Stop(stop) => self.on_stop(stop).await,
            ControlMessage::JoinBridge(join) => self.on_join(sender, join, "bridge").await,
            ControlMessage::JoinConference(join) => self.on_join(sender, join, "conference").await,
            ControlMessage::Leave => self.on_leave().await,
        }
    }

    /// Attempt a state change; illegal ones are logged and dropped
    async fn transition(&mut self, trigger: Trigger, target: MediaSessionState) -> bool {
        match self.fsm.transition(&mut self.ctx, &trigger, target).await {
            Ok(()) => true,
            Err(e) => {
                warn!(controller = %self.ctx.id, "Dropping {}: {}", trigger.name(), e);
                false
            }
        }
    }

    fn on_observe(&mut self, observer: Recipient) {
        observer.tell(&self.ctx.id, MediaServerResponse::Observing);
        self.ctx.observers.insert(observer.id().clone(), observer);
    }

    fn on_stop_observing(&mut self, observer: Option<Recipient>) {
        match observer {
            Some(observer) => {
                self.ctx.observers.shift_remove(observer.id());
            }
            None => self.ctx.observers.clear(),
        }
    }

    fn snapshot(&self) -> ControllerSnapshot {
        let ctx = &self.ctx;
        ControllerSnapshot {
            id: ctx.id.clone(),
            state: self.fsm.state(),
            active_operation: ctx.active,
            conferencing: ctx.conferencing,
            outbound: ctx.outbound,
            has_session: ctx.session.is_some(),
            has_connection: ctx.connection.is_some(),
            has_media_group: ctx.media_group.is_some(),
            has_mixer: ctx.mixer.is_some(),
            local_sdp: ctx.local_sdp.clone(),
            remote_sdp: ctx.remote_sdp.clone(),
            observers: ctx.observers.len(),
            bridge_owner: ctx.bridge_owner.as_ref().map(|owner| owner.id().clone()),
            call_recording: ctx.recording.is_some(),
        }
    }
}
