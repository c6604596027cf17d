use chrono::Utc;
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bridge::{
    DetectorEvent, EventBridge, OperationCategory, PlayerEvent, RecorderEvent, SdpEvent,
};
use crate::config::ControllerConfig;
use crate::error::{MediaControlError, Result};
use crate::messages::{Inbox, MediaServerResponse, Recipient, RecipientId};
use crate::provider::MediaProvider;
use crate::recording::{CallRecording, RecordingStore};
use crate::types::{
    ConnectionHandle, ConnectionMode, ControllerId, MediaGroupHandle, MediaServerInfo,
    MediaSessionInfo, MixerHandle, SessionHandle, Sid,
};

/// The media group operation currently in flight.
///
/// At most one group operation runs at a time. The generation is the one its
/// completion sink was armed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveOperation {
    #[default]
    None,
    Playing { generation: u64 },
    Recording { generation: u64 },
    Collecting { generation: u64 },
}

impl ActiveOperation {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self, Self::Collecting { .. })
    }

    pub fn category(&self) -> Option<OperationCategory> {
        match self {
            Self::None => None,
            Self::Playing { .. } => Some(OperationCategory::Playback),
            Self::Recording { .. } => Some(OperationCategory::Recording),
            Self::Collecting { .. } => Some(OperationCategory::DigitCollection),
        }
    }
}

/// Everything a controller owns besides its state machine
#[derive(Debug)]
pub(crate) struct SessionContext {
    pub(crate) id: ControllerId,
    pub(crate) provider: Arc<dyn MediaProvider>,
    pub(crate) config: ControllerConfig,
    pub(crate) server_info: MediaServerInfo,

    /// Owning call, set by CreateMediaSession
    pub(crate) call: Option<Recipient>,
    /// Whoever joined us to the current mixer
    pub(crate) bridge_owner: Option<Recipient>,
    pub(crate) observers: IndexMap<RecipientId, Recipient>,

    pub(crate) session: Option<SessionHandle>,
    pub(crate) connection: Option<ConnectionHandle>,
    pub(crate) media_group: Option<MediaGroupHandle>,
    pub(crate) mixer: Option<MixerHandle>,

    pub(crate) outbound: bool,
    pub(crate) connection_mode: ConnectionMode,
    pub(crate) local_sdp: Option<String>,
    pub(crate) remote_sdp: Option<String>,
    pub(crate) conferencing: bool,

    pub(crate) active: ActiveOperation,
    /// Digits reported when a record is stopped by its end key
    pub(crate) record_end_key: String,
    pub(crate) recording: Option<CallRecording>,
    pub(crate) account_id: Option<Sid>,
    pub(crate) store: Option<Arc<dyn RecordingStore>>,

    pub(crate) sdp: EventBridge<SdpEvent>,
    pub(crate) player: EventBridge<PlayerEvent>,
    pub(crate) detector: EventBridge<DetectorEvent>,
    pub(crate) recorder: EventBridge<RecorderEvent>,
}

impl SessionContext {
    pub(crate) fn new(
        id: ControllerId,
        provider: Arc<dyn MediaProvider>,
        server_info: MediaServerInfo,
        config: ControllerConfig,
        inbox: mpsc::WeakUnboundedSender<Inbox>,
    ) -> Self {
        Self {
            id,
            provider,
            config,
            server_info,
            call: None,
            bridge_owner: None,
            observers: IndexMap::new(),
            session: None,
            connection: None,
            media_group: None,
            mixer: None,
            outbound: false,
            connection_mode: ConnectionMode::default(),
            local_sdp: None,
            remote_sdp: None,
            conferencing: false,
            active: ActiveOperation::None,
            record_end_key: String::new(),
            recording: None,
            account_id: None,
            store: None,
            sdp: EventBridge::new(inbox.clone()),
            player: EventBridge::new(inbox.clone()),
            detector: EventBridge::new(inbox.clone()),
            recorder: EventBridge::new(inbox),
        }
    }

    pub(crate) fn tell_call(&self, response: MediaServerResponse) {
        match &self.call {
            Some(call) => {
                call.tell(&self.id, response);
            }
            None => debug!(controller = %self.id, "No owning call for {:?}", response),
        }
    }

    pub(crate) fn notify_observers(&self, response: MediaServerResponse) {
        for observer in self.observers.values() {
            observer.tell(&self.id, response.clone());
        }
    }

    pub(crate) fn session_info(&self) -> MediaSessionInfo {
        MediaSessionInfo {
            use_media_server: true,
            server_address: self.server_info.address,
            local_sdp: self.local_sdp.clone().unwrap_or_default(),
            remote_sdp: self.remote_sdp.clone().unwrap_or_default(),
        }
    }

    fn require_connection(&self) -> Result<ConnectionHandle> {
        self.connection
            .clone()
            .ok_or_else(|| MediaControlError::resource_unavailable("network connection"))
    }

    /// The media group, provided no other group operation is in flight
    pub(crate) fn require_idle_group(
        &self,
        requested: OperationCategory,
    ) -> Result<MediaGroupHandle> {
        let group = self
            .media_group
            .clone()
            .ok_or_else(|| MediaControlError::resource_unavailable("media group"))?;
        match self.active.category() {
            None => Ok(group),
            Some(current) => Err(MediaControlError::illegal_operation(format!(
                "cannot start {} while {} is in progress",
                requested, current
            ))),
        }
    }

    /// Allocate session and connection, then start SDP negotiation
    pub(crate) async fn open_session(&mut self) -> Result<()> {
        let session = self.provider.create_session().await?;
        self.session = Some(session.clone());

        let connection = self
            .provider
            .create_connection(&session, self.connection_mode)
            .await?;
        self.connection = Some(connection.clone());

        if let Some(call) = self.call.clone() {
            self.sdp.bind(call);
        }
        let sink = self.sdp.arm()?;
        let result = if self.outbound {
            self.provider.generate_offer(&connection, sink).await
        } else {
            let offer = self.remote_sdp.clone().unwrap_or_default();
            self.provider
                .process_offer(&connection, offer.as_bytes(), sink)
                .await
        };
        if result.is_err() {
            self.sdp.disarm();
        }
        result
    }

    /// Submit the updated remote SDP as an answer
    pub(crate) async fn renegotiate_session(&mut self) -> Result<()> {
        let connection = self.require_connection()?;
        let answer = self.remote_sdp.clone().unwrap_or_default();
        let sink = self.sdp.arm()?;
        let result = self
            .provider
            .process_answer(&connection, answer.as_bytes(), sink)
            .await;
        if result.is_err() {
            self.sdp.disarm();
        }
        result
    }

    /// Release the media session and forget every handle.
    ///
    /// Releasing the session releases the group and connection on the media
    /// server side as well.
    pub(crate) async fn release_resources(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = self.provider.release_session(&session).await {
                warn!(controller = %self.id, "Could not release media session {}: {}", session, e);
            }
        }
        self.connection = None;
        self.media_group = None;
        self.mixer = None;
        self.bridge_owner = None;
        self.conferencing = false;
        self.active = ActiveOperation::None;
        self.recording = None;

        self.sdp.disarm();
        self.player.disarm();
        self.detector.disarm();
        self.recorder.disarm();
    }

    /// Stop whatever group operation is active and reset the operation
    /// regardless of the outcome. Returns the operation that was active.
    pub(crate) async fn stop_active(&mut self) -> Result<ActiveOperation> {
        let active = std::mem::take(&mut self.active);
        let Some(group) = self.media_group.clone() else {
            return Ok(active);
        };
        match active {
            ActiveOperation::None => {}
            ActiveOperation::Playing { .. } => self.provider.stop_player(&group).await?,
            ActiveOperation::Recording { .. } => self.provider.stop_recorder(&group).await?,
            ActiveOperation::Collecting { .. } => self.provider.stop_detector(&group).await?,
        }
        if !active.is_idle() {
            debug!(controller = %self.id, "Stopped {:?} on {}", active, group);
        }
        Ok(active)
    }

    /// Take the call recording written by recorder operation `generation`
    pub(crate) fn take_call_recording(&mut self, generation: u64) -> Option<CallRecording> {
        if self
            .recording
            .as_ref()
            .is_some_and(|recording| recording.generation == generation)
        {
            self.recording.take()
        } else {
            None
        }
    }

    /// Measure the call recording written by the stopped recorder operation
    /// and hand its metadata to the store
    pub(crate) async fn finalize_recording(&mut self, generation: u64) {
        let Some(recording) = self.take_call_recording(generation) else {
            debug!(controller = %self.id, "Stopped record is not a call recording, nothing to persist");
            return;
        };
        let Some(account_id) = self.account_id.clone() else {
            warn!(controller = %self.id, "Call recording {} has no account", recording.recording_id);
            return;
        };
        let Some(store) = self.store.clone() else {
            warn!(controller = %self.id, "No recording store for {}", recording.recording_id);
            return;
        };

        let metadata = match recording.finalize(&account_id, &self.config.api_version, Utc::now())
        {
            Ok(metadata) => metadata,
            Err(e) => {
                error!(controller = %self.id, "Could not finalize recording: {}", e);
                self.tell_call(MediaServerResponse::ControllerError(e));
                return;
            }
        };

        info!(
            controller = %self.id,
            "Call wrapping up recording {} ({:.3}s)", metadata.recording_id, metadata.duration
        );
        if let Err(e) = store.add_recording(metadata).await {
            error!(controller = %self.id, "Could not persist recording: {}", e);
            self.tell_call(MediaServerResponse::ControllerError(e));
        }
    }
}
