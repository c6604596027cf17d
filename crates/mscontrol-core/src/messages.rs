//! Control messages, responses and addressable recipients
//!
//! The call-control layer drives a controller exclusively by sending
//! [`ControlMessage`]s. Everything the controller has to say back (to the
//! owning call, to the sender of a message, or to observers) is a
//! [`MediaServerResponse`] wrapped in a [`Notice`].

use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit};
use url::Url;

use crate::bridge::{OperationCategory, ProviderEvent};
use crate::controller::ControllerSnapshot;
use crate::error::MediaControlError;
use crate::recording::RecordingStore;
use crate::types::{
    ConnectionMode, ControllerId, MediaGroupState, MediaSessionInfo, MixerHandle, Sid,
};

/// Identifier of a [`Recipient`]
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RecipientId(pub String);

impl RecipientId {
    pub fn new() -> Self {
        Self(format!("rcpt-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something the controller can address a response to
#[derive(Debug, Clone)]
pub struct Recipient {
    id: RecipientId,
    tx: mpsc::UnboundedSender<Notice>,
}

impl Recipient {
    /// Create a recipient and the receiving end of its mailbox
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: RecipientId::new(),
                tx,
            },
            rx,
        )
    }

    /// Wrap an existing mailbox
    pub fn new(id: RecipientId, tx: mpsc::UnboundedSender<Notice>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> &RecipientId {
        &self.id
    }

    /// Deliver a response; returns `false` if the recipient has gone away
    pub fn tell(&self, from: &ControllerId, response: MediaServerResponse) -> bool {
        let notice = Notice {
            from: from.clone(),
            response,
        };
        if self.tx.send(notice).is_err() {
            tracing::debug!(recipient = %self.id, "Recipient mailbox closed, dropping notice");
            return false;
        }
        true
    }
}

impl PartialEq for Recipient {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Recipient {}

/// A response delivered to a recipient
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub from: ControllerId,
    pub response: MediaServerResponse,
}

/// Result of a single media group operation
#[derive(Debug, Clone, PartialEq)]
pub struct MediaGroupResponse {
    pub category: OperationCategory,
    pub result: Result<String, MediaControlError>,
}

impl MediaGroupResponse {
    pub fn success(category: OperationCategory, payload: impl Into<String>) -> Self {
        Self {
            category,
            result: Ok(payload.into()),
        }
    }

    pub fn failure(category: OperationCategory, error: MediaControlError) -> Self {
        Self {
            category,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Payload of a successful play completion
pub const PLAY_COMPLETED: &str = "play_completed";

/// Everything a controller reports upward
#[derive(Debug, Clone, PartialEq)]
pub enum MediaServerResponse {
    /// Media session negotiated (or renegotiated)
    SessionReady(MediaSessionInfo),
    SessionClosed,
    MediaGroupCreated,
    MediaGroupDestroyed,
    MediaGroupStateChanged(MediaGroupState),
    OperationResult(MediaGroupResponse),
    JoinComplete,
    /// Confirms an observer registration
    Observing,
    ControllerError(MediaControlError),
}

/// Request to open a media session
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMediaSession {
    /// We generate the offer (outbound call) instead of answering one
    pub outbound: bool,
    pub connection_mode: ConnectionMode,
    /// Remote SDP; empty for outbound calls
    pub session_description: String,
}

/// Start recording the whole call
#[derive(Debug, Clone)]
pub struct StartRecording {
    pub account_id: Sid,
    pub call_id: Sid,
    pub recording_id: Sid,
    pub recording_uri: Url,
    pub store: Option<Arc<dyn RecordingStore>>,
}

/// Stop a call recording and persist its metadata
#[derive(Debug, Clone, Default)]
pub struct StopRecording {
    pub account_id: Option<Sid>,
    pub store: Option<Arc<dyn RecordingStore>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Play {
    pub uris: Vec<Url>,
    /// `<= 0` loops forever
    pub iterations: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collect {
    pub pattern: Option<String>,
    pub end_input_key: Option<String>,
    pub prompts: Vec<Url>,
    pub number_of_digits: u32,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub destination: Url,
    pub prompts: Vec<Url>,
    pub end_input_key: Option<String>,
    /// Maximum recording length
    pub length_secs: u32,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stop {
    /// Persist metadata of an active call recording
    pub create_record_artifact: bool,
}

/// Join the connection to a bridge or conference mixer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinMixer {
    pub mixer: MixerHandle,
}

/// Messages accepted from the call-control layer
#[derive(Debug, Clone)]
pub enum ControlMessage {
    CreateMediaSession(CreateMediaSession),
    CloseMediaSession,
    UpdateMediaSession { session_description: String },
    CreateMediaGroup,
    DestroyMediaGroup,
    StopMediaGroup,
    Mute,
    Unmute,
    StartRecording(StartRecording),
    StopRecording(StopRecording),
    Play(Play),
    Collect(Collect),
    Record(Record),
    Stop(Stop),
    /// Two-party bridge
    JoinBridge(JoinMixer),
    /// N-party conference
    JoinConference(JoinMixer),
    Leave,
    Observe { observer: Recipient },
    /// `None` removes every observer
    StopObserving { observer: Option<Recipient> },
}

impl ControlMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateMediaSession(_) => "CreateMediaSession",
            Self::CloseMediaSession => "CloseMediaSession",
            Self::UpdateMediaSession { .. } => "UpdateMediaSession",
            Self::CreateMediaGroup => "CreateMediaGroup",
            Self::DestroyMediaGroup => "DestroyMediaGroup",
            Self::StopMediaGroup => "StopMediaGroup",
            Self::Mute => "Mute",
            Self::Unmute => "Unmute",
            Self::StartRecording(_) => "StartRecording",
            Self::StopRecording(_) => "StopRecording",
            Self::Play(_) => "Play",
            Self::Collect(_) => "Collect",
            Self::Record(_) => "Record",
            Self::Stop(_) => "Stop",
            Self::JoinBridge(_) => "JoinBridge",
            Self::JoinConference(_) => "JoinConference",
            Self::Leave => "Leave",
            Self::Observe { .. } => "Observe",
            Self::StopObserving { .. } => "StopObserving",
        }
    }
}

/// Items consumed by the controller loop, in enqueue order.
///
/// Control and snapshot items hold an inbox permit until dequeued; provider
/// completions are never held back.
#[derive(Debug)]
pub(crate) enum Inbox {
    Control {
        sender: Recipient,
        message: ControlMessage,
        permit: OwnedSemaphorePermit,
    },
    Provider(ProviderEvent),
    Snapshot {
        reply: oneshot::Sender<ControllerSnapshot>,
        permit: OwnedSemaphorePermit,
    },
}
