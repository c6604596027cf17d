//! Async Event Bridge
//!
//! Media providers report completion of asynchronous operations from
//! whatever task or thread they like. The bridge turns those callbacks into
//! [`ProviderEvent`]s queued on the controller's own inbox, so they are
//! handled strictly in order with every other message. Queuing a completion
//! never waits: only control messages are subject to the inbox capacity, so
//! a provider may complete inline from inside the call that issued the
//! operation.
//!
//! There is one [`EventBridge`] per operation category, typed by its event
//! so a playback bridge can only ever produce playback sinks. Arming a bridge
//! yields a [`CompletionSink`] that is consumed on completion: a provider can
//! report an issued operation at most once.
//!
//! Each arm bumps a generation counter. Completions carrying an older
//! generation are stale (the operation was superseded) and the controller
//! drops them.

use std::fmt;
use std::marker::PhantomData;
use tokio::sync::mpsc;

use crate::error::{MediaControlError, Result};
use crate::messages::{Inbox, Recipient};

/// Category of asynchronous operation a bridge is bound to
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum OperationCategory {
    Negotiation,
    Playback,
    DigitCollection,
    Recording,
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Negotiation => "negotiation",
            Self::Playback => "playback",
            Self::DigitCollection => "digit collection",
            Self::Recording => "recording",
        };
        f.write_str(s)
    }
}

/// Outcome of an SDP offer/answer step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdpEvent {
    /// Media server generated a local offer
    OfferGenerated(String),
    /// Media server answered a remote offer
    AnswerGenerated(String),
    /// Media server accepted a remote answer
    AnswerProcessed,
    /// The media stream failed after negotiation
    NetworkStreamFailure,
    /// SDP processing failed, with the provider's diagnostic
    Failed(String),
}

/// Outcome of a play request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Completed,
    Failed(String),
}

/// Outcome of a digit collection request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorEvent {
    /// Collected digit string
    Completed(String),
    Failed(String),
}

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordQualifier {
    /// Stopped by the configured end key
    Stopped,
    EndOfData,
    MaxDuration,
    Timeout,
}

/// Outcome of a record request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    Completed(RecordQualifier),
    Failed(String),
}

/// Payload of a provider completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEventKind {
    Sdp(SdpEvent),
    Player(PlayerEvent),
    Detector(DetectorEvent),
    Recorder(RecorderEvent),
}

impl ProviderEventKind {
    pub fn category(&self) -> OperationCategory {
        match self {
            Self::Sdp(_) => OperationCategory::Negotiation,
            Self::Player(_) => OperationCategory::Playback,
            Self::Detector(_) => OperationCategory::DigitCollection,
            Self::Recorder(_) => OperationCategory::Recording,
        }
    }
}

/// Event type carried by one bridge category
pub trait BridgeEvent: Into<ProviderEventKind> + Send + 'static {
    const CATEGORY: OperationCategory;
}

impl BridgeEvent for SdpEvent {
    const CATEGORY: OperationCategory = OperationCategory::Negotiation;
}

impl BridgeEvent for PlayerEvent {
    const CATEGORY: OperationCategory = OperationCategory::Playback;
}

impl BridgeEvent for DetectorEvent {
    const CATEGORY: OperationCategory = OperationCategory::DigitCollection;
}

impl BridgeEvent for RecorderEvent {
    const CATEGORY: OperationCategory = OperationCategory::Recording;
}

impl From<SdpEvent> for ProviderEventKind {
    fn from(event: SdpEvent) -> Self {
        Self::Sdp(event)
    }
}

impl From<PlayerEvent> for ProviderEventKind {
    fn from(event: PlayerEvent) -> Self {
        Self::Player(event)
    }
}

impl From<DetectorEvent> for ProviderEventKind {
    fn from(event: DetectorEvent) -> Self {
        Self::Detector(event)
    }
}

impl From<RecorderEvent> for ProviderEventKind {
    fn from(event: RecorderEvent) -> Self {
        Self::Recorder(event)
    }
}

/// A provider completion as queued on the controller inbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    pub generation: u64,
    pub kind: ProviderEventKind,
}

impl ProviderEvent {
    pub fn category(&self) -> OperationCategory {
        self.kind.category()
    }
}

/// One-shot completion handle for an issued operation
pub struct CompletionSink<T> {
    generation: u64,
    inbox: mpsc::UnboundedSender<Inbox>,
    _event: PhantomData<fn(T)>,
}

impl<T: BridgeEvent> CompletionSink<T> {
    pub fn category(&self) -> OperationCategory {
        T::CATEGORY
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn deliver(self, event: T) -> Result<()> {
        let event = ProviderEvent {
            generation: self.generation,
            kind: event.into(),
        };
        self.inbox
            .send(Inbox::Provider(event))
            .map_err(|_| MediaControlError::ChannelClosed)
    }

    /// Report completion from async provider code
    pub async fn complete(self, event: T) -> Result<()> {
        self.deliver(event)
    }

    /// Report completion from a thread outside the async runtime
    pub fn blocking_complete(self, event: T) -> Result<()> {
        self.deliver(event)
    }
}

impl<T: BridgeEvent> fmt::Debug for CompletionSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSink")
            .field("category", &T::CATEGORY)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Binds one operation category to its current reply-to target
pub struct EventBridge<T> {
    generation: u64,
    pending: bool,
    reply_to: Option<Recipient>,
    inbox: mpsc::WeakUnboundedSender<Inbox>,
    _event: PhantomData<fn(T)>,
}

impl<T: BridgeEvent> EventBridge<T> {
    pub(crate) fn new(inbox: mpsc::WeakUnboundedSender<Inbox>) -> Self {
        Self {
            generation: 0,
            pending: false,
            reply_to: None,
            inbox,
            _event: PhantomData,
        }
    }

    pub fn category(&self) -> OperationCategory {
        T::CATEGORY
    }

    /// Rebind the reply-to target for the next operation
    pub fn bind(&mut self, reply_to: Recipient) {
        self.reply_to = Some(reply_to);
    }

    pub fn reply_to(&self) -> Option<&Recipient> {
        self.reply_to.as_ref()
    }

    /// Generation of the most recently armed operation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an armed operation has not reported completion yet
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Prepare a sink for a new operation, superseding any previous one
    pub fn arm(&mut self) -> Result<CompletionSink<T>> {
        let inbox = self
            .inbox
            .upgrade()
            .ok_or(MediaControlError::ChannelClosed)?;
        self.generation += 1;
        self.pending = true;
        Ok(CompletionSink {
            generation: self.generation,
            inbox,
            _event: PhantomData,
        })
    }

    /// Forget the pending operation, typically because the provider rejected
    /// the request that would have completed it
    pub fn disarm(&mut self) {
        self.pending = false;
    }

    /// Accept a completion for `generation`.
    ///
    /// Returns `true` exactly once for the currently armed operation and
    /// `false` for stale or duplicate completions.
    pub fn accept(&mut self, generation: u64) -> bool {
        if self.pending && generation == self.generation {
            self.pending = false;
            true
        } else {
            false
        }
    }
}

impl<T: BridgeEvent> fmt::Debug for EventBridge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBridge")
            .field("category", &T::CATEGORY)
            .field("generation", &self.generation)
            .field("pending", &self.pending)
            .field("reply_to", &self.reply_to.as_ref().map(Recipient::id))
            .finish()
    }
}
