//! Media provider abstraction
//!
//! The controller never talks to a media server directly. Everything it needs
//! is expressed by [`MediaProvider`], implemented by an adapter for whatever
//! media control protocol is in use.
//!
//! Operations come in two flavours:
//!
//! - **synchronous**: session/connection/group creation, join/unjoin, stop,
//!   release. These complete (or fail) before the returned future resolves.
//! - **asynchronous**: SDP negotiation, play, collect, record. The returned
//!   future resolves once the operation has been *issued*; completion is
//!   reported later through the [`CompletionSink`] handed to the call.
//!
//! An `Err` from either flavour means the request was rejected outright and
//! no completion will follow.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::bridge::{CompletionSink, DetectorEvent, PlayerEvent, RecorderEvent, SdpEvent};
use crate::error::Result;
use crate::types::{
    ConnectionHandle, ConnectionMode, GroupCapabilities, JoinDirection, JoinTarget,
    MediaGroupHandle, SessionHandle,
};

/// How many times a play request repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatCount {
    /// Loop until stopped
    Forever,
    /// Number of additional repeats after the first play
    Times(u32),
}

impl RepeatCount {
    /// Map a caller-facing iteration count onto a provider repeat count.
    ///
    /// `iterations <= 0` loops forever; otherwise the media is played
    /// `iterations` times in total.
    pub fn from_iterations(iterations: i32) -> Self {
        if iterations <= 0 {
            Self::Forever
        } else {
            Self::Times((iterations - 1) as u32)
        }
    }
}

/// Parameters of a play request
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub uris: Vec<Url>,
    pub repeat: RepeatCount,
}

/// Slot a digit pattern is installed in on the signal detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatternSlot {
    /// Slot 0, reserved for the end-of-input key
    EndKey,
    /// Slot 1, the caller supplied pattern
    Pattern,
}

/// A single signal detector pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalPattern {
    pub slot: PatternSlot,
    pub value: String,
}

/// Parameters of a digit collection request
#[derive(Debug, Clone, PartialEq)]
pub struct CollectRequest {
    pub patterns: Vec<SignalPattern>,
    pub prompts: Vec<Url>,
    pub digit_count: u32,
    pub initial_timeout: Duration,
    pub inter_signal_timeout: Duration,
    pub buffering: bool,
}

/// Parameters of a record request
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRequest {
    pub destination: Url,
    pub prompts: Vec<Url>,
    pub max_duration: Duration,
    /// Pattern that ends the recording when detected
    pub end_signal_pattern: Option<String>,
    pub inter_signal_timeout: Option<Duration>,
    /// Couple the signal detector to the player so a detected end key also
    /// stops prompt playback
    pub stop_play_on_signal: bool,
    pub initial_timeout: Duration,
    pub final_timeout: Duration,
    pub append: bool,
    pub start_beep: bool,
}

/// Capability interface of the external media server
#[async_trait]
pub trait MediaProvider: Send + Sync + fmt::Debug {
    async fn create_session(&self) -> Result<SessionHandle>;

    async fn create_connection(
        &self,
        session: &SessionHandle,
        mode: ConnectionMode,
    ) -> Result<ConnectionHandle>;

    /// Ask the media server to generate an SDP offer (we are the offerer)
    async fn generate_offer(
        &self,
        connection: &ConnectionHandle,
        sink: CompletionSink<SdpEvent>,
    ) -> Result<()>;

    /// Hand a remote offer to the media server (we are the answerer)
    async fn process_offer(
        &self,
        connection: &ConnectionHandle,
        offer: &[u8],
        sink: CompletionSink<SdpEvent>,
    ) -> Result<()>;

    /// Hand a remote answer to the media server
    async fn process_answer(
        &self,
        connection: &ConnectionHandle,
        answer: &[u8],
        sink: CompletionSink<SdpEvent>,
    ) -> Result<()>;

    async fn create_media_group(
        &self,
        session: &SessionHandle,
        capabilities: GroupCapabilities,
    ) -> Result<MediaGroupHandle>;

    async fn join(
        &self,
        connection: &ConnectionHandle,
        direction: JoinDirection,
        target: &JoinTarget,
    ) -> Result<()>;

    async fn unjoin(&self, connection: &ConnectionHandle, target: &JoinTarget) -> Result<()>;

    async fn play(
        &self,
        group: &MediaGroupHandle,
        request: PlayRequest,
        sink: CompletionSink<PlayerEvent>,
    ) -> Result<()>;

    /// Discard digits buffered by the signal detector
    async fn flush_digits(&self, group: &MediaGroupHandle) -> Result<()>;

    async fn collect(
        &self,
        group: &MediaGroupHandle,
        request: CollectRequest,
        sink: CompletionSink<DetectorEvent>,
    ) -> Result<()>;

    async fn record(
        &self,
        group: &MediaGroupHandle,
        request: RecordRequest,
        sink: CompletionSink<RecorderEvent>,
    ) -> Result<()>;

    async fn stop_player(&self, group: &MediaGroupHandle) -> Result<()>;

    async fn stop_recorder(&self, group: &MediaGroupHandle) -> Result<()>;

    async fn stop_detector(&self, group: &MediaGroupHandle) -> Result<()>;

    /// Release a media group together with its player, recorder and detector
    async fn release_group(&self, group: &MediaGroupHandle) -> Result<()>;

    /// Release a media session and every resource created inside it
    async fn release_session(&self, session: &SessionHandle) -> Result<()>;
}
