//! # RVoIP Media Server Control
//!
//! Per-call media session control for an application server. A
//! [`MediaSessionController`] negotiates a media session with an external
//! media server, then runs media operations on it: play, record, DTMF
//! collection, mute, bridging and conferencing.
//!
//! The media server itself is reached through the [`MediaProvider`] trait.
//! Providers report asynchronous completions through [`CompletionSink`]s,
//! which feed the same ordered inbox the controller reads its control
//! messages from.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_mscontrol_core::prelude::*;
//!
//! # async fn example(provider: Arc<dyn MediaProvider>, server: MediaServerInfo) -> Result<()> {
//! let controller = MediaSessionController::spawn(provider, server, ControllerConfig::default());
//! let (call, mut notices) = Recipient::channel();
//!
//! controller
//!     .tell(
//!         &call,
//!         ControlMessage::CreateMediaSession(CreateMediaSession {
//!             outbound: true,
//!             connection_mode: ConnectionMode::SendRecv,
//!             session_description: String::new(),
//!         }),
//!     )
//!     .await?;
//!
//! while let Some(notice) = notices.recv().await {
//!     if let MediaServerResponse::SessionReady(info) = notice.response {
//!         println!("local SDP: {}", info.local_sdp);
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod fsm;
pub mod logging;
pub mod messages;
pub mod provider;
pub mod recording;
pub mod types;

pub use bridge::{
    CompletionSink, DetectorEvent, OperationCategory, PlayerEvent, RecordQualifier,
    RecorderEvent, SdpEvent,
};
pub use config::{CallRecordingConfig, ControllerConfig};
pub use logging::{setup_logging, LoggingConfig};
pub use controller::{
    ActiveOperation, ControllerRef, ControllerSnapshot, MediaSessionController, MediaSessionState,
};
pub use error::{MediaControlError, Result};
pub use messages::{ControlMessage, MediaGroupResponse, MediaServerResponse, Notice, Recipient};
pub use provider::MediaProvider;
pub use recording::{RecordingMetadata, RecordingStore};
pub use types::*;

/// Commonly used types
pub mod prelude {
    pub use crate::bridge::{
        CompletionSink, DetectorEvent, OperationCategory, PlayerEvent, RecordQualifier,
        RecorderEvent, SdpEvent,
    };
    pub use crate::config::ControllerConfig;
    pub use crate::controller::{
        ActiveOperation, ControllerRef, ControllerSnapshot, MediaSessionController,
        MediaSessionState,
    };
    pub use crate::error::{MediaControlError, Result};
    pub use crate::messages::*;
    pub use crate::provider::{
        CollectRequest, MediaProvider, PatternSlot, PlayRequest, RecordRequest, RepeatCount,
        SignalPattern,
    };
    pub use crate::recording::{RecordingMetadata, RecordingStore};
    pub use crate::types::*;
}
