//! Core types for mscontrol-core
//!
//! Identifiers, opaque media server resource handles and the small enums
//! shared between the controller and the media provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Identifier of one media session controller instance
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ControllerId(pub String);

impl ControllerId {
    pub fn new() -> Self {
        Self(format!("msc-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application-level resource identifier (account, call, recording)
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Sid(pub String);

impl Sid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a media session allocated by the media server
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SessionHandle(pub String);

/// Handle to the network-facing connection of a media session
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct ConnectionHandle(pub String);

/// Handle to a player/recorder/signal-detector bundle
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct MediaGroupHandle(pub String);

/// Handle to a mixer used for bridging and conferencing
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct MixerHandle(pub String);

macro_rules! impl_handle_display {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

impl_handle_display!(SessionHandle, ConnectionHandle, MediaGroupHandle, MixerHandle);

/// Media direction requested for the network connection
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    #[default]
    Inactive,
    SendOnly,
    RecvOnly,
    SendRecv,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Inactive => "inactive",
            Self::SendOnly => "sendonly",
            Self::RecvOnly => "recvonly",
            Self::SendRecv => "sendrecv",
        };
        f.write_str(s)
    }
}

/// Direction of a join between two media resources
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum JoinDirection {
    /// Media flows both ways
    Duplex,
    /// Only receive from the target (used for mute)
    Recv,
    /// Only send to the target
    Send,
}

/// Something a connection can be joined to
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum JoinTarget {
    MediaGroup(MediaGroupHandle),
    Mixer(MixerHandle),
}

/// Capabilities requested when creating a media group
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum GroupCapabilities {
    Player,
    PlayerSignalDetector,
    PlayerRecorderSignalDetector,
}

/// Static description of the media server this controller talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaServerInfo {
    pub name: String,
    pub address: IpAddr,
    pub port: u16,
    pub timeout_secs: u64,
}

/// Negotiated media session description reported to the call
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSessionInfo {
    pub use_media_server: bool,
    pub server_address: IpAddr,
    pub local_sdp: String,
    pub remote_sdp: String,
}

/// Group-level state broadcast to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaGroupState {
    Active,
    Inactive,
}
