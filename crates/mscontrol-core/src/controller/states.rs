//! Media session states, their entry actions and the legal transition table

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use tracing::{error, info, warn};

use super::context::SessionContext;
use crate::error::MediaControlError;
use crate::fsm::{FiniteStateMachine, State, Transition};
use crate::messages::MediaServerResponse;

/// Lifecycle state of a media session
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum MediaSessionState {
    Uninitialized,
    OpeningMediaSession,
    Active,
    UpdatingMediaSession,
    Inactive,
    Failed,
}

impl fmt::Display for MediaSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::OpeningMediaSession => "opening media session",
            Self::Active => "active",
            Self::UpdatingMediaSession => "updating media session",
            Self::Inactive => "inactive",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What caused a state change; handed to the entry action of the new state
#[derive(Debug, Clone)]
pub(crate) enum Trigger {
    /// A control message, by name
    Control(&'static str),
    /// SDP negotiation succeeded; carries the media server SDP if it produced one
    Negotiated { local_sdp: Option<String> },
    NegotiationFailed(MediaControlError),
}

impl Trigger {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Control(message) => *message,
            Self::Negotiated { .. } => "negotiation completed",
            Self::NegotiationFailed(_) => "negotiation failed",
        }
    }
}

pub(crate) type SessionFsm = FiniteStateMachine<MediaSessionState, SessionContext, Trigger>;

/// Legal transitions of a media session.
///
/// `Uninitialized -> Active` covers a session that completes negotiation
/// before the opening bookkeeping is observed.
pub const LEGAL_TRANSITIONS: [(MediaSessionState, MediaSessionState); 10] = {
    use MediaSessionState::*;
    [
        (Uninitialized, OpeningMediaSession),
        (Uninitialized, Active),
        (OpeningMediaSession, Failed),
        (OpeningMediaSession, Active),
        (OpeningMediaSession, Inactive),
        (Active, UpdatingMediaSession),
        (Active, Inactive),
        (UpdatingMediaSession, Active),
        (UpdatingMediaSession, Inactive),
        (UpdatingMediaSession, Failed),
    ]
};

pub(crate) fn build_fsm() -> SessionFsm {
    use MediaSessionState::*;
    FiniteStateMachine::new(
        Uninitialized,
        vec![
            State::new(Uninitialized),
            State::with_entry(OpeningMediaSession, enter_opening),
            State::with_entry(Active, enter_active),
            State::with_entry(UpdatingMediaSession, enter_updating),
            State::with_entry(Inactive, enter_inactive),
            State::with_entry(Failed, enter_failed),
        ],
        LEGAL_TRANSITIONS.iter().copied().map(Transition::from),
    )
}

fn enter_opening<'a>(ctx: &'a mut SessionContext, _trigger: &'a Trigger) -> BoxFuture<'a, ()> {
    async move {
        if let Err(e) = ctx.open_session().await {
            error!(controller = %ctx.id, "Could not open media session: {}", e);
            ctx.tell_call(MediaServerResponse::ControllerError(e));
        }
    }
    .boxed()
}

fn enter_updating<'a>(ctx: &'a mut SessionContext, _trigger: &'a Trigger) -> BoxFuture<'a, ()> {
    async move {
        if let Err(e) = ctx.renegotiate_session().await {
            error!(controller = %ctx.id, "Could not update media session: {}", e);
            ctx.tell_call(MediaServerResponse::ControllerError(e));
        }
    }
    .boxed()
}

fn enter_active<'a>(ctx: &'a mut SessionContext, trigger: &'a Trigger) -> BoxFuture<'a, ()> {
    async move {
        if let Trigger::Negotiated {
            local_sdp: Some(sdp),
        } = trigger
        {
            ctx.local_sdp = Some(sdp.clone());
        }
        info!(controller = %ctx.id, "Media session is active");
        let info = ctx.session_info();
        ctx.tell_call(MediaServerResponse::SessionReady(info));
    }
    .boxed()
}

fn enter_inactive<'a>(ctx: &'a mut SessionContext, _trigger: &'a Trigger) -> BoxFuture<'a, ()> {
    async move {
        ctx.release_resources().await;
        info!(controller = %ctx.id, "Media session closed");
        ctx.tell_call(MediaServerResponse::SessionClosed);
    }
    .boxed()
}

fn enter_failed<'a>(ctx: &'a mut SessionContext, trigger: &'a Trigger) -> BoxFuture<'a, ()> {
    async move {
        let error = match trigger {
            Trigger::NegotiationFailed(e) => e.clone(),
            _ => MediaControlError::negotiation("media session could not be set up"),
        };
        warn!(controller = %ctx.id, "Media server returned error: {}. Failing call", error);
        ctx.tell_call(MediaServerResponse::ControllerError(error));
    }
    .boxed()
}
