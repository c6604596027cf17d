//! Bridging and conferencing

use tracing::{debug, error, info};

use super::{MediaSessionController, MediaSessionState};
use crate::messages::{JoinMixer, MediaServerResponse, Recipient};
use crate::types::{JoinDirection, JoinTarget};

impl MediaSessionController {
    /// JoinBridge and JoinConference: a two-party bridge is a mixer too
    pub(super) async fn on_join(&mut self, sender: Recipient, join: JoinMixer, kind: &'static str) {
        if !self.fsm.is(MediaSessionState::Active) {
            return;
        }
        let Some(connection) = self.ctx.connection.clone() else {
            debug!(controller = %self.ctx.id, "No network connection to join to {}", kind);
            return;
        };

        let target = JoinTarget::Mixer(join.mixer.clone());
        match self
            .ctx
            .provider
            .join(&connection, JoinDirection::Duplex, &target)
            .await
        {
            Ok(()) => {
                info!(controller = %self.ctx.id, "Joined {} {}", kind, join.mixer);
                self.ctx.mixer = Some(join.mixer);
                self.ctx.bridge_owner = Some(sender);
                self.ctx.conferencing = true;
                self.ctx.tell_call(MediaServerResponse::JoinComplete);
            }
            Err(e) => {
                error!(controller = %self.ctx.id, "Call bridging failed: {}", e);
                self.ctx
                    .notify_observers(MediaServerResponse::ControllerError(e));
            }
        }
    }

    pub(super) async fn on_leave(&mut self) {
        if !self.fsm.is(MediaSessionState::Active) || !self.ctx.conferencing {
            return;
        }
        let (Some(connection), Some(mixer)) = (self.ctx.connection.clone(), self.ctx.mixer.clone())
        else {
            return;
        };

        match self
            .ctx
            .provider
            .unjoin(&connection, &JoinTarget::Mixer(mixer.clone()))
            .await
        {
            Ok(()) => {
                info!(controller = %self.ctx.id, "Left mixer {}", mixer);
                self.ctx.mixer = None;
                self.ctx.bridge_owner = None;
                self.ctx.conferencing = false;
            }
            Err(e) => {
                error!(controller = %self.ctx.id, "Could not leave mixer {}: {}", mixer, e);
                self.ctx.tell_call(MediaServerResponse::ControllerError(e));
            }
        }
    }

    pub(super) async fn on_mute(&mut self) {
        self.rejoin_mixer(JoinDirection::Recv, "mute").await;
    }

    pub(super) async fn on_unmute(&mut self) {
        self.rejoin_mixer(JoinDirection::Duplex, "unmute").await;
    }

    /// Mute and unmute are advisory: failures are logged only
    async fn rejoin_mixer(&mut self, direction: JoinDirection, action: &str) {
        if !self.fsm.is(MediaSessionState::Active) {
            return;
        }
        let (Some(connection), Some(mixer)) = (self.ctx.connection.clone(), self.ctx.mixer.clone())
        else {
            debug!(controller = %self.ctx.id, "No mixer to {}", action);
            return;
        };
        if let Err(e) = self
            .ctx
            .provider
            .join(&connection, direction, &JoinTarget::Mixer(mixer))
            .await
        {
            error!(controller = %self.ctx.id, "Could not {} call: {}", action, e);
        }
    }
}
