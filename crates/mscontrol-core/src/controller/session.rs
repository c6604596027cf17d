use tracing::debug;

use super::states::Trigger;
use super::{MediaSessionController, MediaSessionState};
use crate::messages::{CreateMediaSession, Recipient};

impl MediaSessionController {
    pub(super) async fn on_create_media_session(
        &mut self,
        sender: Recipient,
        create: CreateMediaSession,
    ) {
        if !self.fsm.is(MediaSessionState::Uninitialized) {
            debug!(controller = %self.ctx.id, "Media session already created, ignoring");
            return;
        }

        self.ctx.call = Some(sender);
        self.ctx.outbound = create.outbound;
        self.ctx.connection_mode = create.connection_mode;
        if !create.session_description.is_empty() {
            self.ctx.remote_sdp = Some(create.session_description);
        }

        self.transition(
            Trigger::Control("CreateMediaSession"),
            MediaSessionState::OpeningMediaSession,
        )
        .await;
    }

    pub(super) async fn on_close_media_session(&mut self) {
        use MediaSessionState::*;
        if self.fsm.is(Active) || self.fsm.is(OpeningMediaSession) || self.fsm.is(UpdatingMediaSession)
        {
            self.transition(Trigger::Control("CloseMediaSession"), Inactive)
                .await;
        }
    }

    pub(super) async fn on_update_media_session(&mut self, session_description: String) {
        if !self.fsm.is(MediaSessionState::Active) {
            return;
        }
        self.ctx.remote_sdp = Some(session_description);
        self.transition(
            Trigger::Control("UpdateMediaSession"),
            MediaSessionState::UpdatingMediaSession,
        )
        .await;
    }
}
