//! Reconciliation of provider completion events

use tracing::{debug, error, info};

use super::context::ActiveOperation;
use super::states::Trigger;
use super::{MediaSessionController, MediaSessionState};
use crate::bridge::{
    DetectorEvent, OperationCategory, PlayerEvent, ProviderEvent, ProviderEventKind,
    RecordQualifier, RecorderEvent, SdpEvent,
};
use crate::error::MediaControlError;
use crate::messages::{MediaGroupResponse, MediaServerResponse, PLAY_COMPLETED};

impl MediaSessionController {
    pub(super) async fn handle_provider_event(&mut self, event: ProviderEvent) {
        let ProviderEvent { generation, kind } = event;
        let category = kind.category();
        let accepted = match category {
            OperationCategory::Negotiation => self.ctx.sdp.accept(generation),
            OperationCategory::Playback => self.ctx.player.accept(generation),
            OperationCategory::DigitCollection => self.ctx.detector.accept(generation),
            OperationCategory::Recording => self.ctx.recorder.accept(generation),
        };
        if !accepted {
            debug!(
                controller = %self.ctx.id,
                "Dropping stale {} event (generation {})", category, generation
            );
            return;
        }

        match kind {
            ProviderEventKind::Sdp(event) => self.on_sdp_event(event).await,
            ProviderEventKind::Player(event) => self.on_player_event(generation, event),
            ProviderEventKind::Detector(event) => self.on_detector_event(generation, event),
            ProviderEventKind::Recorder(event) => self.on_recorder_event(generation, event),
        }
    }

    async fn on_sdp_event(&mut self, event: SdpEvent) {
        let failure = match event {
            SdpEvent::OfferGenerated(sdp) | SdpEvent::AnswerGenerated(sdp) => {
                self.negotiated(Some(sdp)).await;
                return;
            }
            SdpEvent::AnswerProcessed => {
                self.negotiated(None).await;
                return;
            }
            SdpEvent::NetworkStreamFailure => MediaControlError::negotiation("Network stream failure"),
            SdpEvent::Failed(reason) => MediaControlError::negotiation(reason),
        };

        if failure.is_fatal() && self.fsm.can_transition(MediaSessionState::Failed) {
            self.transition(Trigger::NegotiationFailed(failure), MediaSessionState::Failed)
                .await;
        } else {
            // the session is past negotiation; the call decides what to do
            error!(controller = %self.ctx.id, "Media session error: {}", failure);
            self.ctx
                .tell_call(MediaServerResponse::ControllerError(failure));
        }
    }

    async fn negotiated(&mut self, local_sdp: Option<String>) {
        self.transition(Trigger::Negotiated { local_sdp }, MediaSessionState::Active)
            .await;
    }

    /// Clear the active operation if it is the one that just completed
    fn complete_operation(&mut self, completed: ActiveOperation) {
        if self.ctx.active == completed {
            self.ctx.active = ActiveOperation::None;
        }
    }

    fn on_player_event(&mut self, generation: u64, event: PlayerEvent) {
        let response = match event {
            PlayerEvent::Completed => {
                MediaGroupResponse::success(OperationCategory::Playback, PLAY_COMPLETED)
            }
            PlayerEvent::Failed(reason) => MediaGroupResponse::failure(
                OperationCategory::Playback,
                MediaControlError::provider(reason),
            ),
        };
        self.complete_operation(ActiveOperation::Playing { generation });
        if let Some(reply_to) = self.ctx.player.reply_to() {
            reply_to.tell(&self.ctx.id, MediaServerResponse::OperationResult(response));
        }
    }

    fn on_detector_event(&mut self, generation: u64, event: DetectorEvent) {
        let response = match event {
            DetectorEvent::Completed(digits) => {
                MediaGroupResponse::success(OperationCategory::DigitCollection, digits)
            }
            DetectorEvent::Failed(reason) => MediaGroupResponse::failure(
                OperationCategory::DigitCollection,
                MediaControlError::provider(reason),
            ),
        };
        self.complete_operation(ActiveOperation::Collecting { generation });
        if let Some(reply_to) = self.ctx.detector.reply_to() {
            reply_to.tell(&self.ctx.id, MediaServerResponse::OperationResult(response));
        }
    }

    fn on_recorder_event(&mut self, generation: u64, event: RecorderEvent) {
        let response = match event {
            RecorderEvent::Completed(qualifier) => {
                let digits = match qualifier {
                    RecordQualifier::Stopped => self.ctx.record_end_key.clone(),
                    _ => String::new(),
                };
                MediaGroupResponse::success(OperationCategory::Recording, digits)
            }
            RecorderEvent::Failed(reason) => {
                error!(controller = %self.ctx.id, "Recording event failed: {}", reason);
                MediaGroupResponse::failure(
                    OperationCategory::Recording,
                    MediaControlError::provider(reason),
                )
            }
        };
        self.complete_operation(ActiveOperation::Recording { generation });
        if let Some(recording) = self.ctx.take_call_recording(generation) {
            info!(
                controller = %self.ctx.id,
                "Call recording {} ended by the media server", recording.recording_id
            );
        }
        if let Some(reply_to) = self.ctx.recorder.reply_to() {
            reply_to.tell(&self.ctx.id, MediaServerResponse::OperationResult(response));
        }
    }
}
