//! Media group lifecycle and player / recorder / signal detector operations

use chrono::Utc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::context::{ActiveOperation, SessionContext};
use super::{MediaSessionController, MediaSessionState};
use crate::bridge::OperationCategory;
use crate::error::{MediaControlError, Result};
use crate::messages::{
    Collect, MediaGroupResponse, MediaServerResponse, Play, Record, Recipient, StartRecording,
    Stop, StopRecording,
};
use crate::provider::{
    CollectRequest, PatternSlot, PlayRequest, RecordRequest, RepeatCount, SignalPattern,
};
use crate::recording::CallRecording;
use crate::types::{GroupCapabilities, JoinDirection, JoinTarget, MediaGroupState, SessionHandle};

pub(crate) fn play_request(play: &Play) -> PlayRequest {
    PlayRequest {
        uris: play.uris.clone(),
        repeat: RepeatCount::from_iterations(play.iterations),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Only the keys actually supplied become detector patterns
pub(crate) fn collect_request(collect: &Collect) -> CollectRequest {
    let mut patterns = Vec::with_capacity(2);
    if let Some(key) = non_empty(&collect.end_input_key) {
        patterns.push(SignalPattern {
            slot: PatternSlot::EndKey,
            value: key.to_string(),
        });
    }
    if let Some(pattern) = non_empty(&collect.pattern) {
        patterns.push(SignalPattern {
            slot: PatternSlot::Pattern,
            value: pattern.to_string(),
        });
    }

    let timeout = Duration::from_secs(u64::from(collect.timeout_secs));
    CollectRequest {
        patterns,
        prompts: collect.prompts.clone(),
        digit_count: collect.number_of_digits,
        initial_timeout: timeout,
        inter_signal_timeout: timeout,
        buffering: false,
    }
}

pub(crate) fn record_request(record: &Record, inter_signal_timeout: Duration) -> RecordRequest {
    let end_key = non_empty(&record.end_input_key).map(str::to_string);
    let ends_on_key = end_key.is_some();
    let timeout = Duration::from_secs(u64::from(record.timeout_secs));

    RecordRequest {
        destination: record.destination.clone(),
        // recorders accept a single prompt
        prompts: record.prompts.iter().take(1).cloned().collect(),
        max_duration: Duration::from_millis(u64::from(record.length_secs) * 1000),
        end_signal_pattern: end_key,
        inter_signal_timeout: ends_on_key.then_some(inter_signal_timeout),
        stop_play_on_signal: ends_on_key,
        initial_timeout: timeout,
        final_timeout: timeout,
        append: false,
        start_beep: false,
    }
}

impl SessionContext {
    /// Create a player/recorder/detector group and join it to the connection.
    ///
    /// A group that cannot be joined is released again.
    async fn create_media_group(&mut self, session: &SessionHandle) -> Result<()> {
        let connection = self
            .connection
            .clone()
            .ok_or_else(|| MediaControlError::resource_unavailable("network connection"))?;
        let group = self
            .provider
            .create_media_group(session, GroupCapabilities::PlayerRecorderSignalDetector)
            .await?;

        let target = JoinTarget::MediaGroup(group.clone());
        if let Err(e) = self
            .provider
            .join(&connection, JoinDirection::Duplex, &target)
            .await
        {
            if let Err(release) = self.provider.release_group(&group).await {
                warn!(controller = %self.id, "Could not release media group {}: {}", group, release);
            }
            return Err(e);
        }

        info!(controller = %self.id, "Created media group {}", group);
        self.media_group = Some(group);
        Ok(())
    }
}

fn operation_failed(category: OperationCategory, error: MediaControlError) -> MediaServerResponse {
    MediaServerResponse::OperationResult(MediaGroupResponse::failure(category, error))
}

impl MediaSessionController {
    pub(super) async fn on_create_media_group(&mut self, sender: Recipient) {
        if self.ctx.media_group.is_some() {
            debug!(controller = %self.ctx.id, "Reusing existing media group");
            return;
        }
        let Some(session) = self.ctx.session.clone() else {
            let error = MediaControlError::resource_unavailable("media session");
            sender.tell(&self.ctx.id, MediaServerResponse::ControllerError(error));
            return;
        };

        match self.ctx.create_media_group(&session).await {
            Ok(()) => {
                sender.tell(&self.ctx.id, MediaServerResponse::MediaGroupCreated);
            }
            Err(e) => {
                error!(controller = %self.ctx.id, "Could not create media group: {}", e);
                sender.tell(&self.ctx.id, MediaServerResponse::ControllerError(e));
            }
        }
    }

    /// Always answers, to the call if there is one, whether or not a group
    /// existed
    pub(super) async fn on_destroy_media_group(&mut self, sender: Recipient) {
        if let Some(group) = self.ctx.media_group.take() {
            self.ctx.active = ActiveOperation::None;
            if let Err(e) = self.ctx.provider.release_group(&group).await {
                warn!(controller = %self.ctx.id, "Could not release media group {}: {}", group, e);
            }
        }

        let target = self.ctx.call.as_ref().unwrap_or(&sender);
        target.tell(&self.ctx.id, MediaServerResponse::MediaGroupDestroyed);
    }

    pub(super) async fn on_stop_media_group(&mut self) {
        match self.ctx.stop_active().await {
            Ok(_) => self
                .ctx
                .notify_observers(MediaServerResponse::MediaGroupStateChanged(
                    MediaGroupState::Inactive,
                )),
            Err(e) => {
                error!(controller = %self.ctx.id, "Could not stop media group: {}", e);
                self.ctx
                    .notify_observers(MediaServerResponse::ControllerError(e));
            }
        }
    }

    pub(super) async fn on_play(&mut self, sender: Recipient, play: Play) {
        if !self.fsm.is(MediaSessionState::Active) {
            return;
        }
        let group = match self.ctx.require_idle_group(OperationCategory::Playback) {
            Ok(group) => group,
            Err(e) => {
                sender.tell(&self.ctx.id, operation_failed(OperationCategory::Playback, e));
                return;
            }
        };

        self.ctx.player.bind(sender);
        let result = match self.ctx.player.arm() {
            Ok(sink) => {
                let generation = sink.generation();
                self.ctx
                    .provider
                    .play(&group, play_request(&play), sink)
                    .await
                    .map(|()| generation)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(generation) => self.ctx.active = ActiveOperation::Playing { generation },
            Err(e) => {
                error!(controller = %self.ctx.id, "Play failed: {}", e);
                self.ctx.player.disarm();
                self.ctx
                    .notify_observers(operation_failed(OperationCategory::Playback, e));
            }
        }
    }

    pub(super) async fn on_collect(&mut self, sender: Recipient, collect: Collect) {
        if !self.fsm.is(MediaSessionState::Active) {
            return;
        }
        let group = match self.ctx.require_idle_group(OperationCategory::DigitCollection) {
            Ok(group) => group,
            Err(e) => {
                sender.tell(
                    &self.ctx.id,
                    operation_failed(OperationCategory::DigitCollection, e),
                );
                return;
            }
        };

        self.ctx.detector.bind(sender);
        let result = match self.ctx.provider.flush_digits(&group).await {
            Ok(()) => match self.ctx.detector.arm() {
                Ok(sink) => {
                    let generation = sink.generation();
                    self.ctx
                        .provider
                        .collect(&group, collect_request(&collect), sink)
                        .await
                        .map(|()| generation)
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(generation) => self.ctx.active = ActiveOperation::Collecting { generation },
            Err(e) => {
                error!(controller = %self.ctx.id, "DTMF recognition failed: {}", e);
                self.ctx.detector.disarm();
                self.ctx
                    .notify_observers(operation_failed(OperationCategory::DigitCollection, e));
            }
        }
    }

    /// Returns the recorder generation if the record was issued
    pub(super) async fn on_record(&mut self, sender: Recipient, record: Record) -> Option<u64> {
        if !self.fsm.is(MediaSessionState::Active) {
            return None;
        }
        let group = match self.ctx.require_idle_group(OperationCategory::Recording) {
            Ok(group) => group,
            Err(e) => {
                sender.tell(&self.ctx.id, operation_failed(OperationCategory::Recording, e));
                return None;
            }
        };

        let request = record_request(&record, self.ctx.config.record_inter_signal_timeout());
        self.ctx.record_end_key = record.end_input_key.unwrap_or_default();
        self.ctx.recorder.bind(sender);
        let result = match self.ctx.recorder.arm() {
            Ok(sink) => {
                let generation = sink.generation();
                self.ctx
                    .provider
                    .record(&group, request, sink)
                    .await
                    .map(|()| generation)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(generation) => {
                self.ctx.active = ActiveOperation::Recording { generation };
                Some(generation)
            }
            Err(e) => {
                error!(controller = %self.ctx.id, "Recording failed: {}", e);
                self.ctx.recorder.disarm();
                self.ctx
                    .notify_observers(operation_failed(OperationCategory::Recording, e));
                None
            }
        }
    }

    pub(super) async fn on_start_recording(&mut self, sender: Recipient, start: StartRecording) {
        if !self.fsm.is(MediaSessionState::Active) {
            return;
        }
        if self.ctx.account_id.is_none() {
            self.ctx.account_id = Some(start.account_id);
        }
        if self.ctx.store.is_none() {
            self.ctx.store = start.store;
        }

        info!(controller = %self.ctx.id, "Start recording call to {}", start.recording_uri);
        let defaults = self.ctx.config.call_recording.clone();
        let record = Record {
            destination: start.recording_uri.clone(),
            prompts: Vec::new(),
            end_input_key: Some(defaults.end_input_keys),
            length_secs: defaults.max_length_secs,
            timeout_secs: defaults.timeout_secs,
        };

        let started_at = Utc::now();
        if let Some(generation) = self.on_record(sender, record).await {
            self.ctx.recording = Some(CallRecording {
                generation,
                recording_id: start.recording_id,
                call_id: start.call_id,
                uri: start.recording_uri,
                started_at,
            });
        }
    }

    pub(super) async fn on_stop_recording(&mut self, stop: StopRecording) {
        if !self.fsm.is(MediaSessionState::Active) || !self.ctx.active.is_recording() {
            return;
        }
        if self.ctx.account_id.is_none() {
            self.ctx.account_id = stop.account_id;
        }
        if self.ctx.store.is_none() {
            self.ctx.store = stop.store;
        }

        info!(controller = %self.ctx.id, "Stop recording call");
        self.on_stop(Stop {
            create_record_artifact: true,
        })
        .await;
    }

    /// Stopping with nothing active is a no-op
    pub(super) async fn on_stop(&mut self, stop: Stop) {
        match self.ctx.stop_active().await {
            Ok(ActiveOperation::Recording { generation }) if stop.create_record_artifact => {
                self.ctx.finalize_recording(generation).await;
            }
            Ok(ActiveOperation::Recording { generation }) => {
                if let Some(recording) = self.ctx.take_call_recording(generation) {
                    debug!(controller = %self.ctx.id, "Discarding call recording {}", recording.recording_id);
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!(controller = %self.ctx.id, "Could not stop media group operation: {}", e);
                self.ctx.tell_call(MediaServerResponse::ControllerError(e));
            }
        }
    }
}
