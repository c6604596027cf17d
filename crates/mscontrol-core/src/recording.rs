//! Recording finalizer
//!
//! When a call recording stops, its duration is measured from the recorded
//! artifact. Some media servers finish writing the artifact only after the
//! completion event has fired, so an unmeasurable artifact falls back to the
//! wall-clock time elapsed since the recording started.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

use crate::error::{MediaControlError, Result};
use crate::types::Sid;

/// Persistence collaborator receiving finalized recording metadata
#[async_trait]
pub trait RecordingStore: Send + Sync + fmt::Debug {
    async fn add_recording(&self, recording: RecordingMetadata) -> Result<()>;
}

/// Metadata of a finished call recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub recording_id: Sid,
    pub account_id: Sid,
    pub call_id: Sid,
    /// Duration in seconds
    pub duration: f64,
    pub api_version: String,
    /// REST resource path of the recording
    pub uri: String,
    pub date_created: DateTime<Utc>,
}

impl RecordingMetadata {
    pub fn builder() -> RecordingMetadataBuilder {
        RecordingMetadataBuilder::default()
    }
}

/// Builder for [`RecordingMetadata`]
#[derive(Debug, Default)]
pub struct RecordingMetadataBuilder {
    recording_id: Option<Sid>,
    account_id: Option<Sid>,
    call_id: Option<Sid>,
    duration: Option<f64>,
    api_version: Option<String>,
    date_created: Option<DateTime<Utc>>,
}

impl RecordingMetadataBuilder {
    pub fn recording_id(mut self, sid: Sid) -> Self {
        self.recording_id = Some(sid);
        self
    }

    pub fn account_id(mut self, sid: Sid) -> Self {
        self.account_id = Some(sid);
        self
    }

    pub fn call_id(mut self, sid: Sid) -> Self {
        self.call_id = Some(sid);
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn date_created(mut self, at: DateTime<Utc>) -> Self {
        self.date_created = Some(at);
        self
    }

    pub fn build(self) -> Result<RecordingMetadata> {
        let recording_id = self
            .recording_id
            .ok_or_else(|| MediaControlError::recording("recording id not set"))?;
        let account_id = self
            .account_id
            .ok_or_else(|| MediaControlError::recording("account id not set"))?;
        let call_id = self
            .call_id
            .ok_or_else(|| MediaControlError::recording("call id not set"))?;
        let api_version = self
            .api_version
            .ok_or_else(|| MediaControlError::recording("api version not set"))?;
        let uri = recording_resource_uri(&api_version, &account_id, &recording_id);

        Ok(RecordingMetadata {
            recording_id,
            account_id,
            call_id,
            duration: self.duration.unwrap_or(0.0),
            api_version,
            uri,
            date_created: self.date_created.unwrap_or_else(Utc::now),
        })
    }
}

/// `/{api_version}/Accounts/{account}/Recordings/{recording}`
pub fn recording_resource_uri(api_version: &str, account_id: &Sid, recording_id: &Sid) -> String {
    format!(
        "/{}/Accounts/{}/Recordings/{}",
        api_version, account_id, recording_id
    )
}

/// Measure the duration in seconds of a recorded WAV artifact.
///
/// Only `file:` URIs can be measured. A zero-length recording is reported as
/// an error, the same as a missing or unreadable one.
pub fn measure_duration(uri: &Url) -> Result<f64> {
    if uri.scheme() != "file" {
        return Err(MediaControlError::recording(format!(
            "cannot measure non-file artifact {}",
            uri
        )));
    }
    let path = uri
        .to_file_path()
        .map_err(|_| MediaControlError::recording(format!("invalid file URI {}", uri)))?;
    measure_wav(&path)
}

fn measure_wav(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| MediaControlError::recording(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();
    // duration() is in samples per channel
    let frames = reader.duration();
    if frames == 0 || spec.sample_rate == 0 {
        return Err(MediaControlError::recording(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(frames as f64 / spec.sample_rate as f64)
}

/// Duration to report for a stopped recording
pub fn finalize_duration(uri: &Url, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> f64 {
    match measure_duration(uri) {
        Ok(duration) => {
            info!("Recording artifact {} measured at {:.3}s", uri, duration);
            duration
        }
        Err(e) => {
            debug!("Could not measure recording duration: {}", e);
            let elapsed = (ended_at - started_at).num_seconds().max(0);
            info!(
                "Recording artifact {} not materialized, using elapsed time {}s",
                uri, elapsed
            );
            elapsed as f64
        }
    }
}

/// Identifiers of the call recording currently in progress
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecording {
    /// Generation of the recorder operation writing this recording
    pub generation: u64,
    pub recording_id: Sid,
    pub call_id: Sid,
    pub uri: Url,
    pub started_at: DateTime<Utc>,
}

impl CallRecording {
    /// Build the metadata record for this recording ending at `ended_at`
    pub fn finalize(
        &self,
        account_id: &Sid,
        api_version: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<RecordingMetadata> {
        let duration = finalize_duration(&self.uri, self.started_at, ended_at);
        RecordingMetadata::builder()
            .recording_id(self.recording_id.clone())
            .account_id(account_id.clone())
            .call_id(self.call_id.clone())
            .duration(duration)
            .api_version(api_version)
            .date_created(ended_at)
            .build()
    }
}
