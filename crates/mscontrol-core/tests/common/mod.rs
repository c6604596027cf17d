// Shared fixtures for controller integration tests
//
// FakeProvider stands in for a media server: it records every call made to
// it, keeps the completion sinks it is handed so a test can fire completion
// events at will, and can be told to reject specific operations.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use rvoip_mscontrol_core::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    CreateSession,
    CreateConnection(ConnectionMode),
    GenerateOffer,
    ProcessOffer(String),
    ProcessAnswer(String),
    CreateMediaGroup(GroupCapabilities),
    Join(JoinDirection, JoinTarget),
    Unjoin(JoinTarget),
    Play(PlayRequest),
    FlushDigits,
    Collect(CollectRequest),
    Record(RecordRequest),
    StopPlayer,
    StopRecorder,
    StopDetector,
    ReleaseGroup(MediaGroupHandle),
    ReleaseSession(SessionHandle),
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<ProviderCall>,
    failing: HashSet<&'static str>,
    next_id: u32,
    inline_offer: Option<(Duration, String)>,
    sdp_sinks: VecDeque<CompletionSink<SdpEvent>>,
    player_sinks: VecDeque<CompletionSink<PlayerEvent>>,
    detector_sinks: VecDeque<CompletionSink<DetectorEvent>>,
    recorder_sinks: VecDeque<CompletionSink<RecorderEvent>>,
}

#[derive(Debug, Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the named operation (by trait method name) fail from now on
    pub fn fail(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.remove(operation);
    }

    /// Answer generate_offer from inside the call, after `delay`, instead of
    /// holding on to the sink
    pub fn complete_offers_inline(&self, delay: Duration, sdp: &str) {
        self.state.lock().unwrap().inline_offer = Some((delay, sdp.to_string()));
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn count(&self, matches: impl Fn(&ProviderCall) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn take_sdp_sink(&self) -> CompletionSink<SdpEvent> {
        self.state
            .lock()
            .unwrap()
            .sdp_sinks
            .pop_front()
            .expect("no pending SDP operation")
    }

    pub fn take_player_sink(&self) -> CompletionSink<PlayerEvent> {
        self.state
            .lock()
            .unwrap()
            .player_sinks
            .pop_front()
            .expect("no pending play")
    }

    pub fn take_detector_sink(&self) -> CompletionSink<DetectorEvent> {
        self.state
            .lock()
            .unwrap()
            .detector_sinks
            .pop_front()
            .expect("no pending collect")
    }

    pub fn take_recorder_sink(&self) -> CompletionSink<RecorderEvent> {
        self.state
            .lock()
            .unwrap()
            .recorder_sinks
            .pop_front()
            .expect("no pending record")
    }

    fn record_call(&self, operation: &'static str, call: ProviderCall) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing.contains(operation) {
            return Err(MediaControlError::provider(format!("{} rejected", operation)));
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        format!("{}-{}", prefix, state.next_id)
    }
}

#[async_trait]
impl MediaProvider for FakeProvider {
    async fn create_session(&self) -> Result<SessionHandle> {
        self.record_call("create_session", ProviderCall::CreateSession)?;
        Ok(SessionHandle(self.next_id("session")))
    }

    async fn create_connection(
        &self,
        _session: &SessionHandle,
        mode: ConnectionMode,
    ) -> Result<ConnectionHandle> {
        self.record_call("create_connection", ProviderCall::CreateConnection(mode))?;
        Ok(ConnectionHandle(self.next_id("connection")))
    }

    async fn generate_offer(
        &self,
        _connection: &ConnectionHandle,
        sink: CompletionSink<SdpEvent>,
    ) -> Result<()> {
        self.record_call("generate_offer", ProviderCall::GenerateOffer)?;
        let inline = self.state.lock().unwrap().inline_offer.clone();
        match inline {
            Some((delay, sdp)) => {
                tokio::time::sleep(delay).await;
                sink.complete(SdpEvent::OfferGenerated(sdp)).await
            }
            None => {
                self.state.lock().unwrap().sdp_sinks.push_back(sink);
                Ok(())
            }
        }
    }

    async fn process_offer(
        &self,
        _connection: &ConnectionHandle,
        offer: &[u8],
        sink: CompletionSink<SdpEvent>,
    ) -> Result<()> {
        let offer = String::from_utf8_lossy(offer).into_owned();
        self.record_call("process_offer", ProviderCall::ProcessOffer(offer))?;
        self.state.lock().unwrap().sdp_sinks.push_back(sink);
        Ok(())
    }

    async fn process_answer(
        &self,
        _connection: &ConnectionHandle,
        answer: &[u8],
        sink: CompletionSink<SdpEvent>,
    ) -> Result<()> {
        let answer = String::from_utf8_lossy(answer).into_owned();
        self.record_call("process_answer", ProviderCall::ProcessAnswer(answer))?;
        self.state.lock().unwrap().sdp_sinks.push_back(sink);
        Ok(())
    }

    async fn create_media_group(
        &self,
        _session: &SessionHandle,
        capabilities: GroupCapabilities,
    ) -> Result<MediaGroupHandle> {
        self.record_call(
            "create_media_group",
            ProviderCall::CreateMediaGroup(capabilities),
        )?;
        Ok(MediaGroupHandle(self.next_id("group")))
    }

    async fn join(
        &self,
        _connection: &ConnectionHandle,
        direction: JoinDirection,
        target: &JoinTarget,
    ) -> Result<()> {
        self.record_call("join", ProviderCall::Join(direction, target.clone()))
    }

    async fn unjoin(&self, _connection: &ConnectionHandle, target: &JoinTarget) -> Result<()> {
        self.record_call("unjoin", ProviderCall::Unjoin(target.clone()))
    }

    async fn play(
        &self,
        _group: &MediaGroupHandle,
        request: PlayRequest,
        sink: CompletionSink<PlayerEvent>,
    ) -> Result<()> {
        self.record_call("play", ProviderCall::Play(request))?;
        self.state.lock().unwrap().player_sinks.push_back(sink);
        Ok(())
    }

    async fn flush_digits(&self, _group: &MediaGroupHandle) -> Result<()> {
        self.record_call("flush_digits", ProviderCall::FlushDigits)
    }

    async fn collect(
        &self,
        _group: &MediaGroupHandle,
        request: CollectRequest,
        sink: CompletionSink<DetectorEvent>,
    ) -> Result<()> {
        self.record_call("collect", ProviderCall::Collect(request))?;
        self.state.lock().unwrap().detector_sinks.push_back(sink);
        Ok(())
    }

    async fn record(
        &self,
        _group: &MediaGroupHandle,
        request: RecordRequest,
        sink: CompletionSink<RecorderEvent>,
    ) -> Result<()> {
        self.record_call("record", ProviderCall::Record(request))?;
        self.state.lock().unwrap().recorder_sinks.push_back(sink);
        Ok(())
    }

    async fn stop_player(&self, _group: &MediaGroupHandle) -> Result<()> {
        self.record_call("stop_player", ProviderCall::StopPlayer)
    }

    async fn stop_recorder(&self, _group: &MediaGroupHandle) -> Result<()> {
        self.record_call("stop_recorder", ProviderCall::StopRecorder)
    }

    async fn stop_detector(&self, _group: &MediaGroupHandle) -> Result<()> {
        self.record_call("stop_detector", ProviderCall::StopDetector)
    }

    async fn release_group(&self, group: &MediaGroupHandle) -> Result<()> {
        self.record_call("release_group", ProviderCall::ReleaseGroup(group.clone()))
    }

    async fn release_session(&self, session: &SessionHandle) -> Result<()> {
        self.record_call("release_session", ProviderCall::ReleaseSession(session.clone()))
    }
}

/// Collects recording metadata handed to it
#[derive(Debug, Default)]
pub struct FakeStore {
    pub recordings: Mutex<Vec<RecordingMetadata>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recordings(&self) -> Vec<RecordingMetadata> {
        self.recordings.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordingStore for FakeStore {
    async fn add_recording(&self, recording: RecordingMetadata) -> Result<()> {
        self.recordings.lock().unwrap().push(recording);
        Ok(())
    }
}

pub const SERVER_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
pub const LOCAL_SDP: &str = "v=0\r\no=xms 1 1 IN IP4 10.0.0.5\r\n";
pub const REMOTE_SDP: &str = "v=0\r\no=caller 7 7 IN IP4 192.168.1.20\r\n";

pub fn server_info() -> MediaServerInfo {
    MediaServerInfo {
        name: "test-media-server".to_string(),
        address: SERVER_ADDRESS,
        port: 5080,
        timeout_secs: 5,
    }
}

pub fn media_uri(name: &str) -> Url {
    Url::parse(&format!("file:///var/media/{}.wav", name)).unwrap()
}

/// A controller plus a call-control recipient talking to it
pub struct Harness {
    pub provider: Arc<FakeProvider>,
    pub controller: ControllerRef,
    pub call: Recipient,
    pub call_rx: mpsc::UnboundedReceiver<Notice>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let provider = FakeProvider::new();
        let controller = MediaSessionController::spawn(provider.clone(), server_info(), config);
        let (call, call_rx) = Recipient::channel();
        Self {
            provider,
            controller,
            call,
            call_rx,
        }
    }

    /// Send a message as the owning call
    pub async fn send(&self, message: ControlMessage) {
        self.controller.tell(&self.call, message).await.unwrap();
    }

    /// Send a message on behalf of another recipient
    pub async fn send_as(&self, sender: &Recipient, message: ControlMessage) {
        self.controller.tell(sender, message).await.unwrap();
    }

    /// Wait until everything sent so far has been handled
    pub async fn snapshot(&self) -> ControllerSnapshot {
        self.controller.snapshot().await.unwrap()
    }

    /// Responses the call has received so far
    pub async fn call_responses(&mut self) -> Vec<MediaServerResponse> {
        self.snapshot().await;
        drain(&mut self.call_rx)
    }

    pub async fn open_outbound(&mut self) {
        self.send(ControlMessage::CreateMediaSession(CreateMediaSession {
            outbound: true,
            connection_mode: ConnectionMode::SendRecv,
            session_description: String::new(),
        }))
        .await;
        self.snapshot().await;
        self.provider
            .take_sdp_sink()
            .complete(SdpEvent::OfferGenerated(LOCAL_SDP.to_string()))
            .await
            .unwrap();
        let snapshot = self.snapshot().await;
        assert_eq!(snapshot.state, MediaSessionState::Active);
        drain(&mut self.call_rx);
    }

    /// Active outbound session with a media group
    pub async fn open_with_media_group(&mut self) {
        self.open_outbound().await;
        self.send(ControlMessage::CreateMediaGroup).await;
        let responses = self.call_responses().await;
        assert_eq!(responses, vec![MediaServerResponse::MediaGroupCreated]);
        self.provider.clear_calls();
    }
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<Notice>) -> Vec<MediaServerResponse> {
    let mut responses = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        responses.push(notice.response);
    }
    responses
}

pub fn operation_result(response: &MediaServerResponse) -> &MediaGroupResponse {
    match response {
        MediaServerResponse::OperationResult(result) => result,
        other => panic!("expected an operation result, got {:?}", other),
    }
}
