// Media session lifecycle: negotiation, renegotiation, close and failure

use pretty_assertions::assert_eq;
use std::time::Duration;

use rvoip_mscontrol_core::prelude::*;

mod common;
use common::*;

fn inbound(sdp: &str) -> ControlMessage {
    ControlMessage::CreateMediaSession(CreateMediaSession {
        outbound: false,
        connection_mode: ConnectionMode::SendRecv,
        session_description: sdp.to_string(),
    })
}

fn outbound() -> ControlMessage {
    ControlMessage::CreateMediaSession(CreateMediaSession {
        outbound: true,
        connection_mode: ConnectionMode::SendRecv,
        session_description: String::new(),
    })
}

#[tokio::test]
async fn test_outbound_session_offer_makes_session_active() {
    let mut h = Harness::new();

    h.send(outbound()).await;
    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, MediaSessionState::OpeningMediaSession);
    assert!(snapshot.outbound);
    assert!(snapshot.has_session);
    assert!(snapshot.has_connection);
    assert_eq!(
        h.provider.calls(),
        vec![
            ProviderCall::CreateSession,
            ProviderCall::CreateConnection(ConnectionMode::SendRecv),
            ProviderCall::GenerateOffer,
        ]
    );

    h.provider
        .take_sdp_sink()
        .complete(SdpEvent::OfferGenerated(LOCAL_SDP.to_string()))
        .await
        .unwrap();

    let responses = h.call_responses().await;
    assert_eq!(
        responses,
        vec![MediaServerResponse::SessionReady(MediaSessionInfo {
            use_media_server: true,
            server_address: SERVER_ADDRESS,
            local_sdp: LOCAL_SDP.to_string(),
            remote_sdp: String::new(),
        })]
    );
    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, MediaSessionState::Active);
    assert_eq!(snapshot.local_sdp.as_deref(), Some(LOCAL_SDP));
}

#[tokio::test]
async fn test_inbound_session_answers_remote_offer() {
    let mut h = Harness::new();

    h.send(inbound(REMOTE_SDP)).await;
    h.snapshot().await;
    assert_eq!(
        h.provider.calls().last(),
        Some(&ProviderCall::ProcessOffer(REMOTE_SDP.to_string()))
    );

    h.provider
        .take_sdp_sink()
        .complete(SdpEvent::AnswerGenerated(LOCAL_SDP.to_string()))
        .await
        .unwrap();

    match h.call_responses().await.as_slice() {
        [MediaServerResponse::SessionReady(info)] => {
            assert_eq!(info.local_sdp, LOCAL_SDP);
            assert_eq!(info.remote_sdp, REMOTE_SDP);
        }
        other => panic!("unexpected responses: {:?}", other),
    }
    assert!(!h.snapshot().await.outbound);
}

#[tokio::test]
async fn test_create_media_session_is_noop_once_created() {
    let mut h = Harness::new();
    h.open_outbound().await;
    h.provider.clear_calls();
    let before = h.snapshot().await;

    h.send(inbound(REMOTE_SDP)).await;

    let after = h.snapshot().await;
    assert_eq!(after, before);
    assert!(h.provider.calls().is_empty());
    assert!(h.call_responses().await.is_empty());
}

#[tokio::test]
async fn test_update_media_session_renegotiates() {
    let mut h = Harness::new();
    h.open_outbound().await;

    h.send(ControlMessage::UpdateMediaSession {
        session_description: REMOTE_SDP.to_string(),
    })
    .await;
    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, MediaSessionState::UpdatingMediaSession);
    assert_eq!(snapshot.remote_sdp.as_deref(), Some(REMOTE_SDP));
    assert_eq!(
        h.provider.calls().last(),
        Some(&ProviderCall::ProcessAnswer(REMOTE_SDP.to_string()))
    );

    h.provider
        .take_sdp_sink()
        .complete(SdpEvent::AnswerProcessed)
        .await
        .unwrap();

    assert_eq!(
        h.call_responses().await,
        vec![MediaServerResponse::SessionReady(MediaSessionInfo {
            use_media_server: true,
            server_address: SERVER_ADDRESS,
            local_sdp: LOCAL_SDP.to_string(),
            remote_sdp: REMOTE_SDP.to_string(),
        })]
    );
    assert_eq!(h.snapshot().await.state, MediaSessionState::Active);
}

#[tokio::test]
async fn test_update_ignored_unless_active() {
    let mut h = Harness::new();

    h.send(ControlMessage::UpdateMediaSession {
        session_description: REMOTE_SDP.to_string(),
    })
    .await;

    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, MediaSessionState::Uninitialized);
    assert_eq!(snapshot.remote_sdp, None);
    assert!(h.provider.calls().is_empty());
    assert!(h.call_responses().await.is_empty());
}

#[tokio::test]
async fn test_failed_negotiation_fails_session() {
    let mut h = Harness::new();
    h.send(outbound()).await;
    h.snapshot().await;

    h.provider
        .take_sdp_sink()
        .complete(SdpEvent::Failed("488 not acceptable here".to_string()))
        .await
        .unwrap();

    assert_eq!(
        h.call_responses().await,
        vec![MediaServerResponse::ControllerError(
            MediaControlError::negotiation("488 not acceptable here")
        )]
    );
    assert_eq!(h.snapshot().await.state, MediaSessionState::Failed);
}

#[tokio::test]
async fn test_network_stream_failure_during_update_fails_session() {
    let mut h = Harness::new();
    h.open_outbound().await;

    h.send(ControlMessage::UpdateMediaSession {
        session_description: REMOTE_SDP.to_string(),
    })
    .await;
    h.snapshot().await;
    h.provider
        .take_sdp_sink()
        .complete(SdpEvent::NetworkStreamFailure)
        .await
        .unwrap();

    let responses = h.call_responses().await;
    assert!(matches!(
        responses.as_slice(),
        [MediaServerResponse::ControllerError(MediaControlError::Negotiation { .. })]
    ));
    assert_eq!(h.snapshot().await.state, MediaSessionState::Failed);
}

#[tokio::test]
async fn test_provider_error_while_opening_is_reported_without_transition() {
    let mut h = Harness::new();
    h.provider.fail("create_connection");

    h.send(outbound()).await;

    assert_eq!(
        h.call_responses().await,
        vec![MediaServerResponse::ControllerError(
            MediaControlError::provider("create_connection rejected")
        )]
    );
    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, MediaSessionState::OpeningMediaSession);
    assert!(snapshot.has_session);
    assert!(!snapshot.has_connection);

    // the call can still tear the half-open session down
    h.send(ControlMessage::CloseMediaSession).await;
    assert_eq!(
        h.call_responses().await,
        vec![MediaServerResponse::SessionClosed]
    );
    assert_eq!(
        h.provider
            .count(|call| matches!(call, ProviderCall::ReleaseSession(_))),
        1
    );
}

#[tokio::test]
async fn test_close_releases_every_resource() {
    let mut h = Harness::new();
    h.open_with_media_group().await;

    h.send(ControlMessage::CloseMediaSession).await;

    assert_eq!(
        h.call_responses().await,
        vec![MediaServerResponse::SessionClosed]
    );
    assert_eq!(
        h.provider.calls(),
        vec![ProviderCall::ReleaseSession(SessionHandle(
            "session-1".to_string()
        ))]
    );
    let snapshot = h.snapshot().await;
    assert_eq!(snapshot.state, MediaSessionState::Inactive);
    assert!(!snapshot.has_session);
    assert!(!snapshot.has_connection);
    assert!(!snapshot.has_media_group);
    assert_eq!(snapshot.active_operation, ActiveOperation::None);
}

#[tokio::test]
async fn test_close_ignored_before_session_exists() {
    let mut h = Harness::new();

    h.send(ControlMessage::CloseMediaSession).await;

    assert_eq!(h.snapshot().await.state, MediaSessionState::Uninitialized);
    assert!(h.call_responses().await.is_empty());
}

#[tokio::test]
async fn test_late_offer_after_close_is_dropped() {
    let mut h = Harness::new();
    h.send(outbound()).await;
    h.snapshot().await;
    let sink = h.provider.take_sdp_sink();

    h.send(ControlMessage::CloseMediaSession).await;
    assert_eq!(
        h.call_responses().await,
        vec![MediaServerResponse::SessionClosed]
    );

    sink.complete(SdpEvent::OfferGenerated(LOCAL_SDP.to_string()))
        .await
        .unwrap();

    assert_eq!(h.snapshot().await.state, MediaSessionState::Inactive);
    assert!(h.call_responses().await.is_empty());
}

#[tokio::test]
async fn test_observers_are_deduplicated_and_confirmed() {
    let h = Harness::new();
    let (observer, mut observer_rx) = Recipient::channel();
    let (other, _other_rx) = Recipient::channel();

    h.send(ControlMessage::Observe {
        observer: observer.clone(),
    })
    .await;
    h.send(ControlMessage::Observe {
        observer: observer.clone(),
    })
    .await;
    h.send(ControlMessage::Observe { observer: other }).await;
    assert_eq!(h.snapshot().await.observers, 2);
    assert_eq!(
        drain(&mut observer_rx),
        vec![MediaServerResponse::Observing, MediaServerResponse::Observing]
    );

    h.send(ControlMessage::StopMediaGroup).await;
    h.snapshot().await;
    assert_eq!(
        drain(&mut observer_rx),
        vec![MediaServerResponse::MediaGroupStateChanged(
            MediaGroupState::Inactive
        )]
    );

    h.send(ControlMessage::StopObserving {
        observer: Some(observer),
    })
    .await;
    assert_eq!(h.snapshot().await.observers, 1);

    h.send(ControlMessage::StopObserving { observer: None }).await;
    assert_eq!(h.snapshot().await.observers, 0);
}

#[tokio::test]
async fn test_controller_stops_when_handles_are_dropped() {
    let (controller, handle) = MediaSessionController::new(
        FakeProvider::new(),
        server_info(),
        ControllerConfig::default(),
    );
    assert_eq!(controller.state(), MediaSessionState::Uninitialized);
    assert!(controller.id().to_string().starts_with("msc-"));

    let task = tokio::spawn(controller.run());
    assert!(handle.is_running());
    drop(handle);

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("controller loop should end")
        .unwrap();
}

#[tokio::test]
async fn test_inline_completion_with_full_inbox_does_not_stall() {
    let config = ControllerConfig {
        inbox_capacity: 1,
        ..Default::default()
    };
    let mut h = Harness::with_config(config);
    h.provider
        .complete_offers_inline(Duration::from_millis(100), LOCAL_SDP);
    let (observer, mut observer_rx) = Recipient::channel();

    // the observer fills the inbox while the provider is still inside
    // generate_offer
    h.send(outbound()).await;
    h.send(ControlMessage::Observe { observer }).await;

    let snapshot = tokio::time::timeout(Duration::from_secs(2), h.controller.snapshot())
        .await
        .expect("controller stalled on an inline completion")
        .unwrap();

    assert_eq!(snapshot.state, MediaSessionState::Active);
    assert_eq!(snapshot.local_sdp.as_deref(), Some(LOCAL_SDP));
    assert_eq!(snapshot.observers, 1);
    assert_eq!(drain(&mut observer_rx), vec![MediaServerResponse::Observing]);
    match drain(&mut h.call_rx).as_slice() {
        [MediaServerResponse::SessionReady(info)] => assert_eq!(info.local_sdp, LOCAL_SDP),
        other => panic!("unexpected call responses: {:?}", other),
    }
}

#[tokio::test]
async fn test_tell_waits_for_inbox_room() {
    let config = ControllerConfig {
        inbox_capacity: 1,
        ..Default::default()
    };
    let (controller, handle) =
        MediaSessionController::new(FakeProvider::new(), server_info(), config);
    let (call, _call_rx) = Recipient::channel();

    handle.tell(&call, ControlMessage::Mute).await.unwrap();
    let blocked = tokio::time::timeout(
        Duration::from_millis(50),
        handle.tell(&call, ControlMessage::Unmute),
    )
    .await;
    assert!(blocked.is_err(), "second message should wait for the first to be taken");

    tokio::spawn(controller.run());
    tokio::time::timeout(Duration::from_secs(1), handle.tell(&call, ControlMessage::Unmute))
        .await
        .expect("inbox room frees once the controller runs")
        .unwrap();
    assert_eq!(handle.snapshot().await.unwrap().state, MediaSessionState::Uninitialized);
}
