//! End-to-end service tests running against the in-memory store.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use vino_trivia_back::{
    config::AppConfig,
    dao::session_store::{SessionStore, memory::MemorySessionStore},
    dto::{session::AckStatus, sse::Handshake},
    error::ServiceError,
    services::{session_service, sse_events, sse_service},
    state::{AppState, SharedState, session::SessionContext},
};

const CODE: &str = "ABCD";

fn host() -> SessionContext {
    SessionContext::named("host-1", "Hilda")
}

fn player() -> SessionContext {
    SessionContext::named("player-1", "Pau")
}

async fn online_state() -> (SharedState, Arc<dyn SessionStore>) {
    let state = AppState::new(AppConfig::default(), None);
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    state.install_session_store(store.clone()).await;
    (state, store)
}

/// Create a session with a fixed code so tests can address it.
async fn create_fixed(state: &SharedState, store: &Arc<dyn SessionStore>) {
    let session = session_service::create_with_codes(state, store, &host(), vec![CODE.into()])
        .await
        .unwrap();
    assert_eq!(session.code, CODE);
}

#[tokio::test]
async fn create_join_answer_flow() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;

    let ack = session_service::join_session(&state, CODE, player())
        .await
        .unwrap();
    assert_eq!(ack.status, AckStatus::Applied);

    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert_eq!(session.players.len(), 1);
    let correct = session.current_question().unwrap().correct_answer.clone();

    session_service::submit_answer(&state, CODE, player(), correct.clone())
        .await
        .unwrap();
    let session = session_service::get_session(&state, CODE).await.unwrap();
    let entry = &session.players["player-1"];
    assert_eq!(entry.score, 1);
    assert_eq!(entry.feedback.as_deref(), Some("Correct!"));

    // A second submission for the same question must not double-count.
    session_service::submit_answer(&state, CODE, player(), correct)
        .await
        .unwrap();
    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert_eq!(session.players["player-1"].score, 1);
}

#[tokio::test]
async fn joining_twice_keeps_one_entry() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;

    session_service::join_session(&state, CODE, player())
        .await
        .unwrap();
    session_service::join_session(&state, CODE, SessionContext::named("player-1", "Other name"))
        .await
        .unwrap();

    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert_eq!(session.players.len(), 1);
    assert_eq!(session.players["player-1"].user_name, "Pau");
}

#[tokio::test]
async fn join_unknown_code_is_not_found() {
    let (state, _store) = online_state().await;
    let err = session_service::join_session(&state, "WXYZ", player())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn only_the_host_advances() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;
    session_service::join_session(&state, CODE, player())
        .await
        .unwrap();

    let err = session_service::advance_question(&state, CODE, player())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotAuthorized(_)));

    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert_eq!(session.current_question_index, 0);
    assert!(!session.quiz_ended);
}

#[tokio::test]
async fn advancing_past_the_last_question_ends_the_quiz() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;

    let total = session_service::get_session(&state, CODE)
        .await
        .unwrap()
        .questions
        .len();
    for _ in 1..total {
        session_service::advance_question(&state, CODE, host())
            .await
            .unwrap();
    }

    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert_eq!(session.current_question_index, total - 1);
    assert!(!session.quiz_ended);

    session_service::advance_question(&state, CODE, host())
        .await
        .unwrap();
    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert!(session.quiz_ended);
    // The index stays on the last question instead of running past the end.
    assert_eq!(session.current_question_index, total - 1);

    let err = session_service::submit_answer(&state, CODE, player(), "anything".into())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_) | ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn restart_resets_scores_and_resamples_questions() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;
    session_service::join_session(&state, CODE, player())
        .await
        .unwrap();

    let correct = session_service::get_session(&state, CODE)
        .await
        .unwrap()
        .current_question()
        .unwrap()
        .correct_answer
        .clone();
    session_service::submit_answer(&state, CODE, player(), correct)
        .await
        .unwrap();
    session_service::advance_question(&state, CODE, host())
        .await
        .unwrap();

    session_service::restart_session(&state, CODE, host())
        .await
        .unwrap();

    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert_eq!(session.current_question_index, 0);
    assert!(!session.quiz_ended);
    let entry = &session.players["player-1"];
    assert_eq!(entry.score, 0);
    assert!(entry.selected_answer.is_none());
    assert!(entry.feedback.is_none());
}

#[tokio::test]
async fn creation_gives_up_when_every_code_is_taken() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;

    let candidates = vec![CODE.to_owned(); 100];
    let err = session_service::create_with_codes(&state, &store, &host(), candidates)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::CodeExhaustion { attempts: 100 }));

    // The original session is untouched.
    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert_eq!(session.host_id, "host-1");
}

#[tokio::test]
async fn degraded_mutations_queue_and_replay_in_order() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;

    state.clear_session_store().await;
    assert!(state.is_degraded());

    let join_ack = session_service::join_session(&state, CODE, player())
        .await
        .unwrap();
    assert_eq!(join_ack.status, AckStatus::Queued);
    assert!(join_ack.key.is_some());

    let correct = state
        .last_snapshot(CODE)
        .unwrap()
        .current_question()
        .unwrap()
        .correct_answer
        .clone();
    let submit_ack = session_service::submit_answer(&state, CODE, player(), correct)
        .await
        .unwrap();
    assert_eq!(submit_ack.status, AckStatus::Queued);
    assert_eq!(state.outbox().len(), 2);

    // Nothing reached the store while degraded.
    let entity = store.find_session(CODE.into()).await.unwrap().unwrap();
    assert!(entity.players.is_empty());

    state.install_session_store(store.clone()).await;
    session_service::drain_outbox(&state, &store).await;

    assert!(state.outbox().is_empty());
    let session = session_service::get_session(&state, CODE).await.unwrap();
    let entry = &session.players["player-1"];
    assert_eq!(entry.score, 1);

    // Replaying again is a no-op; the applied keys are remembered.
    session_service::drain_outbox(&state, &store).await;
    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert_eq!(session.players["player-1"].score, 1);
}

#[tokio::test]
async fn failed_queued_operation_never_blocks_the_rest() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;
    state.clear_session_store().await;

    // First intent targets a session that does not exist and will fail.
    session_service::submit_answer(&state, "ZZZZ", player(), "Merlot".into())
        .await
        .unwrap();
    session_service::join_session(&state, CODE, player())
        .await
        .unwrap();

    state.install_session_store(store.clone()).await;
    session_service::drain_outbox(&state, &store).await;

    assert!(state.outbox().is_empty());
    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert_eq!(session.players.len(), 1);
}

#[tokio::test]
async fn full_queue_rejects_further_mutations() {
    let mut config = AppConfig::default();
    config.outbox_capacity = 1;
    let state = AppState::new(config, None);

    session_service::join_session(&state, CODE, player())
        .await
        .unwrap();
    let err = session_service::join_session(&state, CODE, SessionContext::named("p2", "P2"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::QueueFull { capacity: 1 }));
}

#[tokio::test]
async fn host_reconnect_bypasses_the_queue() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;

    state.clear_session_store().await;
    session_service::join_session(&state, CODE, player())
        .await
        .unwrap();
    assert_eq!(state.outbox().len(), 1);

    // Storage returns but the queue has not drained yet; the host still gets
    // the authoritative document immediately.
    state.install_session_store(store.clone()).await;
    let session = session_service::reconnect(&state, CODE, host()).await.unwrap();
    assert_eq!(session.code, CODE);
    assert!(session.players.is_empty());
    assert_eq!(state.outbox().len(), 1);

    let err = session_service::reconnect(&state, CODE, player())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotAuthorized(_)));
}

#[tokio::test]
async fn degraded_reads_serve_the_last_known_snapshot() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;
    state.clear_session_store().await;

    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert_eq!(session.code, CODE);

    let err = session_service::get_session(&state, "WXYZ").await.unwrap_err();
    assert!(matches!(err, ServiceError::Degraded));
}

#[tokio::test]
async fn subscribing_to_an_unknown_code_is_not_found() {
    let (state, _store) = online_state().await;
    let err = sse_service::subscribe_session(&state, "WXYZ")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn degraded_subscriptions_serve_the_cached_snapshot() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;
    state.clear_session_store().await;

    let (_receiver, snapshot) = sse_service::subscribe_session(&state, CODE).await.unwrap();
    assert_eq!(snapshot.code, CODE);

    // No cached snapshot, no store: nothing to serve.
    let err = sse_service::subscribe_session(&state, "WXYZ")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Degraded));
}

#[tokio::test]
async fn subscribers_observe_snapshot_broadcasts() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;

    let (mut receiver, _snapshot) = sse_service::subscribe_session(&state, CODE).await.unwrap();
    session_service::join_session(&state, CODE, player())
        .await
        .unwrap();

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.event.as_deref(), Some("session.snapshot"));
    assert!(event.data.contains("player-1"));
}

#[tokio::test]
async fn closing_a_session_ends_its_stream() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;

    let (mut receiver, _snapshot) = sse_service::subscribe_session(&state, CODE).await.unwrap();
    sse_events::broadcast_session_closed(&state, CODE, "expired");

    let event = receiver.recv().await.unwrap();
    assert_eq!(event.event.as_deref(), Some("session.closed"));
    assert!(event.data.contains("expired"));
    // The channel is torn down after the terminal event.
    assert!(matches!(receiver.recv().await, Err(RecvError::Closed)));
}

#[tokio::test]
async fn snapshot_streams_are_built_from_an_owned_snapshot() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;

    let (receiver, snapshot) = sse_service::subscribe_session(&state, CODE).await.unwrap();
    let handshake = Handshake {
        code: snapshot.code.clone(),
        message: "session stream connected".into(),
        degraded: state.is_degraded(),
    };
    // The response stream outlives every request-local value.
    let _sse = sse_service::to_sse_stream(receiver, handshake, snapshot);
}

#[tokio::test]
async fn appended_questions_extend_the_quiz() {
    let (state, store) = online_state().await;
    create_fixed(&state, &store).await;

    let before = session_service::get_session(&state, CODE)
        .await
        .unwrap()
        .questions
        .len();

    let question = vino_trivia_back::state::session::Question {
        question: "Which region produces Tokaji?".into(),
        options: vec![
            "Hungary".into(),
            "Austria".into(),
            "Slovenia".into(),
            "Croatia".into(),
        ],
        correct_answer: "Hungary".into(),
        explanation: "Tokaj in northeastern Hungary is home to Tokaji Aszú.".into(),
    };
    session_service::append_question(&state, CODE, host(), question)
        .await
        .unwrap();

    let session = session_service::get_session(&state, CODE).await.unwrap();
    assert_eq!(session.questions.len(), before + 1);
    assert_eq!(session.current_question_index, 0);

    let err = session_service::append_question(
        &state,
        CODE,
        player(),
        session.questions[0].clone(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotAuthorized(_)));
}
