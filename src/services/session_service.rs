use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::{
    dao::session_store::SessionStore,
    dto::{session::MutationAck, validation::validate_session_code},
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        outbox::SessionIntent,
        session::{AdvanceOutcome, GameSession, Question, SessionContext, SubmitOutcome},
    },
};

/// How many random codes are probed before creation gives up.
pub const CODE_ATTEMPTS: u32 = 100;
const CODE_LENGTH: usize = 4;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

const DEFAULT_HOST_NAME: &str = "Quiz Host";
const DEFAULT_PLAYER_NAME: &str = "Anonymous";

/// Open a new session for the calling host.
///
/// While degraded, the request is parked in the offline queue and the code
/// is allocated at replay time.
pub async fn create_session(
    state: &SharedState,
    ctx: SessionContext,
) -> Result<MutationAck, ServiceError> {
    require_participant(&ctx)?;

    let Some(store) = state.session_store().await else {
        let key = state.outbox().enqueue(SessionIntent::CreateSession {
            host_id: ctx.identity.clone(),
            host_name: host_name(&ctx),
        })?;
        info!(key = %key, "storage degraded; queued session creation");
        return Ok(MutationAck::queued(key));
    };

    let session = create_with_codes(state, &store, &ctx, candidate_codes(CODE_ATTEMPTS)).await?;
    Ok(MutationAck::applied(&session))
}

/// Creation inner loop, probing the supplied candidate codes in order.
///
/// Each probe is a single atomic insert-if-absent; a taken code simply moves
/// on to the next candidate. Exposed so tests can control the candidates.
pub async fn create_with_codes(
    state: &SharedState,
    store: &Arc<dyn SessionStore>,
    ctx: &SessionContext,
    candidates: Vec<String>,
) -> Result<GameSession, ServiceError> {
    let questions = {
        let mut rng = rand::rng();
        state.config().sample_questions(&mut rng)
    };
    let attempts = candidates.len() as u32;

    for code in candidates {
        let session = GameSession::new(code, &ctx.identity, &host_name(ctx), questions.clone());
        if store.insert_session(session.clone().into()).await? {
            info!(code = %session.code, host = %session.host_id, "created session");
            publish(state, &session);
            return Ok(session);
        }
        debug!(code = %session.code, "session code taken; trying another");
    }

    warn!(attempts, "exhausted session code candidates");
    Err(ServiceError::CodeExhaustion { attempts })
}

/// Add the caller to a session, idempotently per identity.
pub async fn join_session(
    state: &SharedState,
    code: &str,
    ctx: SessionContext,
) -> Result<MutationAck, ServiceError> {
    require_participant(&ctx)?;
    let code = checked_code(code)?;

    let Some(store) = state.session_store().await else {
        let key = state.outbox().enqueue(SessionIntent::JoinSession {
            code,
            player_id: ctx.identity.clone(),
            user_name: player_name(&ctx),
        })?;
        return Ok(MutationAck::queued(key));
    };

    let session = apply_join(state, &store, &code, &ctx.identity, &player_name(&ctx)).await?;
    Ok(MutationAck::applied(&session))
}

/// Record the caller's answer for the current question.
pub async fn submit_answer(
    state: &SharedState,
    code: &str,
    ctx: SessionContext,
    answer: String,
) -> Result<MutationAck, ServiceError> {
    require_identity(&ctx)?;
    let code = checked_code(code)?;

    let Some(store) = state.session_store().await else {
        let key = state.outbox().enqueue(SessionIntent::SubmitAnswer {
            code,
            player_id: ctx.identity.clone(),
            answer,
        })?;
        return Ok(MutationAck::queued(key));
    };

    let session = apply_submit(state, &store, &code, &ctx.identity, &answer).await?;
    Ok(MutationAck::applied(&session))
}

/// Move the session to the next question (host only).
pub async fn advance_question(
    state: &SharedState,
    code: &str,
    ctx: SessionContext,
) -> Result<MutationAck, ServiceError> {
    require_identity(&ctx)?;
    let code = checked_code(code)?;

    let Some(store) = state.session_store().await else {
        let key = state.outbox().enqueue(SessionIntent::AdvanceQuestion {
            code,
            host_id: ctx.identity.clone(),
        })?;
        return Ok(MutationAck::queued(key));
    };

    let session = apply_advance(state, &store, &code, &ctx.identity).await?;
    Ok(MutationAck::applied(&session))
}

/// Reset the session for a fresh run with newly sampled questions (host only).
pub async fn restart_session(
    state: &SharedState,
    code: &str,
    ctx: SessionContext,
) -> Result<MutationAck, ServiceError> {
    require_identity(&ctx)?;
    let code = checked_code(code)?;

    let Some(store) = state.session_store().await else {
        let key = state.outbox().enqueue(SessionIntent::RestartSession {
            code,
            host_id: ctx.identity.clone(),
        })?;
        return Ok(MutationAck::queued(key));
    };

    let session = apply_restart(state, &store, &code, &ctx.identity).await?;
    Ok(MutationAck::applied(&session))
}

/// Append a host-supplied question to the session (host only).
pub async fn append_question(
    state: &SharedState,
    code: &str,
    ctx: SessionContext,
    question: Question,
) -> Result<MutationAck, ServiceError> {
    require_identity(&ctx)?;
    let code = checked_code(code)?;

    let Some(store) = state.session_store().await else {
        let key = state.outbox().enqueue(SessionIntent::AppendQuestion {
            code,
            host_id: ctx.identity.clone(),
            question: question.into(),
        })?;
        return Ok(MutationAck::queued(key));
    };

    let session = apply_append(state, &store, &code, &ctx.identity, question).await?;
    Ok(MutationAck::applied(&session))
}

/// Generate a question through the configured backend and append it.
///
/// Generation needs the network either way, so this operation is never
/// queued; while degraded it fails immediately.
pub async fn generate_and_append(
    state: &SharedState,
    code: &str,
    ctx: SessionContext,
    topic: Option<String>,
) -> Result<MutationAck, ServiceError> {
    require_identity(&ctx)?;
    let code = checked_code(code)?;
    let client = super::generation_service::require_client(state)?;
    let store = state.require_session_store().await?;

    let session = load_session(&store, &code).await?;
    if !session.is_host(&ctx.identity) {
        return Err(ServiceError::NotAuthorized(
            "only the session host may generate questions".into(),
        ));
    }

    let prompts: Vec<String> = session
        .questions
        .iter()
        .map(|question| question.question.clone())
        .collect();
    let generated = client.generate_question(topic.as_deref(), &prompts).await?;
    let question = Question {
        question: generated.question,
        options: generated.options,
        correct_answer: generated.correct_answer,
        explanation: generated.explanation,
    };

    let session = apply_append(state, &store, &code, &ctx.identity, question).await?;
    Ok(MutationAck::applied(&session))
}

/// Read the current session document.
///
/// While degraded, falls back to the last snapshot this process observed.
pub async fn get_session(state: &SharedState, code: &str) -> Result<GameSession, ServiceError> {
    let code = checked_code(code)?;

    match state.session_store().await {
        Some(store) => {
            let session = load_session(&store, &code).await?;
            state.remember_snapshot(session.clone());
            Ok(session)
        }
        None => state.last_snapshot(&code).ok_or(ServiceError::Degraded),
    }
}

/// Host-only reconnect: fetch the authoritative document straight from the
/// store, bypassing the offline queue entirely.
pub async fn reconnect(
    state: &SharedState,
    code: &str,
    ctx: SessionContext,
) -> Result<GameSession, ServiceError> {
    require_identity(&ctx)?;
    let code = checked_code(code)?;
    let store = state.require_session_store().await?;

    let session = load_session(&store, &code).await?;
    if !session.is_host(&ctx.identity) {
        return Err(ServiceError::NotAuthorized(
            "only the session host may reconnect directly".into(),
        ));
    }

    info!(code, "host reconnected");
    publish(state, &session);
    Ok(session)
}

/// Replay everything waiting in the offline queue, in enqueue order.
///
/// A queued operation that fails to replay is logged and dropped; it never
/// blocks the operations behind it. Keys already recorded as applied are
/// skipped so an interrupted drain cannot double-apply.
pub async fn drain_outbox(state: &SharedState, store: &Arc<dyn SessionStore>) {
    if state.outbox().is_empty() {
        return;
    }

    state.set_draining(true);
    info!(pending = state.outbox().len(), "replaying offline queue");

    while let Some(pending) = state.outbox().pop() {
        if state.outbox().is_applied(pending.key) {
            debug!(key = %pending.key, "skipping already applied operation");
            continue;
        }

        let label = pending.intent.label();
        match apply_intent(state, store, pending.intent).await {
            Ok(()) => {
                state.outbox().mark_applied(pending.key);
                debug!(key = %pending.key, op = label, "replayed queued operation");
            }
            Err(err) => {
                warn!(key = %pending.key, op = label, error = %err, "dropping queued operation that failed to replay");
            }
        }
    }

    state.outbox().retire_applied();
    state.set_draining(false);
    info!("offline queue drained");
}

/// Apply one queued intent against the store.
async fn apply_intent(
    state: &SharedState,
    store: &Arc<dyn SessionStore>,
    intent: SessionIntent,
) -> Result<(), ServiceError> {
    match intent {
        SessionIntent::CreateSession { host_id, host_name } => {
            let ctx = SessionContext::named(host_id, host_name);
            create_with_codes(state, store, &ctx, candidate_codes(CODE_ATTEMPTS)).await?;
        }
        SessionIntent::JoinSession {
            code,
            player_id,
            user_name,
        } => {
            apply_join(state, store, &code, &player_id, &user_name).await?;
        }
        SessionIntent::SubmitAnswer {
            code,
            player_id,
            answer,
        } => {
            apply_submit(state, store, &code, &player_id, &answer).await?;
        }
        SessionIntent::AdvanceQuestion { code, host_id } => {
            apply_advance(state, store, &code, &host_id).await?;
        }
        SessionIntent::RestartSession { code, host_id } => {
            apply_restart(state, store, &code, &host_id).await?;
        }
        SessionIntent::AppendQuestion {
            code,
            host_id,
            question,
        } => {
            apply_append(state, store, &code, &host_id, question.into()).await?;
        }
    }
    Ok(())
}

async fn apply_join(
    state: &SharedState,
    store: &Arc<dyn SessionStore>,
    code: &str,
    identity: &str,
    user_name: &str,
) -> Result<GameSession, ServiceError> {
    let mut session = load_session(store, code).await?;
    if session.is_host(identity) {
        // The host is already part of the session; joining is a read.
        state.remember_snapshot(session.clone());
        return Ok(session);
    }

    if session.join(identity, user_name) {
        let player = player_entity(&session, identity)?;
        store.save_player(code.to_owned(), player).await?;
        info!(code, player = identity, "player joined session");
        publish(state, &session);
    } else {
        debug!(code, player = identity, "identity already joined; no-op");
        state.remember_snapshot(session.clone());
    }
    Ok(session)
}

async fn apply_submit(
    state: &SharedState,
    store: &Arc<dyn SessionStore>,
    code: &str,
    identity: &str,
    answer: &str,
) -> Result<GameSession, ServiceError> {
    let mut session = load_session(store, code).await?;

    match session.submit_answer(identity, answer)? {
        SubmitOutcome::Recorded { correct } => {
            let player = player_entity(&session, identity)?;
            store.save_player(code.to_owned(), player).await?;
            debug!(code, player = identity, correct, "answer recorded");
            publish(state, &session);
        }
        SubmitOutcome::AlreadyAnswered => {
            debug!(code, player = identity, "answer already recorded; no-op");
            state.remember_snapshot(session.clone());
        }
    }
    Ok(session)
}

async fn apply_advance(
    state: &SharedState,
    store: &Arc<dyn SessionStore>,
    code: &str,
    identity: &str,
) -> Result<GameSession, ServiceError> {
    let mut session = load_session(store, code).await?;

    let outcome = session.advance(identity)?;
    store.save_session(session.clone().into()).await?;
    match outcome {
        AdvanceOutcome::Advanced(index) => info!(code, index, "advanced to next question"),
        AdvanceOutcome::Ended => info!(code, "quiz ended"),
    }
    publish(state, &session);
    Ok(session)
}

async fn apply_restart(
    state: &SharedState,
    store: &Arc<dyn SessionStore>,
    code: &str,
    identity: &str,
) -> Result<GameSession, ServiceError> {
    let mut session = load_session(store, code).await?;

    let questions = {
        let mut rng = rand::rng();
        state.config().sample_questions(&mut rng)
    };
    session.restart(identity, questions)?;
    store.save_session(session.clone().into()).await?;
    info!(code, "session restarted");
    publish(state, &session);
    Ok(session)
}

async fn apply_append(
    state: &SharedState,
    store: &Arc<dyn SessionStore>,
    code: &str,
    identity: &str,
    question: Question,
) -> Result<GameSession, ServiceError> {
    let mut session = load_session(store, code).await?;

    session.append_question(identity, question)?;
    store.save_session(session.clone().into()).await?;
    info!(code, total = session.questions.len(), "question appended");
    publish(state, &session);
    Ok(session)
}

/// Uppercase and validate a session code taken from a request path.
pub fn checked_code(raw: &str) -> Result<String, ServiceError> {
    let code = raw.trim().to_ascii_uppercase();
    validate_session_code(&code).map_err(|err| {
        ServiceError::InvalidInput(
            err.message
                .map(|message| message.into_owned())
                .unwrap_or_else(|| "invalid session code".into()),
        )
    })?;
    Ok(code)
}

fn require_identity(ctx: &SessionContext) -> Result<(), ServiceError> {
    if ctx.identity.trim().is_empty() {
        return Err(ServiceError::IdentityNotReady(
            "the client identity has not been established yet".into(),
        ));
    }
    Ok(())
}

/// Hosting or joining additionally requires a display name.
fn require_participant(ctx: &SessionContext) -> Result<(), ServiceError> {
    require_identity(ctx)?;
    match ctx.display_name.as_deref() {
        Some(name) if !name.trim().is_empty() => Ok(()),
        _ => Err(ServiceError::IdentityNotReady(
            "a display name is required before hosting or joining".into(),
        )),
    }
}

async fn load_session(
    store: &Arc<dyn SessionStore>,
    code: &str,
) -> Result<GameSession, ServiceError> {
    let entity = store
        .find_session(code.to_owned())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no session with code {code}")))?;
    Ok(entity.into())
}

/// Broadcast the new authoritative snapshot and cache it locally.
fn publish(state: &SharedState, session: &GameSession) {
    sse_events::broadcast_snapshot(state, session);
    state.remember_snapshot(session.clone());
}

fn player_entity(
    session: &GameSession,
    identity: &str,
) -> Result<crate::dao::models::PlayerEntity, ServiceError> {
    session
        .players
        .get(identity)
        .cloned()
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(format!("player {identity} vanished from session")))
}

fn host_name(ctx: &SessionContext) -> String {
    ctx.display_name
        .clone()
        .unwrap_or_else(|| DEFAULT_HOST_NAME.to_owned())
}

fn player_name(ctx: &SessionContext) -> String {
    ctx.display_name
        .clone()
        .unwrap_or_else(|| DEFAULT_PLAYER_NAME.to_owned())
}

/// Pre-drawn random codes so the creation loop holds no RNG across awaits.
fn candidate_codes(attempts: u32) -> Vec<String> {
    let mut rng = rand::rng();
    (0..attempts).map(|_| random_code(&mut rng)).collect()
}

fn random_code(rng: &mut impl Rng) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_codes_are_four_uppercase_letters() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let code = random_code(&mut rng);
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn checked_code_normalizes_and_validates() {
        assert_eq!(checked_code(" abcd ").unwrap(), "ABCD");
        assert!(matches!(
            checked_code("ab"),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            checked_code("AB1D"),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn empty_identity_is_rejected() {
        let err = require_identity(&SessionContext::anonymous("  ")).unwrap_err();
        assert!(matches!(err, ServiceError::IdentityNotReady(_)));
        assert!(require_identity(&SessionContext::anonymous("client-1")).is_ok());
    }

    #[test]
    fn joining_without_a_display_name_is_rejected() {
        let err = require_participant(&SessionContext::anonymous("client-1")).unwrap_err();
        assert!(matches!(err, ServiceError::IdentityNotReady(_)));

        let err = require_participant(&SessionContext::named("client-1", " ")).unwrap_err();
        assert!(matches!(err, ServiceError::IdentityNotReady(_)));

        assert!(require_participant(&SessionContext::named("client-1", "Nia")).is_ok());
    }
}
