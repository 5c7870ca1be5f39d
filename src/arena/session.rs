//! Arena session state machine.
//!
//! ```text
//!   submit ──> created ──dispatch──> running ──both results──> voting ──vote──> completed
//!                 │                     │                        │
//!                 └──── job error ──────┴──> failed <── abandon ─┘
//! ```
//!
//! Transitions are pure: [`apply_event`] takes the current record and returns
//! the next one with `version` bumped. The store persists the result with a
//! compare-and-swap on the old version, so two writers racing on the same
//! session cannot both win.
//!
//! The two review jobs form a barrier. A result may arrive while the session
//! is still `created` (dispatch in flight); it is kept, and the barrier is
//! evaluated again when the session becomes `running`. `voting` is entered
//! exactly once, when the second successful result is present.

use chrono::{DateTime, Utc};

use super::models::{ArenaSession, JobOutcome, ReviewResult, SessionState, Side, Vote};

/// Something that happened to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Both review jobs were accepted by the execution collaborator.
    Dispatched,
    /// A review job reported its completion signal.
    JobFinished { side: Side, outcome: JobOutcome },
    /// Dispatch was rejected or the session could not be started.
    DispatchRejected { reason: String },
    /// A human verdict was cast.
    VoteCast(Vote),
    /// The abandonment policy expired a session that never got a vote.
    Abandoned { reason: String },
}

/// Why an event cannot be applied in the session's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub state: SessionState,
    pub message: String,
}

impl TransitionError {
    fn new(state: SessionState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session is {}: {}", self.state, self.message)
    }
}

impl std::error::Error for TransitionError {}

/// Compute the session that results from `event`.
pub fn apply_event(
    session: &ArenaSession,
    event: &SessionEvent,
    now: DateTime<Utc>,
) -> Result<ArenaSession, TransitionError> {
    let mut next = session.clone();
    let state = session.state;

    match event {
        SessionEvent::Dispatched => {
            if state != SessionState::Created {
                return Err(TransitionError::new(state, "jobs already dispatched"));
            }
            next.state = SessionState::Running;
            promote_if_ready(&mut next, now);
        }
        SessionEvent::DispatchRejected { reason } => {
            if state != SessionState::Created {
                return Err(TransitionError::new(state, "dispatch already settled"));
            }
            fail(&mut next, reason.clone(), now);
        }
        SessionEvent::JobFinished { side, outcome } => {
            if !state.accepts_results() {
                return Err(TransitionError::new(
                    state,
                    format!("result for side {} arrived after the session settled", side),
                ));
            }
            if session.result(*side).is_some() {
                return Err(TransitionError::new(
                    state,
                    format!("side {} already reported a result", side),
                ));
            }
            match outcome {
                JobOutcome::Succeeded { issue_count } => {
                    let result = ReviewResult {
                        issue_count: *issue_count,
                        completed_at: now,
                    };
                    match side {
                        Side::A => next.review_a_result = Some(result),
                        Side::B => next.review_b_result = Some(result),
                    }
                    promote_if_ready(&mut next, now);
                }
                JobOutcome::Failed { .. } | JobOutcome::TimedOut => {
                    let reason = outcome.failure_reason().unwrap_or_default();
                    fail(&mut next, format!("review {} failed: {}", side, reason), now);
                }
            }
        }
        SessionEvent::VoteCast(vote) => {
            match state {
                SessionState::Voting => {}
                SessionState::Completed => {
                    return Err(TransitionError::new(state, "vote already cast"));
                }
                _ if state.is_terminal() => {
                    return Err(TransitionError::new(state, "session ended without a vote"));
                }
                _ => return Err(TransitionError::new(state, "session is not awaiting a vote")),
            }
            if !session.has_both_results() {
                return Err(TransitionError::new(state, "review results are incomplete"));
            }
            next.state = SessionState::Completed;
            next.vote = Some(*vote);
            next.completed_at = Some(now);
        }
        SessionEvent::Abandoned { reason } => {
            if state != SessionState::Voting {
                return Err(TransitionError::new(state, "only sessions awaiting a vote can be abandoned"));
            }
            fail(&mut next, reason.clone(), now);
        }
    }

    next.version = session.version + 1;
    Ok(next)
}

fn promote_if_ready(session: &mut ArenaSession, now: DateTime<Utc>) {
    if session.state == SessionState::Running && session.has_both_results() {
        session.state = SessionState::Voting;
        session.voting_at = Some(now);
    }
}

fn fail(session: &mut ArenaSession, reason: String, now: DateTime<Utc>) {
    session.state = SessionState::Failed;
    session.failure_reason = Some(reason);
    session.completed_at = Some(now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::models::JobHandle;
    use crate::schema::{AgentConfig, SchemaConfig, SchemaIdentity};
    use proptest::prelude::*;

    fn new_session() -> ArenaSession {
        let a = SchemaConfig::new().with_role("general", AgentConfig::new("openai", "gpt-4o"));
        let b = SchemaConfig::new().with_role("general", AgentConfig::new("anthropic", "claude"));
        ArenaSession {
            id: 1,
            project_id: 10,
            schema_a_hash: SchemaIdentity::of(&a),
            schema_b_hash: SchemaIdentity::of(&b),
            schema_a_config: a,
            schema_b_config: b,
            state: SessionState::Created,
            review_a_ref: JobHandle::new("a"),
            review_b_ref: JobHandle::new("b"),
            review_a_result: None,
            review_b_result: None,
            vote: None,
            failure_reason: None,
            version: 0,
            created_at: Utc::now(),
            voting_at: None,
            completed_at: None,
        }
    }

    fn ok(side: Side, issue_count: u32) -> SessionEvent {
        SessionEvent::JobFinished {
            side,
            outcome: JobOutcome::Succeeded { issue_count },
        }
    }

    fn step(session: &ArenaSession, event: SessionEvent) -> ArenaSession {
        apply_event(session, &event, Utc::now()).unwrap()
    }

    #[test]
    fn test_happy_path_reaches_completed() {
        let s = step(&new_session(), SessionEvent::Dispatched);
        assert_eq!(s.state, SessionState::Running);
        let s = step(&s, ok(Side::A, 3));
        assert_eq!(s.state, SessionState::Running);
        let s = step(&s, ok(Side::B, 5));
        assert_eq!(s.state, SessionState::Voting);
        assert!(s.voting_at.is_some());
        let s = step(&s, SessionEvent::VoteCast(Vote::A));
        assert_eq!(s.state, SessionState::Completed);
        assert_eq!(s.vote, Some(Vote::A));
        assert!(s.completed_at.is_some());
        assert_eq!(s.version, 4);
    }

    #[test]
    fn test_results_before_dispatch_are_kept_and_promoted_on_dispatch() {
        let s = step(&new_session(), ok(Side::B, 1));
        let s = step(&s, ok(Side::A, 2));
        // Still created: the session never skips running.
        assert_eq!(s.state, SessionState::Created);
        let s = step(&s, SessionEvent::Dispatched);
        assert_eq!(s.state, SessionState::Voting);
    }

    #[test]
    fn test_job_failure_fails_session() {
        let s = step(&new_session(), SessionEvent::Dispatched);
        let s = step(
            &s,
            SessionEvent::JobFinished {
                side: Side::B,
                outcome: JobOutcome::Failed {
                    reason: "rate limited".into(),
                },
            },
        );
        assert_eq!(s.state, SessionState::Failed);
        assert!(s.failure_reason.unwrap().contains("rate limited"));
        assert!(s.completed_at.is_some());
    }

    #[test]
    fn test_timeout_fails_session() {
        let s = step(&new_session(), SessionEvent::Dispatched);
        let s = step(
            &s,
            SessionEvent::JobFinished {
                side: Side::A,
                outcome: JobOutcome::TimedOut,
            },
        );
        assert_eq!(s.state, SessionState::Failed);
    }

    #[test]
    fn test_vote_before_results_is_rejected() {
        let s = step(&new_session(), SessionEvent::Dispatched);
        let s = step(&s, ok(Side::A, 3));
        let err = apply_event(&s, &SessionEvent::VoteCast(Vote::B), Utc::now()).unwrap_err();
        assert_eq!(err.state, SessionState::Running);
    }

    #[test]
    fn test_second_vote_is_rejected() {
        let s = step(&new_session(), SessionEvent::Dispatched);
        let s = step(&s, ok(Side::A, 3));
        let s = step(&s, ok(Side::B, 3));
        let s = step(&s, SessionEvent::VoteCast(Vote::Tie));
        let err = apply_event(&s, &SessionEvent::VoteCast(Vote::Tie), Utc::now()).unwrap_err();
        assert_eq!(err.state, SessionState::Completed);
        assert!(err.message.contains("already cast"));
    }

    #[test]
    fn test_vote_on_failed_session_is_rejected() {
        let s = step(&new_session(), SessionEvent::Dispatched);
        let s = step(
            &s,
            SessionEvent::JobFinished {
                side: Side::B,
                outcome: JobOutcome::TimedOut,
            },
        );
        let err = apply_event(&s, &SessionEvent::VoteCast(Vote::A), Utc::now()).unwrap_err();
        assert_eq!(err.state, SessionState::Failed);
        assert!(err.message.contains("without a vote"));
    }

    #[test]
    fn test_duplicate_result_for_same_side_is_rejected() {
        let s = step(&new_session(), SessionEvent::Dispatched);
        let s = step(&s, ok(Side::A, 3));
        let err = apply_event(&s, &ok(Side::A, 4), Utc::now()).unwrap_err();
        assert!(err.message.contains("already reported"));
    }

    #[test]
    fn test_terminal_sessions_reject_everything() {
        let failed = step(
            &new_session(),
            SessionEvent::DispatchRejected {
                reason: "unknown project".into(),
            },
        );
        assert_eq!(failed.state, SessionState::Failed);
        for event in [
            SessionEvent::Dispatched,
            ok(Side::A, 1),
            SessionEvent::VoteCast(Vote::A),
            SessionEvent::Abandoned { reason: "x".into() },
        ] {
            assert!(apply_event(&failed, &event, Utc::now()).is_err());
        }
    }

    #[test]
    fn test_abandon_only_from_voting() {
        let s = step(&new_session(), SessionEvent::Dispatched);
        assert!(apply_event(&s, &SessionEvent::Abandoned { reason: "x".into() }, Utc::now()).is_err());
        let s = step(&s, ok(Side::A, 0));
        let s = step(&s, ok(Side::B, 0));
        let s = step(&s, SessionEvent::Abandoned { reason: "no vote".into() });
        assert_eq!(s.state, SessionState::Failed);
        assert_eq!(s.failure_reason.as_deref(), Some("no vote"));
    }

    proptest! {
        /// Any interleaving of dispatch and the two successes reaches voting
        /// only once both results are present, and always ends in voting.
        #[test]
        fn voting_requires_both_results(
            order in Just(vec![0u8, 1, 2]).prop_shuffle(),
            a_issues in 0u32..50,
            b_issues in 0u32..50,
        ) {
            let mut s = new_session();
            for ev in order {
                let event = match ev {
                    0 => SessionEvent::Dispatched,
                    1 => ok(Side::A, a_issues),
                    _ => ok(Side::B, b_issues),
                };
                s = apply_event(&s, &event, Utc::now()).unwrap();
                if s.state == SessionState::Voting {
                    prop_assert!(s.has_both_results());
                } else {
                    prop_assert!(!(s.has_both_results() && s.state == SessionState::Running));
                }
            }
            prop_assert_eq!(s.state, SessionState::Voting);
            prop_assert_eq!(s.review_a_result.unwrap().issue_count, a_issues);
            prop_assert_eq!(s.review_b_result.unwrap().issue_count, b_issues);
        }

        /// A failure anywhere in the interleaving ends in failed, never voting.
        #[test]
        fn any_failure_prevents_voting(
            order in Just(vec![0u8, 1, 2]).prop_shuffle(),
            failing_side in prop_oneof![Just(Side::A), Just(Side::B)],
        ) {
            let mut s = new_session();
            for ev in order {
                let event = match ev {
                    0 => SessionEvent::Dispatched,
                    1 | 2 => {
                        let side = if ev == 1 { Side::A } else { Side::B };
                        if side == failing_side {
                            SessionEvent::JobFinished {
                                side,
                                outcome: JobOutcome::Failed { reason: "boom".into() },
                            }
                        } else {
                            ok(side, 1)
                        }
                    }
                    _ => unreachable!(),
                };
                if let Ok(next) = apply_event(&s, &event, Utc::now()) {
                    s = next;
                }
                prop_assert_ne!(s.state, SessionState::Voting);
            }
            prop_assert_eq!(s.state, SessionState::Failed);
        }
    }
}
