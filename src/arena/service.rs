//! Arena operations: submit, route job results, vote, query, expire.
//!
//! `ArenaService` owns the store handle and the executor. Every public method
//! returns [`ArenaError`]; store failures surface as `Persistence`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::db::{Commit, DbHandle, NewSession};
use super::executor::{JobCompletion, ReviewExecutor, ReviewRequest};
use super::models::{ArenaSession, JobHandle, JobOutcome, SessionState, Side, Vote, VoteOutcome};
use super::ranking::{RankedSchema, RankingQuery, list_rankings, rank};
use super::session::{SessionEvent, TransitionError};
use crate::errors::ArenaError;
use crate::rating::{DEFAULT_INITIAL_RATING, EloEngine};
use crate::schema::{ProviderRegistry, SchemaConfig, SchemaIdentity};

/// Tunables the service needs from configuration.
#[derive(Debug, Clone)]
pub struct ArenaSettings {
    pub elo: EloEngine,
    pub initial_rating: f64,
    pub providers: ProviderRegistry,
    /// Sessions in `voting` longer than this may be expired. `None` keeps them.
    pub abandon_voting_after: Option<Duration>,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            elo: EloEngine::default(),
            initial_rating: DEFAULT_INITIAL_RATING,
            providers: ProviderRegistry::open(),
            abandon_voting_after: None,
        }
    }
}

pub struct ArenaService {
    db: DbHandle,
    executor: Arc<dyn ReviewExecutor>,
    settings: ArenaSettings,
}

impl ArenaService {
    pub fn new(db: DbHandle, executor: Arc<dyn ReviewExecutor>, settings: ArenaSettings) -> Self {
        Self {
            db,
            executor,
            settings,
        }
    }

    /// Validate two schemas, persist a session and dispatch both reviews.
    ///
    /// Nothing is written when validation fails. If either dispatch is
    /// rejected the session is persisted as `failed` and the other job is
    /// cancelled.
    pub async fn create_session(
        &self,
        project_id: i64,
        schema_a: SchemaConfig,
        schema_b: SchemaConfig,
    ) -> Result<ArenaSession, ArenaError> {
        self.validate_pair(&schema_a, &schema_b)?;

        let new = NewSession {
            project_id,
            schema_a,
            schema_b,
            review_a_ref: JobHandle::generate(),
            review_b_ref: JobHandle::generate(),
        };
        let initial = self.settings.initial_rating;
        let insert = new.clone();
        let session = self
            .db
            .call(move |db| db.create_session(&insert, initial))
            .await?;
        info!(
            session_id = session.id,
            project_id,
            schema_a = %session.schema_a_hash.short(),
            schema_b = %session.schema_b_hash.short(),
            "Arena session created"
        );

        let request = |side: Side| ReviewRequest {
            handle: session.job_ref(side).clone(),
            project_id,
            side,
            schema: match side {
                Side::A => new.schema_a.clone(),
                Side::B => new.schema_b.clone(),
            },
        };
        let (dispatch_a, dispatch_b) = tokio::join!(
            self.executor.dispatch(request(Side::A)),
            self.executor.dispatch(request(Side::B)),
        );

        let rejection = match (&dispatch_a, &dispatch_b) {
            (Ok(()), Ok(())) => None,
            (Err(e), _) => Some((Side::A, format!("{:#}", e))),
            (_, Err(e)) => Some((Side::B, format!("{:#}", e))),
        };

        if let Some((side, reason)) = rejection {
            for (dispatched, accepted_side) in [(&dispatch_a, Side::A), (&dispatch_b, Side::B)] {
                if dispatched.is_ok() {
                    self.executor.cancel(session.job_ref(accepted_side)).await;
                }
            }
            let reason = format!("dispatch of review {} rejected: {}", side, reason);
            warn!(session_id = session.id, %reason, "Review dispatch rejected");
            self.fail_dispatch(session.id, &reason).await?;
            return Err(ArenaError::ExecutionFailure {
                session_id: session.id,
                reason,
            });
        }

        match self.apply(session.id, SessionEvent::Dispatched).await? {
            Ok(running) => {
                info!(session_id = running.id, state = %running.state, "Review jobs dispatched");
                Ok(running)
            }
            // Only a job that already failed can move a session off `created`.
            Err(_) => {
                let current = self.get_session(session.id).await?;
                Err(ArenaError::ExecutionFailure {
                    session_id: current.id,
                    reason: current
                        .failure_reason
                        .unwrap_or_else(|| format!("session is {}", current.state)),
                })
            }
        }
    }

    /// Route a completion signal to its session.
    ///
    /// A failed or timed-out job fails the session and cancels the sibling.
    /// A duplicate or late signal is a `Conflict`.
    pub async fn record_job_result(
        &self,
        handle: JobHandle,
        outcome: JobOutcome,
    ) -> Result<ArenaSession, ArenaError> {
        let lookup = handle.clone();
        let session = self
            .db
            .call(move |db| db.find_session_by_job(&lookup))
            .await?
            .ok_or_else(|| ArenaError::UnknownJob {
                handle: handle.to_string(),
            })?;
        let Some(side) = session.side_of(&handle) else {
            return Err(ArenaError::UnknownJob {
                handle: handle.to_string(),
            });
        };

        let event = SessionEvent::JobFinished {
            side,
            outcome,
        };
        let updated = match self.apply(session.id, event).await? {
            Ok(updated) => updated,
            Err(conflict) => {
                warn!(
                    session_id = session.id,
                    job = %handle,
                    side = %side,
                    state = %conflict.state,
                    "Ignoring review result: {}",
                    conflict.message
                );
                return Err(ArenaError::conflict(
                    session.id,
                    conflict.state,
                    conflict.message,
                ));
            }
        };

        match updated.state {
            SessionState::Voting => info!(
                session_id = updated.id,
                issues_a = updated.review_a_result.map(|r| r.issue_count),
                issues_b = updated.review_b_result.map(|r| r.issue_count),
                "Both reviews finished; awaiting vote"
            ),
            SessionState::Failed => {
                warn!(
                    session_id = updated.id,
                    side = %side,
                    reason = updated.failure_reason.as_deref().unwrap_or(""),
                    "Review job failed; session failed"
                );
                if updated.result(side.other()).is_none() {
                    self.executor.cancel(updated.job_ref(side.other())).await;
                }
            }
            _ => debug!(session_id = updated.id, side = %side, "Review result stored"),
        }
        Ok(updated)
    }

    /// Record the human verdict and update both ratings atomically.
    pub async fn cast_vote(&self, session_id: i64, vote: Vote) -> Result<VoteOutcome, ArenaError> {
        let engine = self.settings.elo;
        let commit = self
            .db
            .call(move |db| db.commit_vote(session_id, vote, &engine, Utc::now()))
            .await?
            .ok_or(ArenaError::SessionNotFound { id: session_id })?;

        match commit {
            Commit::Applied(outcome) => {
                info!(
                    session_id,
                    vote = %vote,
                    schema_a = %outcome.schema_a.schema_hash.short(),
                    elo_a = outcome.schema_a.elo_rating,
                    schema_b = %outcome.schema_b.schema_hash.short(),
                    elo_b = outcome.schema_b.elo_rating,
                    "Vote recorded"
                );
                Ok(outcome)
            }
            Commit::Rejected(e) => {
                warn!(session_id, vote = %vote, state = %e.state, "Vote rejected: {}", e.message);
                Err(ArenaError::conflict(session_id, e.state, e.message))
            }
        }
    }

    pub async fn get_session(&self, id: i64) -> Result<ArenaSession, ArenaError> {
        self.db
            .call(move |db| db.get_session(id))
            .await?
            .ok_or(ArenaError::SessionNotFound { id })
    }

    pub async fn list_sessions(
        &self,
        project_id: Option<i64>,
        state: Option<SessionState>,
    ) -> Result<Vec<ArenaSession>, ArenaError> {
        Ok(self
            .db
            .call(move |db| db.list_sessions(project_id, state))
            .await?)
    }

    pub async fn list_rankings(&self, query: RankingQuery) -> Result<Vec<RankedSchema>, ArenaError> {
        let ratings = self.db.call(move |db| list_rankings(db, &query)).await?;
        Ok(rank(ratings))
    }

    /// Fail sessions that have waited in `voting` longer than the configured
    /// bound. Does nothing when no bound is configured.
    pub async fn expire_abandoned(&self, now: DateTime<Utc>) -> Result<Vec<ArenaSession>, ArenaError> {
        let Some(bound) = self.settings.abandon_voting_after else {
            debug!("No abandonment bound configured; keeping voting sessions");
            return Ok(Vec::new());
        };
        let bound_chrono = chrono::Duration::from_std(bound)
            .map_err(|e| ArenaError::validation(format!("abandonment bound out of range: {}", e)))?;
        let cutoff = now - bound_chrono;
        let reason = format!("abandoned: no vote within {}s", bound.as_secs());

        let expired = self
            .db
            .call(move |db| db.expire_voting_before(cutoff, &reason, now))
            .await?;
        for session in &expired {
            info!(session_id = session.id, "Expired abandoned session");
        }
        Ok(expired)
    }

    /// Drain executor completions into `record_job_result` until the channel
    /// closes.
    pub fn spawn_completion_listener(
        self: Arc<Self>,
        mut completions: mpsc::UnboundedReceiver<JobCompletion>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(completion) = completions.recv().await {
                let handle = completion.handle.clone();
                if let Err(e) = self
                    .record_job_result(completion.handle, completion.outcome)
                    .await
                {
                    warn!(job = %handle, error = %e, "Failed to record review result");
                }
            }
            debug!("Completion channel closed");
        })
    }

    fn validate_pair(&self, a: &SchemaConfig, b: &SchemaConfig) -> Result<(), ArenaError> {
        let mut problems = Vec::new();
        for (label, schema) in [("schema_a", a), ("schema_b", b)] {
            problems.extend(
                schema
                    .validate(&self.settings.providers)
                    .into_iter()
                    .map(|p| format!("{}: {}", label, p)),
            );
        }
        if !problems.is_empty() {
            return Err(ArenaError::Validation(problems.join("; ")));
        }
        let identity = SchemaIdentity::of(a);
        if identity == SchemaIdentity::of(b) {
            return Err(ArenaError::validation(format!(
                "schema_a and schema_b are identical ({}); a schema cannot play itself",
                identity.short()
            )));
        }
        Ok(())
    }

    /// Apply one event through the store. The outer `Result` is the store,
    /// the inner one the state machine's verdict.
    /// Record a dispatch rejection. A job that already failed the session
    /// keeps its own reason; the caller reports the dispatch error either way.
    async fn fail_dispatch(&self, session_id: i64, reason: &str) -> Result<ArenaSession, ArenaError> {
        let event = SessionEvent::DispatchRejected {
            reason: reason.to_string(),
        };
        match self.apply(session_id, event).await? {
            Ok(failed) => Ok(failed),
            Err(e) => {
                debug!(
                    session_id,
                    state = %e.state,
                    "Session settled before dispatch rejection was recorded: {}",
                    e.message
                );
                self.get_session(session_id).await
            }
        }
    }

    async fn apply(
        &self,
        session_id: i64,
        event: SessionEvent,
    ) -> Result<Result<ArenaSession, TransitionError>, ArenaError> {
        let commit = self
            .db
            .call(move |db| db.apply_session_event(session_id, &event, Utc::now()))
            .await?
            .ok_or(ArenaError::SessionNotFound { id: session_id })?;
        Ok(match commit {
            Commit::Applied(session) => Ok(session),
            Commit::Rejected(e) => Err(e),
        })
    }
}
