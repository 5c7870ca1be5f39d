//! Vote processing: turn one verdict into two leaderboard updates.
//!
//! [`plan_vote`] is pure. It validates the session transition and computes
//! what each rating row must become; the store applies the plan to both rows
//! and the session inside a single transaction (see `ArenaDb::commit_vote`),
//! so either all three writes land or none do.

use chrono::{DateTime, Utc};

use super::models::{ArenaSession, SchemaRating, Vote};
use super::session::{SessionEvent, TransitionError, apply_event};
use crate::rating::EloEngine;

/// One side's share of a finished game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameRecord {
    pub new_rating: f64,
    /// Match score for this side: 1 win, 0.5 tie, 0 loss.
    pub score: f64,
    pub issues_found: u32,
}

impl GameRecord {
    pub fn apply(&self, rating: &mut SchemaRating, now: DateTime<Utc>) {
        rating.record_game(self.new_rating, self.score, self.issues_found, now);
    }
}

/// Everything a vote changes.
#[derive(Debug, Clone, PartialEq)]
pub struct VotePlan {
    /// The session after the vote (state `completed`).
    pub session: ArenaSession,
    pub a: GameRecord,
    pub b: GameRecord,
}

/// Validate `vote` against `session` and compute the rating changes.
///
/// `rating_a` and `rating_b` must be the current rows for the session's two
/// schema hashes.
pub fn plan_vote(
    session: &ArenaSession,
    vote: Vote,
    rating_a: &SchemaRating,
    rating_b: &SchemaRating,
    engine: &EloEngine,
    now: DateTime<Utc>,
) -> Result<VotePlan, TransitionError> {
    debug_assert_eq!(rating_a.schema_hash, session.schema_a_hash);
    debug_assert_eq!(rating_b.schema_hash, session.schema_b_hash);

    let next = apply_event(session, &SessionEvent::VoteCast(vote), now)?;

    // apply_event only accepts a vote once both results exist.
    let issues_a = session.review_a_result.map(|r| r.issue_count).unwrap_or(0);
    let issues_b = session.review_b_result.map(|r| r.issue_count).unwrap_or(0);

    let result = vote.to_match_result();
    let (new_a, new_b) = engine.rate(rating_a.elo_rating, rating_b.elo_rating, result);
    let score_a = result.score_a();

    Ok(VotePlan {
        session: next,
        a: GameRecord {
            new_rating: new_a,
            score: score_a,
            issues_found: issues_a,
        },
        b: GameRecord {
            new_rating: new_b,
            score: 1.0 - score_a,
            issues_found: issues_b,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::models::{JobHandle, ReviewResult, SessionState};
    use crate::schema::{AgentConfig, SchemaConfig, SchemaIdentity};

    fn voting_session(issues_a: u32, issues_b: u32) -> ArenaSession {
        let a = SchemaConfig::new().with_role("general", AgentConfig::new("openai", "gpt-4o"));
        let b = SchemaConfig::new().with_role("general", AgentConfig::new("anthropic", "claude"));
        let now = Utc::now();
        ArenaSession {
            id: 9,
            project_id: 1,
            schema_a_hash: SchemaIdentity::of(&a),
            schema_b_hash: SchemaIdentity::of(&b),
            schema_a_config: a,
            schema_b_config: b,
            state: SessionState::Voting,
            review_a_ref: JobHandle::new("a"),
            review_b_ref: JobHandle::new("b"),
            review_a_result: Some(ReviewResult {
                issue_count: issues_a,
                completed_at: now,
            }),
            review_b_result: Some(ReviewResult {
                issue_count: issues_b,
                completed_at: now,
            }),
            vote: None,
            failure_reason: None,
            version: 3,
            created_at: now,
            voting_at: Some(now),
            completed_at: None,
        }
    }

    fn ratings(session: &ArenaSession) -> (SchemaRating, SchemaRating) {
        let now = Utc::now();
        (
            SchemaRating::new(
                session.schema_a_hash.clone(),
                session.schema_a_config.clone(),
                1500.0,
                now,
            ),
            SchemaRating::new(
                session.schema_b_hash.clone(),
                session.schema_b_config.clone(),
                1500.0,
                now,
            ),
        )
    }

    #[test]
    fn test_vote_a_on_equal_priors() {
        let session = voting_session(4, 6);
        let (mut ra, mut rb) = ratings(&session);
        let now = Utc::now();
        let plan = plan_vote(&session, Vote::A, &ra, &rb, &EloEngine::default(), now).unwrap();

        assert_eq!(plan.session.state, SessionState::Completed);
        assert_eq!(plan.session.vote, Some(Vote::A));

        plan.a.apply(&mut ra, now);
        plan.b.apply(&mut rb, now);
        assert_eq!(ra.elo_rating, 1516.0);
        assert_eq!(rb.elo_rating, 1484.0);
        assert_eq!((ra.wins, ra.losses, ra.ties), (1, 0, 0));
        assert_eq!((rb.wins, rb.losses, rb.ties), (0, 1, 0));
        assert_eq!(ra.avg_issues_found, Some(4.0));
        assert_eq!(rb.avg_issues_found, Some(6.0));
    }

    #[test]
    fn test_tie_on_equal_priors_keeps_ratings() {
        let session = voting_session(2, 2);
        let (mut ra, mut rb) = ratings(&session);
        let now = Utc::now();
        let plan = plan_vote(&session, Vote::Tie, &ra, &rb, &EloEngine::default(), now).unwrap();
        plan.a.apply(&mut ra, now);
        plan.b.apply(&mut rb, now);
        assert_eq!(ra.elo_rating, 1500.0);
        assert_eq!(rb.elo_rating, 1500.0);
        assert_eq!(ra.ties, 1);
        assert_eq!(rb.ties, 1);
        assert_eq!(ra.games_played, 1);
    }

    #[test]
    fn test_vote_b_mirrors_vote_a() {
        let session = voting_session(0, 0);
        let (ra, rb) = ratings(&session);
        let plan = plan_vote(&session, Vote::B, &ra, &rb, &EloEngine::default(), Utc::now()).unwrap();
        assert_eq!(plan.a.new_rating, 1484.0);
        assert_eq!(plan.b.new_rating, 1516.0);
        assert_eq!(plan.a.score, 0.0);
        assert_eq!(plan.b.score, 1.0);
    }

    #[test]
    fn test_plan_rejects_session_not_in_voting() {
        let mut session = voting_session(1, 1);
        session.state = SessionState::Completed;
        session.vote = Some(Vote::A);
        let (ra, rb) = ratings(&session);
        let err =
            plan_vote(&session, Vote::A, &ra, &rb, &EloEngine::default(), Utc::now()).unwrap_err();
        assert_eq!(err.state, SessionState::Completed);
    }
}
