use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::rating::MatchResult;
use crate::schema::{SchemaConfig, SchemaIdentity};

/// Render a timestamp the way the store writes it.
///
/// Fixed-width UTC with microseconds, so lexical order equals time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|e| anyhow::anyhow!("Invalid timestamp '{}': {}", s, e))?
        .with_timezone(&Utc))
}

// ── Session lifecycle ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Running,
    Voting,
    Completed,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Voting => "voting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether review results may still be recorded.
    pub fn accepts_results(&self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "voting" => Ok(Self::Voting),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid session state: {}", s)),
        }
    }
}

/// The human verdict on a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    A,
    B,
    Tie,
}

impl Vote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::Tie => "tie",
        }
    }

    pub fn to_match_result(self) -> MatchResult {
        match self {
            Self::A => MatchResult::AWins,
            Self::B => MatchResult::BWins,
            Self::Tie => MatchResult::Tie,
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vote {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            "tie" => Ok(Self::Tie),
            _ => Err(format!("Invalid vote: {} (expected a, b or tie)", s)),
        }
    }
}

/// Which of the two schemas a review job belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Review jobs ──────────────────────────────────────────────────────

/// Opaque handle identifying one review job at the execution collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a fresh random handle.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Completion signal payload from the execution collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    #[serde(rename = "success")]
    Succeeded { issue_count: u32 },
    #[serde(rename = "error")]
    Failed { reason: String },
    #[serde(rename = "timeout")]
    TimedOut,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Reason string for an unsuccessful outcome.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Succeeded { .. } => None,
            Self::Failed { reason } => Some(reason.clone()),
            Self::TimedOut => Some("review job timed out".to_string()),
        }
    }
}

/// Stored result of a successful review job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub issue_count: u32,
    pub completed_at: DateTime<Utc>,
}

// ── Persistent records ───────────────────────────────────────────────

/// One A/B comparison between two schemas for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaSession {
    pub id: i64,
    pub project_id: i64,
    pub schema_a_config: SchemaConfig,
    pub schema_b_config: SchemaConfig,
    pub schema_a_hash: SchemaIdentity,
    pub schema_b_hash: SchemaIdentity,
    pub state: SessionState,
    pub review_a_ref: JobHandle,
    pub review_b_ref: JobHandle,
    pub review_a_result: Option<ReviewResult>,
    pub review_b_result: Option<ReviewResult>,
    pub vote: Option<Vote>,
    pub failure_reason: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub voting_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ArenaSession {
    pub fn job_ref(&self, side: Side) -> &JobHandle {
        match side {
            Side::A => &self.review_a_ref,
            Side::B => &self.review_b_ref,
        }
    }

    pub fn result(&self, side: Side) -> Option<&ReviewResult> {
        match side {
            Side::A => self.review_a_result.as_ref(),
            Side::B => self.review_b_result.as_ref(),
        }
    }

    pub fn schema_hash(&self, side: Side) -> &SchemaIdentity {
        match side {
            Side::A => &self.schema_a_hash,
            Side::B => &self.schema_b_hash,
        }
    }

    /// Which side a job handle belongs to, if either.
    pub fn side_of(&self, handle: &JobHandle) -> Option<Side> {
        if &self.review_a_ref == handle {
            Some(Side::A)
        } else if &self.review_b_ref == handle {
            Some(Side::B)
        } else {
            None
        }
    }

    pub fn has_both_results(&self) -> bool {
        self.review_a_result.is_some() && self.review_b_result.is_some()
    }
}

/// Leaderboard row: one per distinct schema identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRating {
    pub schema_hash: SchemaIdentity,
    pub schema_config: SchemaConfig,
    pub elo_rating: f64,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub avg_issues_found: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl SchemaRating {
    /// A fresh row with zero counters.
    pub fn new(
        schema_hash: SchemaIdentity,
        schema_config: SchemaConfig,
        initial_rating: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_hash,
            schema_config,
            elo_rating: initial_rating,
            games_played: 0,
            wins: 0,
            losses: 0,
            ties: 0,
            avg_issues_found: None,
            created_at: now,
            last_used_at: now,
        }
    }

    /// `games_played == wins + losses + ties`.
    pub fn counters_consistent(&self) -> bool {
        self.games_played == self.wins + self.losses + self.ties
    }

    /// Fraction of games won, ties counting half. `None` before the first game.
    pub fn win_rate(&self) -> Option<f64> {
        if self.games_played == 0 {
            return None;
        }
        Some((self.wins as f64 + 0.5 * self.ties as f64) / self.games_played as f64)
    }

    /// Record one finished game: counters, running issue mean, last use.
    ///
    /// `score` is this schema's match score (1 win, 0.5 tie, 0 loss).
    pub fn record_game(
        &mut self,
        new_rating: f64,
        score: f64,
        issues_found: u32,
        now: DateTime<Utc>,
    ) {
        self.elo_rating = new_rating;
        self.games_played += 1;
        if score >= 1.0 {
            self.wins += 1;
        } else if score <= 0.0 {
            self.losses += 1;
        } else {
            self.ties += 1;
        }
        let issues = issues_found as f64;
        self.avg_issues_found = Some(match self.avg_issues_found {
            Some(old) if self.games_played > 1 => {
                old + (issues - old) / self.games_played as f64
            }
            _ => issues,
        });
        self.last_used_at = now;
    }
}

/// Both updated leaderboard rows returned by a vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub session_id: i64,
    pub vote: Vote,
    pub schema_a: SchemaRating,
    pub schema_b: SchemaRating,
}
