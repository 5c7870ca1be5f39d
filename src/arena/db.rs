use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::models::*;
use super::session::{SessionEvent, TransitionError, apply_event};
use super::vote::plan_vote;
use crate::rating::EloEngine;
use crate::schema::{SchemaConfig, SchemaIdentity};

/// Async-safe handle to the arena database.
///
/// Wraps `ArenaDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<ArenaDb>>,
}

impl DbHandle {
    pub fn new(db: ArenaDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&ArenaDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

/// Result of a guarded write: either the new record, or the reason the
/// session's current state refused the change. A refusal writes nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Commit<T> {
    Applied(T),
    Rejected(TransitionError),
}

/// Fields needed to insert a new session row.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub project_id: i64,
    pub schema_a: SchemaConfig,
    pub schema_b: SchemaConfig,
    pub review_a_ref: JobHandle,
    pub review_b_ref: JobHandle,
}

pub struct ArenaDb {
    conn: Connection,
}

impl ArenaDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_ratings (
                schema_hash TEXT PRIMARY KEY,
                schema_config TEXT NOT NULL,
                elo_rating REAL NOT NULL,
                games_played INTEGER NOT NULL DEFAULT 0 CHECK (games_played >= 0),
                wins INTEGER NOT NULL DEFAULT 0 CHECK (wins >= 0),
                losses INTEGER NOT NULL DEFAULT 0 CHECK (losses >= 0),
                ties INTEGER NOT NULL DEFAULT 0 CHECK (ties >= 0),
                avg_issues_found REAL,
                created_at TEXT NOT NULL,
                last_used_at TEXT NOT NULL,
                CHECK (games_played = wins + losses + ties)
            );

            CREATE TABLE IF NOT EXISTS arena_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                schema_a_config TEXT NOT NULL,
                schema_b_config TEXT NOT NULL,
                schema_a_hash TEXT NOT NULL REFERENCES schema_ratings(schema_hash),
                schema_b_hash TEXT NOT NULL REFERENCES schema_ratings(schema_hash),
                state TEXT NOT NULL DEFAULT 'created'
                    CHECK (state IN ('created', 'running', 'voting', 'completed', 'failed')),
                review_a_ref TEXT NOT NULL UNIQUE,
                review_b_ref TEXT NOT NULL UNIQUE,
                review_a_issues INTEGER,
                review_a_completed_at TEXT,
                review_b_issues INTEGER,
                review_b_completed_at TEXT,
                vote TEXT CHECK (vote IS NULL OR vote IN ('a', 'b', 'tie')),
                failure_reason TEXT,
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                voting_at TEXT,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_arena_sessions_project ON arena_sessions(project_id);
            CREATE INDEX IF NOT EXISTS idx_arena_sessions_state ON arena_sessions(state);
            CREATE INDEX IF NOT EXISTS idx_schema_ratings_elo ON schema_ratings(elo_rating DESC);
            ",
        )?;
        Ok(())
    }

    // ── Schema ratings ────────────────────────────────────────────────

    /// Return the rating row for `hash`, inserting a fresh one if absent.
    ///
    /// Concurrent first use of the same hash resolves on the primary key:
    /// the losing insert is a no-op and both callers read the same row.
    pub fn get_or_create_rating(
        &self,
        hash: &SchemaIdentity,
        config: &SchemaConfig,
        initial_rating: f64,
    ) -> Result<SchemaRating> {
        get_or_create_rating(&self.conn, hash, config, initial_rating, Utc::now())
    }

    pub fn get_rating(&self, hash: &SchemaIdentity) -> Result<Option<SchemaRating>> {
        read_rating(&self.conn, hash)
    }

    /// Atomic read-modify-write of one rating row.
    ///
    /// Fails if the row does not exist. A mutation that breaks the counter
    /// invariant or changes the key is rolled back.
    pub fn update_rating<F>(&self, hash: &SchemaIdentity, mutator: F) -> Result<SchemaRating>
    where
        F: FnOnce(&mut SchemaRating),
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin rating update")?;
        let updated = update_rating_in(&tx, hash, mutator)?;
        tx.commit().context("Failed to commit rating update")?;
        Ok(updated)
    }

    /// Ratings with at least `min_games` games, best first.
    ///
    /// Order: elo desc, games desc, created_at asc, schema_hash asc.
    pub fn query_ratings(&self, min_games: u32) -> Result<Vec<SchemaRating>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {RATING_COLUMNS} FROM schema_ratings
                 WHERE games_played >= ?1
                 ORDER BY elo_rating DESC, games_played DESC, created_at ASC, schema_hash ASC"
            ))
            .context("Failed to prepare query_ratings")?;
        let rows = stmt
            .query_map(params![min_games], rating_row)
            .context("Failed to query ratings")?;
        let mut ratings = Vec::new();
        for row in rows {
            ratings.push(row.context("Failed to read rating row")?.into_rating()?);
        }
        Ok(ratings)
    }

    // ── Sessions ──────────────────────────────────────────────────────

    /// Insert a session in `created`, upserting both rating rows in the same
    /// transaction so the foreign keys always resolve.
    pub fn create_session(&self, new: &NewSession, initial_rating: f64) -> Result<ArenaSession> {
        let now = Utc::now();
        let hash_a = SchemaIdentity::of(&new.schema_a);
        let hash_b = SchemaIdentity::of(&new.schema_b);

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin session insert")?;
        get_or_create_rating(&tx, &hash_a, &new.schema_a, initial_rating, now)?;
        get_or_create_rating(&tx, &hash_b, &new.schema_b, initial_rating, now)?;
        tx.execute(
            "INSERT INTO arena_sessions
                (project_id, schema_a_config, schema_b_config, schema_a_hash, schema_b_hash,
                 state, review_a_ref, review_b_ref, version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
            params![
                new.project_id,
                serde_json::to_string(&new.schema_a).context("Failed to encode schema A")?,
                serde_json::to_string(&new.schema_b).context("Failed to encode schema B")?,
                hash_a.as_str(),
                hash_b.as_str(),
                SessionState::Created.as_str(),
                new.review_a_ref.as_str(),
                new.review_b_ref.as_str(),
                format_timestamp(&now),
            ],
        )
        .context("Failed to insert arena session")?;
        let id = tx.last_insert_rowid();
        let session = read_session(&tx, id)?.context("Session not found after insert")?;
        tx.commit().context("Failed to commit session insert")?;
        Ok(session)
    }

    pub fn get_session(&self, id: i64) -> Result<Option<ArenaSession>> {
        read_session(&self.conn, id)
    }

    /// The session that owns `handle` on either side.
    pub fn find_session_by_job(&self, handle: &JobHandle) -> Result<Option<ArenaSession>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM arena_sessions
                 WHERE review_a_ref = ?1 OR review_b_ref = ?1"
            ))
            .context("Failed to prepare find_session_by_job")?;
        let row = stmt
            .query_row(params![handle.as_str()], session_row)
            .optional()
            .context("Failed to query session by job")?;
        row.map(SessionRow::into_session).transpose()
    }

    /// Sessions, newest first, optionally narrowed to one project and/or state.
    pub fn list_sessions(
        &self,
        project_id: Option<i64>,
        state: Option<SessionState>,
    ) -> Result<Vec<ArenaSession>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM arena_sessions
                 WHERE (?1 IS NULL OR project_id = ?1)
                   AND (?2 IS NULL OR state = ?2)
                 ORDER BY id DESC"
            ))
            .context("Failed to prepare list_sessions")?;
        let rows = stmt
            .query_map(params![project_id, state.map(|s| s.as_str())], session_row)
            .context("Failed to query sessions")?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row.context("Failed to read session row")?.into_session()?);
        }
        Ok(sessions)
    }

    /// Apply a lifecycle event to a session and persist it atomically.
    ///
    /// Returns `Ok(None)` when the session does not exist.
    pub fn apply_session_event(
        &self,
        id: i64,
        event: &SessionEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<Commit<ArenaSession>>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin session update")?;
        let Some(current) = read_session(&tx, id)? else {
            return Ok(None);
        };
        let next = match apply_event(&current, event, now) {
            Ok(next) => next,
            Err(e) => return Ok(Some(Commit::Rejected(e))),
        };
        if !write_session(&tx, &next, current.version)? {
            return Ok(Some(Commit::Rejected(stale_version(&current))));
        }
        let stored = read_session(&tx, id)?.context("Session not found after update")?;
        tx.commit().context("Failed to commit session update")?;
        Ok(Some(Commit::Applied(stored)))
    }

    /// Record a vote: complete the session and update both ratings in one
    /// transaction.
    ///
    /// Returns `Ok(None)` when the session does not exist.
    pub fn commit_vote(
        &self,
        id: i64,
        vote: Vote,
        engine: &EloEngine,
        now: DateTime<Utc>,
    ) -> Result<Option<Commit<VoteOutcome>>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin vote")?;
        let Some(session) = read_session(&tx, id)? else {
            return Ok(None);
        };
        let rating_a = read_rating(&tx, &session.schema_a_hash)?
            .with_context(|| format!("Rating row missing for {}", session.schema_a_hash))?;
        let rating_b = read_rating(&tx, &session.schema_b_hash)?
            .with_context(|| format!("Rating row missing for {}", session.schema_b_hash))?;

        let plan = match plan_vote(&session, vote, &rating_a, &rating_b, engine, now) {
            Ok(plan) => plan,
            Err(e) => return Ok(Some(Commit::Rejected(e))),
        };

        let schema_a = update_rating_in(&tx, &session.schema_a_hash, |r| plan.a.apply(r, now))?;
        let schema_b = update_rating_in(&tx, &session.schema_b_hash, |r| plan.b.apply(r, now))?;
        if !write_session(&tx, &plan.session, session.version)? {
            // Dropping the transaction rolls back both rating writes.
            return Ok(Some(Commit::Rejected(stale_version(&session))));
        }
        tx.commit().context("Failed to commit vote")?;

        Ok(Some(Commit::Applied(VoteOutcome {
            session_id: id,
            vote,
            schema_a,
            schema_b,
        })))
    }

    /// Fail every `voting` session that entered voting before `cutoff`.
    pub fn expire_voting_before(
        &self,
        cutoff: DateTime<Utc>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ArenaSession>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin expiry")?;
        let stale = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM arena_sessions
                     WHERE state = 'voting' AND voting_at < ?1
                     ORDER BY id"
                ))
                .context("Failed to prepare stale session query")?;
            let rows = stmt
                .query_map(params![format_timestamp(&cutoff)], session_row)
                .context("Failed to query stale sessions")?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row.context("Failed to read session row")?.into_session()?);
            }
            sessions
        };

        let event = SessionEvent::Abandoned {
            reason: reason.to_string(),
        };
        let mut expired = Vec::with_capacity(stale.len());
        for session in stale {
            let next = apply_event(&session, &event, now)
                .map_err(|e| anyhow::anyhow!("Cannot expire session {}: {}", session.id, e))?;
            if write_session(&tx, &next, session.version)? {
                expired.push(read_session(&tx, next.id)?.context("Session not found after expiry")?);
            }
        }
        tx.commit().context("Failed to commit expiry")?;
        Ok(expired)
    }
}

// ── Row access shared by plain calls and transactions ─────────────────

const RATING_COLUMNS: &str = "schema_hash, schema_config, elo_rating, games_played, wins, losses, ties, avg_issues_found, created_at, last_used_at";

const SESSION_COLUMNS: &str = "id, project_id, schema_a_config, schema_b_config, schema_a_hash, schema_b_hash, state, review_a_ref, review_b_ref, review_a_issues, review_a_completed_at, review_b_issues, review_b_completed_at, vote, failure_reason, version, created_at, voting_at, completed_at";

fn get_or_create_rating(
    conn: &Connection,
    hash: &SchemaIdentity,
    config: &SchemaConfig,
    initial_rating: f64,
    now: DateTime<Utc>,
) -> Result<SchemaRating> {
    let ts = format_timestamp(&now);
    conn.execute(
        "INSERT INTO schema_ratings
            (schema_hash, schema_config, elo_rating, games_played, wins, losses, ties,
             avg_issues_found, created_at, last_used_at)
         VALUES (?1, ?2, ?3, 0, 0, 0, 0, NULL, ?4, ?4)
         ON CONFLICT(schema_hash) DO NOTHING",
        params![
            hash.as_str(),
            serde_json::to_string(config).context("Failed to encode schema config")?,
            initial_rating,
            ts,
        ],
    )
    .context("Failed to upsert schema rating")?;
    read_rating(conn, hash)?.context("Schema rating not found after insert")
}

fn read_rating(conn: &Connection, hash: &SchemaIdentity) -> Result<Option<SchemaRating>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {RATING_COLUMNS} FROM schema_ratings WHERE schema_hash = ?1"
        ))
        .context("Failed to prepare get_rating")?;
    let row = stmt
        .query_row(params![hash.as_str()], rating_row)
        .optional()
        .context("Failed to query rating")?;
    row.map(RatingRow::into_rating).transpose()
}

fn update_rating_in<F>(conn: &Connection, hash: &SchemaIdentity, mutator: F) -> Result<SchemaRating>
where
    F: FnOnce(&mut SchemaRating),
{
    let mut rating =
        read_rating(conn, hash)?.with_context(|| format!("No rating row for schema {}", hash))?;
    mutator(&mut rating);

    if rating.schema_hash != *hash {
        anyhow::bail!("Rating mutation changed the schema hash of {}", hash);
    }
    if !rating.counters_consistent() {
        anyhow::bail!(
            "Rating mutation for {} breaks games_played = wins + losses + ties ({} != {} + {} + {})",
            hash,
            rating.games_played,
            rating.wins,
            rating.losses,
            rating.ties
        );
    }
    if !rating.elo_rating.is_finite() {
        anyhow::bail!("Rating mutation for {} produced a non-finite rating", hash);
    }

    conn.execute(
        "UPDATE schema_ratings
         SET elo_rating = ?1, games_played = ?2, wins = ?3, losses = ?4, ties = ?5,
             avg_issues_found = ?6, last_used_at = ?7
         WHERE schema_hash = ?8",
        params![
            rating.elo_rating,
            rating.games_played,
            rating.wins,
            rating.losses,
            rating.ties,
            rating.avg_issues_found,
            format_timestamp(&rating.last_used_at),
            hash.as_str(),
        ],
    )
    .context("Failed to update schema rating")?;
    read_rating(conn, hash)?.context("Schema rating not found after update")
}

fn read_session(conn: &Connection, id: i64) -> Result<Option<ArenaSession>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM arena_sessions WHERE id = ?1"
        ))
        .context("Failed to prepare get_session")?;
    let row = stmt
        .query_row(params![id], session_row)
        .optional()
        .context("Failed to query session")?;
    row.map(SessionRow::into_session).transpose()
}

/// Compare-and-swap on `version`. Returns false if another writer got there
/// first.
fn write_session(conn: &Connection, session: &ArenaSession, expected_version: i64) -> Result<bool> {
    let (a_issues, a_at) = split_result(session.review_a_result.as_ref());
    let (b_issues, b_at) = split_result(session.review_b_result.as_ref());
    let changed = conn
        .execute(
            "UPDATE arena_sessions
             SET state = ?1, review_a_issues = ?2, review_a_completed_at = ?3,
                 review_b_issues = ?4, review_b_completed_at = ?5, vote = ?6,
                 failure_reason = ?7, version = ?8, voting_at = ?9, completed_at = ?10
             WHERE id = ?11 AND version = ?12",
            params![
                session.state.as_str(),
                a_issues,
                a_at,
                b_issues,
                b_at,
                session.vote.map(|v| v.as_str()),
                session.failure_reason,
                session.version,
                session.voting_at.as_ref().map(format_timestamp),
                session.completed_at.as_ref().map(format_timestamp),
                session.id,
                expected_version,
            ],
        )
        .context("Failed to update arena session")?;
    Ok(changed == 1)
}

fn split_result(result: Option<&ReviewResult>) -> (Option<u32>, Option<String>) {
    match result {
        Some(r) => (Some(r.issue_count), Some(format_timestamp(&r.completed_at))),
        None => (None, None),
    }
}

fn stale_version(session: &ArenaSession) -> TransitionError {
    TransitionError {
        state: session.state,
        message: format!(
            "session {} was modified concurrently (version {})",
            session.id, session.version
        ),
    }
}

fn rating_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RatingRow> {
    Ok(RatingRow {
        schema_hash: row.get(0)?,
        schema_config: row.get(1)?,
        elo_rating: row.get(2)?,
        games_played: row.get(3)?,
        wins: row.get(4)?,
        losses: row.get(5)?,
        ties: row.get(6)?,
        avg_issues_found: row.get(7)?,
        created_at: row.get(8)?,
        last_used_at: row.get(9)?,
    })
}

fn session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        schema_a_config: row.get(2)?,
        schema_b_config: row.get(3)?,
        schema_a_hash: row.get(4)?,
        schema_b_hash: row.get(5)?,
        state: row.get(6)?,
        review_a_ref: row.get(7)?,
        review_b_ref: row.get(8)?,
        review_a_issues: row.get(9)?,
        review_a_completed_at: row.get(10)?,
        review_b_issues: row.get(11)?,
        review_b_completed_at: row.get(12)?,
        vote: row.get(13)?,
        failure_reason: row.get(14)?,
        version: row.get(15)?,
        created_at: row.get(16)?,
        voting_at: row.get(17)?,
        completed_at: row.get(18)?,
    })
}

/// Intermediate row struct for schema_ratings before parsing the hash,
/// config JSON and timestamps.
struct RatingRow {
    schema_hash: String,
    schema_config: String,
    elo_rating: f64,
    games_played: u32,
    wins: u32,
    losses: u32,
    ties: u32,
    avg_issues_found: Option<f64>,
    created_at: String,
    last_used_at: String,
}

impl RatingRow {
    fn into_rating(self) -> Result<SchemaRating> {
        let schema_hash = SchemaIdentity::from_str(&self.schema_hash)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse schema hash")?;
        let schema_config: SchemaConfig =
            serde_json::from_str(&self.schema_config).context("Failed to parse schema config JSON")?;
        Ok(SchemaRating {
            schema_hash,
            schema_config,
            elo_rating: self.elo_rating,
            games_played: self.games_played,
            wins: self.wins,
            losses: self.losses,
            ties: self.ties,
            avg_issues_found: self.avg_issues_found,
            created_at: parse_timestamp(&self.created_at)?,
            last_used_at: parse_timestamp(&self.last_used_at)?,
        })
    }
}

/// Intermediate row struct for arena_sessions.
struct SessionRow {
    id: i64,
    project_id: i64,
    schema_a_config: String,
    schema_b_config: String,
    schema_a_hash: String,
    schema_b_hash: String,
    state: String,
    review_a_ref: String,
    review_b_ref: String,
    review_a_issues: Option<u32>,
    review_a_completed_at: Option<String>,
    review_b_issues: Option<u32>,
    review_b_completed_at: Option<String>,
    vote: Option<String>,
    failure_reason: Option<String>,
    version: i64,
    created_at: String,
    voting_at: Option<String>,
    completed_at: Option<String>,
}

impl SessionRow {
    fn into_session(self) -> Result<ArenaSession> {
        let state = SessionState::from_str(&self.state)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse session state")?;
        let vote = self
            .vote
            .as_deref()
            .map(Vote::from_str)
            .transpose()
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse session vote")?;
        let schema_a_hash = SchemaIdentity::from_str(&self.schema_a_hash)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse schema A hash")?;
        let schema_b_hash = SchemaIdentity::from_str(&self.schema_b_hash)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse schema B hash")?;

        Ok(ArenaSession {
            id: self.id,
            project_id: self.project_id,
            schema_a_config: serde_json::from_str(&self.schema_a_config)
                .context("Failed to parse schema A config JSON")?,
            schema_b_config: serde_json::from_str(&self.schema_b_config)
                .context("Failed to parse schema B config JSON")?,
            schema_a_hash,
            schema_b_hash,
            state,
            review_a_ref: JobHandle::new(self.review_a_ref),
            review_b_ref: JobHandle::new(self.review_b_ref),
            review_a_result: join_result(self.review_a_issues, self.review_a_completed_at)?,
            review_b_result: join_result(self.review_b_issues, self.review_b_completed_at)?,
            vote,
            failure_reason: self.failure_reason,
            version: self.version,
            created_at: parse_timestamp(&self.created_at)?,
            voting_at: self.voting_at.as_deref().map(parse_timestamp).transpose()?,
            completed_at: self.completed_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn join_result(issues: Option<u32>, completed_at: Option<String>) -> Result<Option<ReviewResult>> {
    match (issues, completed_at) {
        (Some(issue_count), Some(at)) => Ok(Some(ReviewResult {
            issue_count,
            completed_at: parse_timestamp(&at)?,
        })),
        (None, None) => Ok(None),
        _ => anyhow::bail!("Review result columns are half-populated"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
