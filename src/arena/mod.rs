//! Review arena: blind A/B comparison of review schemas.
//!
//! ## Overview
//!
//! A session pits two schema configurations against the same project. Both
//! reviews run in the execution collaborator; when both finish a human casts
//! a vote, and the vote updates each schema's Elo rating in one transaction.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (router, service wiring)             │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘          │         │                                        │
//!                       │         v                                        │
//!                       │  service.rs  (ArenaService)                      │
//!                       │     │            │                               │
//!                       │     │ dispatch   │ apply_event / commit_vote     │
//!                       │     v            v                               │
//!                       │  executor.rs   db.rs ── session.rs, vote.rs      │
//!                       │  (ReviewExecutor)      (state machine, Elo plan) │
//!                       │     │                                            │
//!                       │     └── JobCompletion ──> service (mpsc)         │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module    | Responsibility                                            |
//! |-----------|-----------------------------------------------------------|
//! | `models`  | `ArenaSession`, `SchemaRating`, `SessionState`, `Vote`     |
//! | `ranking` | Leaderboard filters and `RankedSchema`                     |

pub mod api;
pub mod db;
pub mod executor;
pub mod models;
pub mod ranking;
pub mod server;
pub mod service;
pub mod session;
pub mod vote;
