//! Planner domain model.
//!
//! # Responsibility
//! - Define the four record types persisted by the core.
//! - Define the `Entity` contract the repository and sync layers rely on.
//!
//! # Invariants
//! - Every record carries a stable `id`, `created_at`, and `updated_at`.
//! - Deletion is immediate; there are no tombstones.

pub mod daily_routine;
pub mod daily_task;
pub mod entity;
pub mod event;
pub mod trip;
