//! Use-case services over the local stores.
//!
//! # Responsibility
//! - Combine repository calls into application-level operations.
//! - Keep callers decoupled from storage details.

pub mod daily_plan_service;

pub use daily_plan_service::DailyPlanService;
