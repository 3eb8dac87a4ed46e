//! Use-case services.
//!
//! # Responsibility
//! - `coordinator`: every mutation, gated, validated and transactional.
//! - `notifications`: in-app notification creation and the inbox.
//! - `dashboard`: read-only aggregate views.
//! - `identity`: registration and login.
//!
//! # Invariants
//! - Callers pass an explicit, already-authenticated actor; there is no
//!   ambient current user.

pub mod coordinator;
pub mod dashboard;
pub mod error;
pub mod identity;
pub mod notifications;
