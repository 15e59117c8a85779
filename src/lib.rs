//! LinkHive Core Library
//!
//! Backend for saving, tagging and sharing links. Each saved link gets a
//! best-effort preview (thumbnail URL or embed markup), a type and a set of
//! tags drawn from a shared registry.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`preview`] - Link metadata resolver with a priority-ordered provider registry
//! - [`labels`] - Tag/type registry with race-safe get-or-create
//! - [`content`] - Content records and the create/update/delete workflow
//! - [`share`] - Public share tokens
//! - [`accounts`] - OTP-gated signup and signin
//! - [`auth`] - Password hashing, bearer tokens, request guard
//! - [`signup_cache`] - Ephemeral pending-signup storage (Redis or in-process)
//! - [`mail`] - Verification code delivery
//! - [`db`] - Database connection and schema management
//! - [`http`] - axum router and handlers
//! - [`config`] - Server configuration and validation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod accounts;
pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod entities;
pub mod http;
pub mod labels;
pub mod mail;
pub mod preview;
pub mod share;
pub mod signup_cache;

// Re-export commonly used types
pub use accounts::{AccountError, AccountService};
pub use config::{ConfigError, ServerConfig};
pub use content::{ContentError, ContentService, ContentStore, ContentUpdate, NewContent};
pub use db::{Database, DbError};
pub use entities::{ContentId, ContentRecord, Label, LabelId, User, UserId};
pub use http::{ApiError, AppState, StateDeps, router};
pub use labels::{LabelError, LabelKind, LabelRegistry, LabelRepository};
pub use preview::{
    PreviewArtifact, PreviewResolver, PreviewSource, VideoPreviewStyle,
    build_default_preview_resolver,
};
pub use share::{ShareError, ShareLink, ShareLinks};
pub use signup_cache::{MemorySignupCache, RedisSignupCache, SignupCache};
