//! Assume multiple AWS roles at once from an MFA-backed session.
//!
//! A run resolves the identity profile's long-term keys, trades them plus an
//! MFA code for session credentials, assumes every configured role with
//! those session credentials, and rewrites the shared credentials file with
//! `[identity]`, `[default]` and one stanza per role.

pub mod aws;
pub mod chain;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
