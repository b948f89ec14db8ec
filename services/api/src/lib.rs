//! Therapist API Library Crate
//!
//! The HTTP side of the AI therapist: it holds the only API key, mints
//! ephemeral realtime credentials for browsers and relays streamed chat
//! replies. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
