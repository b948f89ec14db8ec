//! Core logic for the AI therapist client.
//!
//! - `voice`: the realtime voice session controller and its platform seams.
//! - `chat`: streamed text chat and the conversation history it feeds.
//! - `persona`: the therapist prompts shared by both modes.

pub mod chat;
pub mod persona;
pub mod voice;
