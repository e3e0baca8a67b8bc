//! Conversation core — the Shop Foreman session manager.
//!
//! ARCHITECTURE
//! ============
//! Pure, synchronous state: messages, persona constants and the per-session
//! state machine. No I/O happens here; `services::chat` drives the
//! generation call between `begin_turn` and `settle`.

pub mod message;
pub mod persona;
pub mod session;

pub use message::Message;
pub use session::{ChatSession, SessionSnapshot, SubmitOutcome, SubmitRejection};
