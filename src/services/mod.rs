//! Services — domain logic behind the HTTP routes.
//!
//! `chat` owns the session registry and drives each turn, `lead` relays the
//! contact form, and `sweeper` evicts abandoned sessions in the background.

pub mod chat;
pub mod lead;
pub mod sweeper;
