#![deny(missing_debug_implementations)]

//! Misuse-resistant data structures for the logline wire protocol and
//! message model (spec §3). No I/O and no parsing logic beyond value
//! validation lives here; see `logline-proto` for the codec and
//! `logline-filter` for the collection/filter engine.

pub mod command;
pub mod core;
pub mod error;
pub mod field_map;
pub mod message;
pub mod state;

pub use command::{Command, Header, Reply};
pub use core::{CommandId, Verb};
pub use error::ValidationError;
pub use message::{LogMessage, ScalarField, TagSet};
pub use state::ChannelState;
