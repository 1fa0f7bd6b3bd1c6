//! Wire protocol for shipping [`logline_types::message::LogMessage`] values
//! to a collector daemon over TCP (spec §3-§5).
//!
//! - [`framer`] splits a byte stream into logical lines and handles the
//!   backslash-continuation and dot-stuffing conventions.
//! - [`codec`] formats/parses commands and replies out of those lines.
//! - [`message_codec`] converts between `WRITE` commands and
//!   [`logline_types::message::LogMessage`].
//! - [`channel`] drives one end of a connection: greeting, send queue,
//!   heartbeats, and command/reply correlation.
//! - [`server`] accepts connections and spawns a [`channel::Channel`] per
//!   peer.
//! - [`client`] dials a collector, with an optional auto-reconnect façade.

#![deny(missing_debug_implementations)]

pub mod channel;
pub mod client;
pub mod codec;
pub mod error;
pub mod framer;
pub mod message_codec;
pub mod server;

pub use channel::{Backpressure, Channel, ChannelConfig, ChannelRole, Inbound, ShutdownCause};
pub use error::{FramingError, ProtocolParseError};
