//! Wire protocol for Parley.
//!
//! This crate defines what clients and the relay say to each other:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`]): the events that travel
//!   on the wire, one per frame.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those events are
//!   converted to and from frame bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! The protocol layer knows nothing about connections or names; it sits
//! between transport (raw bytes) and the presence service.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Session (names, routing)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientEvent, ServerEvent};
