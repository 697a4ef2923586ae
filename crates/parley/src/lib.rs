//! # Parley
//!
//! Real-time presence and private-messaging relay over WebSocket.
//!
//! Clients connect, claim a unique display name, see who else is online
//! through full `users_list` snapshots, and send each other direct
//! messages addressed by name. Everything lives in memory; nothing is
//! persisted.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn start() -> Result<(), ParleyError> {
//! let server = ParleyServer::<JsonCodec>::builder()
//!     .bind("0.0.0.0:3001")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::ParleyError;
pub use server::{DEFAULT_BIND_ADDR, ParleyServer, ParleyServerBuilder, ServerConfig};

pub use parley_presence as presence;
pub use parley_protocol as protocol;
pub use parley_session as session;
pub use parley_transport as transport;

/// Everything needed to configure and run a relay.
pub mod prelude {
    pub use crate::{
        DEFAULT_BIND_ADDR, ParleyError, ParleyServer, ParleyServerBuilder,
        ServerConfig,
    };
    pub use parley_protocol::{ClientEvent, Codec, JsonCodec, ServerEvent};
    pub use parley_session::{SessionConfig, SessionError};
}
