//! # Bingo Relay Server
//!
//! Relay server for two-peer turn-based Bingo matches. One peer creates a
//! room identified by a short shareable code, a second joins it by code, and
//! from then on the server relays move, win-claim, retry, and exit events
//! between the two connections without interpreting game rules.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    BINGO RELAY SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  codes.rs      - Room code generation (injected, pure)       │
//! │  protocol.rs   - Channel-tagged JSON wire frames             │
//! │  registry.rs   - Concurrency-safe room store + lifecycle     │
//! │  connection.rs - Per-socket reader/writer pumps              │
//! │  dispatch.rs   - Inbound frame -> registry op + peer forward │
//! │  server.rs     - Axum shell: /, /health, /ws, CORS           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Relay Guarantees
//!
//! - Every mutation of a room is linearizable per code: concurrent joins of
//!   one room have exactly one winner.
//! - A connection's socket is written only by its own writer task; peers
//!   communicate solely through bounded delivery queues, in FIFO order.
//! - When either member's connection terminates, by any cause, the room is
//!   removed and the remaining peer receives an `exit-room` notification.
//! - Roles are derived from registry slot membership, never from the
//!   client-supplied `isCreator` flag.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod codes;
pub mod connection;
pub mod dispatch;
pub mod protocol;
pub mod registry;
pub mod server;

// Re-export commonly used types
pub use codes::{CodeGenerator, RandomCodeGenerator};
pub use connection::{ConnId, PeerHandle};
pub use protocol::{ClientFrame, ServerFrame};
pub use registry::{JoinError, Peer, Role, RoomState, SessionRegistry};
pub use server::{RelayServer, ServerConfig, ServerHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
