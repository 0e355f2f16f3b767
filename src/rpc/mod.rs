//! RPC link between a remote coordinator and the process that owns the
//! control loop.
//!
//! ```text
//!   CoordinatorRemote ── RpcClient ── Transport ══ Transport ── RpcServer ── CoordinatorLocal
//! ```
//!
//! Frames are length-prefixed postcard envelopes (see [`codec`] and
//! [`protocol`]).

pub mod client;
pub mod codec;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::RpcClient;
pub use server::{RpcServer, serve_tcp};
pub use transport::{ChannelTransport, StreamTransport, Transport};
