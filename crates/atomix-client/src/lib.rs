// ABOUTME: Typed client for atomix distributed primitives over gRPC.
// ABOUTME: Sessions, watch streams, and one facade per primitive type.

pub mod client;
pub mod codec;
pub mod config;
pub mod counter;
pub mod election;
pub mod indexed_map;
pub mod list;
pub mod lock;
pub mod map;
pub mod meta;
pub mod primitive;
pub mod session;
pub mod set;
pub mod value;

mod gate;
mod pump;
mod watch;

#[cfg(test)]
mod testing;

pub use client::AtomixClient;
pub use codec::{BytesCodec, Codec, JsonCodec, StringCodec};
pub use config::ClientOptions;
pub use counter::Counter;
pub use election::Election;
pub use indexed_map::IndexedMap;
pub use list::List;
pub use lock::Lock;
pub use map::Map;
pub use meta::{ObjectMeta, Precondition, Revision};
pub use primitive::{Primitive, PrimitiveOption, SessionId, Type};
pub use session::{CallContext, Session};
pub use set::Set;
pub use value::Value;
pub use watch::WatchHook;

// Re-exports so callers need only this crate.
pub use atomix_grpc::{ChannelConfig, Context, ContextError, Error, ErrorKind, Result};
