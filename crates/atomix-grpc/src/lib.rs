// ABOUTME: Shared gRPC plumbing for the atomix primitive client.
// ABOUTME: Provides channel creation, call contexts, the transport seam, error translation, and stream receive.

pub mod channel;
pub mod context;
pub mod error;
pub mod stream;
pub mod transport;

// Channel creation
pub use channel::{create_channel, ChannelConfig, KeepAliveConfig, DEFAULT_PORT};

// Cancellation and deadlines
pub use context::{Context, ContextError};

// Error types
pub use error::{Error, ErrorKind, Result};

// Stream management
pub use stream::{receive, Received};

// Transport
pub use transport::{MessageStream, Transport};

// Re-export tonic for implementors of Transport
pub use tonic;
