// ABOUTME: Identity of a primitive: its type tag, session id, and session-open options.
// ABOUTME: The Primitive trait is the surface every facade shares.

use std::fmt;
use std::time::Duration;

use atomix_grpc::{Context, Result};
use atomix_proto::SessionOptions;

/// The kind of distributed data structure a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Counter,
    Election,
    IndexedMap,
    List,
    Lock,
    Map,
    Set,
    Value,
}

impl Type {
    pub fn as_str(self) -> &'static str {
        match self {
            Type::Counter => "Counter",
            Type::Election => "Election",
            Type::IndexedMap => "IndexedMap",
            Type::List => "List",
            Type::Lock => "Lock",
            Type::Map => "Map",
            Type::Set => "Set",
            Type::Value => "Value",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque, server-assigned session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Options applied to the open-session request, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveOption {
    /// Identifies this client to the server; also the election candidate id.
    ClientId(String),
    /// How long the server keeps the session alive without traffic.
    SessionTimeout(Duration),
}

impl PrimitiveOption {
    pub(crate) fn apply(&self, options: &mut SessionOptions) {
        match self {
            PrimitiveOption::ClientId(id) => options.client_id = id.clone(),
            PrimitiveOption::SessionTimeout(timeout) => {
                options.timeout_millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
            }
        }
    }
}

/// Surface shared by every primitive facade.
#[async_trait::async_trait]
pub trait Primitive: Send + Sync {
    fn primitive_type(&self) -> Type;

    fn name(&self) -> &str;

    fn session_id(&self) -> SessionId;

    /// Close the session. Not idempotent: a second close reports whatever the server does.
    async fn close(&self, ctx: &Context) -> Result<()>;
}

/// Implements `Primitive` for a facade holding its session in a `session` field.
///
/// Type parameters other than the trailing transport are listed in brackets.
macro_rules! impl_primitive {
    ($facade:ident $(<$($param:ident),+>)?) => {
        #[async_trait::async_trait]
        impl<$($($param: Send + Sync + 'static,)+)? T: atomix_grpc::Transport>
            $crate::primitive::Primitive for $facade<$($($param,)+)? T>
        {
            fn primitive_type(&self) -> $crate::primitive::Type {
                self.session.primitive_type()
            }

            fn name(&self) -> &str {
                self.session.name()
            }

            fn session_id(&self) -> $crate::primitive::SessionId {
                self.session.id()
            }

            async fn close(&self, ctx: &atomix_grpc::Context) -> atomix_grpc::Result<()> {
                self.session.close(ctx).await
            }
        }
    };
}
pub(crate) use impl_primitive;
