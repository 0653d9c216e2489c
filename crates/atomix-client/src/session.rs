// ABOUTME: Session handle: one open, server-acknowledged binding to one primitive instance.
// ABOUTME: Builds per-call contexts carrying the session id and issues translated RPCs.

use std::fmt;
use std::future::Future;

use atomix_grpc::{Context, Error, MessageStream, Result, Transport};
use atomix_proto::{
    CloseSessionRequest, CloseSessionResponse, OpenSessionRequest, OpenSessionResponse,
    PrimitiveId, SessionOptions, SessionPaths,
};
use prost::Message;
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::Request;
use tracing::Instrument;

use crate::primitive::{PrimitiveOption, SessionId, Type};

/// Metadata key carrying the session id on every call.
pub const SESSION_ID_HEADER: &str = "atomix-session-id";
/// Metadata key carrying the primitive type on every call.
pub const PRIMITIVE_TYPE_HEADER: &str = "atomix-primitive-type";
/// Metadata key carrying the primitive name on every call.
pub const PRIMITIVE_NAME_HEADER: &str = "atomix-primitive-name";

/// The caller's context plus the session's call metadata, for one call.
#[derive(Debug, Clone)]
pub struct CallContext {
    ctx: Context,
    metadata: MetadataMap,
}

impl CallContext {
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    /// Wrap `message` in a request scoped to the session and the caller's deadline.
    pub fn request<M>(&self, message: M) -> Request<M> {
        let mut request = Request::new(message);
        *request.metadata_mut() = self.metadata.clone();
        if let Some(remaining) = self.ctx.remaining() {
            request.set_timeout(remaining);
        }
        request
    }
}

/// An open session against one named primitive.
///
/// Sessions are not renewed by the client; `close` must be called explicitly.
#[derive(Clone)]
pub struct Session<T> {
    kind: Type,
    name: String,
    id: SessionId,
    client_id: String,
    transport: T,
    paths: SessionPaths,
    metadata: MetadataMap,
    span: tracing::Span,
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

fn metadata_value(field: &str, value: &str) -> Result<MetadataValue<tonic::metadata::Ascii>> {
    MetadataValue::try_from(value)
        .map_err(|_| Error::invalid(format!("{} '{}' is not valid call metadata", field, value)))
}

impl<T: Transport> Session<T> {
    /// Open a session on the primitive `name` of type `kind`.
    pub async fn open(
        ctx: &Context,
        transport: T,
        kind: Type,
        paths: SessionPaths,
        name: &str,
        options: &[PrimitiveOption],
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::invalid("primitive name must not be empty"));
        }

        let mut metadata = MetadataMap::new();
        metadata.insert(PRIMITIVE_TYPE_HEADER, metadata_value("type", kind.as_str())?);
        metadata.insert(PRIMITIVE_NAME_HEADER, metadata_value("name", name)?);

        let mut session_options = SessionOptions::default();
        for option in options {
            option.apply(&mut session_options);
        }
        let client_id = session_options.client_id.clone();

        let mut request = Request::new(OpenSessionRequest {
            primitive: Some(PrimitiveId {
                r#type: kind.as_str().to_string(),
                name: name.to_string(),
            }),
            options: Some(session_options),
        });
        if let Some(remaining) = ctx.remaining() {
            request.set_timeout(remaining);
        }

        let response: OpenSessionResponse = ctx
            .run(transport.unary(paths.open_session, request))
            .await?
            .into_inner();

        let id = SessionId(response.session_id);
        metadata.insert(SESSION_ID_HEADER, MetadataValue::from(id.0));

        let span = tracing::info_span!(
            "primitive",
            primitive = %kind,
            name = %name,
            session = %id,
        );
        tracing::debug!(parent: &span, "session opened");

        Ok(Self {
            kind,
            name: name.to_string(),
            id,
            client_id,
            transport,
            paths,
            metadata,
            span,
        })
    }

    pub fn primitive_type(&self) -> Type {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Client id the session was opened with; empty if none was given.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Attach this session to the caller's context for one call.
    pub fn context_for(&self, ctx: &Context) -> CallContext {
        CallContext {
            ctx: ctx.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Issue a unary call within the session, racing the caller's context.
    pub(crate) async fn unary<Req, Resp>(
        &self,
        ctx: &Context,
        path: &'static str,
        message: Req,
    ) -> Result<Resp>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        let call = self.context_for(ctx);
        let response = ctx
            .run(self.transport.unary(path, call.request(message)))
            .await?;
        Ok(response.into_inner())
    }

    /// Open a server stream within the session, racing the caller's context.
    pub(crate) async fn server_streaming<Req, Resp>(
        &self,
        ctx: &Context,
        path: &'static str,
        message: Req,
    ) -> Result<MessageStream<Resp>>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        let call = self.context_for(ctx);
        ctx.run(self.transport.server_streaming(path, call.request(message)))
            .await
    }

    /// Run a background task under this session's span.
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(task.instrument(self.span.clone()));
    }

    /// Close the session on the server.
    pub async fn close(&self, ctx: &Context) -> Result<()> {
        let mut request = Request::new(CloseSessionRequest { session_id: self.id.0 });
        if let Some(remaining) = ctx.remaining() {
            request.set_timeout(remaining);
        }
        let _: tonic::Response<CloseSessionResponse> = ctx
            .run(self.transport.unary(self.paths.close_session, request))
            .await?;
        tracing::debug!(parent: &self.span, "session closed");
        Ok(())
    }
}
