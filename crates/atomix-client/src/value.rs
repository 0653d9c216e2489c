// ABOUTME: Distributed single value: versioned and encoded through a codec, with optimistic updates.
// ABOUTME: Watches stream every update together with its new revision.

use std::fmt;
use std::sync::Arc;

use atomix_grpc::{Context, Result, Transport};
use atomix_proto::value as pb;
use tokio::sync::mpsc;
use tonic::transport::Channel;

use crate::codec::{decode_or_skip, Codec};
use crate::meta::{preconditions_to_proto, ObjectMeta, Precondition};
use crate::primitive::{impl_primitive, PrimitiveOption, Type};
use crate::session::Session;
use crate::watch::NoWatchOption;

/// The value changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<V = Vec<u8>> {
    pub value: V,
    pub meta: ObjectMeta,
}

impl<V: 'static> Event<V> {
    fn from_proto(response: pb::EventsResponse, codec: &dyn Codec<V>) -> Option<Self> {
        let event = response.event?;
        match pb::event::Type::try_from(event.r#type).ok()? {
            pb::event::Type::Update => Some(Event {
                value: decode_or_skip(codec, &event.value, "value watch")?,
                meta: ObjectMeta::from_proto(event.meta),
            }),
            pb::event::Type::None => None,
        }
    }
}

pub struct Value<V = Vec<u8>, T = Channel> {
    session: Session<T>,
    codec: Arc<dyn Codec<V>>,
}

impl<V, T: Clone> Clone for Value<V, T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<V, T> fmt::Debug for Value<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl_primitive!(Value<V>);

impl<V: Send + Sync + 'static, T: Transport> Value<V, T> {
    pub async fn open(
        ctx: &Context,
        transport: T,
        name: &str,
        codec: impl Codec<V>,
        options: &[PrimitiveOption],
    ) -> Result<Self> {
        let session =
            Session::open(ctx, transport, Type::Value, pb::SESSION, name, options).await?;
        Ok(Self {
            session,
            codec: Arc::new(codec),
        })
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Replace the value, returning its new metadata.
    pub async fn set(
        &self,
        ctx: &Context,
        value: impl Into<V>,
        preconditions: &[Precondition],
    ) -> Result<ObjectMeta> {
        let request = pb::SetRequest {
            value: self.codec.encode(&value.into())?,
            preconditions: preconditions_to_proto(preconditions),
        };
        let response: pb::SetResponse = self.session.unary(ctx, pb::SET, request).await?;
        Ok(ObjectMeta::from_proto(response.meta))
    }

    /// Current value and metadata, or `None` if the value was never set.
    pub async fn get(&self, ctx: &Context) -> Result<Option<(V, ObjectMeta)>> {
        let response: pb::GetResponse =
            self.session.unary(ctx, pb::GET, pb::GetRequest {}).await?;
        let meta = ObjectMeta::from_proto(response.meta);
        if meta.revision.0 == 0 {
            return Ok(None);
        }
        Ok(Some((self.codec.decode(&response.value)?, meta)))
    }

    /// Watch for updates. Returns once the stream is live.
    ///
    /// Updates whose value does not decode are logged and skipped.
    pub async fn watch(&self, ctx: &Context, tx: mpsc::Sender<Event<V>>) -> Result<()> {
        let codec = self.codec.clone();
        self.session
            .watch(
                ctx,
                pb::EVENTS,
                pb::EventsRequest {},
                Vec::<NoWatchOption>::new(),
                tx,
                move |response| Event::from_proto(response, codec.as_ref()),
            )
            .await
    }

    pub async fn close(&self, ctx: &Context) -> Result<()> {
        self.session.close(ctx).await
    }
}
