// ABOUTME: Distributed set of elements encoded through a codec.
// ABOUTME: Add/remove report presence as a bool; watches stream add/remove/replay events.

use std::fmt;
use std::sync::Arc;

use atomix_grpc::{Context, Result, Transport};
use atomix_proto::set as pb;
use tokio::sync::mpsc;
use tonic::transport::Channel;

use crate::codec::{decode_or_skip, encode_string, Codec};
use crate::primitive::{impl_primitive, PrimitiveOption, Type};
use crate::session::Session;
use crate::watch::WatchHook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A value was added to the set.
    Add,
    /// A value was removed from the set.
    Remove,
    /// An existing value, streamed because replay was requested.
    Replay,
}

/// A set change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<E = String> {
    pub kind: EventType,
    pub value: E,
}

impl<E: 'static> Event<E> {
    fn from_proto(response: pb::EventsResponse, codec: &dyn Codec<E>) -> Option<Self> {
        let event = response.event?;
        let kind = match pb::event::Type::try_from(event.r#type).ok()? {
            pb::event::Type::Add => EventType::Add,
            pb::event::Type::Remove => EventType::Remove,
            pb::event::Type::Replay => EventType::Replay,
            pb::event::Type::None => return None,
        };
        let element = event.element.map(|e| e.value).unwrap_or_default();
        Some(Event {
            kind,
            value: decode_or_skip(codec, element.as_bytes(), "set watch")?,
        })
    }
}

/// Options for `Set::watch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOption {
    /// Stream every existing element as a `Replay` event before live changes.
    Replay,
}

impl WatchHook<pb::EventsRequest, pb::EventsResponse> for WatchOption {
    fn before_watch(&self, request: &mut pb::EventsRequest) {
        match self {
            WatchOption::Replay => request.replay = true,
        }
    }
}

/// A distributed set whose elements are stored through a [`Codec`].
pub struct Set<E = String, T = Channel> {
    session: Session<T>,
    codec: Arc<dyn Codec<E>>,
}

impl<E, T: Clone> Clone for Set<E, T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<E, T> fmt::Debug for Set<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Set")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl_primitive!(Set<E>);

impl<E: Send + Sync + 'static, T: Transport> Set<E, T> {
    pub async fn open(
        ctx: &Context,
        transport: T,
        name: &str,
        codec: impl Codec<E>,
        options: &[PrimitiveOption],
    ) -> Result<Self> {
        let session = Session::open(ctx, transport, Type::Set, pb::SESSION, name, options).await?;
        Ok(Self {
            session,
            codec: Arc::new(codec),
        })
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    fn element(&self, value: impl Into<E>) -> Result<Option<pb::Element>> {
        let value = encode_string(self.codec.as_ref(), &value.into())?;
        Ok(Some(pb::Element { value }))
    }

    /// Add `value`. Returns false if it was already present.
    pub async fn add(&self, ctx: &Context, value: impl Into<E>) -> Result<bool> {
        let request = pb::AddRequest {
            element: self.element(value)?,
        };
        match self
            .session
            .unary::<_, pb::AddResponse>(ctx, pb::ADD, request)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.is_already_exists() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Remove `value`. Returns false if it was not present.
    pub async fn remove(&self, ctx: &Context, value: impl Into<E>) -> Result<bool> {
        let request = pb::RemoveRequest {
            element: self.element(value)?,
        };
        match self
            .session
            .unary::<_, pb::RemoveResponse>(ctx, pb::REMOVE, request)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn contains(&self, ctx: &Context, value: impl Into<E>) -> Result<bool> {
        let request = pb::ContainsRequest {
            element: self.element(value)?,
        };
        let response: pb::ContainsResponse =
            self.session.unary(ctx, pb::CONTAINS, request).await?;
        Ok(response.contains)
    }

    pub async fn len(&self, ctx: &Context) -> Result<usize> {
        let response: pb::SizeResponse =
            self.session.unary(ctx, pb::SIZE, pb::SizeRequest {}).await?;
        Ok(response.size as usize)
    }

    pub async fn is_empty(&self, ctx: &Context) -> Result<bool> {
        Ok(self.len(ctx).await? == 0)
    }

    pub async fn clear(&self, ctx: &Context) -> Result<()> {
        let _: pb::ClearResponse = self.session.unary(ctx, pb::CLEAR, pb::ClearRequest {}).await?;
        Ok(())
    }

    /// Stream the current elements to `tx`, which is closed after the last one.
    ///
    /// Elements that do not decode are logged and skipped.
    pub async fn elements(&self, ctx: &Context, tx: mpsc::Sender<E>) -> Result<()> {
        let codec = self.codec.clone();
        self.session
            .elements(ctx, pb::ELEMENTS, pb::ElementsRequest {}, tx, move |response: pb::ElementsResponse| {
                let element = response.element?;
                decode_or_skip(codec.as_ref(), element.value.as_bytes(), "set elements")
            })
            .await
    }

    /// Watch the set for changes.
    ///
    /// Returns once the stream is live. Events are then pushed onto `tx` in
    /// server order; `tx` is closed when the watch ends for any reason.
    pub async fn watch(
        &self,
        ctx: &Context,
        tx: mpsc::Sender<Event<E>>,
        options: &[WatchOption],
    ) -> Result<()> {
        let codec = self.codec.clone();
        self.session
            .watch(
                ctx,
                pb::EVENTS,
                pb::EventsRequest::default(),
                options.to_vec(),
                tx,
                move |response| Event::from_proto(response, codec.as_ref()),
            )
            .await
    }

    pub async fn close(&self, ctx: &Context) -> Result<()> {
        self.session.close(ctx).await
    }
}
