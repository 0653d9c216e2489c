// ABOUTME: Distributed ordered list of codec-encoded values addressed by index.
// ABOUTME: Watch events carry the index the change applied to.

use std::fmt;
use std::sync::Arc;

use atomix_grpc::{Context, Error, Result, Transport};
use atomix_proto::list as pb;
use tokio::sync::mpsc;
use tonic::transport::Channel;

use crate::codec::{decode_or_skip, decode_string, encode_string, Codec};
use crate::primitive::{impl_primitive, PrimitiveOption, Type};
use crate::session::Session;
use crate::watch::WatchHook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Add,
    Remove,
    Replay,
}

/// A list change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<E = String> {
    pub kind: EventType,
    pub index: usize,
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
        let item = event.item.unwrap_or_default();
        Some(Event {
            kind,
            index: item.index as usize,
            value: decode_or_skip(codec, item.value.as_bytes(), "list watch")?,
        })
    }
}

/// Options for `List::watch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOption {
    /// Stream every existing item as a `Replay` event first.
    Replay,
}

impl WatchHook<pb::EventsRequest, pb::EventsResponse> for WatchOption {
    fn before_watch(&self, request: &mut pb::EventsRequest) {
        match self {
            WatchOption::Replay => request.replay = true,
        }
    }
}

fn wire_index(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| Error::invalid(format!("index {} out of range", index)))
}

pub struct List<E = String, T = Channel> {
    session: Session<T>,
    codec: Arc<dyn Codec<E>>,
}

impl<E, T: Clone> Clone for List<E, T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<E, T> fmt::Debug for List<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl_primitive!(List<E>);

impl<E: Send + Sync + 'static, T: Transport> List<E, T> {
    pub async fn open(
        ctx: &Context,
        transport: T,
        name: &str,
        codec: impl Codec<E>,
        options: &[PrimitiveOption],
    ) -> Result<Self> {
        let session =
            Session::open(ctx, transport, Type::List, pb::SESSION, name, options).await?;
        Ok(Self {
            session,
            codec: Arc::new(codec),
        })
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    fn encode(&self, value: impl Into<E>) -> Result<String> {
        encode_string(self.codec.as_ref(), &value.into())
    }

    fn item_value(&self, item: Option<pb::Item>) -> Result<E> {
        let value = item.map(|i| i.value).unwrap_or_default();
        decode_string(self.codec.as_ref(), &value)
    }

    /// Append `value`, returning the index it landed at.
    pub async fn append(&self, ctx: &Context, value: impl Into<E>) -> Result<usize> {
        let request = pb::AppendRequest {
            value: self.encode(value)?,
        };
        let response: pb::AppendResponse = self.session.unary(ctx, pb::APPEND, request).await?;
        Ok(response.item.map(|i| i.index as usize).unwrap_or_default())
    }

    /// Insert `value` before `index`. Indexes past the end are `Invalid`.
    pub async fn insert(&self, ctx: &Context, index: usize, value: impl Into<E>) -> Result<()> {
        let request = pb::InsertRequest {
            index: wire_index(index)?,
            value: self.encode(value)?,
        };
        let _: pb::InsertResponse = self.session.unary(ctx, pb::INSERT, request).await?;
        Ok(())
    }

    pub async fn get(&self, ctx: &Context, index: usize) -> Result<E> {
        let request = pb::GetRequest {
            index: wire_index(index)?,
        };
        let response: pb::GetResponse = self.session.unary(ctx, pb::GET, request).await?;
        self.item_value(response.item)
    }

    /// Replace the value at `index`.
    pub async fn set(&self, ctx: &Context, index: usize, value: impl Into<E>) -> Result<()> {
        let request = pb::SetRequest {
            index: wire_index(index)?,
            value: self.encode(value)?,
        };
        let _: pb::SetResponse = self.session.unary(ctx, pb::SET, request).await?;
        Ok(())
    }

    /// Remove the item at `index`, returning its value.
    pub async fn remove(&self, ctx: &Context, index: usize) -> Result<E> {
        let request = pb::RemoveRequest {
            index: wire_index(index)?,
        };
        let response: pb::RemoveResponse = self.session.unary(ctx, pb::REMOVE, request).await?;
        self.item_value(response.item)
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

    /// Stream the items in order to `tx`, which is closed after the last one.
    ///
    /// Items that do not decode are logged and skipped.
    pub async fn elements(&self, ctx: &Context, tx: mpsc::Sender<E>) -> Result<()> {
        let codec = self.codec.clone();
        self.session
            .elements(ctx, pb::ELEMENTS, pb::ElementsRequest {}, tx, move |response: pb::ElementsResponse| {
                let item = response.item?;
                decode_or_skip(codec.as_ref(), item.value.as_bytes(), "list elements")
            })
            .await
    }

    /// Watch the list. Returns once the stream is live; `tx` is closed when the watch ends.
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
