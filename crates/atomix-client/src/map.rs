// ABOUTME: Distributed map from codec-encoded keys to versioned, codec-encoded values.
// ABOUTME: Supports per-entry preconditions and keyed or whole-map watches.

use std::fmt;

use atomix_grpc::{Context, Result, Transport};
use atomix_proto::map as pb;
use tokio::sync::mpsc;
use tonic::transport::Channel;

use crate::codec::{skip_undecodable, Codec, KeyValueCodec};
use crate::meta::{preconditions_to_proto, ObjectMeta, Precondition};
use crate::primitive::{impl_primitive, PrimitiveOption, Type};
use crate::session::Session;
use crate::watch::WatchHook;

/// A key, its value, and the value's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<K = String, V = Vec<u8>> {
    pub key: K,
    pub value: V,
    pub meta: ObjectMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Insert,
    Update,
    Remove,
    Replay,
}

/// A map change event. For `Remove` the entry is the one that was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<K = String, V = Vec<u8>> {
    pub kind: EventType,
    pub entry: Entry<K, V>,
}

/// Options for `Map::watch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOption<K = String> {
    /// Stream every existing entry as a `Replay` event first.
    Replay,
    /// Only stream events for this key.
    Filter(K),
}

/// A watch option with its key already encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EventsOption {
    Replay,
    Filter(String),
}

impl WatchHook<pb::EventsRequest, pb::EventsResponse> for EventsOption {
    fn before_watch(&self, request: &mut pb::EventsRequest) {
        match self {
            EventsOption::Replay => request.replay = true,
            EventsOption::Filter(key) => request.key = key.clone(),
        }
    }
}

fn decode_entry<K: 'static, V: 'static>(
    codec: &KeyValueCodec<K, V>,
    entry: Option<pb::Entry>,
) -> Result<Entry<K, V>> {
    let entry = entry.unwrap_or_default();
    Ok(Entry {
        key: codec.decode_key(&entry.key)?,
        value: codec.decode_value(&entry.value)?,
        meta: ObjectMeta::from_proto(entry.meta),
    })
}

fn decode_event<K: 'static, V: 'static>(
    codec: &KeyValueCodec<K, V>,
    response: pb::EventsResponse,
) -> Option<Event<K, V>> {
    let event = response.event?;
    let kind = match pb::event::Type::try_from(event.r#type).ok()? {
        pb::event::Type::Insert => EventType::Insert,
        pb::event::Type::Update => EventType::Update,
        pb::event::Type::Remove => EventType::Remove,
        pb::event::Type::Replay => EventType::Replay,
        pb::event::Type::None => return None,
    };
    Some(Event {
        kind,
        entry: skip_undecodable(decode_entry(codec, event.entry), "map watch")?,
    })
}

pub struct Map<K = String, V = Vec<u8>, T = Channel> {
    session: Session<T>,
    codec: KeyValueCodec<K, V>,
}

impl<K, V, T: Clone> Clone for Map<K, V, T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<K, V, T> fmt::Debug for Map<K, V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl_primitive!(Map<K, V>);

impl<K, V, T> Map<K, V, T>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    T: Transport,
{
    pub async fn open(
        ctx: &Context,
        transport: T,
        name: &str,
        key_codec: impl Codec<K>,
        value_codec: impl Codec<V>,
        options: &[PrimitiveOption],
    ) -> Result<Self> {
        let session = Session::open(ctx, transport, Type::Map, pb::SESSION, name, options).await?;
        Ok(Self {
            session,
            codec: KeyValueCodec::new(key_codec, value_codec),
        })
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Insert or replace `key`, returning the stored entry.
    pub async fn put(
        &self,
        ctx: &Context,
        key: impl Into<K>,
        value: impl Into<V>,
        preconditions: &[Precondition],
    ) -> Result<Entry<K, V>> {
        let request = pb::PutRequest {
            key: self.codec.encode_key(&key.into())?,
            value: self.codec.encode_value(&value.into())?,
            preconditions: preconditions_to_proto(preconditions),
        };
        let response: pb::PutResponse = self.session.unary(ctx, pb::PUT, request).await?;
        decode_entry(&self.codec, response.entry)
    }

    /// Fails with `NotFound` if the key is absent.
    pub async fn get(&self, ctx: &Context, key: impl Into<K>) -> Result<Entry<K, V>> {
        let request = pb::GetRequest {
            key: self.codec.encode_key(&key.into())?,
        };
        let response: pb::GetResponse = self.session.unary(ctx, pb::GET, request).await?;
        decode_entry(&self.codec, response.entry)
    }

    /// Remove `key`, returning the entry it held.
    pub async fn remove(
        &self,
        ctx: &Context,
        key: impl Into<K>,
        preconditions: &[Precondition],
    ) -> Result<Entry<K, V>> {
        let request = pb::RemoveRequest {
            key: self.codec.encode_key(&key.into())?,
            preconditions: preconditions_to_proto(preconditions),
        };
        let response: pb::RemoveResponse = self.session.unary(ctx, pb::REMOVE, request).await?;
        decode_entry(&self.codec, response.entry)
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

    /// Stream the current entries to `tx`, which is closed after the last one.
    ///
    /// Entries that do not decode are logged and skipped.
    pub async fn entries(&self, ctx: &Context, tx: mpsc::Sender<Entry<K, V>>) -> Result<()> {
        let codec = self.codec.clone();
        self.session
            .elements(ctx, pb::ENTRIES, pb::EntriesRequest {}, tx, move |response: pb::EntriesResponse| {
                let entry = response.entry?;
                skip_undecodable(decode_entry(&codec, Some(entry)), "map entries")
            })
            .await
    }

    /// Watch the map. Returns once the stream is live; `tx` is closed when the watch ends.
    pub async fn watch(
        &self,
        ctx: &Context,
        tx: mpsc::Sender<Event<K, V>>,
        options: &[WatchOption<K>],
    ) -> Result<()> {
        let options = options
            .iter()
            .map(|option| match option {
                WatchOption::Replay => Ok(EventsOption::Replay),
                WatchOption::Filter(key) => self.codec.encode_key(key).map(EventsOption::Filter),
            })
            .collect::<Result<Vec<_>>>()?;
        let codec = self.codec.clone();
        self.session
            .watch(
                ctx,
                pb::EVENTS,
                pb::EventsRequest::default(),
                options,
                tx,
                move |response| decode_event(&codec, response),
            )
            .await
    }

    pub async fn close(&self, ctx: &Context) -> Result<()> {
        self.session.close(ctx).await
    }
}
