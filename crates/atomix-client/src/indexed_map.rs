// ABOUTME: Distributed insertion-ordered map, addressable by key or by server-assigned index.
// ABOUTME: Supports ordered navigation from any index plus keyed or whole-map watches.

use std::fmt;

use atomix_grpc::{Context, Result, Transport};
use atomix_proto::indexed_map as pb;
use tokio::sync::mpsc;
use tonic::transport::Channel;

use crate::codec::{skip_undecodable, Codec, KeyValueCodec};
use crate::meta::{preconditions_to_proto, ObjectMeta, Precondition};
use crate::primitive::{impl_primitive, PrimitiveOption, Type};
use crate::session::Session;
use crate::watch::WatchHook;

/// An entry and the index the server assigned it on insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<K = String, V = Vec<u8>> {
    pub index: u64,
    pub key: K,
    pub value: V,
    pub meta: ObjectMeta,
}

fn decode_entry<K: 'static, V: 'static>(
    codec: &KeyValueCodec<K, V>,
    entry: Option<pb::Entry>,
) -> Result<Entry<K, V>> {
    let entry = entry.unwrap_or_default();
    Ok(Entry {
        index: entry.index,
        key: codec.decode_key(&entry.key)?,
        value: codec.decode_value(&entry.value)?,
        meta: ObjectMeta::from_proto(entry.meta),
    })
}

fn by_key(key: String) -> Option<pb::Position> {
    Some(pb::Position { index: 0, key })
}

fn by_index(index: u64) -> Option<pb::Position> {
    Some(pb::Position {
        index,
        key: String::new(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Insert,
    Update,
    Remove,
    Replay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<K = String, V = Vec<u8>> {
    pub kind: EventType,
    pub entry: Entry<K, V>,
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
        entry: skip_undecodable(decode_entry(codec, event.entry), "indexed map watch")?,
    })
}

/// Options for `IndexedMap::watch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOption<K = String> {
    Replay,
    Filter(K),
}

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

pub struct IndexedMap<K = String, V = Vec<u8>, T = Channel> {
    session: Session<T>,
    codec: KeyValueCodec<K, V>,
}

impl<K, V, T: Clone> Clone for IndexedMap<K, V, T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<K, V, T> fmt::Debug for IndexedMap<K, V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedMap")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl_primitive!(IndexedMap<K, V>);

impl<K, V, T> IndexedMap<K, V, T>
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
        let session =
            Session::open(ctx, transport, Type::IndexedMap, pb::SESSION, name, options).await?;
        Ok(Self {
            session,
            codec: KeyValueCodec::new(key_codec, value_codec),
        })
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    async fn entry_call<Req>(
        &self,
        ctx: &Context,
        path: &'static str,
        request: Req,
    ) -> Result<Entry<K, V>>
    where
        Req: prost::Message + Send + Sync + 'static,
    {
        let response: pb::EntryResponse = self.session.unary(ctx, path, request).await?;
        decode_entry(&self.codec, response.entry)
    }

    /// Navigation calls report an absent neighbor as `None`.
    async fn optional_entry_call<Req>(
        &self,
        ctx: &Context,
        path: &'static str,
        request: Req,
    ) -> Result<Option<Entry<K, V>>>
    where
        Req: prost::Message + Send + Sync + 'static,
    {
        match self.entry_call(ctx, path, request).await {
            Ok(entry) => Ok(Some(entry)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Append a new key at the end. Fails with `AlreadyExists` if the key is present.
    pub async fn append(
        &self,
        ctx: &Context,
        key: impl Into<K>,
        value: impl Into<V>,
    ) -> Result<Entry<K, V>> {
        let request = pb::AppendRequest {
            key: self.codec.encode_key(&key.into())?,
            value: self.codec.encode_value(&value.into())?,
        };
        self.entry_call(ctx, pb::APPEND, request).await
    }

    /// Insert or update `key`. An update keeps the entry's index.
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
        self.entry_call(ctx, pb::PUT, request).await
    }

    pub async fn get(&self, ctx: &Context, key: impl Into<K>) -> Result<Entry<K, V>> {
        let request = pb::GetRequest {
            position: by_key(self.codec.encode_key(&key.into())?),
        };
        self.entry_call(ctx, pb::GET, request).await
    }

    pub async fn get_index(&self, ctx: &Context, index: u64) -> Result<Entry<K, V>> {
        let request = pb::GetRequest {
            position: by_index(index),
        };
        self.entry_call(ctx, pb::GET, request).await
    }

    pub async fn first_entry(&self, ctx: &Context) -> Result<Option<Entry<K, V>>> {
        self.optional_entry_call(ctx, pb::FIRST_ENTRY, pb::FirstEntryRequest {})
            .await
    }

    pub async fn last_entry(&self, ctx: &Context) -> Result<Option<Entry<K, V>>> {
        self.optional_entry_call(ctx, pb::LAST_ENTRY, pb::LastEntryRequest {})
            .await
    }

    /// The entry with the greatest index below `index`.
    pub async fn prev_entry(&self, ctx: &Context, index: u64) -> Result<Option<Entry<K, V>>> {
        self.optional_entry_call(ctx, pb::PREV_ENTRY, pb::PrevEntryRequest { index })
            .await
    }

    /// The entry with the smallest index above `index`.
    pub async fn next_entry(&self, ctx: &Context, index: u64) -> Result<Option<Entry<K, V>>> {
        self.optional_entry_call(ctx, pb::NEXT_ENTRY, pb::NextEntryRequest { index })
            .await
    }

    pub async fn remove(
        &self,
        ctx: &Context,
        key: impl Into<K>,
        preconditions: &[Precondition],
    ) -> Result<Entry<K, V>> {
        let request = pb::RemoveRequest {
            position: by_key(self.codec.encode_key(&key.into())?),
            preconditions: preconditions_to_proto(preconditions),
        };
        self.entry_call(ctx, pb::REMOVE, request).await
    }

    pub async fn remove_index(
        &self,
        ctx: &Context,
        index: u64,
        preconditions: &[Precondition],
    ) -> Result<Entry<K, V>> {
        let request = pb::RemoveRequest {
            position: by_index(index),
            preconditions: preconditions_to_proto(preconditions),
        };
        self.entry_call(ctx, pb::REMOVE, request).await
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

    /// Stream entries in index order to `tx`, which is closed after the last one.
    ///
    /// Entries that do not decode are logged and skipped.
    pub async fn entries(&self, ctx: &Context, tx: mpsc::Sender<Entry<K, V>>) -> Result<()> {
        let codec = self.codec.clone();
        self.session
            .elements(ctx, pb::ENTRIES, pb::EntriesRequest {}, tx, move |response: pb::EntryResponse| {
                let entry = response.entry?;
                skip_undecodable(decode_entry(&codec, Some(entry)), "indexed map entries")
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
