// ABOUTME: AtomixClient: one transport plus client options, handing out primitive facades.
// ABOUTME: Every facade it opens gets the client-level options before per-call ones.

use atomix_grpc::{create_channel, ChannelConfig, Context, Result, Transport};
use tonic::transport::Channel;

use crate::codec::Codec;
use crate::config::ClientOptions;
use crate::counter::Counter;
use crate::election::Election;
use crate::indexed_map::IndexedMap;
use crate::list::List;
use crate::lock::Lock;
use crate::map::Map;
use crate::primitive::PrimitiveOption;
use crate::set::Set;
use crate::value::Value;

/// Entry point for opening primitives against one atomix endpoint.
///
/// Cheap to clone; clones share the underlying transport.
#[derive(Debug, Clone)]
pub struct AtomixClient<T = Channel> {
    transport: T,
    options: ClientOptions,
}

impl AtomixClient<Channel> {
    /// Connect to the endpoint described by `config`.
    pub async fn connect(config: &ChannelConfig, options: ClientOptions) -> Result<Self> {
        let channel = create_channel(config).await?;
        tracing::info!(
            address = %config.address(),
            client_id = %options.client_id,
            "connected to atomix"
        );
        Ok(Self::with_transport(channel, options))
    }
}

impl<T: Transport> AtomixClient<T> {
    /// Use an already-built transport, e.g. a shared channel.
    pub fn with_transport(transport: T, options: ClientOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn session_options(&self, options: &[PrimitiveOption]) -> Vec<PrimitiveOption> {
        let mut all = self.options.primitive_options();
        all.extend_from_slice(options);
        all
    }

    /// Open a set whose elements are converted by `codec`, e.g. `StringCodec`.
    pub async fn get_set<E: Send + Sync + 'static>(
        &self,
        ctx: &Context,
        name: &str,
        codec: impl Codec<E>,
        options: &[PrimitiveOption],
    ) -> Result<Set<E, T>> {
        let options = self.session_options(options);
        Set::open(ctx, self.transport.clone(), name, codec, &options).await
    }

    pub async fn get_value<V: Send + Sync + 'static>(
        &self,
        ctx: &Context,
        name: &str,
        codec: impl Codec<V>,
        options: &[PrimitiveOption],
    ) -> Result<Value<V, T>> {
        let options = self.session_options(options);
        Value::open(ctx, self.transport.clone(), name, codec, &options).await
    }

    pub async fn get_map<K, V>(
        &self,
        ctx: &Context,
        name: &str,
        key_codec: impl Codec<K>,
        value_codec: impl Codec<V>,
        options: &[PrimitiveOption],
    ) -> Result<Map<K, V, T>>
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let options = self.session_options(options);
        Map::open(ctx, self.transport.clone(), name, key_codec, value_codec, &options).await
    }

    pub async fn get_counter(
        &self,
        ctx: &Context,
        name: &str,
        options: &[PrimitiveOption],
    ) -> Result<Counter<T>> {
        Counter::open(ctx, self.transport.clone(), name, &self.session_options(options)).await
    }

    pub async fn get_lock(
        &self,
        ctx: &Context,
        name: &str,
        options: &[PrimitiveOption],
    ) -> Result<Lock<T>> {
        Lock::open(ctx, self.transport.clone(), name, &self.session_options(options)).await
    }

    pub async fn get_list<E: Send + Sync + 'static>(
        &self,
        ctx: &Context,
        name: &str,
        codec: impl Codec<E>,
        options: &[PrimitiveOption],
    ) -> Result<List<E, T>> {
        let options = self.session_options(options);
        List::open(ctx, self.transport.clone(), name, codec, &options).await
    }

    pub async fn get_election(
        &self,
        ctx: &Context,
        name: &str,
        options: &[PrimitiveOption],
    ) -> Result<Election<T>> {
        Election::open(ctx, self.transport.clone(), name, &self.session_options(options)).await
    }

    pub async fn get_indexed_map<K, V>(
        &self,
        ctx: &Context,
        name: &str,
        key_codec: impl Codec<K>,
        value_codec: impl Codec<V>,
        options: &[PrimitiveOption],
    ) -> Result<IndexedMap<K, V, T>>
    where
        K: Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let options = self.session_options(options);
        IndexedMap::open(ctx, self.transport.clone(), name, key_codec, value_codec, &options)
            .await
    }
}
