// ABOUTME: Watches a named set on a running atomix endpoint and prints every change.
// ABOUTME: Usage: cargo run -p atomix-client --example watch_set -- [address] [set-name]

use atomix_client::set::WatchOption;
use atomix_client::{AtomixClient, ChannelConfig, ClientOptions, Context, StringCodec};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    atomix_log::init();

    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "localhost".to_string());
    let name = args.next().unwrap_or_else(|| "demo".to_string());

    let ctx = Context::background();
    let client = AtomixClient::connect(&ChannelConfig::new(address), ClientOptions::default()).await?;
    let set = client.get_set(&ctx, &name, StringCodec, &[]).await?;

    let shutdown = ctx.with_cancel();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        }
    });

    let (tx, mut rx) = mpsc::channel(64);
    match set.watch(&shutdown, tx, &[WatchOption::Replay]).await {
        Err(err) if !err.is_canceled() => return Err(err.into()),
        _ => {}
    }
    while let Some(event) = rx.recv().await {
        println!("{:?} {}", event.kind, event.value);
    }

    set.close(&ctx).await?;
    Ok(())
}
