use std::error::Error;

use drf_client::{DrfClient, DrfError, DrfMessage};
use futures_util::StreamExt;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let api_key = std::env::var("DRF_API_KEY").map_err(|_| "DRF_API_KEY is not set")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = DrfClient::new();
        let mut messages = client.subscribe(SecretString::new(api_key));

        while let Some(message) = messages.next().await {
            match message {
                Ok(DrfMessage::Data(data)) => {
                    println!(
                        "{} items={:?} currencies={:?} mf={} at {}",
                        data.character,
                        data.drop.items,
                        data.drop.currencies,
                        data.drop.magic_find,
                        data.drop.timestamp,
                    );
                }
                Ok(DrfMessage::SessionUpdate(update)) => {
                    println!(
                        "{} level={} map={} started={} ongoing={}",
                        update.character,
                        update.level,
                        update.map,
                        update.start,
                        update.is_ongoing(),
                    );
                }
                Err(DrfError::SocketClosed { code, reason }) => {
                    eprintln!("server closed the feed: code={code} reason={reason}");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        client.close();
        Ok::<(), Box<dyn Error>>(())
    })
}
