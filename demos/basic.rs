use std::time::Duration;

use forward_requests::{
    filename_from_url, ClientOptions, RequestOptions, RequestsClient, RequestsConfig,
};
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://httpbin.org/get".to_owned());

    let config = RequestsConfig::from_env()?;
    let client = RequestsClient::with_reqwest(&config)?.with_options(
        ClientOptions::default()
            .with_tries(3)
            .with_retry_delay(Duration::from_secs(1)),
    )?;

    let response = client
        .get(&url, RequestOptions::new().param("source", "demo"))
        .await?;
    println!("status: {}", response.status);

    match response.json::<JsonValue>() {
        Ok(body) => println!("{body:#}"),
        Err(_) => println!("{}", response.text("utf-8")?.unwrap_or_default()),
    }

    let name = filename_from_url(&url);
    if !name.is_empty() {
        println!("file name: {name}");
    }

    Ok(())
}
