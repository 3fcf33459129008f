use forward_requests::{
    Method, RequestOptions, RequestsClient, RequestsConfig, RequestsError, WebSocketConnection,
    WsMessage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let url = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: websocket <ws-url>"))?;

    let client = RequestsClient::with_reqwest(&RequestsConfig::from_env()?)?;

    let reply = client
        .websocket(
            Method::GET,
            &url,
            RequestOptions::new(),
            |ws| {
                Box::pin(async move {
                    ws.send(WsMessage::Text("hello".to_owned())).await?;
                    Ok::<_, RequestsError>(ws.receive().await?)
                })
            },
        )
        .await?;

    println!("{reply:?}");
    Ok(())
}
