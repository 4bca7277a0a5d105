use std::sync::Arc;

use bitrpc_rpc::{serve_connection, ServerConfig};
use echo_demo::build_router;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    let router = Arc::new(build_router());
    let listener = TcpListener::bind("127.0.0.1:7737").await?;
    tracing::info!(addr = %listener.local_addr()?, "echo-demo server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let router = router.clone();
        tokio::spawn(async move {
            tracing::info!(%peer, "connection accepted");
            let (reader, writer) = tokio::io::split(stream);
            serve_connection(router, reader, writer, ServerConfig::default()).await;
            tracing::info!(%peer, "connection closed");
        });
    }
}
