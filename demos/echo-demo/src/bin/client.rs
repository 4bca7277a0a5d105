use bitrpc_rpc::{Client, ClientConfig};
use echo_demo::{echo_method_id, EchoRequest, EchoResponse};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    let stream = TcpStream::connect("127.0.0.1:7737").await?;
    let (reader, writer) = tokio::io::split(stream);
    let client = Client::new(reader, writer, ClientConfig::default());

    for nonce in 0..5u64 {
        let request = EchoRequest {
            message: format!("hello #{nonce}"),
            nonce,
        };
        match client.call::<EchoRequest, EchoResponse>(echo_method_id(), request).await {
            Ok(resp) => tracing::info!(message = %resp.message, nonce = resp.nonce, "echo reply"),
            Err(e) => tracing::error!(error = %e, "call failed"),
        }
    }

    Ok(())
}
