use clap::Parser;
use shared::{ClientMessage, Color, ServerMessage, StatePatch, DEFAULT_PORT};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

/// Scripted client for poking a running server by hand
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Number of delta updates to send
    #[arg(short, long, default_value = "10")]
    count: u32,

    /// Pause between updates in milliseconds
    #[arg(short, long, default_value = "200")]
    interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.server);
    let stream = TcpStream::connect(&args.server).await?;
    let (reader, mut writer) = stream.into_split();
    let mut replies = BufReader::new(reader).lines();

    println!("Sending CONNECT");
    writer.write_all(ClientMessage::Connect.to_line().as_bytes()).await?;

    match replies.next_line().await? {
        Some(line) => println!("Handshake reply: {:?}", ServerMessage::decode(&line)),
        None => {
            println!("Server closed the connection during the handshake");
            return Ok(());
        }
    }

    for i in 0..args.count {
        let angle = i as f32 * 0.3;
        let patch = StatePatch {
            x: Some(400.0 + 100.0 * angle.cos()),
            y: Some(300.0 + 100.0 * angle.sin()),
            direction: Some((angle.to_degrees() + 90.0) % 360.0),
            color: (i % 5 == 0).then(|| Color::new(255, (i * 25 % 256) as i32, 0)),
            ..Default::default()
        };

        let message = ClientMessage::Delta(patch);
        println!("Sending {}", message.to_value());
        writer.write_all(message.to_line().as_bytes()).await?;

        sleep(Duration::from_millis(args.interval)).await;
    }

    println!("Sending an unsupported message type");
    writer
        .write_all(ClientMessage::Unknown(Some("bogus".to_string())).to_line().as_bytes())
        .await?;

    match timeout(Duration::from_secs(2), replies.next_line()).await {
        Ok(Ok(Some(line))) => println!("Reply: {:?}", ServerMessage::decode(&line)),
        Ok(Ok(None)) => println!("Server closed the connection"),
        Ok(Err(e)) => println!("Read failed: {}", e),
        Err(_) => println!("No reply within 2s"),
    }

    writer.shutdown().await?;
    println!("Test client finished");

    Ok(())
}
