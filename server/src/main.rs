use clap::Parser;
use log::{error, info};
use server::config::{Framing, ServerConfig};
use server::console::{spawn_stdin_reader, Console};
use server::network::Server;
use shared::{DEFAULT_PORT, MAX_MESSAGE_SIZE};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Interface to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// How client byte streams are split into messages
    #[arg(long, value_enum, default_value_t = Framing::Lines)]
    framing: Framing,

    /// Largest single read / unterminated line, in bytes
    #[arg(long, default_value_t = MAX_MESSAGE_SIZE)]
    max_message_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        framing: args.framing,
        max_message_size: args.max_message_size,
    };

    let handle = Server::bind(config).await?.spawn()?;
    info!("Console ready: send <id> <payload> | state <id> | clients | exit");

    let console = Console::new(handle.registry().clone(), handle.store().clone());

    tokio::select! {
        result = console.run(spawn_stdin_reader(), tokio::io::stdout()) => {
            if let Err(e) = result {
                error!("Console failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    handle.shutdown().await;
    println!("Server shutdown.");

    Ok(())
}
