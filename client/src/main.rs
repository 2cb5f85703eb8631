use clap::Parser;
use client::game::{BouncingSquare, StateReporter};
use client::network;
use client::rendering::Renderer;
use log::{error, info};
use macroquad::prelude::*;
use shared::{DEFAULT_PORT, WORLD_HEIGHT, WORLD_WIDTH};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Networked Bouncing Square".to_owned(),
        window_width: WORLD_WIDTH as i32,
        window_height: WORLD_HEIGHT as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    // macroquad owns the main thread; networking runs on a separate runtime.
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start network runtime: {}", e);
            return;
        }
    };

    let mut connection = match runtime.block_on(network::connect(&args.server)) {
        Ok(connection) => connection,
        Err(e) => {
            error!("Failed to connect to {}: {}", args.server, e);
            return;
        }
    };

    let mut square = BouncingSquare::random(&mut ::rand::thread_rng());
    let mut reporter = StateReporter::new(Instant::now());
    let renderer = Renderer::new(args.server.clone());
    info!("Starting at ({}, {})", square.x, square.y);

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        square.step();

        while let Some(patch) = connection.try_recv_authoritative() {
            square.apply_authoritative(&patch);
        }

        for message in reporter.report(&square.to_record(), Instant::now()) {
            connection.send(message);
        }

        renderer.render(&square, connection.is_connected());
        next_frame().await;
    }

    info!("Client closed");
}
