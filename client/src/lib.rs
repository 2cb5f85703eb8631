//! # Bouncing Square Client Library
//!
//! A small windowed client that simulates a square bouncing around an
//! 800x600 world and reports its motion to the relay server.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! - `BouncingSquare`: movement and wall bounces, one step per frame
//! - `StateReporter`: per-frame deltas of changed fields and a periodic
//!   full snapshot, with values rounded to two decimals
//!
//! ### Network Module (`network`)
//! Connects over TCP, performs the `CONNECT` handshake and runs background
//! reader/writer tasks. Authoritative updates pushed by the server operator
//! are handed to the game loop, which applies them before the next report.
//!
//! ### Rendering Module (`rendering`)
//! Draws the square in its current color plus a connection status line.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::{BouncingSquare, StateReporter};
//! use client::network;
//! use std::time::Instant;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut connection = network::connect("127.0.0.1:55555").await?;
//!     let mut square = BouncingSquare::random(&mut rand::thread_rng());
//!     let mut reporter = StateReporter::new(Instant::now());
//!
//!     loop {
//!         square.step();
//!         while let Some(patch) = connection.try_recv_authoritative() {
//!             square.apply_authoritative(&patch);
//!         }
//!         for message in reporter.report(&square.to_record(), Instant::now()) {
//!             connection.send(message);
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(16)).await;
//!     }
//! }
//! ```

pub mod game;
pub mod network;
pub mod rendering;
