//! # Motion Relay Server Library
//!
//! This library implements a small TCP server that keeps the latest motion
//! state (position, velocity, direction, color) reported by each connected
//! game client, and lets an operator push raw data to any one of them.
//!
//! ## Core Responsibilities
//!
//! ### Connection Handling
//! Every accepted TCP connection gets a process-unique `ClientId` and its own
//! listener task. The listener is the only reader of that stream; it cuts
//! the bytes into messages and queues them, and removes the client from the
//! registry as soon as the stream closes or fails.
//!
//! ### Serialized State Mutation
//! All queued messages are handled by a single command processor. It is the
//! only consumer of the command queue and the only writer of the state
//! store, so updates take effect one at a time in arrival order.
//!
//! ### Replies and Operator Pushes
//! Replies from the processor and operator `send` commands both go through
//! the connection registry, which serializes writes per connection and
//! reports failures as a plain `false`.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Live connections by `ClientId`, id allocation, targeted and broadcast
//! sends, and shutdown of all connections.
//!
//! ### Store Module (`store`)
//! Last known `StateRecord` per client. Records outlive disconnects.
//!
//! ### Queue Module (`queue`)
//! Unbounded many-producer, single-consumer FIFO of `Command`s.
//!
//! ### Framing and Listener Modules (`framing`, `listener`)
//! Per-connection read loop with chunk or newline framing.
//!
//! ### Processor Module (`processor`)
//! Decodes each command and acknowledges, rejects, drops or applies it.
//!
//! ### Network Module (`network`)
//! Binding, the accept loop, and the wiring of all of the above.
//!
//! ### Console Module (`console`)
//! Operator commands: `send`, `state`, `clients`, `exit`.
//!
//! ## Protocol
//!
//! Clients send one JSON object per line:
//!
//! ```text
//! {"type":"CONNECT"}
//! {"type":"delta","state":{"x":10.0,"direction":45.0}}
//! {"type":"snapshot","state":{"x":10.0,"y":4.0,"velocity":4.24,"direction":45.0,"color":[255,0,0]}}
//! ```
//!
//! `CONNECT` is answered with `{"type":"response","status":"SUCCESS"}`,
//! unknown types with `"status":"FAIL"`, state updates are not answered, and
//! undecodable messages are logged and ignored.
//!
//! ## Limits
//!
//! There is one task per connection and the command queue is unbounded.
//! Neither grows a cap here: a flood of clients or a stalled processor shows
//! up as memory growth.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     let handle = server.spawn()?;
//!
//!     // ... run until the operator asks to stop ...
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod framing;
pub mod listener;
pub mod network;
pub mod processor;
pub mod queue;
pub mod registry;
pub mod store;
