//! TCP remote-control protocol
//!
//! A 12-byte command header with two parameters, answered by the server
//! with the same framing. [`RemoteServer`] drives a
//! [`Navigator`](crate::nav::Navigator); [`BotClient`] is the matching
//! blocking client.

mod client;
mod message;
mod server;

pub use client::BotClient;
pub use message::{RemoteCommand, RemoteMessage, DEFAULT_PORT};
pub use server::RemoteServer;
