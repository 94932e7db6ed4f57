//! Network surface - line-delimited JSON over TCP.

pub mod protocol;
pub mod server;

pub use server::{parse_serve_args, run_server, ServerConfig};
