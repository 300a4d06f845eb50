//! TokenGuard RPC - wiring, ingestion, gateway and CLI orchestration
//!
//! [`AppContext`] builds one instance of every component from an
//! [`AppConfig`]. Requests and observed transactions run through the
//! [`Pipeline`]; alerts reach subscribers over the WebSocket [`Gateway`].

pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod pipeline;

pub use config::{AppConfig, SeedData, ServerConfig};
pub use context::AppContext;
pub use error::{RpcError, RpcResult};
pub use gateway::{Gateway, WsTransport};
pub use ingest::{ChannelEventSource, IngestStats, JsonlEventSource, TransactionEvent, TransactionEventSource};
pub use pipeline::{Outcome, Pipeline, TransactionEventHandler};
