//! HTTP side of the A2A bridge: agent card resolution and the JSON-RPC
//! transport, streaming replies over server-sent events.

pub mod jsonrpc;
pub mod resolver;

pub use jsonrpc::{HttpClientFactory, JsonRpcClient};
pub use resolver::HttpCardResolver;
