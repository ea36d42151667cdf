//! JSON-RPC 2.0 session over a WebSocket, acting as client and server at once.

mod session;
mod types;

pub use session::RpcSession;
pub use types::{ErrorObject, Frame, INTERNAL_ERROR, METHOD_NOT_FOUND, RpcError};
