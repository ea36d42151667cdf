//! evntboard OpenAI module.
//!
//! Connects to an evntboard hub over one WebSocket, registers as a module,
//! and serves AI-assistant RPC methods that proxy to the OpenAI API.

pub mod config;
pub mod methods;
pub mod openai;
pub mod rpc;
