//! tribunal-api: Arbitration service client
//!
//! This crate speaks to the remote arbitration service (an HTTP endpoint
//! answering with a server-sent-event stream) and to the wallet that
//! identifies the user. It owns the wire types, the SSE line framing and the
//! decision accumulator that turns partial results into a transcript.

pub mod client;
pub mod error;
pub mod sse;
pub mod stream;
pub mod types;
pub mod wallet;

pub use client::{ArbitrationService, ByteStream, HttpArbitrationClient};
pub use error::{Error, Result};
pub use stream::{DecisionAccumulator, StreamEvent, StreamEventStream};
pub use types::*;
pub use wallet::{AccountSubscription, JsonRpcWallet, StaticWallet, WalletProvider};
