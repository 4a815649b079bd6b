//! # seqwire-client
//!
//! Client-side packet transport for the seqwire binary RPC protocol.
//!
//! This crate turns an already-connected byte stream into a reliable
//! channel for discrete, integrity-checked binary packets. It provides:
//! - A full-duplex framed transport with `send`/`receive` over any
//!   connected async stream
//! - Bounded reads with a configurable per-attempt deadline
//! - The transport error taxonomy consumed by the session layer above
//!
//! Connection establishment, authentication, encryption, and RPC
//! correlation live above this crate; payloads pass through as opaque
//! bytes.

pub mod error;
pub mod io;
pub mod transport;

pub use error::TransportError;
pub use transport::{Transport, TransportConfig, DEFAULT_READ_TIMEOUT};
