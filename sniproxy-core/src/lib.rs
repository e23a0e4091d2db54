//! SNI-routed TCP proxy core with fault injection.
//!
//! Each accepted connection goes through [`handler::Handler`], which peeks
//! the TLS ClientHello, optionally injects a fault, dials the host named in
//! SNI and splices the two streams together. TLS itself is never terminated.

pub mod config;
pub mod dial;
pub mod error;
pub mod fault;
pub mod handler;
pub mod hello;
pub mod splice;
mod sni;

#[cfg(test)]
mod testing;

pub use error::{ConfigError, DialError, HelloError, ProxyError};
pub use handler::{Handler, Outcome};
