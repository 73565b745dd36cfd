//! Transport layer for the query gateway.
//!
//! Only HTTP is provided; the trait keeps the daemon's lifecycle independent
//! of how requests arrive.

pub mod http;

pub use http::{HttpTransport, router};

use crate::error::GatewayResult;
use std::future::Future;

/// Trait for gateway transport implementations.
pub trait Transport: Send + Sync {
    /// Start the transport and begin handling requests.
    ///
    /// This method should block until the transport is shut down.
    fn run(&self) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}
