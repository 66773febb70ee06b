// Middleware modules for the relay gateway
pub mod cors;
pub mod logging;
pub mod request_metrics;

pub use cors::*;
pub use logging::*;
pub use request_metrics::*;
