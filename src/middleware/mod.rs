//! Request logging and rate-limit admission middleware.

pub mod logging;
pub mod rate_limit;

pub use logging::request_logging;
pub use rate_limit::rate_limit_gate;
