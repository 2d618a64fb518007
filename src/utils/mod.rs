pub mod format;
pub mod logger;
pub mod metrics;
pub mod numeric;
pub mod retry;
