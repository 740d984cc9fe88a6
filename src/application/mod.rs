pub mod batch_runner;
pub mod handlers;
pub mod listing_cache;
pub mod server;

pub use batch_runner::{BatchRunner, BatchSummary};
pub use listing_cache::ListingCache;
