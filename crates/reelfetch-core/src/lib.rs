pub mod config;
pub mod logging;

pub mod cache;
pub mod error;
pub mod pool;
pub mod retry;
pub mod scheduler;
pub mod segmenter;
pub mod transport;
pub mod worker;

mod sync;
