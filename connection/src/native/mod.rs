pub mod executor;
pub mod pool;

pub use executor::NativeExecutor;
pub use pool::{ConnectionPool, PoolOptions};
