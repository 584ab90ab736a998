pub mod proxy_error;

pub use proxy_error::ProxyError;

pub type PResult<T> = Result<T, ProxyError>;
