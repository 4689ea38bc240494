pub mod block;
pub mod client;
pub mod error;
pub mod transport;

pub use error::TonClientError;
