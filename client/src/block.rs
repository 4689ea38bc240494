mod storage;
mod subscription;

pub use storage::*;
pub use subscription::*;
