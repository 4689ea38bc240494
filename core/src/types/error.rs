use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TonAddressParseError {
    #[error("Invalid address (Address: {address}, message: {message})")]
    InvalidFormat { address: String, message: String },

    #[error("Invalid address checksum (Address: {address}, expected: {expected:#06x}, actual: {actual:#06x})")]
    ChecksumMismatch {
        address: String,
        expected: u16,
        actual: u16,
    },

    #[error("Invalid workchain ({0})")]
    InvalidWorkchain(i32),
}

impl TonAddressParseError {
    pub fn new<A: ToString, M: ToString>(address: A, message: M) -> TonAddressParseError {
        TonAddressParseError::InvalidFormat {
            address: address.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid shard id (ShardId: {shard_id}, message: {message})")]
pub struct ShardIdParseError {
    shard_id: String,
    message: String,
}

impl ShardIdParseError {
    pub fn new<S: ToString, M: ToString>(shard_id: S, message: M) -> ShardIdParseError {
        ShardIdParseError {
            shard_id: shard_id.to_string(),
            message: message.to_string(),
        }
    }
}
