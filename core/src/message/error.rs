use thiserror::Error;

use crate::cell::TonCellError;

#[derive(Error, Debug)]
pub enum TonMessageError {
    #[error("NaCl cryptographic error ({0})")]
    NaclCryptographicError(String),

    #[error("TonCellError ({0})")]
    TonCellError(#[from] TonCellError),

    #[error("Invalid message ({0})")]
    InvalidMessage(String),
}

impl TonMessageError {
    pub fn invalid_message<T: ToString>(e: T) -> TonMessageError {
        TonMessageError::InvalidMessage(e.to_string())
    }
}
