use thiserror::Error;
use tonkit_core::cell::TonCellError;
use tonkit_core::message::TonMessageError;
use tonkit_core::TonAddressParseError;

#[derive(Error, Debug)]
pub enum TonClientError {
    #[error("Transport error (method: {method}, message: {message})")]
    TransportError {
        method: &'static str,
        message: String,
    },

    #[error("Storage error ({0})")]
    StorageError(String),

    #[error("Cell error ({0})")]
    CellError(#[from] TonCellError),

    #[error("Message error ({0})")]
    MessageError(#[from] TonMessageError),

    #[error("Address error ({0})")]
    AddressError(#[from] TonAddressParseError),

    #[error("Internal error ({0})")]
    InternalError(String),
}

impl TonClientError {
    pub fn transport_error<T: ToString>(method: &'static str, e: T) -> TonClientError {
        TonClientError::TransportError {
            method,
            message: e.to_string(),
        }
    }

    pub fn storage_error<T: ToString>(e: T) -> TonClientError {
        TonClientError::StorageError(e.to_string())
    }
}
