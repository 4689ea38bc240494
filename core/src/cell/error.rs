use thiserror::Error;

use crate::types::TonAddressParseError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TonCellError {
    #[error("Value out of range ({0})")]
    EncodingRange(String),

    #[error("Cell overflow (capacity: {capacity} bits, requested: {requested} bits)")]
    CellOverflow { capacity: usize, requested: usize },

    #[error("Too many references (max: {max}, got: {got})")]
    TooManyReferences { max: usize, got: usize },

    #[error("Cell depth limit exceeded (limit: {limit})")]
    DepthLimitExceeded { limit: usize },

    #[error("Invalid bag of cells format ({0})")]
    InvalidBocFormat(String),

    #[error("Dangling reference (cell: {cell_index}, reference: {ref_index}, cells: {cell_count})")]
    DanglingReference {
        cell_index: usize,
        ref_index: usize,
        cell_count: usize,
    },

    #[error("Bag of cells checksum mismatch (expected: {expected:#010x}, actual: {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Cyclic cell graph (cell: {0})")]
    CyclicCellGraph(usize),

    #[error("Cell parser error ({0})")]
    CellParserError(String),

    #[error("Invalid cell id (id: {id}, cells: {cell_count})")]
    InvalidCellId { id: usize, cell_count: usize },

    #[error("Invalid address ({0})")]
    InvalidAddress(#[from] TonAddressParseError),

    #[error("Internal error ({0})")]
    InternalError(String),
}

pub trait MapTonCellError<R, E>
where
    E: std::error::Error,
{
    fn map_boc_format_error(self) -> Result<R, TonCellError>;

    fn map_cell_parser_error(self) -> Result<R, TonCellError>;

    fn map_internal_error(self) -> Result<R, TonCellError>;
}

impl<R, E> MapTonCellError<R, E> for Result<R, E>
where
    E: std::error::Error,
{
    fn map_boc_format_error(self) -> Result<R, TonCellError> {
        self.map_err(|e| TonCellError::boc_format_error(e))
    }

    fn map_cell_parser_error(self) -> Result<R, TonCellError> {
        self.map_err(|e| TonCellError::cell_parser_error(e))
    }

    fn map_internal_error(self) -> Result<R, TonCellError> {
        self.map_err(|e| TonCellError::InternalError(e.to_string()))
    }
}

impl TonCellError {
    pub fn encoding_range_error<T>(e: T) -> TonCellError
    where
        T: ToString,
    {
        TonCellError::EncodingRange(e.to_string())
    }

    pub fn boc_format_error<T>(e: T) -> TonCellError
    where
        T: ToString,
    {
        TonCellError::InvalidBocFormat(e.to_string())
    }

    pub fn cell_parser_error<T>(e: T) -> TonCellError
    where
        T: ToString,
    {
        TonCellError::CellParserError(e.to_string())
    }
}
