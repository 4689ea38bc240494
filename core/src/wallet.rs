mod ton_wallet;
mod types;
mod wallet_code;
mod wallet_version;

pub use ton_wallet::*;
pub use types::*;
pub use wallet_version::*;

/// Subwallet id of the first wallet in the basechain, offset by the workchain for others.
pub const DEFAULT_WALLET_ID: u32 = 698983191;

/// Lifetime of a signed message when no explicit expiration is given.
pub const DEFAULT_VALIDITY_SECS: u32 = 60;

/// Maximal number of transfers in a single signing message.
pub const MAX_TRANSFERS: usize = 4;
