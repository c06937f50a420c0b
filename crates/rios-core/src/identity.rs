//! Node identity issued by the control plane at registration

use serde::{Deserialize, Serialize};

use crate::{RiosError, RiosResult};

/// Length of a BSC wallet address including the `0x` prefix
pub const WALLET_ADDRESS_LEN: usize = 42;

/// Identity record persisted after a successful registration.
///
/// A node holds at most one identity. Registering again replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Node ID assigned by the control plane
    pub node_id: i64,
    /// Bearer token used for every authenticated call
    pub auth_token: String,
    /// Control plane base URL the node registered against
    pub api_endpoint: String,
    /// Wallet receiving rewards
    pub wallet_address: String,
}

/// Validate a wallet address before it is sent anywhere.
///
/// Accepts exactly 42 characters starting with `0x`. Surrounding whitespace
/// is the caller's concern.
pub fn validate_wallet_address(address: &str) -> RiosResult<()> {
    if address.len() != WALLET_ADDRESS_LEN || !address.starts_with("0x") {
        return Err(RiosError::InvalidWallet(format!(
            "'{}' must be a {}-character BSC address starting with 0x",
            address, WALLET_ADDRESS_LEN
        )));
    }
    Ok(())
}
