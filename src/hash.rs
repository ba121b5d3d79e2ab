//! Hash computation for transfer-root identifiers
//!
//! The transfer root id is the on-chain lookup key for bonds and
//! confirmations. It must match the contract derivation exactly:
//! keccak256(abi.encode(rootHash, totalAmount)).

use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Compute the transfer root id that matches the bridge contract's derivation
///
/// keccak256(abi.encode(rootHash, totalAmount)) where both values are 32-byte
/// words and the amount is big-endian right-aligned.
///
/// Every component must recompute this identically; it is never persisted,
/// only derived from `(root_hash, total_amount)` at the point of use.
pub fn transfer_root_id(root_hash: &[u8; 32], total_amount: u128) -> [u8; 32] {
    // abi.encode layout: 2 words * 32 bytes
    let mut data = [0u8; 64];

    // Word 0: rootHash (bytes32)
    data[0..32].copy_from_slice(root_hash);

    // Word 1: totalAmount (uint256, we carry u128)
    // Big-endian in last 16 bytes of the 32-byte word
    data[32 + 16..64].copy_from_slice(&total_amount.to_be_bytes());

    keccak256(&data)
}

/// Format a bytes32 value as a 0x-prefixed hex string
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_root_id_matches_abi_encoding() {
        let root_hash = [0xabu8; 32];
        let amount: u128 = 1_000_000_000_000_000_000;

        let mut expected_preimage = [0u8; 64];
        expected_preimage[0..32].copy_from_slice(&root_hash);
        expected_preimage[48..64].copy_from_slice(&amount.to_be_bytes());

        assert_eq!(
            transfer_root_id(&root_hash, amount),
            keccak256(&expected_preimage)
        );
    }

    #[test]
    fn test_transfer_root_id_is_amount_sensitive() {
        let root_hash = [0x11u8; 32];
        let id_a = transfer_root_id(&root_hash, 100);
        let id_b = transfer_root_id(&root_hash, 101);
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn test_transfer_root_id_is_deterministic() {
        let root_hash = [0x42u8; 32];
        assert_eq!(
            transfer_root_id(&root_hash, 7),
            transfer_root_id(&root_hash, 7)
        );
    }

    #[test]
    fn test_bytes32_to_hex() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xde;
        bytes[1] = 0xad;
        let hex = bytes32_to_hex(&bytes);
        assert!(hex.starts_with("0xdead"));
        assert_eq!(hex.len(), 66);
    }
}
