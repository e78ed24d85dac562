//! Bridge contract ABI definitions.
//!
//! Uses alloy's sol! macro to generate type-safe bindings. The event and
//! function shapes are a fixed wire contract; the canonical Deposit
//! parameter order is the one on the emitted event.

#![allow(clippy::too_many_arguments)]

use alloy::sol;

sol! {
    /// Lock-and-mint bridge contract interface.
    #[sol(rpc)]
    contract Bridge {
        /// Release funds on the target chain. `signatures` carries one
        /// 65-byte validator signature per configured signer.
        function withdraw(
            address token,
            address recipient,
            uint256 amount,
            uint256 nonce,
            uint256 sourceChainId,
            bytes[] signatures
        ) external;

        /// Replay map over canonical withdrawal message hashes.
        function isProcessed(bytes32 messageHash) external view returns (bool);

        /// Whether a token is registered with the bridge.
        function supportedTokens(address token) external view returns (bool);

        /// Emitted when tokens are locked on the source chain.
        /// token == address(0) denotes the native currency.
        event Deposit(
            address indexed token,
            address indexed sender,
            address indexed recipient,
            uint256 amount,
            uint256 nonce,
            uint256 targetChainId
        );

        /// Emitted when tokens are released on the target chain.
        event Withdraw(
            address indexed token,
            address indexed recipient,
            uint256 amount,
            uint256 nonce,
            uint256 sourceChainId
        );
    }

    /// Minimal ERC20 surface used for bridge liquidity reads.
    #[sol(rpc)]
    contract ERC20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;
    use alloy::sol_types::SolEvent;

    #[test]
    fn test_event_signatures_match_wire_contract() {
        assert_eq!(
            Bridge::Deposit::SIGNATURE_HASH,
            keccak256(b"Deposit(address,address,address,uint256,uint256,uint256)")
        );
        assert_eq!(
            Bridge::Withdraw::SIGNATURE_HASH,
            keccak256(b"Withdraw(address,address,uint256,uint256,uint256)")
        );
    }
}
