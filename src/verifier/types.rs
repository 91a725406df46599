//! Additional Ethereum RPC types.

use crate::{
    serialization::{Bytes, Quantity},
    types::{Address, Digest},
};
use ethnum::U256;
use serde::{Deserialize, Serialize};

/// A block reference.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub enum Block {
    /// The latest block.
    #[serde(rename = "latest")]
    Latest,
}

/// Parameters for `eth_call`.
#[derive(Clone, Debug, Serialize)]
pub struct CallRequest {
    pub to: Address,
    pub data: Bytes,
}

/// Parameters for `eth_sendTransaction`, signed by a node managed account.
#[derive(Clone, Debug, Serialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub value: Quantity,
    pub data: Bytes,
}

/// The subset of a transaction receipt the relay inspects.
#[derive(Clone, Debug, Deserialize)]
pub struct Receipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: Digest,
    /// `0x1` for success, `0x0` for a reverted transaction.
    pub status: Option<Quantity>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status.map(|status| status.0 == U256::ONE).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_request() {
        assert_eq!(
            serde_json::to_value((
                CallRequest {
                    to: Address::new([0x42; 20]),
                    data: Bytes(vec![0xaf, 0xfe, 0xd0, 0xe0]),
                },
                Block::Latest,
            ))
            .unwrap(),
            json!([
                {
                    "to": "0x4242424242424242424242424242424242424242",
                    "data": "0xaffed0e0",
                },
                "latest",
            ]),
        );
    }

    #[test]
    fn receipt_status() {
        let receipt = serde_json::from_value::<Receipt>(json!({
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "status": "0x0",
            "blockNumber": "0x10",
        }))
        .unwrap();
        assert!(!receipt.succeeded());
        assert_eq!(receipt.transaction_hash, Digest::new([0x11; 32]));
    }
}
