//! Human readable previews of proposal calldata.
//!
//! Proposals only ever carry one of a closed set of calls, so decoding is a
//! match over known selectors. Anything else is shown as raw calldata.

use crate::{
    bindings::{
        from_uint, to_uint,
        IMultiSigWallet::{self, IMultiSigWalletCalls},
    },
    serialization::{decimal, Bytes},
    types::{Address, Digest},
};
use alloy_sol_types::{SolCall, SolInterface};
use ethnum::U256;
use serde::Serialize;

/// A decoded proposal call.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Call {
    /// A plain value transfer with empty calldata.
    Transfer,
    AddSigner {
        signer: Address,
        #[serde(rename = "signaturesRequired", with = "decimal")]
        signatures_required: U256,
    },
    RemoveSigner {
        signer: Address,
        #[serde(rename = "signaturesRequired", with = "decimal")]
        signatures_required: U256,
    },
    UpdateSignaturesRequired {
        #[serde(rename = "signaturesRequired", with = "decimal")]
        signatures_required: U256,
    },
    /// Profile metadata update.
    SetData { key: Digest, value: Bytes },
    /// Calldata that is not one of the known calls.
    Raw { data: Bytes },
}

impl Call {
    /// Decodes calldata. Never fails: unknown selectors and malformed
    /// arguments decode as `Raw`.
    pub fn decode(data: &[u8]) -> Self {
        if data.is_empty() {
            return Call::Transfer;
        }
        Self::decode_known(data).unwrap_or_else(|| Call::Raw {
            data: Bytes(data.to_vec()),
        })
    }

    fn decode_known(data: &[u8]) -> Option<Self> {
        let call = match IMultiSigWalletCalls::abi_decode(data, true).ok()? {
            IMultiSigWalletCalls::addSigner(call) => Call::AddSigner {
                signer: call.newSigner,
                signatures_required: from_uint(call.newSignaturesRequired),
            },
            IMultiSigWalletCalls::removeSigner(call) => Call::RemoveSigner {
                signer: call.oldSigner,
                signatures_required: from_uint(call.newSignaturesRequired),
            },
            IMultiSigWalletCalls::updateSignaturesRequired(call) => {
                Call::UpdateSignaturesRequired {
                    signatures_required: from_uint(call.newSignaturesRequired),
                }
            }
            IMultiSigWalletCalls::setData(call) => Call::SetData {
                key: call.dataKey,
                value: Bytes(call.dataValue.to_vec()),
            },
            _ => return None,
        };
        Some(call)
    }

    /// Encodes the call back into calldata.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Call::Transfer => Vec::new(),
            Call::AddSigner {
                signer,
                signatures_required,
            } => IMultiSigWallet::addSignerCall {
                newSigner: *signer,
                newSignaturesRequired: to_uint(*signatures_required),
            }
            .abi_encode(),
            Call::RemoveSigner {
                signer,
                signatures_required,
            } => IMultiSigWallet::removeSignerCall {
                oldSigner: *signer,
                newSignaturesRequired: to_uint(*signatures_required),
            }
            .abi_encode(),
            Call::UpdateSignaturesRequired {
                signatures_required,
            } => IMultiSigWallet::updateSignaturesRequiredCall {
                newSignaturesRequired: to_uint(*signatures_required),
            }
            .abi_encode(),
            Call::SetData { key, value } => IMultiSigWallet::setDataCall {
                dataKey: *key,
                dataValue: value.0.clone().into(),
            }
            .abi_encode(),
            Call::Raw { data } => data.0.clone(),
        }
    }

    /// The contract function name, as shown in proposal previews.
    pub fn function_name(&self) -> &'static str {
        match self {
            Call::Transfer => "transferFunds",
            Call::AddSigner { .. } => "addSigner",
            Call::RemoveSigner { .. } => "removeSigner",
            Call::UpdateSignaturesRequired { .. } => "updateSignaturesRequired",
            Call::SetData { .. } => "setData",
            Call::Raw { .. } => "unknown",
        }
    }

    /// A default proposal title for the call.
    pub fn title(&self) -> &'static str {
        match self {
            Call::Transfer => "Transfer Funds",
            Call::AddSigner { .. } => "Add Signer",
            Call::RemoveSigner { .. } => "Remove Signer",
            Call::UpdateSignaturesRequired { .. } => "Update Signatures Required",
            Call::SetData { .. } => "Update Profile",
            Call::Raw { .. } => "Contract Call",
        }
    }

    /// The new quorum threshold, for calls that change it.
    pub fn signatures_required(&self) -> Option<U256> {
        match self {
            Call::AddSigner {
                signatures_required,
                ..
            }
            | Call::RemoveSigner {
                signatures_required,
                ..
            }
            | Call::UpdateSignaturesRequired {
                signatures_required,
            } => Some(*signatures_required),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_calldata_is_a_transfer() {
        assert_eq!(Call::decode(&[]), Call::Transfer);
        assert_eq!(Call::Transfer.function_name(), "transferFunds");
    }

    #[test]
    fn decodes_signer_management() {
        let calls = [
            Call::AddSigner {
                signer: Address::new([0x11; 20]),
                signatures_required: U256::new(2),
            },
            Call::RemoveSigner {
                signer: Address::new([0x22; 20]),
                signatures_required: U256::ONE,
            },
            Call::UpdateSignaturesRequired {
                signatures_required: U256::new(3),
            },
            Call::SetData {
                key: Digest::new([0x33; 32]),
                value: Bytes(b"profile".to_vec()),
            },
        ];
        for call in calls {
            assert_eq!(Call::decode(&call.encode()), call);
        }
    }

    #[test]
    fn unknown_or_truncated_calldata_is_raw() {
        let unknown = vec![0xde, 0xad, 0xbe, 0xef, 0x00];
        assert_eq!(
            Call::decode(&unknown),
            Call::Raw {
                data: Bytes(unknown.clone()),
            },
        );

        let mut truncated = Call::UpdateSignaturesRequired {
            signatures_required: U256::ONE,
        }
        .encode();
        truncated.truncate(20);
        assert!(matches!(Call::decode(&truncated), Call::Raw { .. }));
        assert!(matches!(Call::decode(&[0xab]), Call::Raw { .. }));
    }

    #[test]
    fn serializes_tagged() {
        assert_eq!(
            serde_json::to_value(Call::AddSigner {
                signer: Address::new([0x11; 20]),
                signatures_required: U256::new(2),
            })
            .unwrap(),
            json!({
                "kind": "addSigner",
                "signer": "0x1111111111111111111111111111111111111111",
                "signaturesRequired": "2",
            }),
        );
        assert_eq!(
            serde_json::to_value(Call::Transfer).unwrap(),
            json!({ "kind": "transfer" }),
        );
    }
}
