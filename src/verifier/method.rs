//! Method trait and type definitions for attaching associated types to RPC
//! methods.

/// An Ethereum JSON RPC method.
pub trait Method {
    type Params;
    type Result;

    fn into_name(self) -> String;
}

macro_rules! impl_method {
    (
        $(#[$attr:meta])*
        pub struct $m:ident = $s:literal ($($p:ty),*) -> $r:ty;
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $m;

        impl $crate::verifier::method::Method for $m {
            type Params = ($($p,)*);
            type Result = $r;

            fn into_name(self) -> String {
                $s.to_owned()
            }
        }
    };
}

pub mod eth {
    use crate::{
        serialization::{Bytes, Quantity},
        types::{Address, Digest},
        verifier::types::{Block, CallRequest, Receipt, TransactionRequest},
    };

    impl_method! {
        /// Executes a read-only contract call.
        pub struct Call = "eth_call" (CallRequest, Block) -> Bytes;
    }

    impl_method! {
        /// Returns the balance of an account.
        pub struct GetBalance = "eth_getBalance" (Address, Block) -> Quantity;
    }

    impl_method! {
        /// Signs and sends a transaction with a node managed account.
        pub struct SendTransaction = "eth_sendTransaction" (TransactionRequest) -> Digest;
    }

    impl_method! {
        /// Returns a transaction receipt, or `null` if it is still pending.
        pub struct GetTransactionReceipt = "eth_getTransactionReceipt" (Digest) -> Option<Receipt>;
    }
}
