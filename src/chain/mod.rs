//! Chain-facing data types and the capability seams consumed by the
//! coordinator. Signing, RPC submission and receipt polling live behind
//! these traits; the coordinator only ever sees handles and update streams.

use std::fmt;
use std::str::FromStr;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod sim;

pub use sim::SimulatedChain;

/// A 20-byte account or contract address, parsed from `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    pub const LEN: usize = 20;

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let malformed = || AddressParseError {
            value: s.to_string(),
        };

        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(malformed)?;
        if hex.len() != Self::LEN * 2 {
            return Err(malformed());
        }

        let mut bytes = [0u8; Self::LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| malformed())?;
        }
        Ok(Address(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Raised when an address string is not `0x` followed by 40 hex digits
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed address {value:?}: expected 0x followed by 40 hex digits")]
pub struct AddressParseError {
    pub value: String,
}

/// Opaque reference to a submitted transaction, used to track confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(String);

impl TxHandle {
    pub fn new(id: impl Into<String>) -> Self {
        TxHandle(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Progress reported by the receipt wait capability for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptUpdate {
    /// Mined but not yet at the required confirmation depth
    Confirming,
    /// Confirmed on chain
    Confirmed,
    /// Reverted, dropped, or the wait itself errored out
    Failed { reason: String },
}

impl ReceiptUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReceiptUpdate::Confirming)
    }
}

/// ABI-shaped argument value for a contract write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallValue {
    Uint(u64),
    Address(Address),
}

impl fmt::Display for CallValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallValue::Uint(value) => write!(f, "{}", value),
            CallValue::Address(address) => write!(f, "{}", address),
        }
    }
}

/// A validated write call against the leave contract. Dates are already
/// encoded as unix seconds and indices as non-negative integers; building
/// one of these goes through `ActionRequest` validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractCall {
    ApplyLeave { start: u64, end: u64 },
    ApproveLeave { employee: Address, index: u64 },
    RejectLeave { employee: Address, index: u64 },
}

impl ContractCall {
    /// On-chain function name for this call
    pub fn function_name(&self) -> &'static str {
        match self {
            ContractCall::ApplyLeave { .. } => "applyLeave",
            ContractCall::ApproveLeave { .. } => "approveLeave",
            ContractCall::RejectLeave { .. } => "rejectLeave",
        }
    }

    /// Arguments in ABI order
    pub fn args(&self) -> Vec<CallValue> {
        match self {
            ContractCall::ApplyLeave { start, end } => {
                vec![CallValue::Uint(*start), CallValue::Uint(*end)]
            }
            ContractCall::ApproveLeave { employee, index }
            | ContractCall::RejectLeave { employee, index } => {
                vec![CallValue::Address(*employee), CallValue::Uint(*index)]
            }
        }
    }
}

/// Identity of the connected caller, supplied by the wallet layer.
/// An absent account gates the coordinator into read-only mode.
pub trait WalletSession: Send + Sync {
    fn account(&self) -> Option<Address>;
}

/// Read, write and receipt transport for the leave contract.
#[async_trait::async_trait]
pub trait ContractClient: Send + Sync {
    /// Read the contract owner
    async fn read_owner(&self) -> Result<Option<Address>>;

    /// Read the number of leave requests recorded for `account`
    async fn read_leave_count(&self, account: &Address) -> Result<u64>;

    /// Submit a write call, returning a handle once the transport accepts it
    async fn submit_write(&self, call: &ContractCall) -> Result<TxHandle>;

    /// Observe receipt progress for a submitted transaction. The stream
    /// yields zero or more `Confirming` updates followed by one terminal
    /// update; a stream that ends early counts as a failed wait.
    async fn receipt_updates(&self, handle: &TxHandle)
        -> Result<BoxStream<'static, ReceiptUpdate>>;
}
