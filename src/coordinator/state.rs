//! State machine, request validation and snapshot types for the
//! lifecycle coordinator

use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::chain::{Address, ContractCall, TxHandle};
use crate::error::{LeaveChainError, Result};

/// Transaction lifecycle state. Exactly one holds at any instant.
///
/// Lifecycle: `Idle -> Submitting -> AwaitingConfirmation -> {Confirmed |
/// Failed}`. Terminal states clear back to `Idle` only through the next
/// user-initiated action, never automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxState {
    /// No submission in flight
    Idle,
    /// A write call has been handed to the transport; no handle yet
    Submitting,
    /// Submitted and waiting on the receipt
    AwaitingConfirmation { handle: TxHandle },
    /// Receipt observed on chain
    Confirmed { handle: TxHandle },
    /// Submission was rejected (no handle) or the receipt wait failed
    Failed {
        handle: Option<TxHandle>,
        reason: String,
    },
}

impl TxState {
    /// A new dispatch is only admitted while nothing is in flight
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TxState::Submitting | TxState::AwaitingConfirmation { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Confirmed { .. } | TxState::Failed { .. })
    }

    /// Handle carried by this state, if one exists yet
    pub fn handle(&self) -> Option<&TxHandle> {
        match self {
            TxState::AwaitingConfirmation { handle } | TxState::Confirmed { handle } => {
                Some(handle)
            }
            TxState::Failed { handle, .. } => handle.as_ref(),
            TxState::Idle | TxState::Submitting => None,
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxState::Idle => write!(f, "idle"),
            TxState::Submitting => write!(f, "submitting"),
            TxState::AwaitingConfirmation { handle } => {
                write!(f, "awaiting confirmation of {}", handle)
            }
            TxState::Confirmed { handle } => write!(f, "confirmed {}", handle),
            TxState::Failed { reason, .. } => write!(f, "failed: {}", reason),
        }
    }
}

/// A user intent, validated locally before it reaches the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionRequest {
    ApplyLeave { start: u64, end: u64 },
    ApproveLeave { employee: String, index: i64 },
    RejectLeave { employee: String, index: i64 },
}

impl ActionRequest {
    /// Check the request's own invariants and produce the contract call.
    /// Failures surface as `InvalidInput` and never reach the transport.
    pub fn to_call(&self) -> Result<ContractCall> {
        match self {
            ActionRequest::ApplyLeave { start, end } => {
                if start > end {
                    return Err(LeaveChainError::InvalidInput {
                        reason: format!("leave start {} is after end {}", start, end),
                    });
                }
                Ok(ContractCall::ApplyLeave {
                    start: *start,
                    end: *end,
                })
            }
            ActionRequest::ApproveLeave { employee, index } => {
                let (employee, index) = validate_record_target(employee, *index)?;
                Ok(ContractCall::ApproveLeave { employee, index })
            }
            ActionRequest::RejectLeave { employee, index } => {
                let (employee, index) = validate_record_target(employee, *index)?;
                Ok(ContractCall::RejectLeave { employee, index })
            }
        }
    }
}

fn validate_record_target(employee: &str, index: i64) -> Result<(Address, u64)> {
    let employee: Address = employee.parse()?;
    if index < 0 {
        return Err(LeaveChainError::InvalidInput {
            reason: format!("leave index {} is negative", index),
        });
    }
    Ok((employee, index as u64))
}

/// Parse a `YYYY-MM-DD` date string to unix seconds at midnight UTC
pub fn date_to_unix_seconds(date: &str) -> Result<u64> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
        LeaveChainError::InvalidInput {
            reason: format!("invalid date {:?}: {}", date, e),
        }
    })?;

    let timestamp = parsed.and_time(NaiveTime::MIN).and_utc().timestamp();
    if timestamp < 0 {
        return Err(LeaveChainError::InvalidInput {
            reason: format!("date {:?} predates the unix epoch", date),
        });
    }
    Ok(timestamp as u64)
}

/// Read-only view of the coordinator, safe to render from at any time
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorSnapshot {
    pub owner: Option<Address>,
    pub my_leave_count: u64,
    pub state: TxState,
    pub last_handle: Option<TxHandle>,
    pub last_error: Option<String>,
}

impl CoordinatorSnapshot {
    /// Advisory owner check used to gate approve/reject controls in the
    /// consuming surface. The contract itself remains the authority.
    pub fn is_owner(&self, account: Option<Address>) -> bool {
        matches!((self.owner, account), (Some(owner), Some(account)) if owner == account)
    }

    /// Action controls are enabled whenever nothing is in flight
    pub fn actions_enabled(&self) -> bool {
        !self.state.is_in_flight()
    }
}

/// Lifecycle counters for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStats {
    pub submissions: u64,
    pub confirmations: u64,
    pub failures: u64,
    pub refreshes: u64,
    pub state: TxState,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPLOYEE: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

    #[test]
    fn test_apply_leave_requires_ordered_dates() {
        let request = ActionRequest::ApplyLeave { start: 200, end: 100 };
        assert!(matches!(
            request.to_call(),
            Err(LeaveChainError::InvalidInput { .. })
        ));

        let request = ActionRequest::ApplyLeave { start: 100, end: 100 };
        assert!(request.to_call().is_ok());
    }

    #[test]
    fn test_record_target_validation() {
        let request = ActionRequest::ApproveLeave {
            employee: "not-an-address".to_string(),
            index: 0,
        };
        assert!(matches!(
            request.to_call(),
            Err(LeaveChainError::InvalidInput { .. })
        ));

        let request = ActionRequest::RejectLeave {
            employee: EMPLOYEE.to_string(),
            index: -1,
        };
        assert!(matches!(
            request.to_call(),
            Err(LeaveChainError::InvalidInput { .. })
        ));

        let request = ActionRequest::ApproveLeave {
            employee: EMPLOYEE.to_string(),
            index: 3,
        };
        let call = request.to_call().unwrap();
        assert_eq!(call.function_name(), "approveLeave");
    }

    #[test]
    fn test_date_to_unix_seconds() {
        assert_eq!(date_to_unix_seconds("2024-01-10").unwrap(), 1_704_844_800);
        assert_eq!(date_to_unix_seconds("2024-01-15").unwrap(), 1_705_276_800);
        assert!(date_to_unix_seconds("2024-13-40").is_err());
        assert!(date_to_unix_seconds("January 10").is_err());
    }

    #[test]
    fn test_state_predicates() {
        let handle = TxHandle::new("0xabc");

        assert!(!TxState::Idle.is_in_flight());
        assert!(TxState::Submitting.is_in_flight());
        assert!(TxState::AwaitingConfirmation {
            handle: handle.clone()
        }
        .is_in_flight());
        assert!(TxState::Confirmed {
            handle: handle.clone()
        }
        .is_terminal());
        assert!(TxState::Failed {
            handle: None,
            reason: "boom".to_string()
        }
        .is_terminal());

        assert_eq!(
            TxState::Confirmed { handle: handle.clone() }.handle(),
            Some(&handle)
        );
        assert_eq!(TxState::Submitting.handle(), None);
    }

    #[test]
    fn test_owner_gating() {
        let owner: Address = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap();
        let other: Address = EMPLOYEE.parse().unwrap();

        let snapshot = CoordinatorSnapshot {
            owner: Some(owner),
            my_leave_count: 0,
            state: TxState::Idle,
            last_handle: None,
            last_error: None,
        };

        assert!(snapshot.is_owner(Some(owner)));
        assert!(!snapshot.is_owner(Some(other)));
        assert!(!snapshot.is_owner(None));
        assert!(snapshot.actions_enabled());
    }
}
