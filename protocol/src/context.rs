//! # Call Context
//!
//! Every state-changing contract call runs inside a [`CallContext`]: who is
//! calling and what time the ledger says it is. Contracts never read the
//! wall clock themselves. Expiry is a pure function of the timestamp handed
//! in here, which is what lets tests walk a credential past its expiry
//! without sleeping for a year.

use serde::{Deserialize, Serialize};

use crate::identity::Address;

/// Unix timestamp in seconds, as the ledger reports it.
pub type Timestamp = u64;

/// Caller identity and ledger time for a single contract call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// The account that submitted the call.
    pub caller: Address,
    /// Ledger time at which the call executes.
    pub timestamp: Timestamp,
}

impl CallContext {
    /// Creates a context for `caller` at `timestamp`.
    pub fn new(caller: Address, timestamp: Timestamp) -> Self {
        Self { caller, timestamp }
    }

    /// The same caller at a different time.
    pub fn at(self, timestamp: Timestamp) -> Self {
        Self { timestamp, ..self }
    }
}

/// Current wall-clock time in Unix seconds. Only the node calls this; the
/// contracts take time from their [`CallContext`].
pub fn now_unix() -> Timestamp {
    chrono::Utc::now().timestamp().max(0) as Timestamp
}
