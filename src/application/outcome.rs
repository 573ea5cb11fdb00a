use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Cents, EntryId, MovementKind};
use crate::storage::PostingFailure;

use super::{MovementError, Rejection};

/// Proof that a movement was posted and committed.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    /// Correlates the log lines of one request.
    pub operation_id: Uuid,
    pub kind: MovementKind,
    /// Ledger ids in the order the legs were posted.
    pub entry_ids: Vec<EntryId>,
    pub amount: Cents,
    pub occurred_at: DateTime<Utc>,
}

/// The three ways a movement can end.
#[derive(Debug, Clone)]
pub enum MovementOutcome {
    Confirmed(Receipt),
    Rejected(Rejection),
    Failed(PostingFailure),
}

impl MovementOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, MovementOutcome::Confirmed(_))
    }
}

impl From<Result<Receipt, MovementError>> for MovementOutcome {
    fn from(result: Result<Receipt, MovementError>) -> Self {
        match result {
            Ok(receipt) => MovementOutcome::Confirmed(receipt),
            Err(MovementError::Rejected(rejection)) => MovementOutcome::Rejected(rejection),
            Err(MovementError::Failed(failure)) => MovementOutcome::Failed(failure),
        }
    }
}
