use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, CardId, Cents, LoanId};

/// Ledger entry identifier. Unique and strictly increasing in commit order.
pub type EntryId = i64;

/// An immutable signed ledger record.
/// Negative amounts are outflows from the posting context, positive amounts inflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub occurred_at: DateTime<Utc>,
    pub signed_amount: Cents,
}

/// Semantic tag carried by an account posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    #[serde(rename = "Transfer_OUT")]
    TransferOut,
    #[serde(rename = "Transfer_IN")]
    TransferIn,
    LoanPayment,
    #[serde(rename = "CC_Repayment")]
    CcRepayment,
    Deposit,
}

impl MovementType {
    pub const ALL: [MovementType; 5] = [
        MovementType::TransferOut,
        MovementType::TransferIn,
        MovementType::LoanPayment,
        MovementType::CcRepayment,
        MovementType::Deposit,
    ];

    /// Tag as stored in the `account_postings.movement_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::TransferOut => "Transfer_OUT",
            MovementType::TransferIn => "Transfer_IN",
            MovementType::LoanPayment => "LoanPayment",
            MovementType::CcRepayment => "CC_Repayment",
            MovementType::Deposit => "Deposit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mt| mt.as_str() == s)
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Links one ledger entry to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPosting {
    pub entry_id: EntryId,
    pub account_id: AccountId,
    pub movement_type: MovementType,
    /// Set exactly for `LoanPayment` postings.
    pub loan_id: Option<LoanId>,
}

/// Links the card leg of a credit-card repayment to the card and to the account that funded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPosting {
    pub entry_id: EntryId,
    pub account_id: AccountId,
    pub card_id: CardId,
}

/// Which posting table a row lives in. Balance views declare the kinds they sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostingKind {
    Account,
    Card,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Posting {
    Account(AccountPosting),
    Card(CardPosting),
}

impl Posting {
    pub fn kind(&self) -> PostingKind {
        match self {
            Posting::Account(_) => PostingKind::Account,
            Posting::Card(_) => PostingKind::Card,
        }
    }

    pub fn entry_id(&self) -> EntryId {
        match self {
            Posting::Account(p) => p.entry_id,
            Posting::Card(p) => p.entry_id,
        }
    }

    /// The account this posting is attributed to. For card postings that is the funding account.
    pub fn account_id(&self) -> AccountId {
        match self {
            Posting::Account(p) => p.account_id,
            Posting::Card(p) => p.account_id,
        }
    }
}

/// A ledger entry together with its single posting, as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedEntry {
    pub entry: LedgerEntry,
    pub posting: Posting,
}

/// Where a leg of a posting request lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegTarget {
    Account {
        account_id: AccountId,
        movement_type: MovementType,
        loan_id: Option<LoanId>,
    },
    Card {
        account_id: AccountId,
        card_id: CardId,
    },
}

/// One entry of a posting request, before an id has been allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingLeg {
    pub signed_amount: Cents,
    pub target: LegTarget,
}

impl PostingLeg {
    pub fn account(signed_amount: Cents, account_id: AccountId, movement_type: MovementType) -> Self {
        Self {
            signed_amount,
            target: LegTarget::Account {
                account_id,
                movement_type,
                loan_id: None,
            },
        }
    }

    pub fn loan_payment(signed_amount: Cents, account_id: AccountId, loan_id: LoanId) -> Self {
        Self {
            signed_amount,
            target: LegTarget::Account {
                account_id,
                movement_type: MovementType::LoanPayment,
                loan_id: Some(loan_id),
            },
        }
    }

    pub fn card(signed_amount: Cents, account_id: AccountId, card_id: CardId) -> Self {
        Self {
            signed_amount,
            target: LegTarget::Card {
                account_id,
                card_id,
            },
        }
    }

    /// Materialise this leg once its entry id is known.
    pub fn into_posted(self, id: EntryId, occurred_at: DateTime<Utc>) -> PostedEntry {
        let posting = match self.target {
            LegTarget::Account {
                account_id,
                movement_type,
                loan_id,
            } => Posting::Account(AccountPosting {
                entry_id: id,
                account_id,
                movement_type,
                loan_id,
            }),
            LegTarget::Card {
                account_id,
                card_id,
            } => Posting::Card(CardPosting {
                entry_id: id,
                account_id,
                card_id,
            }),
        };
        PostedEntry {
            entry: LedgerEntry {
                id,
                occurred_at,
                signed_amount: self.signed_amount,
            },
            posting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_type_tags() {
        for mt in MovementType::ALL {
            assert_eq!(MovementType::parse(mt.as_str()), Some(mt));
        }
        assert_eq!(MovementType::CcRepayment.as_str(), "CC_Repayment");
        assert_eq!(MovementType::parse("cc_repayment"), None);
    }

    #[test]
    fn test_movement_type_serializes_as_stored_tag() {
        let json = serde_json::to_string(&MovementType::TransferOut).unwrap();
        assert_eq!(json, "\"Transfer_OUT\"");
    }

    #[test]
    fn test_card_leg_materialises_as_card_posting() {
        let posted = PostingLeg::card(5000, 7, 3).into_posted(42, Utc::now());
        assert_eq!(posted.entry.id, 42);
        assert_eq!(posted.entry.signed_amount, 5000);
        assert_eq!(posted.posting.kind(), PostingKind::Card);
        assert_eq!(posted.posting.account_id(), 7);
    }

    #[test]
    fn test_loan_leg_carries_loan_reference() {
        let posted = PostingLeg::loan_payment(-2500, 1, 9).into_posted(5, Utc::now());
        match posted.posting {
            Posting::Account(p) => {
                assert_eq!(p.movement_type, MovementType::LoanPayment);
                assert_eq!(p.loan_id, Some(9));
            }
            Posting::Card(_) => panic!("expected an account posting"),
        }
    }
}
