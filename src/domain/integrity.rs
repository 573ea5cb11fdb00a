use serde::Serialize;

use super::EntryId;

/// Raw counters gathered from storage for an integrity check.
#[derive(Debug, Clone, Default)]
pub struct IntegrityStats {
    pub entry_count: i64,
    pub account_posting_count: i64,
    pub card_posting_count: i64,
    pub min_entry_id: Option<EntryId>,
    pub max_entry_id: Option<EntryId>,
    pub sequence_value: i64,
    pub orphan_entries: i64,
    pub doubly_posted_entries: i64,
    pub unbalanced_transfers: i64,
    pub malformed_card_repayments: i64,
    pub unlinked_loan_payments: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub entry_count: i64,
    pub account_posting_count: i64,
    pub card_posting_count: i64,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn build_integrity_report(stats: &IntegrityStats) -> IntegrityReport {
    let mut issues = Vec::new();

    if let (Some(min), Some(max)) = (stats.min_entry_id, stats.max_entry_id) {
        if max - min + 1 != stats.entry_count {
            issues.push(format!(
                "ledger ids {}..={} hold {} entries (gap or reuse)",
                min, max, stats.entry_count
            ));
        }
        if stats.sequence_value < max {
            issues.push(format!(
                "sequence counter {} is behind the highest entry id {}",
                stats.sequence_value, max
            ));
        }
    }

    if stats.orphan_entries > 0 {
        issues.push(format!("{} ledger entries have no posting", stats.orphan_entries));
    }
    if stats.doubly_posted_entries > 0 {
        issues.push(format!(
            "{} ledger entries are linked to both an account and a card",
            stats.doubly_posted_entries
        ));
    }
    if stats.unbalanced_transfers > 0 {
        issues.push(format!(
            "{} transfers lack a matching opposite leg",
            stats.unbalanced_transfers
        ));
    }
    if stats.malformed_card_repayments > 0 {
        issues.push(format!(
            "{} credit-card repayments do not pair a +A card leg with a -2A account leg",
            stats.malformed_card_repayments
        ));
    }
    if stats.unlinked_loan_payments > 0 {
        issues.push(format!(
            "{} loan payments do not reference a loan",
            stats.unlinked_loan_payments
        ));
    }

    IntegrityReport {
        entry_count: stats.entry_count,
        account_posting_count: stats.account_posting_count,
        card_posting_count: stats.card_posting_count,
        issues,
    }
}
