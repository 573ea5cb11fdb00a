mod common;

use anyhow::Result;
use bankledger::application::Rejection;
use bankledger::domain::{MovementKind, MovementType, Posting};
use common::{Household, balance, entry_count, test_service};

#[tokio::test]
async fn test_repayment_moves_amount_once_in_each_view() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 8000).await?;
    let card = home.issue_card(&service, "4000-0001", 100000, 20000).await?;

    let receipt = service
        .repay_credit_card(home.checking.id, card.id, 5000)
        .await?;

    assert_eq!(receipt.kind, MovementKind::CreditCardRepayment);
    assert_eq!(service.card_summary(card.id).await?.available, 25000);
    assert_eq!(balance(&service, &home.checking).await?, 3000);

    let history = service.account_history(home.checking.id, 10).await?;
    let repayment = history
        .iter()
        .find(|line| line.movement_type == MovementType::CcRepayment)
        .expect("repayment line");
    assert_eq!(repayment.ledger_amount, -10000);
    assert_eq!(repayment.display_amount, -5000);

    Ok(())
}

#[tokio::test]
async fn test_repayment_writes_card_leg_then_doubled_account_leg() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 8000).await?;
    let card = home.issue_card(&service, "4000-0001", 100000, 20000).await?;

    let receipt = service
        .repay_credit_card(home.checking.id, card.id, 5000)
        .await?;
    let [card_id, account_id] = receipt.entry_ids[..] else {
        panic!("expected two entries, got {:?}", receipt.entry_ids);
    };
    assert_eq!(account_id, card_id + 1);

    let entries = service.repository().list_posted_entries().await?;
    let card_leg = entries.iter().find(|e| e.entry.id == card_id).expect("card leg");
    let account_leg = entries
        .iter()
        .find(|e| e.entry.id == account_id)
        .expect("account leg");

    assert_eq!(card_leg.entry.signed_amount, 5000);
    assert!(matches!(&card_leg.posting, Posting::Card(p) if p.card_id == card.id && p.account_id == home.checking.id));
    assert_eq!(account_leg.entry.signed_amount, -10000);
    assert!(matches!(&account_leg.posting, Posting::Account(p) if p.movement_type == MovementType::CcRepayment));

    Ok(())
}

#[tokio::test]
async fn test_history_hides_card_leg() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 8000).await?;
    let card = home.issue_card(&service, "4000-0001", 100000, 20000).await?;

    service
        .repay_credit_card(home.checking.id, card.id, 5000)
        .await?;

    let history = service.account_history(home.checking.id, 10).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].movement_type, MovementType::CcRepayment);
    assert_eq!(history[1].movement_type, MovementType::Deposit);

    let shown: i64 = history.iter().map(|line| line.display_amount).sum();
    assert_eq!(shown, balance(&service, &home.checking).await?);
    Ok(())
}

#[tokio::test]
async fn test_repayment_needs_funds_for_amount_not_double() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 5000).await?;
    let card = home.issue_card(&service, "4000-0001", 100000, 0).await?;

    service
        .repay_credit_card(home.checking.id, card.id, 5000)
        .await?;
    assert_eq!(balance(&service, &home.checking).await?, 0);

    let err = service
        .repay_credit_card(home.checking.id, card.id, 1)
        .await
        .unwrap_err();
    assert_eq!(
        err.rejection(),
        Some(&Rejection::InsufficientFunds {
            balance: 0,
            required: 1
        })
    );
    Ok(())
}

#[tokio::test]
async fn test_repayment_above_used_credit_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 50000).await?;
    let card = home.issue_card(&service, "4000-0001", 10000, 8000).await?;
    let entries_before = entry_count(&service).await?;

    let err = service
        .repay_credit_card(home.checking.id, card.id, 5000)
        .await
        .unwrap_err();

    assert_eq!(
        err.rejection(),
        Some(&Rejection::RepaymentExceedsUsedCredit {
            used: 2000,
            requested: 5000
        })
    );
    assert_eq!(entry_count(&service).await?, entries_before);
    assert_eq!(service.card_summary(card.id).await?.available, 8000);
    assert_eq!(balance(&service, &home.checking).await?, 50000);
    Ok(())
}

#[tokio::test]
async fn test_repaying_all_used_credit_restores_the_limit() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 50000).await?;
    let card = home.issue_card(&service, "4000-0001", 10000, 8000).await?;

    service
        .repay_credit_card(home.checking.id, card.id, 2000)
        .await?;

    let summary = service.card_summary(card.id).await?;
    assert_eq!(summary.available, 10000);
    assert_eq!(summary.used, 0);
    assert!(!summary.eligible_for_repayment);
    assert_eq!(balance(&service, &home.checking).await?, 48000);

    let err = service
        .repay_credit_card(home.checking.id, card.id, 1)
        .await
        .unwrap_err();
    assert_eq!(
        err.rejection(),
        Some(&Rejection::RepaymentExceedsUsedCredit {
            used: 0,
            requested: 1
        })
    );
    Ok(())
}

#[tokio::test]
async fn test_non_positive_repayments_are_rejected_before_allocation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 50000).await?;
    let card = home.issue_card(&service, "4000-0001", 10000, 0).await?;
    let entries_before = entry_count(&service).await?;

    for amount in [0, -1, -5000] {
        let err = service
            .repay_credit_card(home.checking.id, card.id, amount)
            .await
            .unwrap_err();
        assert_eq!(err.rejection(), Some(&Rejection::NonPositiveAmount));
    }

    assert_eq!(entry_count(&service).await?, entries_before);
    assert_eq!(service.card_summary(card.id).await?.available, 0);
    Ok(())
}

#[tokio::test]
async fn test_repayment_to_missing_card_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 8000).await?;
    let entries_before = entry_count(&service).await?;

    let err = service
        .repay_credit_card(home.checking.id, 777, 1000)
        .await
        .unwrap_err();

    assert_eq!(err.rejection(), Some(&Rejection::CardNotFound(777)));
    assert!(!err.is_retryable());
    assert_eq!(entry_count(&service).await?, entries_before);
    assert_eq!(balance(&service, &home.checking).await?, 8000);
    Ok(())
}
