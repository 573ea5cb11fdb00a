mod common;

use std::collections::BTreeSet;

use anyhow::Result;
use bankledger::application::Rejection;
use common::{Household, balance, test_service};
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_receive_distinct_contiguous_ids() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 1_000_000).await?;
    let n = 20;

    let mut tasks = JoinSet::new();
    for _ in 0..n {
        let service = service.clone();
        let source = home.checking.id;
        tasks.spawn(async move { service.transfer(source, "ACC-100", 100).await });
    }

    let mut ids = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let receipt = joined??;
        assert_eq!(receipt.entry_ids[1], receipt.entry_ids[0] + 1);
        ids.extend(receipt.entry_ids);
    }

    let distinct: BTreeSet<_> = ids.iter().copied().collect();
    assert_eq!(ids.len(), 2 * n);
    assert_eq!(distinct.len(), 2 * n);

    // The deposit took id 1; every transfer id follows without holes.
    let expected: BTreeSet<i64> = (2..2 + 2 * n as i64).collect();
    assert_eq!(distinct, expected);

    assert_eq!(balance(&service, &home.checking).await?, 1_000_000 - 100 * n as i64);
    assert!(service.check_integrity().await?.is_healthy());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_cannot_overdraw() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 10000).await?;

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let service = service.clone();
        let source = home.checking.id;
        tasks.spawn(async move { service.transfer(source, "ACC-100", 3000).await });
    }

    let mut confirmed = 0;
    let mut refused = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok(_) => confirmed += 1,
            Err(err) => {
                assert!(matches!(
                    err.rejection(),
                    Some(Rejection::InsufficientFunds { .. })
                ));
                refused += 1;
            }
        }
    }

    assert_eq!(confirmed, 3);
    assert_eq!(refused, 7);
    assert_eq!(balance(&service, &home.checking).await?, 1000);
    assert_eq!(balance(&service, &home.bob_account).await?, 9000);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loan_payments_cannot_overpay() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 1_000_000).await?;
    let loan = home.grant_loan(&service, 10000).await?;

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let service = service.clone();
        let source = home.checking.id;
        tasks.spawn(async move { service.pay_loan(source, 4000).await });
    }

    let mut confirmed = 0;
    while let Some(joined) = tasks.join_next().await {
        if joined?.is_ok() {
            confirmed += 1;
        }
    }

    assert_eq!(confirmed, 2);
    assert_eq!(service.loan_summary(loan.id).await?.debt, 2000);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_card_repayments_cannot_overpay() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 1_000_000).await?;
    let card = home.issue_card(&service, "4000-0001", 10000, 0).await?;

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let service = service.clone();
        let source = home.checking.id;
        let card_id = card.id;
        tasks.spawn(async move { service.repay_credit_card(source, card_id, 4000).await });
    }

    let mut confirmed = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined? {
            Ok(_) => confirmed += 1,
            Err(err) => assert!(matches!(
                err.rejection(),
                Some(Rejection::RepaymentExceedsUsedCredit { .. })
            )),
        }
    }

    assert_eq!(confirmed, 2);
    assert_eq!(service.card_summary(card.id).await?.available, 8000);
    assert_eq!(balance(&service, &home.checking).await?, 1_000_000 - 8000);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_concurrent_movements_keep_ledger_consistent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 500_000).await?;
    let card = home.issue_card(&service, "4000-0001", 100_000, 0).await?;
    home.grant_loan(&service, 100_000).await?;

    let mut tasks = JoinSet::new();
    for i in 0..12 {
        let service = service.clone();
        let source = home.checking.id;
        let card_id = card.id;
        tasks.spawn(async move {
            match i % 3 {
                0 => service.transfer(source, "ACC-002", 1000).await,
                1 => service.pay_loan(source, 1000).await,
                _ => service.repay_credit_card(source, card_id, 1000).await,
            }
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }

    assert_eq!(balance(&service, &home.checking).await?, 500_000 - 12 * 1000);
    assert_eq!(service.card_summary(card.id).await?.available, 4000);

    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "issues: {:?}", report.issues);
    Ok(())
}
