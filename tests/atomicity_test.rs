mod common;

use anyhow::Result;
use bankledger::application::MovementError;
use bankledger::domain::{MovementType, PostingLeg};
use bankledger::storage::{LedgerPoster, PostingFailure, PostingScope, SequenceAllocator};
use chrono::Utc;
use common::{Household, balance, entry_count, impatient_service, test_service};

#[tokio::test]
async fn test_failed_second_leg_leaves_no_rows() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 10000).await?;
    let entries_before = entry_count(&service).await?;

    let legs = [
        PostingLeg::account(-4000, home.checking.id, MovementType::TransferOut),
        PostingLeg::account(4000, 9999, MovementType::TransferIn),
    ];
    let err = LedgerPoster::new()
        .post(service.repository().pool(), &legs, Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, PostingFailure::ConstraintViolated(_)));
    assert_eq!(entry_count(&service).await?, entries_before);
    assert_eq!(balance(&service, &home.checking).await?, 10000);
    Ok(())
}

#[tokio::test]
async fn test_rolled_back_ids_are_not_left_as_gaps() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 10000).await?;

    let legs = [
        PostingLeg::account(-4000, home.checking.id, MovementType::TransferOut),
        PostingLeg::account(4000, 9999, MovementType::TransferIn),
    ];
    LedgerPoster::new()
        .post(service.repository().pool(), &legs, Utc::now())
        .await
        .unwrap_err();

    let receipt = service.transfer(home.checking.id, "ACC-002", 1000).await?;
    assert_eq!(receipt.entry_ids, vec![2, 3]);
    assert!(service.check_integrity().await?.is_healthy());
    Ok(())
}

#[tokio::test]
async fn test_dropped_scope_discards_its_postings() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let home = Household::funded(&service, 10000).await?;
    let pool = service.repository().pool();

    {
        let mut scope = PostingScope::begin(pool).await?;
        let ids = LedgerPoster::new()
            .post_in(
                &mut scope,
                &[PostingLeg::account(500, home.savings.id, MovementType::Deposit)],
                Utc::now(),
            )
            .await?;
        assert_eq!(ids, vec![2]);
    }

    assert_eq!(balance(&service, &home.savings).await?, 0);
    let mut conn = pool.acquire().await?;
    assert_eq!(SequenceAllocator::current(&mut conn).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_posting_is_refused() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = LedgerPoster::new()
        .post(service.repository().pool(), &[], Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, PostingFailure::ConstraintViolated(_)));
    Ok(())
}

#[tokio::test]
async fn test_posting_times_out_while_ledger_is_locked() -> Result<()> {
    let (service, _temp) = impatient_service().await?;
    let home = Household::funded(&service, 10000).await?;

    let held = PostingScope::begin(service.repository().pool()).await?;

    let err = service
        .transfer(home.checking.id, "ACC-100", 1000)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MovementError::Failed(PostingFailure::StorageUnavailable(_))
    ));
    assert!(err.is_retryable());
    assert!(err.user_message().contains("try again"));

    held.rollback().await?;

    service.transfer(home.checking.id, "ACC-100", 1000).await?;
    assert_eq!(balance(&service, &home.checking).await?, 9000);
    Ok(())
}

#[tokio::test]
async fn test_ledger_rows_are_append_only() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Household::funded(&service, 10000).await?;
    let pool = service.repository().pool();

    let update = sqlx::query("UPDATE ledger_entries SET signed_amount_cents = 1")
        .execute(pool)
        .await
        .unwrap_err();
    assert!(matches!(
        PostingFailure::from(update),
        PostingFailure::ConstraintViolated(_)
    ));

    let delete = sqlx::query("DELETE FROM account_postings")
        .execute(pool)
        .await
        .unwrap_err();
    assert!(matches!(
        PostingFailure::from(delete),
        PostingFailure::ConstraintViolated(_)
    ));

    assert_eq!(entry_count(&service).await?, 1);
    Ok(())
}
