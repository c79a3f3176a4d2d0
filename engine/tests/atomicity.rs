//! All-or-nothing commits and absence of side effects on failure.

mod support;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use support::TestLedger;
use walletledger_common::{Currency, ErrorKind, WalletError};
use walletledger_engine::{BuyRequest, TransferRequest};
use walletledger_fx::FxError;

#[tokio::test]
async fn test_failed_credit_save_rolls_back_debit() {
    let t = TestLedger::new();
    let source = t.wallet("source", &[("USD", dec!(100))]);
    let target = t.wallet("target", &[("BTC", dec!(0))]);
    let before = (t.snapshot(source), t.snapshot(target));

    t.ledger.store.fail_next_save(target);
    let err = t
        .ledger
        .engine
        .transfer(TransferRequest::new(source, target, "USD", "BTC", dec!(10)).at_price(dec!(0.5)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!((t.snapshot(source), t.snapshot(target)), before);

    // The store is usable again once the fault is gone.
    t.ledger
        .engine
        .transfer(TransferRequest::new(source, target, "USD", "BTC", dec!(10)).at_price(dec!(0.5)))
        .await
        .unwrap();
    assert_eq!(t.balance(source, Currency::usd()), Some(dec!(90)));
    assert_eq!(t.balance(target, Currency::btc()), Some(dec!(5)));
}

#[tokio::test]
async fn test_failed_buy_save_leaves_wallet_untouched() {
    let t = TestLedger::new();
    let wallet = t.wallet("main", &[("USD", dec!(100))]);
    let before = t.snapshot(wallet);

    t.ledger.store.fail_next_save(wallet);
    let err = t
        .ledger
        .engine
        .buy(BuyRequest::new(wallet, "USD", "EUR", dec!(10)).at_price(dec!(0.9)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(t.snapshot(wallet), before);
}

#[tokio::test]
async fn test_rejected_operations_have_no_side_effects() {
    let t = TestLedger::new();
    t.price(Currency::btc(), Currency::usd(), dec!(36000));
    let alice = t.wallet("alice", &[("BTC", dec!(1)), ("USD", dec!(10))]);
    let bob = t.wallet("bob", &[("EUR", dec!(5))]);
    let before = (t.snapshot(alice), t.snapshot(bob));

    let buys = [
        BuyRequest::new(alice, "BTC", "USD", dec!(2)),
        BuyRequest::new(alice, "ETH", "USD", dec!(1)),
        BuyRequest::new(alice, "BTC", "XYZ", dec!(1)),
        BuyRequest::new(alice, "BTC", "USD", dec!(-1)),
        BuyRequest::new(alice, "BTC", "USD", dec!(1)).at_price(dec!(40000)).validated(),
        BuyRequest::new(alice, "USD", "ETH", dec!(1)),
    ];
    for request in buys {
        assert!(t.ledger.engine.buy(request).await.is_err());
    }

    let transfers = [
        TransferRequest::new(alice, bob, "BTC", "USD", dec!(1.5)),
        TransferRequest::new(alice, bob, "GBP", "USD", dec!(1)),
        TransferRequest::new(alice, alice, "BTC", "USD", dec!(1)),
        TransferRequest::new(bob, alice, "EUR", "USD", dec!(1)),
    ];
    for request in transfers {
        assert!(t.ledger.engine.transfer(request).await.is_err());
    }

    t.provider.fail_with(FxError::ProviderError("upstream 500".into()));
    let err = t
        .ledger
        .engine
        .transfer(TransferRequest::new(bob, alice, "EUR", "BTC", dec!(1)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);

    assert_eq!((t.snapshot(alice), t.snapshot(bob)), before);
    assert_eq!(t.ledger.engine.metrics().snapshot().operations_committed, 0);
}

#[tokio::test]
async fn test_unknown_wallet_in_transfer() {
    let t = TestLedger::new();
    let alice = t.wallet("alice", &[("USD", dec!(10))]);
    let before = t.snapshot(alice);
    let ghost = walletledger_common::WalletId::new();

    let err = t
        .ledger
        .engine
        .transfer(TransferRequest::new(alice, ghost, "USD", "USD", dec!(1)).at_price(dec!(1)))
        .await
        .unwrap_err();

    assert_eq!(err, WalletError::WalletNotFound(ghost));
    assert_eq!(t.snapshot(alice), before);
}

#[tokio::test]
async fn test_cancelled_operation_leaves_no_trace() {
    let t = TestLedger::new();
    t.price(Currency::btc(), Currency::usd(), dec!(36000));
    t.provider.set_delay(Duration::from_millis(500));
    let wallet = t.wallet("main", &[("BTC", dec!(1))]);
    let before = t.snapshot(wallet);

    let ledger = Arc::clone(&t.ledger);
    let result = tokio::time::timeout(
        Duration::from_millis(50),
        ledger.engine.buy(BuyRequest::new(wallet, "BTC", "USD", dec!(1))),
    )
    .await;
    assert!(result.is_err());

    assert_eq!(t.snapshot(wallet), before);

    // The abandoned transaction released its lock.
    let mut tx = t.ledger.store.begin();
    assert!(tx.get_for_exclusive_write(wallet).await.is_ok());
}

#[tokio::test]
async fn test_lock_timeout_is_conflict() {
    let mut config = walletledger_engine::EngineConfig::default();
    config.store.lock_timeout = Duration::from_millis(50);
    let t = TestLedger::with_config(config);
    let wallet = t.wallet("main", &[("USD", dec!(10))]);

    let mut holder = t.ledger.store.begin();
    holder.get_for_exclusive_write(wallet).await.unwrap();

    let err = t
        .ledger
        .engine
        .buy(BuyRequest::new(wallet, "USD", "EUR", dec!(1)).at_price(dec!(1)))
        .await
        .unwrap_err();

    assert_eq!(err, WalletError::LockTimeout(wallet));
    assert_eq!(err.http_status(), 409);
    assert!(err.is_retryable());
}
