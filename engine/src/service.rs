//! The operation engine: buy and transfer.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use walletledger_common::{Result, WalletError, WalletId};
use walletledger_fx::RateResolver;
use walletledger_ledger::{CurrencyRegistry, Wallet, WalletStore};

use crate::config::EngineConfig;
use crate::metrics::OperationMetrics;
use crate::operation::{BuyRequest, ConversionOrder, TransferRequest};
use crate::pricing::resolve_price;

/// Executes balance-mutating operations.
///
/// Each call is one store transaction: every wallet it touches is locked
/// exclusively before anything is read for a write, and either all of its
/// writes commit or none do. Operations on disjoint wallets run in parallel.
pub struct OperationEngine {
    store: Arc<WalletStore>,
    registry: Arc<CurrencyRegistry>,
    rates: Arc<RateResolver>,
    config: EngineConfig,
    metrics: Arc<OperationMetrics>,
}

impl OperationEngine {
    /// Build an engine over shared components. Fails on an invalid config.
    pub fn new(
        store: Arc<WalletStore>,
        registry: Arc<CurrencyRegistry>,
        rates: Arc<RateResolver>,
        config: EngineConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| WalletError::invalid(format!("Invalid engine configuration: {}", e)))?;

        Ok(Self {
            store,
            registry,
            rates,
            config,
            metrics: Arc::new(OperationMetrics::new()),
        })
    }

    /// Outcome counters.
    pub fn metrics(&self) -> Arc<OperationMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Convert `amount` of one currency into another inside a wallet.
    ///
    /// Steps: validate input, lock the wallet, check both symbols, check the
    /// source balance, resolve the price, debit, credit, save, commit.
    #[instrument(skip(self, request), fields(wallet_id = tracing::field::Empty, amount = tracing::field::Empty))]
    pub async fn buy(&self, request: BuyRequest) -> Result<()> {
        let result = self.execute_buy(request).await;
        self.finish("buy", &result);
        result
    }

    /// Convert `amount` out of one wallet and into another.
    ///
    /// Both wallets are locked, in ascending id order, before either is
    /// read. Unknown symbols are rejected before any lock is taken.
    #[instrument(
        skip(self, request),
        fields(
            wallet_id_from = tracing::field::Empty,
            wallet_id_to = tracing::field::Empty,
            amount = tracing::field::Empty
        )
    )]
    pub async fn transfer(&self, request: TransferRequest) -> Result<()> {
        let result = self.execute_transfer(request).await;
        self.finish("transfer", &result);
        result
    }

    async fn execute_buy(&self, request: BuyRequest) -> Result<()> {
        let (wallet_id, order) = request.validate()?;
        record_span_fields(&[("wallet_id", wallet_id)], order.amount);

        let mut tx = self.store.begin();
        let mut wallet = tx.get_for_exclusive_write(wallet_id).await?;

        self.check_registered(&order)?;
        check_funds(&wallet, &order)?;

        let price = resolve_price(&self.rates, &order, self.config.price_tolerance).await?;
        let credit = credit_amount(&order, price)?;

        wallet.debit(&order.currency_from, order.amount)?;
        wallet.credit(&order.currency_to, credit)?;

        tx.save(wallet)?;
        tx.commit();

        info!(
            wallet_id = %wallet_id,
            from = %order.currency_from,
            to = %order.currency_to,
            amount = %order.amount,
            price = %price,
            credited = %credit,
            "Buy committed"
        );
        Ok(())
    }

    async fn execute_transfer(&self, request: TransferRequest) -> Result<()> {
        let (from_id, to_id, order) = request.validate()?;
        record_span_fields(
            &[("wallet_id_from", from_id), ("wallet_id_to", to_id)],
            order.amount,
        );

        self.check_registered(&order)?;

        let mut tx = self.store.begin();
        let wallets = tx.get_many_for_exclusive_write(&[from_id, to_id]).await?;
        let [mut source, mut target]: [Wallet; 2] = wallets
            .try_into()
            .map_err(|_| WalletError::Conflict("expected two wallets".to_string()))?;

        check_funds(&source, &order)?;

        let price = resolve_price(&self.rates, &order, self.config.price_tolerance).await?;
        let credit = credit_amount(&order, price)?;

        source.debit(&order.currency_from, order.amount)?;
        target.credit(&order.currency_to, credit)?;

        tx.save(source)?;
        tx.save(target)?;
        tx.commit();

        info!(
            wallet_id_from = %from_id,
            wallet_id_to = %to_id,
            from = %order.currency_from,
            to = %order.currency_to,
            amount = %order.amount,
            price = %price,
            credited = %credit,
            "Transfer committed"
        );
        Ok(())
    }

    fn check_registered(&self, order: &ConversionOrder) -> Result<()> {
        self.registry.find_by_symbol(order.currency_from.code())?;
        self.registry.find_by_symbol(order.currency_to.code())?;
        Ok(())
    }

    fn finish(&self, operation: &str, result: &Result<()>) {
        self.metrics.record(result);
        if let Err(err) = result {
            warn!(
                operation,
                kind = ?err.kind(),
                code = err.error_code(),
                error = %err,
                "Operation rejected"
            );
        }
    }
}

fn check_funds(wallet: &Wallet, order: &ConversionOrder) -> Result<()> {
    let available = wallet
        .balance_of(&order.currency_from)
        .ok_or_else(|| WalletError::MissingCurrency {
            wallet_id: wallet.id,
            currency: order.currency_from.clone(),
        })?;

    if order.amount > available {
        return Err(WalletError::InsufficientFunds {
            currency: order.currency_from.clone(),
            available,
            requested: order.amount,
        });
    }
    Ok(())
}

fn credit_amount(order: &ConversionOrder, price: Decimal) -> Result<Decimal> {
    order.amount.checked_mul(price).ok_or_else(|| {
        WalletError::ArithmeticOverflow(format!("{} * {}", order.amount, price))
    })
}

fn record_span_fields(ids: &[(&'static str, WalletId)], amount: Decimal) {
    let span = tracing::Span::current();
    for (name, id) in ids {
        span.record(*name, tracing::field::display(id));
    }
    span.record("amount", tracing::field::display(amount));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use walletledger_common::{Currency, ErrorKind};
    use walletledger_fx::{FxError, MockRateProvider, RateResolverConfig};
    use walletledger_ledger::{CurrencyAmount, WalletService};

    struct Fixture {
        engine: OperationEngine,
        store: Arc<WalletStore>,
        wallets: WalletService,
        provider: Arc<MockRateProvider>,
    }

    fn setup() -> Fixture {
        let store = Arc::new(WalletStore::default());
        let provider = Arc::new(MockRateProvider::new("test"));
        provider.set_price(Currency::usd(), Currency::btc(), dec!(0.00002778));
        provider.set_price(Currency::btc(), Currency::usd(), dec!(36000));
        provider.set_price(Currency::eur(), Currency::usd(), dec!(1.1));

        let rates = Arc::new(RateResolver::new(provider.clone(), RateResolverConfig::default()));
        let engine = OperationEngine::new(
            store.clone(),
            Arc::new(CurrencyRegistry::seeded()),
            rates,
            EngineConfig::default(),
        )
        .unwrap();

        Fixture {
            engine,
            wallets: WalletService::new(store.clone()),
            store,
            provider,
        }
    }

    fn balance(fixture: &Fixture, id: WalletId, currency: Currency) -> Option<Decimal> {
        fixture.wallets.find(id).unwrap().balance_of(&currency)
    }

    #[tokio::test]
    async fn test_buy_at_market_rate() {
        let f = setup();
        let wallet = f
            .wallets
            .create("main", vec![CurrencyAmount::new("BTC", dec!(2))])
            .unwrap();

        f.engine
            .buy(BuyRequest::new(wallet.id, "BTC", "USD", dec!(0.5)))
            .await
            .unwrap();

        assert_eq!(balance(&f, wallet.id, Currency::btc()), Some(dec!(1.5)));
        assert_eq!(balance(&f, wallet.id, Currency::usd()), Some(dec!(18000)));
    }

    #[tokio::test]
    async fn test_buy_at_fixed_price_adds_to_existing_entry() {
        let f = setup();
        let wallet = f
            .wallets
            .create(
                "main",
                vec![
                    CurrencyAmount::new("USD", dec!(100)),
                    CurrencyAmount::new("BTC", dec!(1)),
                ],
            )
            .unwrap();

        f.engine
            .buy(BuyRequest::new(wallet.id, "usd", "btc", dec!(40)).at_price(dec!(0.5)))
            .await
            .unwrap();

        assert_eq!(balance(&f, wallet.id, Currency::usd()), Some(dec!(60)));
        assert_eq!(balance(&f, wallet.id, Currency::btc()), Some(dec!(21)));
        assert_eq!(f.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_buy_entire_balance_keeps_zero_entry() {
        let f = setup();
        let wallet = f
            .wallets
            .create("main", vec![CurrencyAmount::new("EUR", dec!(10))])
            .unwrap();

        f.engine
            .buy(BuyRequest::new(wallet.id, "EUR", "USD", dec!(10)))
            .await
            .unwrap();

        assert_eq!(balance(&f, wallet.id, Currency::eur()), Some(Decimal::ZERO));
        assert_eq!(balance(&f, wallet.id, Currency::usd()), Some(dec!(11)));
    }

    #[tokio::test]
    async fn test_buy_rejections() {
        let f = setup();
        let wallet = f
            .wallets
            .create("main", vec![CurrencyAmount::new("USD", dec!(100))])
            .unwrap();

        let err = f
            .engine
            .buy(BuyRequest::new(wallet.id, "USD", "BTC", dec!(100.01)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("amount exceeds the available"));

        let err = f
            .engine
            .buy(BuyRequest::new(wallet.id, "EUR", "BTC", dec!(1)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not contain the currency from"));

        let err = f
            .engine
            .buy(BuyRequest::new(wallet.id, "USD", "XYZ", dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = f
            .engine
            .buy(BuyRequest::new(WalletId::new(), "USD", "BTC", dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::WalletNotFound(_)));

        let err = f
            .engine
            .buy(BuyRequest::new(wallet.id, "USD", "BTC", dec!(1)).at_price(dec!(0)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(balance(&f, wallet.id, Currency::usd()), Some(dec!(100)));
        assert_eq!(balance(&f, wallet.id, Currency::btc()), None);

        let snapshot = f.engine.metrics().snapshot();
        assert_eq!(snapshot.operations_total, 5);
        assert_eq!(snapshot.operations_committed, 0);
        assert_eq!(snapshot.rejected_not_found, 2);
    }

    #[tokio::test]
    async fn test_buy_with_validated_price() {
        let f = setup();
        let wallet = f
            .wallets
            .create("main", vec![CurrencyAmount::new("BTC", dec!(1))])
            .unwrap();

        let err = f
            .engine
            .buy(
                BuyRequest::new(wallet.id, "BTC", "USD", dec!(1))
                    .at_price(dec!(36051.54))
                    .validated(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::PriceOutOfTolerance { .. }));

        f.engine
            .buy(
                BuyRequest::new(wallet.id, "BTC", "USD", dec!(1))
                    .at_price(dec!(36000.004))
                    .validated(),
            )
            .await
            .unwrap();
        assert_eq!(balance(&f, wallet.id, Currency::usd()), Some(dec!(36000.004)));
    }

    #[tokio::test]
    async fn test_feed_outage_aborts_buy() {
        let f = setup();
        f.provider.fail_with(FxError::Timeout("1000ms".into()));
        let wallet = f
            .wallets
            .create("main", vec![CurrencyAmount::new("BTC", dec!(1))])
            .unwrap();

        let err = f
            .engine
            .buy(BuyRequest::new(wallet.id, "BTC", "USD", dec!(1)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExternalServiceFailure);
        assert!(err.is_retryable());
        assert_eq!(f.wallets.find(wallet.id).unwrap(), wallet);
    }

    #[tokio::test]
    async fn test_transfer_moves_converted_value() {
        let f = setup();
        let alice = f
            .wallets
            .create("alice", vec![CurrencyAmount::new("BTC", dec!(1))])
            .unwrap();
        let bob = f.wallets.create("bob", vec![]).unwrap();

        f.engine
            .transfer(TransferRequest::new(alice.id, bob.id, "BTC", "USD", dec!(0.25)))
            .await
            .unwrap();

        assert_eq!(balance(&f, alice.id, Currency::btc()), Some(dec!(0.75)));
        assert_eq!(balance(&f, alice.id, Currency::usd()), None);
        assert_eq!(balance(&f, bob.id, Currency::usd()), Some(dec!(9000)));
    }

    #[tokio::test]
    async fn test_transfer_unknown_symbol_takes_no_lock() {
        let f = setup();
        let alice = f
            .wallets
            .create("alice", vec![CurrencyAmount::new("BTC", dec!(1))])
            .unwrap();
        let bob = f.wallets.create("bob", vec![]).unwrap();

        // Hold bob exclusively; an unknown symbol must fail without waiting.
        let mut holder = f.store.begin();
        holder.get_for_exclusive_write(bob.id).await.unwrap();

        let err = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            f.engine
                .transfer(TransferRequest::new(alice.id, bob.id, "BTC", "XYZ", dec!(0.25))),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert_eq!(err, WalletError::CurrencyNotFound(Currency::new("XYZ")));
    }

    #[tokio::test]
    async fn test_transfer_to_self_rejected() {
        let f = setup();
        let alice = f
            .wallets
            .create("alice", vec![CurrencyAmount::new("BTC", dec!(1))])
            .unwrap();

        let err = f
            .engine
            .transfer(TransferRequest::new(alice.id, alice.id, "BTC", "USD", dec!(0.25)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(f.wallets.find(alice.id).unwrap(), alice);
    }
}
