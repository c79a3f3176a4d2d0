//! Applied-price resolution.

use rust_decimal::Decimal;
use tracing::{debug, warn};
use walletledger_common::{Result, WalletError};
use walletledger_fx::RateResolver;

use crate::operation::{ConversionOrder, PriceInstruction};

/// Whether `supplied` lies within `tolerance` of `market`, bounds included.
///
/// `market` must be positive.
pub fn within_tolerance(supplied: Decimal, market: Decimal, tolerance: Decimal) -> bool {
    let Some(ratio) = supplied.checked_div(market) else {
        return false;
    };
    ratio >= Decimal::ONE - tolerance && ratio <= Decimal::ONE + tolerance
}

/// Choose the price one unit of `currency_from` is converted at.
pub async fn resolve_price(
    rates: &RateResolver,
    order: &ConversionOrder,
    tolerance: Decimal,
) -> Result<Decimal> {
    match order.price {
        PriceInstruction::Market => {
            let price = rates.convert(&order.currency_from, &order.currency_to).await?;
            debug!(price = %price, "Using market rate");
            Ok(price)
        }
        PriceInstruction::Fixed(price) => {
            require_positive(price)?;
            Ok(price)
        }
        PriceInstruction::Checked(price) => {
            require_positive(price)?;
            let market = rates.convert(&order.currency_from, &order.currency_to).await?;
            if !within_tolerance(price, market, tolerance) {
                warn!(supplied = %price, market = %market, "Supplied price outside tolerance");
                return Err(WalletError::PriceOutOfTolerance {
                    supplied: price,
                    market,
                    tolerance,
                });
            }
            Ok(price)
        }
    }
}

fn require_positive(price: Decimal) -> Result<()> {
    if price <= Decimal::ZERO {
        return Err(WalletError::invalid("Price must be greater than zero"));
    }
    Ok(())
}
