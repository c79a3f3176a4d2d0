//! Buy and transfer request types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use walletledger_common::{Currency, Result, WalletError, WalletId};

/// How the applied price is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceInstruction {
    /// Use the live market rate.
    Market,
    /// Use the supplied price as-is.
    Fixed(Decimal),
    /// Use the supplied price if it is within tolerance of the market rate.
    Checked(Decimal),
}

impl PriceInstruction {
    /// Map the optional price / validate flag pair onto an instruction.
    ///
    /// The flag means nothing without a price.
    pub fn from_parts(price: Option<Decimal>, validate_price: bool) -> Self {
        match (price, validate_price) {
            (None, _) => PriceInstruction::Market,
            (Some(price), false) => PriceInstruction::Fixed(price),
            (Some(price), true) => PriceInstruction::Checked(price),
        }
    }
}

/// A validated conversion shared by buy and transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOrder {
    pub currency_from: Currency,
    pub currency_to: Currency,
    /// Amount of `currency_from` debited, always positive.
    pub amount: Decimal,
    pub price: PriceInstruction,
}

/// Convert `amount` of one currency into another inside a wallet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyRequest {
    pub wallet_id: Option<WalletId>,
    #[serde(default)]
    pub currency_from: String,
    #[serde(default)]
    pub currency_to: String,
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub validate_price: bool,
}

impl BuyRequest {
    /// Buy at the market rate.
    pub fn new(
        wallet_id: WalletId,
        currency_from: impl Into<String>,
        currency_to: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            wallet_id: Some(wallet_id),
            currency_from: currency_from.into(),
            currency_to: currency_to.into(),
            amount: Some(amount),
            price: None,
            validate_price: false,
        }
    }

    /// Use a fixed price instead of the market rate.
    pub fn at_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    /// Check the supplied price against the market rate.
    pub fn validated(mut self) -> Self {
        self.validate_price = true;
        self
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<(WalletId, ConversionOrder)> {
        let wallet_id = self
            .wallet_id
            .ok_or_else(|| WalletError::invalid("Wallet id is required"))?;
        let order = validate_order(
            &self.currency_from,
            &self.currency_to,
            self.amount,
            PriceInstruction::from_parts(self.price, self.validate_price),
        )?;
        Ok((wallet_id, order))
    }
}

/// Convert `amount` out of one wallet and into another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub wallet_id_from: Option<WalletId>,
    pub wallet_id_to: Option<WalletId>,
    #[serde(default)]
    pub currency_from: String,
    #[serde(default)]
    pub currency_to: String,
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub validate_price: bool,
}

impl TransferRequest {
    /// Transfer at the market rate.
    pub fn new(
        wallet_id_from: WalletId,
        wallet_id_to: WalletId,
        currency_from: impl Into<String>,
        currency_to: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            wallet_id_from: Some(wallet_id_from),
            wallet_id_to: Some(wallet_id_to),
            currency_from: currency_from.into(),
            currency_to: currency_to.into(),
            amount: Some(amount),
            price: None,
            validate_price: false,
        }
    }

    /// Use a fixed price instead of the market rate.
    pub fn at_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    /// Check the supplied price against the market rate.
    pub fn validated(mut self) -> Self {
        self.validate_price = true;
        self
    }

    /// Check required fields. Source and destination must differ.
    pub fn validate(&self) -> Result<(WalletId, WalletId, ConversionOrder)> {
        let from = self
            .wallet_id_from
            .ok_or_else(|| WalletError::invalid("Wallet id from is required"))?;
        let to = self
            .wallet_id_to
            .ok_or_else(|| WalletError::invalid("Wallet id to is required"))?;
        if from == to {
            return Err(WalletError::invalid(
                "Wallet id from and wallet id to must be different",
            ));
        }
        let order = validate_order(
            &self.currency_from,
            &self.currency_to,
            self.amount,
            PriceInstruction::from_parts(self.price, self.validate_price),
        )?;
        Ok((from, to, order))
    }
}

fn validate_order(
    currency_from: &str,
    currency_to: &str,
    amount: Option<Decimal>,
    price: PriceInstruction,
) -> Result<ConversionOrder> {
    let currency_from = Currency::new(currency_from);
    if currency_from.is_empty() {
        return Err(WalletError::invalid("Currency from is required"));
    }
    let currency_to = Currency::new(currency_to);
    if currency_to.is_empty() {
        return Err(WalletError::invalid("Currency to is required"));
    }
    let amount = amount.ok_or_else(|| WalletError::invalid("Amount is required"))?;
    if amount <= Decimal::ZERO {
        return Err(WalletError::invalid("Amount must be greater than zero"));
    }

    Ok(ConversionOrder {
        currency_from,
        currency_to,
        amount,
        price,
    })
}
