//! Payment confirmation port.
//!
//! Each gateway answers one question: is the payment behind this opaque
//! reference confirmed? The wire protocols are simulated; only the reference
//! shape is checked.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::GatewayConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayKind {
    Card,
    Wallet,
    Ledger,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported payment gateway {0:?}")]
pub struct UnsupportedGateway(pub String);

impl FromStr for GatewayKind {
    type Err = UnsupportedGateway;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stripe" | "card" => Ok(GatewayKind::Card),
            "paypal" | "wallet" => Ok(GatewayKind::Wallet),
            "crypto" | "ledger" => Ok(GatewayKind::Ledger),
            _ => Err(UnsupportedGateway(s.to_string())),
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GatewayKind::Card => "stripe",
            GatewayKind::Wallet => "paypal",
            GatewayKind::Ledger => "crypto",
        })
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn confirm(&self, reference: &str) -> anyhow::Result<bool>;
}

/// Card processor. References are payment-method or token ids.
pub struct CardGateway {
    secret_key: String,
}

impl CardGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for CardGateway {
    async fn confirm(&self, reference: &str) -> anyhow::Result<bool> {
        debug!(test_mode = self.secret_key.starts_with("sk_test_"), "confirming card payment");
        Ok(reference.contains("tok_visa") || reference.contains("pm_"))
    }
}

/// Wallet checkout. References are captured order ids.
pub struct WalletGateway {
    client_id: String,
    client_secret: String,
    mode: String,
}

impl WalletGateway {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        mode: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            mode: mode.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for WalletGateway {
    async fn confirm(&self, reference: &str) -> anyhow::Result<bool> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            anyhow::bail!("wallet gateway credentials missing");
        }
        debug!(mode = %self.mode, client_id = %self.client_id, "capturing wallet order");
        Ok(reference.starts_with("PAYPAL_ORDER_"))
    }
}

/// On-chain payment. References are transaction ids.
pub struct LedgerGateway {
    api_key: String,
}

impl LedgerGateway {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for LedgerGateway {
    async fn confirm(&self, reference: &str) -> anyhow::Result<bool> {
        if self.api_key.is_empty() {
            anyhow::bail!("ledger gateway api key missing");
        }
        Ok(reference.starts_with("CRYPTO_TX_"))
    }
}

/// One gateway per kind, each call bounded by `timeout`.
pub struct PaymentGateways {
    card: Arc<dyn PaymentGateway>,
    wallet: Arc<dyn PaymentGateway>,
    ledger: Arc<dyn PaymentGateway>,
    timeout: Duration,
}

impl PaymentGateways {
    pub fn new(
        card: Arc<dyn PaymentGateway>,
        wallet: Arc<dyn PaymentGateway>,
        ledger: Arc<dyn PaymentGateway>,
        timeout: Duration,
    ) -> Self {
        Self {
            card,
            wallet,
            ledger,
            timeout,
        }
    }

    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self::new(
            Arc::new(CardGateway::new(&cfg.stripe_secret_key)),
            Arc::new(WalletGateway::new(
                &cfg.paypal_client_id,
                &cfg.paypal_client_secret,
                &cfg.paypal_mode,
            )),
            Arc::new(LedgerGateway::new(&cfg.crypto_api_key)),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    fn get(&self, kind: GatewayKind) -> &Arc<dyn PaymentGateway> {
        match kind {
            GatewayKind::Card => &self.card,
            GatewayKind::Wallet => &self.wallet,
            GatewayKind::Ledger => &self.ledger,
        }
    }

    /// `false` unless the gateway confirms within `timeout`. Never retried.
    pub async fn confirm(&self, kind: GatewayKind, reference: &str) -> bool {
        match tokio::time::timeout(self.timeout, self.get(kind).confirm(reference)).await {
            Ok(Ok(confirmed)) => confirmed,
            Ok(Err(e)) => {
                warn!(gateway = %kind, error = %e, "payment confirmation failed");
                false
            }
            Err(_) => {
                warn!(gateway = %kind, timeout = ?self.timeout, "payment confirmation timed out");
                false
            }
        }
    }
}
