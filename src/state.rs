use std::sync::Arc;

use tracing::info;

use crate::assist::services::{CodeAssistant, TemplateAssistant};
use crate::auth::jwt::TokenService;
use crate::config::{AppConfig, GatewayConfig, JwtConfig};
use crate::db;
use crate::gate::UsageMeter;
use crate::payments::gateway::PaymentGateways;
use crate::users::{memory::MemoryUserStore, repo::PgUserStore, repo::UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
    pub tokens: Arc<TokenService>,
    pub gateways: Arc<PaymentGateways>,
    pub assistant: Arc<dyn CodeAssistant>,
    pub usage: Arc<UsageMeter>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store: Arc<dyn UserStore> = match &config.database_url {
            Some(url) => {
                let pool = db::connect(url).await?;
                db::migrate(&pool).await;
                info!("using postgres user store");
                Arc::new(PgUserStore::new(pool))
            }
            None => Arc::new(MemoryUserStore::new()),
        };

        Ok(Self::from_parts(Arc::new(config), store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> Self {
        let tokens = Arc::new(TokenService::from_config(&config.jwt));
        let gateways = Arc::new(PaymentGateways::from_config(&config.gateways));
        Self {
            config,
            store,
            tokens,
            gateways,
            assistant: Arc::new(TemplateAssistant),
            usage: Arc::new(UsageMeter::new()),
        }
    }

    /// In-memory state with fixed test settings.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                algorithm: jsonwebtoken::Algorithm::HS256,
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
            },
            cors_origins: vec!["http://localhost".into()],
            gateways: GatewayConfig {
                stripe_secret_key: "sk_test_fake".into(),
                stripe_publishable_key: "pk_test_fake".into(),
                paypal_client_id: "fake-client".into(),
                paypal_client_secret: "fake-secret".into(),
                paypal_mode: "sandbox".into(),
                crypto_api_key: "fake-key".into(),
                timeout_secs: 2,
            },
            seed_demo_users: false,
        });
        Self::from_parts(config, Arc::new(MemoryUserStore::new()))
    }
}
