use jsonwebtoken::Algorithm;
use serde::Deserialize;
use tracing::warn;

pub const PROJECT_NAME: &str = "Ultimate Code Assistant";

const DEV_JWT_SECRET: &str = "a_very_secret_key_for_dev_only";
const DEFAULT_TTL_MINUTES: i64 = 60 * 24 * 7;
/// Upper bound for `JWT_TTL_MINUTES`: one leap year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 366;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Credentials for the three payment gateways plus the confirmation bound.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub stripe_secret_key: String,
    pub stripe_publishable_key: String,
    pub paypal_client_id: String,
    pub paypal_client_secret: String,
    pub paypal_mode: String,
    pub crypto_api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub cors_origins: Vec<String>,
    pub gateways: GatewayConfig,
    pub seed_demo_users: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        if database_url.is_none() {
            warn!("DATABASE_URL not set; using the in-memory store, data is lost on restart");
        }

        let algorithm = env_or("JWT_ALGORITHM", "HS256");
        let algorithm: Algorithm = algorithm
            .parse()
            .map_err(|e| anyhow::anyhow!("JWT_ALGORITHM {algorithm:?}: {e}"))?;
        anyhow::ensure!(
            matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512),
            "JWT_ALGORITHM must be an HMAC algorithm (HS256, HS384, HS512)"
        );

        let jwt = JwtConfig {
            secret: insecure_env_or("JWT_SECRET", DEV_JWT_SECRET),
            algorithm,
            issuer: env_or("JWT_ISSUER", "codeassist"),
            audience: env_or("JWT_AUDIENCE", "codeassist-users"),
            ttl_minutes: ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok().as_deref()),
        };

        let cors_origins = env_or("CORS_ORIGINS", "http://localhost,http://localhost:8000")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let gateways = GatewayConfig {
            stripe_secret_key: insecure_env_or(
                "STRIPE_SECRET_KEY",
                "sk_test_your_stripe_secret_key",
            ),
            stripe_publishable_key: insecure_env_or(
                "STRIPE_PUBLISHABLE_KEY",
                "pk_test_your_stripe_publishable_key",
            ),
            paypal_client_id: insecure_env_or("PAYPAL_CLIENT_ID", "your_paypal_client_id"),
            paypal_client_secret: insecure_env_or(
                "PAYPAL_CLIENT_SECRET",
                "your_paypal_client_secret",
            ),
            paypal_mode: env_or("PAYPAL_MODE", "sandbox"),
            crypto_api_key: insecure_env_or("CRYPTO_API_KEY", "your_crypto_gw_api_key"),
            timeout_secs: std::env::var("PAYMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
        };

        let seed_demo_users = std::env::var("SEED_DEMO_USERS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            database_url,
            jwt,
            cors_origins,
            gateways,
            seed_demo_users,
        })
    }
}

fn ttl_minutes(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return DEFAULT_TTL_MINUTES;
    };
    match raw.trim().parse::<i64>() {
        Ok(m) if m > MAX_TTL_MINUTES => {
            warn!(value = m, max = MAX_TTL_MINUTES, "JWT_TTL_MINUTES too large; clamping");
            MAX_TTL_MINUTES
        }
        Ok(m) if m > 0 => m,
        _ => {
            warn!(
                value = raw,
                default = DEFAULT_TTL_MINUTES,
                "JWT_TTL_MINUTES invalid; using default"
            );
            DEFAULT_TTL_MINUTES
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

/// Falls back to a development value and says so.
fn insecure_env_or(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => v,
        _ => {
            warn!(setting = name, "not set; falling back to an insecure development default");
            default.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Runs `f` with a subscriber that writes into the returned buffer.
    fn with_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, captured.text())
    }

    #[test]
    fn ttl_is_bounded_and_defaulted() {
        assert_eq!(ttl_minutes(None), DEFAULT_TTL_MINUTES);
        assert_eq!(ttl_minutes(Some("90")), 90);

        let (ttl, logs) = with_logs(|| ttl_minutes(Some("9223372036854775807")));
        assert_eq!(ttl, MAX_TTL_MINUTES);
        assert!(logs.contains("clamping"));

        for bad in ["soon", "0", "-5"] {
            let (ttl, logs) = with_logs(|| ttl_minutes(Some(bad)));
            assert_eq!(ttl, DEFAULT_TTL_MINUTES);
            assert!(logs.contains("JWT_TTL_MINUTES invalid"), "{bad}: {logs}");
        }
    }

    #[test]
    fn unset_secret_falls_back_with_warning() {
        let (value, logs) =
            with_logs(|| insecure_env_or("CODEASSIST_UNSET_TEST_SECRET", "dev-only"));
        assert_eq!(value, "dev-only");
        assert!(logs.contains("WARN"));
        assert!(logs.contains("CODEASSIST_UNSET_TEST_SECRET"));
        assert!(logs.contains("insecure development default"));
    }
}
