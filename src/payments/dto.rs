use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Parsed by the service so an unknown plan is a 400, not a body rejection.
    pub plan_id: String,
    /// Opaque gateway reference, e.g. a card token or an order id.
    pub payment_method_token: String,
    #[serde(default)]
    pub is_yearly: bool,
}

/// Client-side keys for starting a checkout.
#[derive(Debug, Serialize)]
pub struct PaymentConfigResponse {
    pub stripe_publishable_key: String,
    pub paypal_client_id: String,
    pub paypal_mode: String,
}
