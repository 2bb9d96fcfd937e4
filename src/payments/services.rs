use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::payments::{dto::SubscribeRequest, gateway::GatewayKind, gateway::PaymentGateways};
use crate::subscriptions::ledger::{Ledger, LedgerError, Subscription};
use crate::subscriptions::plan::Plan;
use crate::users::repo_types::User;

/// Confirms payment through `gateway_name` and, only on success, moves the
/// user onto the requested plan.
pub async fn subscribe(
    gateways: &PaymentGateways,
    ledger: &Ledger,
    user: &User,
    gateway_name: &str,
    req: SubscribeRequest,
) -> Result<(GatewayKind, Subscription), ApiError> {
    let kind: GatewayKind = gateway_name.parse().map_err(|_| {
        warn!(gateway = gateway_name, "unsupported payment gateway");
        ApiError::UnsupportedGateway(gateway_name.to_string())
    })?;
    let plan: Plan = req.plan_id.parse().map_err(|_| ApiError::UnknownPlan)?;
    if !plan.is_paid() {
        return Err(ApiError::UnknownPlan);
    }

    info!(
        user_id = user.id,
        gateway = %kind,
        %plan,
        is_yearly = req.is_yearly,
        "confirming payment"
    );
    if !gateways.confirm(kind, &req.payment_method_token).await {
        warn!(user_id = user.id, gateway = %kind, "payment not confirmed");
        return Err(ApiError::PaymentFailed(gateway_name.to_string()));
    }

    // Paid but not recorded: an invariant breach, not a client error.
    let sub = ledger
        .confirm_payment(user.id, plan, req.is_yearly)
        .await
        .map_err(|e| {
            error!(user_id = user.id, error = %e, "ledger update failed after confirmed payment");
            match e {
                LedgerError::Store(e) => ApiError::Internal(e),
                other => ApiError::Internal(anyhow::anyhow!(other)),
            }
        })?;
    Ok((kind, sub))
}
