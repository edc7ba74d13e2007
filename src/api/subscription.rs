//! Subscription endpoints
//!
//! Tier reads only; upgrades happen in the billing collaborator.

use crate::api::ExtractUser;
use crate::core::traits::ChatService;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;
use serde::Serialize;

pub fn router() -> Router {
    Router::new().route("/status", get(subscription_status))
}

#[derive(Serialize, Debug)]
pub struct SubscriptionStatus {
    pub success: bool,
    pub subscription: &'static str,
}

async fn subscription_status(
    Inject(chat_service): Inject<dyn ChatService>,
    ExtractUser(current_user): ExtractUser,
) -> (StatusCode, Json<SubscriptionStatus>) {
    match chat_service.subscription_tier(current_user).await {
        Ok(tier) => (
            StatusCode::OK,
            Json(SubscriptionStatus {
                success: true,
                subscription: tier.as_str(),
            }),
        ),
        Err(()) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SubscriptionStatus {
                success: false,
                subscription: "unknown",
            }),
        ),
    }
}
