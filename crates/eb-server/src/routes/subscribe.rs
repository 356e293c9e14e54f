//! Dapr programmatic subscription.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Serialize)]
pub struct Subscription {
    pub pubsubname: String,
    pub topic: String,
    pub route: String,
}

/// GET /dapr/subscribe
///
/// Subscribes `/encode` to `server.request_topic` on the configured pubsub
/// component. Empty when no request topic is set.
pub async fn subscriptions(State(ctx): State<AppContext>) -> Json<Vec<Subscription>> {
    let topic = &ctx.config.server.request_topic;
    if topic.is_empty() {
        return Json(Vec::new());
    }
    Json(vec![Subscription {
        pubsubname: ctx.config.pubsub.component.clone(),
        topic: topic.clone(),
        route: "/encode".into(),
    }])
}
