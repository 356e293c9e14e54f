//! POST /encode

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use eb_core::{EncodingRequest, Error};

use crate::context::AppContext;
use crate::error::AppError;
use crate::job::{run_job, JobOutcome};

/// Accepted request bodies.
///
/// Dapr delivers subscribed messages wrapped in a CloudEvent whose `data`
/// holds the request. Direct callers post the request itself.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EncodeEnvelope {
    CloudEvent {
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        topic: Option<String>,
        data: EncodingRequest,
    },
    Bare(EncodingRequest),
}

impl EncodeEnvelope {
    pub fn into_request(self) -> EncodingRequest {
        match self {
            EncodeEnvelope::CloudEvent { data, .. } => data,
            EncodeEnvelope::Bare(request) => request,
        }
    }
}

/// Parse a request body in either accepted shape.
pub fn parse_body(body: &[u8]) -> Result<EncodingRequest, Error> {
    let envelope: EncodeEnvelope =
        serde_json::from_slice(body).map_err(|e| Error::Validation(format!("Invalid JSON: {e}")))?;
    if let EncodeEnvelope::CloudEvent { kind, topic, .. } = &envelope {
        tracing::debug!(kind = ?kind, topic = ?topic, "Unwrapped CloudEvent");
    }
    Ok(envelope.into_request())
}

/// Run the job to completion and report its outcome.
pub async fn encode(State(ctx): State<AppContext>, body: Bytes) -> Result<Json<JobOutcome>, AppError> {
    let request = parse_body(&body)?;
    tracing::info!(job_id = %request.job_id, "Encode request received");

    let outcome = run_job(&ctx, request, ctx.shutdown.child_token()).await?;
    Ok(Json(outcome))
}
