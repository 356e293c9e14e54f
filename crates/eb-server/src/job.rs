//! The job service: one request from receipt to published outcome.
//!
//! [`run_job`] owns the per-request workspace, drives the [`EncodeBox`]
//! event stream, uploads the result and optionally purges the sources. It
//! publishes progress as it goes and exactly one terminal event at the end.
//!
//! [`EncodeBox`]: eb_pipeline::EncodeBox

use std::path::PathBuf;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use eb_core::{EncodeInfos, EncodingRequest, Error, Result};
use eb_pipeline::{purge_source_assets, JobEvent, JobWorkspace};

use crate::context::AppContext;
use crate::notifier::publish_best_effort;

/// What a finished job reports back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub job_id: String,
    /// Storage key of the uploaded output.
    pub output: String,
    /// Non-fatal problems, such as source assets that could not be purged.
    pub warnings: Vec<String>,
}

/// Run `request` to completion.
pub async fn run_job(ctx: &AppContext, request: EncodingRequest, cancel: CancellationToken) -> Result<JobOutcome> {
    let job_id = request.job_id.clone();
    let span = tracing::info_span!("job_service", job_id = %job_id);

    let result = execute(ctx, &request, cancel).instrument(span).await;

    let terminal = match &result {
        Ok(_) => EncodeInfos::done(&job_id),
        Err(e) => EncodeInfos::error(&job_id, e),
    };
    publish_best_effort(ctx.notifier.as_ref(), &terminal).await;
    result
}

async fn execute(ctx: &AppContext, request: &EncodingRequest, cancel: CancellationToken) -> Result<JobOutcome> {
    request.validate()?;

    let output_key = request.output_name();
    let workspace = JobWorkspace::new(
        ctx.config.encoder.work_root.as_deref(),
        &request.job_id,
        &output_key,
    )?;

    let mut events = ctx.encode_box.start(request.clone(), workspace.output(), cancel);
    let mut outcome: Option<Result<PathBuf>> = None;
    while let Some(event) = events.recv().await {
        match event {
            JobEvent::State(_) => {}
            JobEvent::Progress(progress) => {
                let infos = EncodeInfos::in_progress(&request.job_id, progress);
                publish_best_effort(ctx.notifier.as_ref(), &infos).await;
            }
            JobEvent::Done(path) => outcome = Some(Ok(path)),
            JobEvent::Failed(e) => outcome = Some(Err(e)),
        }
    }
    let output = outcome.unwrap_or_else(|| Err(Error::Internal("job ended without a result".into())))?;

    ctx.store.put(&output, &output_key).await?;
    tracing::info!(key = %output_key, store = ctx.store.name(), "Output uploaded");

    if let Err(e) = workspace.close() {
        tracing::warn!(error = %e, "Failed to remove job workspace");
    }

    let mut warnings = Vec::new();
    if request.options.delete_assets_from_obj_store {
        if let Err(e) = purge_source_assets(ctx.store.as_ref(), &request.source_keys()).await {
            tracing::warn!(error = %e, "Source asset purge incomplete");
            warnings.push(e.to_string());
        }
    }

    Ok(JobOutcome {
        job_id: request.job_id.clone(),
        output: output_key,
        warnings,
    })
}
