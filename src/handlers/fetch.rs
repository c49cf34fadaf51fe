//! `fetch_url`: download a URL into the workspace.

use tracing::debug;

use super::StepContext;
use crate::{error::StepError, plan::FetchUrlArgs, store::StepResult};

pub async fn run(args: FetchUrlArgs, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
    let dest = ctx.output_path(args.save_as.as_deref(), "html")?;

    let resp = ctx
        .http
        .get(&args.url)
        .timeout(ctx.timeout)
        .send()
        .await
        .map_err(|e| classify(e, ctx))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(StepError::FetchFailed(format!("{} returned {}", args.url, status)));
    }
    let body = resp.bytes().await.map_err(|e| classify(e, ctx))?;
    tokio::fs::write(&dest, &body).await?;

    debug!(url = %args.url, bytes = body.len(), dest = %dest.display(), "fetched");
    Ok(StepResult::File(dest))
}

fn classify(e: reqwest::Error, ctx: &StepContext<'_>) -> StepError {
    if e.is_timeout() {
        StepError::StepTimeout(ctx.timeout.as_secs())
    } else {
        StepError::FetchFailed(e.to_string())
    }
}
