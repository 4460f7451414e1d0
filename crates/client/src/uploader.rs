//! Upload entry points.

use std::path::Path;
use std::time::Duration;

use formpost_transfer::{
    FormField, PlanBuilder, TransferError, UploadItem, UploadObserver, UploadPlan, transmit,
};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::UploadError;
use crate::config::UploaderConfig;
use crate::response::{UploadResult, interpret};
use crate::transport::{HttpTransport, OpenedRequest, Reply, ReplyFuture, UploadTransport};

/// Uploads `items` followed by `fields` to the configured URL.
///
/// Resolves after the whole body has been sent and the reply status is
/// known. Any status, including errors like 404, comes back as an
/// [`UploadResult`]; only connection, certificate, configuration and item
/// read failures are returned as `Err`. Nothing is retried.
pub async fn upload(
    config: &UploaderConfig,
    items: &[UploadItem],
    fields: &[FormField],
    observer: Option<&dyn UploadObserver>,
) -> Result<UploadResult, UploadError> {
    let plan = PlanBuilder::new()
        .with_boundary(config.boundary.clone())
        .build(items, fields)?;
    let transport = HttpTransport::from_config(config, &plan.content_type())?;
    upload_with(&transport, &plan, observer).await
}

/// Uploads a single file as form field `file`.
pub async fn upload_file(
    config: &UploaderConfig,
    path: impl AsRef<Path>,
) -> Result<UploadResult, UploadError> {
    let items = [UploadItem::file(path)?];
    upload(config, &items, &[], None).await
}

/// Sends `plan` through `transport` and interprets the reply.
///
/// The body is written while the reply is awaited so that a server that
/// answers early, or a connection that fails mid-body, ends the call
/// instead of stalling the writer.
pub async fn upload_with(
    transport: &dyn UploadTransport,
    plan: &UploadPlan<'_>,
    observer: Option<&dyn UploadObserver>,
) -> Result<UploadResult, UploadError> {
    let OpenedRequest { mut body, mut reply } = transport.open(plan.framing()).await?;

    let sent = tokio::select! {
        biased;
        sent = transmit(&mut body, plan, observer) => sent,
        early = &mut reply => {
            let early = early?;
            warn!(status = early.status(), "server replied before the request body was complete");
            return Ok(interpret(early).await);
        }
    };

    let sent = match sent {
        Ok(report) => body
            .shutdown()
            .await
            .map(|()| report)
            .map_err(TransferError::Sink),
        Err(e) => Err(e),
    };

    match sent {
        Ok(report) => {
            drop(body);
            let result = interpret(await_reply(reply, transport.reply_timeout()).await?).await;
            info!(
                status = result.status(),
                bytes_sent = report.bytes_sent,
                body_bytes = report.body_bytes,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "upload finished"
            );
            Ok(result)
        }
        Err(TransferError::Sink(e)) => {
            // A broken body pipe usually means the request itself failed.
            drop(body);
            match await_reply(reply, transport.reply_timeout()).await {
                Err(transport_err) => Err(transport_err),
                Ok(early) => {
                    warn!(
                        status = early.status(),
                        error = %e,
                        "server replied while the request body was being written"
                    );
                    Ok(interpret(early).await)
                }
            }
        }
        Err(e) => {
            // Abandon the request before releasing the body so a partial
            // body is never completed on the wire.
            drop(reply);
            drop(body);
            Err(e.into())
        }
    }
}

/// Waits for the reply of a request whose body is finished.
async fn await_reply(
    reply: ReplyFuture,
    limit: Option<Duration>,
) -> Result<Box<dyn Reply>, UploadError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, reply)
            .await
            .map_err(|_| UploadError::ReplyTimedOut(limit))?,
        None => reply.await,
    }
}
