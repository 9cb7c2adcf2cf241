//! Batch loading with resubmission of unprocessed requests.

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use keytable::wait::Backoff;
use keytable::TableAccessLayer;
use keytable_core::table::{BatchPayload, WriteRequest, MAX_BATCH_WRITE_REQUESTS};
use keytable_core::{Error, ServiceError};

use super::{notes, Context};
use crate::prelude::*;

pub async fn load(ctx: &Context, name: &str, region: &str, file: Option<&Path>) -> Result<()> {
    let payload = match file {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read batch payload {}", path.display()))?;
            BatchPayload::from_json(&path.display().to_string(), &json)?
        }
        None => notes::sample_payload(name),
    };

    let requests = requests_for_table(&payload, name)?;

    let schema = notes::schema(name);
    let service = ctx.data_service(region, Some(&schema)).await;
    let layer = ctx.layer(service, schema)?;

    if !ctx.silent {
        aprintln!("{} {} requests into {name}", p_b("Loading"), requests.len());
    }
    let written = load_requests(
        &layer,
        requests,
        ctx.config.backoff(),
        ctx.config.batch_retries,
    )
    .await?;

    if !ctx.silent {
        aprintln!("{} {written} requests applied", p_g("Done:"));
    }
    Ok(())
}

/// Requests addressed to `name`. A payload with nothing for `name` is
/// rejected and lists the tables it does carry.
pub fn requests_for_table(payload: &BatchPayload, name: &str) -> keytable::Result<Vec<WriteRequest>> {
    let requests = payload.requests_for(name);
    if requests.is_empty() {
        let tables: Vec<_> = payload.tables().collect();
        return Err(Error::validation(
            name,
            format!(
                "batch payload has no requests for this table (payload tables: [{}])",
                tables.join(", ")
            ),
        ));
    }

    for other in payload.tables().filter(|table| *table != name) {
        tracing::warn!(table = other, "payload entries for another table are ignored");
    }
    Ok(requests.to_vec())
}

/// Writes `requests` in batches of at most 25, resubmitting whatever the
/// remote leaves unprocessed up to `retries` times per batch.
///
/// Returns the number of requests applied.
pub async fn load_requests(
    layer: &TableAccessLayer,
    requests: Vec<WriteRequest>,
    backoff: Backoff,
    retries: u32,
) -> keytable::Result<usize> {
    let mut written = 0;

    for chunk in requests.chunks(MAX_BATCH_WRITE_REQUESTS) {
        let mut pending = chunk.to_vec();
        let mut attempt = 0;
        loop {
            let submitted = pending.len();
            let output = layer.batch_write(pending).await?;
            written += submitted - output.unprocessed.len();
            if output.is_complete() {
                break;
            }
            if attempt == retries {
                return Err(Error::Remote {
                    operation: "BatchWriteItem",
                    resource: layer.table_name().to_string(),
                    source: ServiceError::Throttled(format!(
                        "{} requests still unprocessed after {retries} retries",
                        output.unprocessed.len()
                    )),
                });
            }

            let delay = backoff.delay(attempt);
            tracing::info!(
                table = %layer.table_name(),
                unprocessed = output.unprocessed.len(),
                attempt = attempt + 1,
                ?delay,
                "resubmitting unprocessed requests"
            );
            tokio::time::sleep(delay).await;
            pending = output.unprocessed;
            attempt += 1;
        }
    }

    Ok(written)
}
