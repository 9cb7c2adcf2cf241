//! Batch shape checks. Everything here runs before any remote call.

use std::collections::BTreeSet;

use keytable_core::table::{TableSchema, WriteRequest, MAX_BATCH_WRITE_REQUESTS};
use keytable_core::{Error, Result};

/// Rejects batches the remote would refuse outright.
///
/// The size limit and duplicate keys are request-shape problems
/// ([`Error::Schema`]); a malformed put item or delete key is an
/// [`Error::Validation`].
pub fn check_batch(schema: &TableSchema, requests: &[WriteRequest]) -> Result<()> {
    let table = schema.table_name.as_str();

    if requests.len() > MAX_BATCH_WRITE_REQUESTS {
        return Err(Error::schema(
            table,
            format!(
                "batch carries {} requests, the limit is {MAX_BATCH_WRITE_REQUESTS}",
                requests.len()
            ),
        ));
    }

    let mut seen = BTreeSet::new();
    for (position, request) in requests.iter().enumerate() {
        request.validate(schema)?;

        let key = schema.primary_key(&request.key(schema)).ok_or_else(|| {
            Error::validation(
                table,
                format!("{} request #{position} has an incomplete key", request.kind()),
            )
        })?;
        if !seen.insert(key) {
            return Err(Error::schema(
                table,
                format!(
                    "{} request #{position} targets a key already present in the batch",
                    request.kind()
                ),
            ));
        }
    }

    Ok(())
}
