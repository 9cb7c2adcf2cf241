//! Role assumption command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use keytable::identity::{StaticIdentityService, StsIdentityService};
use keytable::CredentialBroker;
use keytable_core::credentials::{Credential, IdentityService, RoleArn, SystemClock};

use super::Context;
use crate::prelude::*;

pub struct Request {
    pub account_id: String,
    pub role_name: String,
    pub duration: Option<u64>,
    pub json: bool,
    pub region: String,
}

pub async fn run(ctx: &Context, request: Request) -> Result<()> {
    let credential = if ctx.simulate {
        // The simulation grants exactly the requested role.
        let arn = RoleArn::new(&request.account_id, &request.role_name)?;
        let identity = StaticIdentityService::new(Arc::new(SystemClock)).allow(arn.as_str());
        assume(identity, &request).await?
    } else {
        let aws = ctx.config.aws(&request.region);
        assume(StsIdentityService::connect(&aws).await, &request).await?
    };

    if request.json {
        // Explicitly requested: the full document, secret included, on stdout.
        aprintln!("{}", serde_json::to_string_pretty(&credential)?);
    } else if !ctx.silent {
        aprintln!("{} {}", p_g("Assumed:"), request.role_name);
        aprintln!("{} {}", p_c("Access key id:"), credential.access_key_id());
        aprintln!("{} {}", p_c("Expires at:"), credential.expires_at());
        aprintln!(
            "{}",
            p_y("Re-run with --json to write the credentials document for --credentials.")
        );
    }
    Ok(())
}

async fn assume<I: IdentityService>(identity: I, request: &Request) -> keytable::Result<Credential> {
    CredentialBroker::new(identity)
        .assume_role_for(
            &request.account_id,
            &request.role_name,
            request.duration.map(Duration::from_secs),
        )
        .await
}
