//! Command implementations for the `keytable` binary.

mod assume_role;
mod batch;
mod demo;
mod notes;
mod table;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use keytable::storage::{DynamoDbDataService, InMemoryDataService};
use keytable::{Config, TableAccessLayer};
use keytable_core::credentials::Credential;
use keytable_core::table::{CapacityMode, DataService, TableSchema};

use crate::cli::{provisioned_or_on_demand, Cli, Commands, Global};
use crate::prelude::*;

/// Exit code for request-shape and validation failures.
pub const EXIT_REQUEST: u8 = 252;
/// Exit code for authorization failures.
pub const EXIT_AUTHORIZATION: u8 = 253;
/// Exit code for service and transport failures.
pub const EXIT_REMOTE: u8 = 254;
/// Exit code for waits that ran out of time.
pub const EXIT_TIMEOUT: u8 = 255;

/// Settings shared by every command.
pub struct Context {
    pub config: Config,
    pub credential: Option<Credential>,
    pub simulate: bool,
    pub silent: bool,
}

impl Context {
    pub fn from_global(global: &Global) -> Result<Self> {
        let credential = global
            .credentials
            .as_deref()
            .map(read_credentials)
            .transpose()?;

        Ok(Self {
            config: Config::from_env(),
            credential,
            simulate: global.simulate,
            silent: global.silent,
        })
    }

    /// Data service for `region`. A simulated service starts empty unless
    /// `existing` names a table to seed as already active.
    pub async fn data_service(
        &self,
        region: &str,
        existing: Option<&TableSchema>,
    ) -> Arc<dyn DataService> {
        if self.simulate {
            let service = InMemoryDataService::new();
            if let Some(schema) = existing {
                service
                    .insert_active_table(schema.clone(), CapacityMode::OnDemand)
                    .await;
            }
            return Arc::new(service);
        }

        let aws = self.config.aws(region);
        if !self.silent {
            aprintln!("{} {}", p_b("Target:"), aws.target_display());
        }
        Arc::new(DynamoDbDataService::connect(&aws, self.credential.as_ref()).await)
    }

    /// Access layer for `schema`, carrying the credential and poll schedule.
    pub fn layer(&self, service: Arc<dyn DataService>, schema: TableSchema) -> Result<TableAccessLayer> {
        let layer = TableAccessLayer::new(service, schema)?.with_backoff(self.config.backoff());
        Ok(match &self.credential {
            Some(credential) => layer.with_credential(credential.clone()),
            None => layer,
        })
    }
}

fn read_credentials(path: &Path) -> Result<Credential> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read credentials from {}", path.display()))?;
    Ok(Credential::from_json(&path.display().to_string(), &json)?)
}

/// Runs the parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let ctx = Context::from_global(&cli.global)?;

    match cli.command {
        Commands::CreateTable { table, provisioned } => {
            let capacity = provisioned_or_on_demand(provisioned.as_deref());
            table::create(&ctx, &table.name, &table.region, capacity).await
        }
        Commands::DeleteTable { table } => table::delete(&ctx, &table.name, &table.region).await,
        Commands::UpdateCapacity { table, capacity } => {
            table::update_capacity(&ctx, &table.name, &table.region, capacity.mode()).await
        }
        Commands::QueryScanDemo { table } => demo::run(&ctx, &table.name, &table.region).await,
        Commands::LoadBatch { table, file } => {
            batch::load(&ctx, &table.name, &table.region, file.as_deref()).await
        }
        Commands::AssumeRole {
            account_id,
            role_name,
            duration,
            json,
            region,
        } => {
            let request = assume_role::Request {
                account_id,
                role_name,
                duration,
                json,
                region,
            };
            assume_role::run(&ctx, request).await
        }
    }
}

/// Maps a failure to the exit code of its error class.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<keytable::Error>() {
        Some(keytable::Error::Schema { .. } | keytable::Error::Validation { .. }) => EXIT_REQUEST,
        Some(keytable::Error::Authorization { .. }) => EXIT_AUTHORIZATION,
        Some(keytable::Error::Remote { .. } | keytable::Error::TableGone { .. }) => EXIT_REMOTE,
        Some(keytable::Error::Timeout { .. }) => EXIT_TIMEOUT,
        None => 1,
    }
}
