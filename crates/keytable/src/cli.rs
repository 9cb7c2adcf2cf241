use std::path::PathBuf;

use keytable_core::table::CapacityMode;

/// Operate tables of a hosted key-value store and broker role credentials
#[derive(Debug, clap::Parser)]
#[command(name = "keytable")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: Global,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Credentials document (as written by `assume-role --json`) used to
    /// sign every data-service call instead of the ambient identity
    #[arg(long, global = true, value_name = "PATH", env = "KEYTABLE_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Run against an in-process simulation of the remote services
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Silence the command output
    #[arg(long, global = true)]
    pub silent: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct TableArgs {
    /// Table name
    pub name: String,

    /// AWS region
    pub region: String,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Create the notes table and wait until it is active
    CreateTable {
        #[command(flatten)]
        table: TableArgs,

        /// Provisioned throughput instead of on-demand billing
        #[arg(long, num_args = 2, value_names = ["RCU", "WCU"])]
        provisioned: Option<Vec<i64>>,
    },

    /// Delete a table and wait until it is gone
    DeleteTable {
        #[command(flatten)]
        table: TableArgs,
    },

    /// Create a table, write notes, query, scan and query the local index,
    /// then delete the table
    QueryScanDemo {
        #[command(flatten)]
        table: TableArgs,
    },

    /// Load a batch-write payload, resubmitting unprocessed requests
    LoadBatch {
        #[command(flatten)]
        table: TableArgs,

        /// Batch-write JSON payload (defaults to the built-in sample notes)
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Assume a role and print the temporary credential
    AssumeRole {
        /// 12-digit account id
        account_id: String,

        /// Role name inside the account
        role_name: String,

        /// Session lifetime in seconds (900-43200)
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,

        /// Print the full credentials document as JSON
        #[arg(long)]
        json: bool,

        /// AWS region of the identity endpoint
        #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
        region: String,
    },

    /// Switch a table between on-demand and provisioned capacity
    UpdateCapacity {
        #[command(flatten)]
        table: TableArgs,

        #[command(flatten)]
        capacity: CapacityArgs,
    },
}

#[derive(Debug, Clone, clap::Args)]
#[group(required = true, multiple = false)]
pub struct CapacityArgs {
    /// Pay per request
    #[arg(long)]
    pub on_demand: bool,

    /// Provisioned read and write capacity units
    #[arg(long, num_args = 2, value_names = ["RCU", "WCU"])]
    pub provisioned: Option<Vec<i64>>,
}

impl CapacityArgs {
    pub fn mode(&self) -> CapacityMode {
        provisioned_or_on_demand(self.provisioned.as_deref())
    }
}

/// `[rcu, wcu]` from a two-value `--provisioned`, on-demand otherwise.
pub fn provisioned_or_on_demand(provisioned: Option<&[i64]>) -> CapacityMode {
    match provisioned {
        Some([read, write]) => CapacityMode::provisioned(*read, *write),
        _ => CapacityMode::OnDemand,
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_create_table_defaults_to_on_demand() {
        let cli = Cli::try_parse_from(["keytable", "create-table", "Notes", "eu-west-2"]).unwrap();
        match cli.command {
            Commands::CreateTable { table, provisioned } => {
                assert_eq!(table.name, "Notes");
                assert_eq!(table.region, "eu-west-2");
                assert_eq!(
                    provisioned_or_on_demand(provisioned.as_deref()),
                    CapacityMode::OnDemand
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_create_table_provisioned() {
        let cli = Cli::try_parse_from([
            "keytable",
            "create-table",
            "Notes",
            "eu-west-2",
            "--provisioned",
            "1",
            "2",
        ])
        .unwrap();
        let Commands::CreateTable { provisioned, .. } = cli.command else {
            panic!("expected create-table");
        };
        assert_eq!(
            provisioned_or_on_demand(provisioned.as_deref()),
            CapacityMode::provisioned(1, 2)
        );
    }

    #[test]
    fn test_update_capacity_requires_exactly_one_mode() {
        assert!(Cli::try_parse_from(["keytable", "update-capacity", "Notes", "eu-west-2"]).is_err());
        assert!(Cli::try_parse_from([
            "keytable",
            "update-capacity",
            "Notes",
            "eu-west-2",
            "--on-demand",
            "--provisioned",
            "1",
            "1",
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "keytable",
            "update-capacity",
            "Notes",
            "eu-west-2",
            "--on-demand",
        ])
        .unwrap();
        let Commands::UpdateCapacity { capacity, .. } = cli.command else {
            panic!("expected update-capacity");
        };
        assert_eq!(capacity.mode(), CapacityMode::OnDemand);
    }

    #[test]
    fn test_missing_arguments_fail() {
        assert!(Cli::try_parse_from(["keytable", "assume-role", "123456789012"]).is_err());
        assert!(Cli::try_parse_from(["keytable", "delete-table", "Notes"]).is_err());
    }

    #[test]
    fn test_global_credentials_after_subcommand() {
        let cli = Cli::try_parse_from([
            "keytable",
            "delete-table",
            "Notes",
            "eu-west-2",
            "--credentials",
            "creds.json",
        ])
        .unwrap();
        assert_eq!(cli.global.credentials, Some(PathBuf::from("creds.json")));
    }
}
