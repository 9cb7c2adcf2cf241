//! Table lifecycle commands.

use anyhow::Result;
use keytable_core::table::CapacityMode;

use super::{notes, Context};
use crate::prelude::*;

pub async fn create(ctx: &Context, name: &str, region: &str, capacity: CapacityMode) -> Result<()> {
    let service = ctx.data_service(region, None).await;
    let layer = ctx.layer(service, notes::schema(name))?;

    if !ctx.silent {
        aprintln!("{} {} ({capacity})", p_b("Creating table"), name);
    }
    let status = layer.create_table(capacity).await?;
    if !ctx.silent {
        aprintln!("{} {status}", p_c("Status:"));
        aprintln!("{}", p_b("Waiting for table to become active..."));
    }

    let description = layer.wait_active(ctx.config.wait_timeout()).await?;
    if !ctx.silent {
        aprintln!(
            "{} {} is {} ({})",
            p_g("Done:"),
            description.table_name,
            description.status,
            description.capacity_mode
        );
    }
    Ok(())
}

pub async fn delete(ctx: &Context, name: &str, region: &str) -> Result<()> {
    let schema = notes::schema(name);
    let service = ctx.data_service(region, Some(&schema)).await;
    let layer = ctx.layer(service, schema)?;

    if !ctx.silent {
        aprintln!("{} {}", p_y("Deleting table"), name);
    }
    let status = layer.delete_table().await?;
    if !ctx.silent {
        aprintln!("{} {status}", p_c("Status:"));
        aprintln!("{}", p_b("Waiting for table to disappear..."));
    }

    layer.wait_deleted(ctx.config.wait_timeout()).await?;
    if !ctx.silent {
        aprintln!("{} {} deleted", p_g("Done:"), name);
    }
    Ok(())
}

pub async fn update_capacity(
    ctx: &Context,
    name: &str,
    region: &str,
    capacity: CapacityMode,
) -> Result<()> {
    let schema = notes::schema(name);
    let service = ctx.data_service(region, Some(&schema)).await;
    let layer = ctx.layer(service, schema)?;

    let status = layer.update_capacity(capacity).await?;
    if !ctx.silent {
        aprintln!(
            "{} {name} switching to {capacity} ({status})",
            p_g("Accepted:")
        );
    }
    Ok(())
}
