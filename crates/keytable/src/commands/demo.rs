//! End-to-end walk through the table operations.

use anyhow::Result;
use keytable::TableAccessLayer;
use keytable_core::table::{
    AttributeValue, CapacityMode, Consistency, Filter, Item, KeyCondition, QueryRequest,
    ReadOutput, ScanRequest, SortCondition,
};

use super::{notes, Context};
use crate::prelude::*;

pub async fn run(ctx: &Context, name: &str, region: &str) -> Result<()> {
    let service = ctx.data_service(region, None).await;
    let layer = ctx.layer(service, notes::schema(name))?;

    step(ctx, "1. Creating table");
    layer.create_table(CapacityMode::OnDemand).await?;
    layer.wait_active(ctx.config.wait_timeout()).await?;

    let outcome = exercise(ctx, &layer).await;

    // The table goes away even when a read step failed.
    step(ctx, "6. Deleting table");
    layer.delete_table().await?;
    layer.wait_deleted(ctx.config.wait_timeout()).await?;
    outcome?;

    if !ctx.silent {
        aprintln!("{}", p_g("Demo complete."));
    }
    Ok(())
}

async fn exercise(ctx: &Context, layer: &TableAccessLayer) -> Result<()> {
    step(ctx, "2. Writing notes");
    for item in notes::samples() {
        if !ctx.silent {
            aprintln!("  + {}", notes::describe(&item));
        }
        layer.put_item(item).await?;
    }

    let albert = KeyCondition::partition("UserId", AttributeValue::string("Albert"));

    step(ctx, "3. Query: Albert's notes after the first");
    let request = QueryRequest::new(
        albert
            .clone()
            .with_sort("NoteId", SortCondition::Gt(AttributeValue::number(1))),
        Consistency::Strong,
    )
    .with_consumed_capacity();
    show(ctx, &layer.query(&request).await?);

    step(ctx, "4. Query the favorites index");
    let request = QueryRequest::new(
        albert.with_sort("Favorite", SortCondition::Eq(AttributeValue::string("Yes"))),
        Consistency::Eventual,
    )
    .on_index(notes::FAVORITE_INDEX)
    .with_consumed_capacity();
    show(ctx, &layer.query(&request).await?);

    step(ctx, "5. Scan for favorites");
    let request = ScanRequest::new(Consistency::Eventual)
        .with_filter(Filter::eq("Favorite", AttributeValue::string("Yes")))
        .with_consumed_capacity();
    show(ctx, &layer.scan(&request).await?);

    let key = Item::from([
        ("UserId".to_string(), AttributeValue::string("Marie")),
        ("NoteId".to_string(), AttributeValue::number(1)),
    ]);
    let found = layer.get_item(key, Consistency::Strong).await?;
    if !ctx.silent {
        match &found.item {
            Some(item) => aprintln!("  get: {}", notes::describe(item)),
            None => aprintln!("  get: {}", p_y("not found")),
        }
    }
    Ok(())
}

fn step(ctx: &Context, title: &str) {
    if !ctx.silent {
        aprintln!("{}", p_c(title));
    }
}

fn show(ctx: &Context, output: &ReadOutput) {
    if ctx.silent {
        return;
    }
    aprintln!(
        "  {} items ({} scanned, {} capacity units)",
        output.count(),
        output.scanned_count,
        output
            .consumed_capacity
            .map_or_else(|| "unreported".to_string(), |units| units.to_string())
    );
    for item in &output.items {
        aprintln!("  - {}", notes::describe(item));
    }
}
