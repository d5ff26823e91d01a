//! Back-office session against the resilient data-access stack
//!
//! Starts the stack, runs one call of every data-provider method, and prints
//! what the caller received. With `--fail-upstream` every backend request
//! fails and the output shows the fallback records instead.

use anyhow::Result;
use clap::Parser;
use galore_bins::common::{init_logging, CommonArgs};
use galore_core::prelude::*;
use galore_core::resilience::FailureLog;
use galore_core::resolver::ResolverStatus;
use serde::Serialize;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse();
    let config = args.load_config()?;
    init_logging(&config)?;

    tracing::info!("=== Galore: resilient data access demo ===");
    tracing::info!(
        "Backend: {:?}, failure rate: {}, latency: {}ms",
        args.backend,
        config.server.failure_rate,
        config.server.latency_ms
    );

    let failures = Arc::new(FailureLog::new());
    let access = DataAccess::start(&config, args.backend.into(), vec![failures.clone()]);

    run_session(&access).await?;

    let status = access.resolver().status();
    tracing::info!("=== Session summary ===");
    tracing::info!("Resolver status: {:?}", status);
    if status == ResolverStatus::Degraded {
        tracing::warn!("Backend setup failed; every answer above came from the noop provider");
    }
    tracing::info!("Backend requests served: {}", access.requests_served());
    for kind in [
        FailureKind::Timeout,
        FailureKind::Upstream,
        FailureKind::Bypassed,
        FailureKind::SetupFailed,
    ] {
        tracing::info!("{} failures: {}", kind.as_str(), failures.count(kind));
    }

    access.shutdown();
    Ok(())
}

async fn run_session(access: &DataAccess) -> Result<()> {
    let provider = access.provider();

    let orders = provider
        .get_list(
            "orders",
            ListParams::default()
                .page(1, 5)
                .sort(Sort::desc("date"))
                .filter("status", "ordered"),
        )
        .await?;
    show("getList orders", &orders)?;

    let customer = provider.get_one("customers", GetOneParams::new(1)).await?;
    show("getOne customers/1", &customer)?;

    let products = provider
        .get_many(
            "products",
            GetManyParams {
                ids: vec![RecordId::Int(1), RecordId::Int(2)],
            },
        )
        .await?;
    show("getMany products", &products)?;

    let reviews = provider
        .get_many_reference("reviews", ReferenceParams::new("customer_id", 1))
        .await?;
    show("getManyReference reviews", &reviews)?;

    let created = provider
        .create(
            "reviews",
            CreateParams {
                data: Record::new()
                    .field("customer_id", 1)
                    .field("rating", 5)
                    .field("status", "pending")
                    .field("comment", "Arrived well packed"),
            },
        )
        .await?;
    show("create reviews", &created)?;

    let Some(review_id) = created.data.id() else {
        anyhow::bail!("created review has no id");
    };

    let accepted = provider
        .update(
            "reviews",
            UpdateParams {
                id: review_id.clone(),
                data: Record::new().field("status", "accepted"),
                previous_data: Some(created.data.clone()),
            },
        )
        .await?;
    show("update reviews", &accepted)?;

    let bulk = provider
        .update_many(
            "reviews",
            UpdateManyParams {
                ids: vec![review_id.clone()],
                data: Record::new().field("status", "rejected"),
            },
        )
        .await?;
    show("updateMany reviews", &bulk)?;

    let deleted = provider
        .delete(
            "reviews",
            DeleteParams {
                id: review_id,
                previous_data: None,
            },
        )
        .await?;
    show("delete reviews", &deleted)?;

    let purged = provider
        .delete_many(
            "categories",
            DeleteManyParams {
                ids: vec![RecordId::Int(999)],
            },
        )
        .await?;
    show("deleteMany categories", &purged)?;

    Ok(())
}

fn show<T: Serialize>(label: &str, result: &T) -> Result<()> {
    println!("--- {} ---", label);
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
