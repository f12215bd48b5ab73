use super::protocol::*;
use crate::dataset::csv::encode_table;
use crate::error::{EdfsError, EdfsResult};
use crate::namespace::manager::Listing;
use crate::namespace::permission::PermissionFormatter;
use crate::namespace::types::InodeKind;
use crate::query::types::{AggregateOp, AggregateResult};
use crate::service::Edfs;
use crate::storage::types::PartitionLocations;

use axum::{
    Json,
    extract::{Extension, Query},
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn respond<T>(
    command: &str,
    result: EdfsResult<T>,
    render: impl FnOnce(T) -> Envelope,
) -> Json<Envelope> {
    match result {
        Ok(value) => Json(render(value)),
        Err(e) => {
            if e.is_internal() {
                tracing::error!("{} failed: {}", command, e);
            } else {
                tracing::debug!("{} rejected: {}", command, e);
            }
            Json(Envelope::error(command, &e))
        }
    }
}

pub async fn handle_mkdir(
    Extension(edfs): Extension<Arc<Edfs>>,
    Query(params): Query<PathParams>,
) -> Json<Envelope> {
    let result = edfs.mkdir(&params.path).await;
    respond("mkdir", result, |entry| {
        Envelope::ok(format!("Created {}", entry.path))
    })
}

pub async fn handle_ls(
    Extension(edfs): Extension<Arc<Edfs>>,
    Query(params): Query<PathParams>,
) -> Json<Envelope> {
    let result = edfs.ls(&params.path).await;
    respond("ls", result, |listing| Envelope::ok(render_listing(&listing)))
}

pub async fn handle_rm(
    Extension(edfs): Extension<Arc<Edfs>>,
    Query(params): Query<PathParams>,
) -> Json<Envelope> {
    let result = edfs.rm(&params.path).await;
    respond("rm", result, |_| Envelope::ok(format!("Deleted {}", params.path)))
}

pub async fn handle_cat(
    Extension(edfs): Extension<Arc<Edfs>>,
    Query(params): Query<PathParams>,
) -> Json<Envelope> {
    let result = edfs.cat(&params.path).await;
    respond("cat", result, |table| match table {
        Some(table) => Envelope::ok(encode_table(&table)),
        None => Envelope::no_content(),
    })
}

pub async fn handle_put(
    Extension(edfs): Extension<Arc<Edfs>>,
    Query(params): Query<PutParams>,
) -> Json<Envelope> {
    let result = edfs
        .put_source(
            Path::new(&params.source),
            &params.destination,
            params.partitions,
            params.hash.as_deref().filter(|h| !h.is_empty()),
        )
        .await;
    respond("put", result, |written| {
        Envelope::ok(format!("File stored in {} partitions", written))
    })
}

pub async fn handle_partition_locations(
    Extension(edfs): Extension<Arc<Edfs>>,
    Query(params): Query<LocationParams>,
) -> Json<Envelope> {
    let result = edfs
        .partition_locations(&params.path, params.hash.as_deref())
        .await;
    respond("getPartitionLocations", result, |locations| {
        Envelope::ok(render_locations(&locations))
    })
}

pub async fn handle_read_partition(
    Extension(edfs): Extension<Arc<Edfs>>,
    Query(params): Query<ReadPartitionParams>,
) -> Json<Envelope> {
    // Partitions are numbered from 1 on the wire.
    let result = match params.partition.checked_sub(1) {
        Some(index) => edfs.read_partition(&params.path, index).await,
        None => Err(EdfsError::NoContentForPartition {
            path: params.path.clone(),
            partition: params.partition,
        }),
    };
    respond("readPartition", result, |table| {
        Envelope::ok(encode_table(&table))
    })
}

pub async fn handle_avg(
    edfs: Extension<Arc<Edfs>>,
    params: Query<AggregateParams>,
) -> Json<Envelope> {
    handle_aggregate(AggregateOp::Avg, edfs, params).await
}

pub async fn handle_max(
    edfs: Extension<Arc<Edfs>>,
    params: Query<AggregateParams>,
) -> Json<Envelope> {
    handle_aggregate(AggregateOp::Max, edfs, params).await
}

pub async fn handle_min(
    edfs: Extension<Arc<Edfs>>,
    params: Query<AggregateParams>,
) -> Json<Envelope> {
    handle_aggregate(AggregateOp::Min, edfs, params).await
}

async fn handle_aggregate(
    op: AggregateOp,
    Extension(edfs): Extension<Arc<Edfs>>,
    Query(params): Query<AggregateParams>,
) -> Json<Envelope> {
    let result = edfs
        .aggregate(
            &params.path,
            &params.col,
            op,
            params.hash.as_deref().filter(|h| !h.is_empty()),
            params.debug_enabled(),
        )
        .await;
    let command = match op {
        AggregateOp::Avg => "getAvg",
        AggregateOp::Max => "getMax",
        AggregateOp::Min => "getMin",
    };
    respond(command, result, |result| Envelope::ok(render_aggregate(&result)))
}

pub async fn handle_datanodes(Extension(edfs): Extension<Arc<Edfs>>) -> Json<Envelope> {
    let result = edfs.datanode_stats().await;
    respond("datanodes", result, |stats| {
        let nodes: serde_json::Map<String, serde_json::Value> = stats
            .into_iter()
            .map(|s| {
                (
                    s.node.to_string(),
                    json!({
                        "blocks": s.block_count,
                        "bytes": s.byte_count,
                        "empty": s.empty,
                    }),
                )
            })
            .collect();
        Envelope::ok(serde_json::Value::Object(nodes))
    })
}

/// `Found N items` followed by one tab-separated line per entry.
pub fn render_listing(listing: &Listing) -> String {
    if listing.entries.is_empty() {
        return String::new();
    }

    let mut out = format!("Found {} items\n", listing.entries.len());
    for entry in &listing.entries {
        let replication = entry
            .replication
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        let size = match entry.kind {
            InodeKind::File => entry.size_bytes.to_string(),
            InodeKind::Directory => "-".to_string(),
        };
        let modified = chrono::DateTime::from_timestamp_millis(entry.modified_at as i64)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\n",
            PermissionFormatter::format(entry.kind, entry.permission),
            replication,
            size,
            modified,
            entry.name
        ));
    }
    out
}

/// `{"Replica 1": {"1": {"Datanode 2": "<block>"}}}`
pub fn render_locations(locations: &PartitionLocations) -> serde_json::Value {
    let mut replicas = serde_json::Map::new();
    for (replica_number, partitions) in &locations.replicas {
        let mut by_partition = serde_json::Map::new();
        for (partition, location) in partitions {
            let mut placed = serde_json::Map::new();
            placed.insert(location.node.to_string(), json!(location.block.0));
            by_partition.insert(partition.to_string(), serde_json::Value::Object(placed));
        }
        replicas.insert(
            format!("Replica {}", replica_number),
            serde_json::Value::Object(by_partition),
        );
    }
    serde_json::Value::Object(replicas)
}

pub fn render_aggregate(result: &AggregateResult) -> serde_json::Value {
    let mut body = json!({
        "result": result.summary(),
        "value": result.value,
        "count": result.total_count,
        "partitions": result.partitions_used,
    });
    if !result.failed_partitions.is_empty() {
        body["failed"] = json!(result.failed_partitions);
    }
    if let Some(explanation) = &result.explanation {
        body["explanation"] = json!(explanation);
    }
    body
}
