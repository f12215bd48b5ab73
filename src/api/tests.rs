//! API Tests
//!
//! Calls the axum handlers directly and checks the envelopes.

#[cfg(test)]
mod tests {
    use crate::api::handlers::*;
    use crate::api::protocol::*;
    use crate::fixtures::{categories_csv, config, memory_harness, prices_csv};
    use crate::service::Edfs;
    use axum::extract::{Extension, Query};
    use std::io::Write;
    use std::sync::Arc;

    fn node() -> Arc<Edfs> {
        Arc::new(memory_harness(config()).edfs)
    }

    fn path(p: &str) -> Query<PathParams> {
        Query(PathParams {
            path: p.to_string(),
        })
    }

    fn aggregate(p: &str, col: &str, debug: Option<&str>) -> Query<AggregateParams> {
        Query(AggregateParams {
            path: p.to_string(),
            col: col.to_string(),
            hash: None,
            debug: debug.map(|d| d.to_string()),
        })
    }

    fn csv_source(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    // ============================================================
    // NAMESPACE ENDPOINTS
    // ============================================================

    #[tokio::test]
    async fn test_mkdir_ls_rm_envelopes() {
        let edfs = node();

        let created = handle_mkdir(Extension(edfs.clone()), path("/user/data")).await.0;
        assert_eq!(created.status, "EDFS200");
        assert_eq!(created.response, "Created /user/data");

        let again = handle_mkdir(Extension(edfs.clone()), path("/user/data")).await.0;
        assert_eq!(again.status, "EDFS400");
        assert_eq!(again.response, "mkdir: /user/data: File exists");

        let listing = handle_ls(Extension(edfs.clone()), path("/user")).await.0;
        let text = listing.response.as_str().unwrap();
        assert!(text.starts_with("Found 1 items\n"));
        assert!(text.contains("drwxr-xr-x\t-\t-\t"));
        assert!(text.trim_end().ends_with("\tdata"));

        let busy = handle_rm(Extension(edfs.clone()), path("/user")).await.0;
        assert_eq!(busy.status, "EDFS400");

        let removed = handle_rm(Extension(edfs.clone()), path("/user/data")).await.0;
        assert_eq!(removed.response, "Deleted /user/data");

        let root = handle_rm(Extension(edfs), path("/")).await.0;
        assert_eq!(root.status, "EDFS400");
        assert!(root.response.as_str().unwrap().contains("Root directory"));
    }

    #[tokio::test]
    async fn test_ls_empty_directory_is_blank() {
        let edfs = node();
        let listing = handle_ls(Extension(edfs), path("/")).await.0;
        assert_eq!(listing.status, "EDFS200");
        assert_eq!(listing.response, "");
    }

    // ============================================================
    // DATA ENDPOINTS
    // ============================================================

    #[tokio::test]
    async fn test_put_and_cat_round_trip() {
        let edfs = node();
        let source = csv_source(&prices_csv());

        let put = handle_put(
            Extension(edfs.clone()),
            Query(PutParams {
                source: source.path().display().to_string(),
                destination: "/prices.csv".to_string(),
                partitions: 2,
                hash: Some(String::new()),
            }),
        )
        .await
        .0;
        assert!(put.is_ok());
        assert_eq!(put.response, "File stored in 2 partitions");

        let cat = handle_cat(Extension(edfs), path("/prices.csv")).await.0;
        assert_eq!(cat.status, "EDFS200");
        assert_eq!(cat.response, prices_csv());
    }

    #[tokio::test]
    async fn test_put_missing_source() {
        let edfs = node();
        let put = handle_put(
            Extension(edfs),
            Query(PutParams {
                source: "/definitely/not/here.csv".to_string(),
                destination: "/x.csv".to_string(),
                partitions: 1,
                hash: None,
            }),
        )
        .await
        .0;
        assert_eq!(put.status, "EDFS400");
        assert_eq!(
            put.response,
            "put: File does not exist: /definitely/not/here.csv"
        );
    }

    #[tokio::test]
    async fn test_cat_of_empty_file_is_no_content() {
        let edfs = node();
        edfs.put("/empty.csv", "a,b\n", 1, None).await.unwrap();

        let cat = handle_cat(Extension(edfs), path("/empty.csv")).await.0;
        assert_eq!(cat.status, "EDFS204");
        assert_eq!(cat.response, "");
    }

    #[tokio::test]
    async fn test_partition_locations_shape() {
        let edfs = node();
        edfs.put("/cats.csv", &categories_csv(), 1, Some("category"))
            .await
            .unwrap();

        let env = handle_partition_locations(
            Extension(edfs),
            Query(LocationParams {
                path: "/cats.csv".to_string(),
                hash: None,
            }),
        )
        .await
        .0;
        assert!(env.is_ok());

        let replicas = env.response.as_object().unwrap();
        assert_eq!(replicas.len(), 2);
        for label in ["Replica 1", "Replica 2"] {
            let partitions = replicas[label].as_object().unwrap();
            assert_eq!(partitions.len(), 3);
            let placed = partitions["1"].as_object().unwrap();
            assert_eq!(placed.len(), 1);
            assert!(placed.keys().all(|k| k.starts_with("Datanode ")));
        }
    }

    #[tokio::test]
    async fn test_read_partition_is_one_based() {
        let edfs = node();
        edfs.put("/cats.csv", &categories_csv(), 1, Some("category"))
            .await
            .unwrap();

        let first = handle_read_partition(
            Extension(edfs.clone()),
            Query(ReadPartitionParams {
                path: "/cats.csv".to_string(),
                partition: 1,
            }),
        )
        .await
        .0;
        assert_eq!(first.response, "category,amount\na,10\na,40\na,70\n");

        let zero = handle_read_partition(
            Extension(edfs),
            Query(ReadPartitionParams {
                path: "/cats.csv".to_string(),
                partition: 0,
            }),
        )
        .await
        .0;
        assert_eq!(zero.status, "EDFS400");
    }

    // ============================================================
    // AGGREGATION ENDPOINTS
    // ============================================================

    #[tokio::test]
    async fn test_aggregate_endpoints() {
        let edfs = node();
        edfs.put("/prices.csv", &prices_csv(), 2, None).await.unwrap();

        let avg = handle_avg(Extension(edfs.clone()), aggregate("/prices.csv", "price", None))
            .await
            .0;
        assert_eq!(avg.status, "EDFS200");
        assert_eq!(avg.response["result"], "The overall average is 5.500");
        assert!(avg.response.get("explanation").is_none());

        let max = handle_max(Extension(edfs.clone()), aggregate("/prices.csv", "price", None))
            .await
            .0;
        assert_eq!(max.response["result"], "The overall maximum is 10.000");

        let min = handle_min(
            Extension(edfs.clone()),
            aggregate("/prices.csv", "price", Some("True")),
        )
        .await
        .0;
        assert_eq!(min.response["result"], "The overall minimum is 1.000");
        assert_eq!(min.response["explanation"].as_array().unwrap().len(), 2);

        let text = handle_avg(Extension(edfs), aggregate("/prices.csv", "name", None))
            .await
            .0;
        assert_eq!(text.status, "EDFS400");
        assert_eq!(
            text.response,
            "getAvg: Cannot aggregate on column name: Data not numeric"
        );
    }

    #[tokio::test]
    async fn test_datanodes_endpoint() {
        let edfs = node();
        edfs.put("/prices.csv", &prices_csv(), 2, None).await.unwrap();

        let env = handle_datanodes(Extension(edfs)).await.0;
        let nodes = env.response.as_object().unwrap();
        assert_eq!(nodes.len(), 3);
        let blocks: u64 = nodes
            .values()
            .map(|n| n["blocks"].as_u64().unwrap())
            .sum();
        assert_eq!(blocks, 4);
    }

    #[test]
    fn test_debug_flag_parsing() {
        let mut params = AggregateParams {
            path: "/p".to_string(),
            col: "c".to_string(),
            hash: None,
            debug: None,
        };
        assert!(!params.debug_enabled());
        params.debug = Some("TRUE".to_string());
        assert!(params.debug_enabled());
        params.debug = Some("1".to_string());
        assert!(params.debug_enabled());
        params.debug = Some("no".to_string());
        assert!(!params.debug_enabled());
    }
}
