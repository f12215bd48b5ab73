//! Storage Module Tests
//!
//! Validates placement, replication and reconstruction on both backends.
//!
//! ## Test Scopes
//! - **Allocator**: distinct targets, pool exhaustion.
//! - **Backends**: block store counters and the catalogue round trip.
//! - **Placement**: partition counts, replica invariants, error paths.
//! - **Reconstruction**: row order, replica fallback, partition locations.

#[cfg(test)]
mod tests {
    use crate::error::EdfsError;
    use crate::fixtures::{
        categories_csv, config, harnesses, memory_harness, prices_csv, sqlite_harness,
    };
    use crate::dataset::csv::{encode_table, parse_table};
    use crate::dataset::types::{ColumnKind, Value};
    use crate::storage::allocator::ReplicaAllocator;
    use crate::storage::backend::{BlockStore, MetadataStore};
    use crate::storage::memory::MemoryBackend;
    use crate::storage::sqlite::SqliteBackend;
    use crate::storage::types::{BlockId, NodeId, bucket_matches};
    use std::collections::HashSet;
    use std::io::Write;

    // ============================================================
    // ALLOCATOR TESTS
    // ============================================================

    #[test]
    fn test_allocate_distinct_nodes() {
        let pool: Vec<NodeId> = (1..=5).map(NodeId).collect();
        for _ in 0..200 {
            let picked = ReplicaAllocator::allocate(3, &pool).unwrap();
            assert_eq!(picked.len(), 3);
            let unique: HashSet<_> = picked.iter().collect();
            assert_eq!(unique.len(), 3);
            assert!(picked.iter().all(|n| pool.contains(n)));
        }
    }

    #[test]
    fn test_allocate_covers_whole_pool() {
        let pool: Vec<NodeId> = (1..=4).map(NodeId).collect();
        let mut seen = HashSet::new();
        for _ in 0..500 {
            seen.extend(ReplicaAllocator::allocate(1, &pool).unwrap());
        }
        assert_eq!(seen.len(), 4, "Every node should eventually be chosen");
    }

    #[test]
    fn test_allocate_rejects_oversized_factor() {
        let pool: Vec<NodeId> = (1..=2).map(NodeId).collect();
        assert!(ReplicaAllocator::allocate(3, &pool).is_err());
        assert!(ReplicaAllocator::allocate(0, &pool).is_err());
    }

    #[test]
    fn test_bucket_filter_matching() {
        assert!(bucket_matches("a", "a"));
        assert!(bucket_matches("3", "3.0"));
        assert!(bucket_matches("2.5", " 2.50"));
        assert!(!bucket_matches("a", "b"));
        assert!(!bucket_matches("index_0", "0"));
    }

    // ============================================================
    // BACKEND TESTS
    // ============================================================

    #[tokio::test]
    async fn test_block_store_round_trip_both_backends() {
        let memory = MemoryBackend::new(3, 755);
        let sqlite = SqliteBackend::open_in_memory(3, 755).unwrap();
        let stores: Vec<&dyn BlockStore> = vec![&memory, &sqlite];

        for store in stores {
            let id = BlockId::new();
            store.put_block(NodeId(2), &id, "index,a\n0,1\n").await.unwrap();
            assert_eq!(
                store.get_block(NodeId(2), &id).await.unwrap().as_deref(),
                Some("index,a\n0,1\n")
            );
            assert_eq!(store.get_block(NodeId(1), &id).await.unwrap(), None);

            store.delete_block(NodeId(2), &id).await.unwrap();
            assert_eq!(store.get_block(NodeId(2), &id).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_node_counters_never_go_negative() {
        let memory = MemoryBackend::new(2, 755);
        let sqlite = SqliteBackend::open_in_memory(2, 755).unwrap();
        let stores: Vec<&dyn BlockStore> = vec![&memory, &sqlite];

        for store in stores {
            let stats = store.adjust_node_block_count(NodeId(1), 2, 100).await.unwrap();
            assert_eq!((stats.block_count, stats.byte_count, stats.empty), (2, 100, false));

            let stats = store.adjust_node_block_count(NodeId(1), -5, -500).await.unwrap();
            assert_eq!((stats.block_count, stats.byte_count, stats.empty), (0, 0, true));

            assert!(store.adjust_node_block_count(NodeId(9), 1, 1).await.is_err());
            assert_eq!(store.node_ids(), vec![NodeId(1), NodeId(2)]);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sqlite_concurrent_block_writes() {
        let sqlite = std::sync::Arc::new(SqliteBackend::open_in_memory(3, 755).unwrap());

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..16u32 {
            let sqlite = sqlite.clone();
            tasks.spawn(async move {
                let node = NodeId(i % 3 + 1);
                let id = BlockId::new();
                let content = format!("index,v:number\n0,{}\n", i);
                sqlite.put_block(node, &id, &content).await.unwrap();
                sqlite.adjust_node_block_count(node, 1, 1).await.unwrap();
                assert_eq!(sqlite.get_block(node, &id).await.unwrap(), Some(content));
            });
        }
        while let Some(done) = tasks.join_next().await {
            done.unwrap();
        }

        let mut total = 0;
        for node in sqlite.node_ids() {
            total += sqlite.node_block_count(node).await.unwrap().block_count;
        }
        assert_eq!(total, 16);
    }

    #[tokio::test]
    async fn test_sqlite_exposes_edge_snapshot() {
        let sqlite = SqliteBackend::open_in_memory(3, 755).unwrap();
        let memory = MemoryBackend::new(3, 755);

        assert!(sqlite.edge_snapshot().await.unwrap().is_some());
        assert!(memory.edge_snapshot().await.unwrap().is_none());
        assert_eq!(sqlite.root().await.unwrap().path, "/");
    }

    #[tokio::test]
    async fn test_sqlite_reopen_keeps_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("edfs.db");
        {
            let h = crate::service::Edfs::sqlite(&db, config()).unwrap();
            h.mkdir("/kept/dir").await.unwrap();
            h.put("/kept/p.csv", &prices_csv(), 2, None).await.unwrap();
        }

        let reopened = crate::service::Edfs::sqlite(&db, config()).unwrap();
        assert!(reopened.resolve("/kept/dir").await.unwrap().exists);
        let table = reopened.cat("/kept/p.csv").await.unwrap().unwrap();
        assert_eq!(table.row_count(), 10);
    }

    // ============================================================
    // PLACEMENT TESTS
    // ============================================================

    #[tokio::test]
    async fn test_put_range_partitions() {
        for h in harnesses() {
            let written = h.edfs.put("/prices.csv", &prices_csv(), 2, None).await.unwrap();
            assert_eq!(written, 2, "{}", h.edfs.backend_name());

            let locations = h.edfs.partition_locations("/prices.csv", None).await.unwrap();
            assert_eq!(locations.partition_count(), 2);
        }
    }

    #[tokio::test]
    async fn test_put_with_huge_partition_count() {
        let h = memory_harness(config());
        let written = h
            .edfs
            .put("/prices.csv", &prices_csv(), u32::MAX, None)
            .await
            .unwrap();
        assert_eq!(written, 10);

        let table = h.edfs.cat("/prices.csv").await.unwrap().unwrap();
        assert_eq!(encode_table(&table), prices_csv());
    }

    #[tokio::test]
    async fn test_put_hash_groups_override_requested_count() {
        for h in harnesses() {
            let written = h
                .edfs
                .put("/cats.csv", &categories_csv(), 1, Some("category"))
                .await
                .unwrap();
            assert_eq!(written, 3);

            let locations = h.edfs.partition_locations("/cats.csv", None).await.unwrap();
            assert_eq!(locations.replicas.len(), 2);
            for partitions in locations.replicas.values() {
                assert_eq!(partitions.len(), 3);
                assert_eq!(partitions.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
            }
        }
    }

    #[tokio::test]
    async fn test_every_block_has_distinct_replicas() {
        for h in harnesses() {
            h.edfs
                .put("/cats.csv", &categories_csv(), 4, Some("category"))
                .await
                .unwrap();

            let locations = h.edfs.partition_locations("/cats.csv", None).await.unwrap();
            let partitions = locations.partition_count() as u32;
            for p in 1..=partitions {
                let nodes: Vec<NodeId> = locations
                    .replicas
                    .values()
                    .filter_map(|parts| parts.get(&p).map(|l| l.node))
                    .collect();
                assert_eq!(nodes.len(), 2);
                assert_ne!(nodes[0], nodes[1]);
            }
        }
    }

    #[tokio::test]
    async fn test_put_updates_datanode_counters() {
        for h in harnesses() {
            h.edfs.put("/cats.csv", &categories_csv(), 1, Some("category")).await.unwrap();
            let stats = h.edfs.datanode_stats().await.unwrap();
            assert_eq!(stats.len(), 3);
            assert_eq!(stats.iter().map(|s| s.block_count).sum::<u64>(), 6);
            assert!(stats.iter().map(|s| s.byte_count).sum::<u64>() > 0);
        }
    }

    #[tokio::test]
    async fn test_put_error_paths() {
        for h in harnesses() {
            assert!(matches!(
                h.edfs.put("/no/such/dir/f.csv", &prices_csv(), 1, None).await,
                Err(EdfsError::PathNotFound(_))
            ));

            h.edfs.put("/f.csv", &prices_csv(), 1, None).await.unwrap();
            assert!(matches!(
                h.edfs.put("/f.csv", &prices_csv(), 1, None).await,
                Err(EdfsError::AlreadyExists(_))
            ));
            assert!(matches!(
                h.edfs.put("/f.csv/g.csv", &prices_csv(), 1, None).await,
                Err(EdfsError::NotADirectory(_))
            ));
            assert!(matches!(
                h.edfs.put("/zero.csv", &prices_csv(), 0, None).await,
                Err(EdfsError::InvalidPartitionCount)
            ));
            assert!(!h.edfs.resolve("/zero.csv").await.unwrap().exists);
        }
    }

    #[tokio::test]
    async fn test_put_source_validation() {
        let h = memory_harness(config());
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.csv");
        assert!(matches!(
            h.edfs.put_source(&missing, "/m.csv", 1, None).await,
            Err(EdfsError::SourceFileNotFound(_))
        ));

        let text_file = dir.path().join("notes.txt");
        std::fs::write(&text_file, "a,b\n1,2\n").unwrap();
        assert!(matches!(
            h.edfs.put_source(&text_file, "/n.csv", 1, None).await,
            Err(EdfsError::InvalidFileType(_))
        ));

        assert!(matches!(
            h.edfs.put_source(dir.path(), "/d.csv", 1, None).await,
            Err(EdfsError::InvalidFileType(_))
        ));
    }

    #[tokio::test]
    async fn test_put_source_reads_local_csv() {
        let h = sqlite_harness(config());
        let mut source = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        source.write_all(prices_csv().as_bytes()).unwrap();
        source.flush().unwrap();

        let written = h
            .edfs
            .put_source(source.path(), "/from_disk.csv", 2, None)
            .await
            .unwrap();
        assert_eq!(written, 2);

        let table = h.edfs.cat("/from_disk.csv").await.unwrap().unwrap();
        assert_eq!(encode_table(&table), prices_csv());
    }

    #[tokio::test]
    async fn test_put_skips_unreachable_replica_target() {
        let h = memory_harness(crate::config::EdfsConfig {
            replication_factor: 3,
            ..config()
        });
        let memory = h.memory.clone().unwrap();
        memory.set_node_offline(NodeId(2), true);

        h.edfs.put("/p.csv", &prices_csv(), 2, None).await.unwrap();

        let locations = h.edfs.partition_locations("/p.csv", None).await.unwrap();
        assert_eq!(locations.replicas.len(), 2);
        assert!(
            locations
                .replicas
                .values()
                .flat_map(|parts| parts.values())
                .all(|l| l.node != NodeId(2))
        );
        assert_eq!(h.edfs.cat("/p.csv").await.unwrap().unwrap().row_count(), 10);
    }

    // ============================================================
    // RECONSTRUCTION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_cat_restores_original_order() {
        for h in harnesses() {
            for (i, (partitions, hash)) in [(1, None), (3, None), (1, Some("category")), (5, Some("category"))]
                .into_iter()
                .enumerate()
            {
                let path = format!("/cats{}.csv", i);
                h.edfs.put(&path, &categories_csv(), partitions, hash).await.unwrap();

                let table = h.edfs.cat(&path).await.unwrap().unwrap();
                assert_eq!(encode_table(&table), categories_csv(), "{} {}", h.edfs.backend_name(), path);
            }
        }
    }

    #[tokio::test]
    async fn test_cat_with_small_partition_cap() {
        let h = memory_harness(crate::config::EdfsConfig {
            max_partition_size: 16,
            ..config()
        });
        let written = h.edfs.put("/p.csv", &prices_csv(), 1, None).await.unwrap();
        assert!(written > 1);

        let table = h.edfs.cat("/p.csv").await.unwrap().unwrap();
        assert_eq!(encode_table(&table), prices_csv());
    }

    #[tokio::test]
    async fn test_cat_errors_and_empty_file() {
        for h in harnesses() {
            h.edfs.mkdir("/dir").await.unwrap();
            assert!(matches!(h.edfs.cat("/dir").await, Err(EdfsError::NotAFile(_))));
            assert!(matches!(h.edfs.cat("/x.csv").await, Err(EdfsError::PathNotFound(_))));

            h.edfs.put("/empty.csv", "a,b\n", 2, None).await.unwrap();
            assert_eq!(h.edfs.cat("/empty.csv").await.unwrap(), None);
            assert!(matches!(
                h.edfs.partition_locations("/empty.csv", None).await,
                Err(EdfsError::NoPartitionsFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_read_partition_sorted_without_index() {
        for h in harnesses() {
            h.edfs
                .put("/cats.csv", &categories_csv(), 1, Some("category"))
                .await
                .unwrap();

            // Buckets are ordered a, b, c; "a" holds source rows 1, 4, 7.
            let first = h.edfs.read_partition("/cats.csv", 0).await.unwrap();
            assert_eq!(encode_table(&first), "category,amount\na,10\na,40\na,70\n");

            let raw = h.edfs.read_partition_raw("/cats.csv", 0).await.unwrap();
            assert!(raw.starts_with("index,category:text,amount:number\n"));

            assert!(matches!(
                h.edfs.read_partition("/cats.csv", 7).await,
                Err(EdfsError::NoPartitionsFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_read_partition_survives_one_unreachable_replica() {
        let h = memory_harness(config());
        let memory = h.memory.clone().unwrap();
        h.edfs.put("/p.csv", &prices_csv(), 2, None).await.unwrap();

        let locations = h.edfs.partition_locations("/p.csv", None).await.unwrap();
        let first_replica = locations.replicas[&1][&1].node;
        memory.set_node_offline(first_replica, true);

        let table = h.edfs.read_partition("/p.csv", 0).await.unwrap();
        assert_eq!(table.row_count(), 5);
        assert_eq!(table.rows[0][2].as_number(), Some(1.0));
    }

    #[tokio::test]
    async fn test_read_partition_no_replica_left() {
        let h = memory_harness(config());
        let memory = h.memory.clone().unwrap();
        h.edfs.put("/p.csv", &prices_csv(), 2, None).await.unwrap();

        let locations = h.edfs.partition_locations("/p.csv", None).await.unwrap();
        for parts in locations.replicas.values() {
            let location = &parts[&2];
            memory.corrupt_replica(location.node, &location.block);
        }

        assert!(matches!(
            h.edfs.read_partition("/p.csv", 1).await,
            Err(EdfsError::NoContentForPartition { partition: 1, .. })
        ));
        assert!(h.edfs.read_partition("/p.csv", 0).await.is_ok());
    }

    #[tokio::test]
    async fn test_partition_locations_hash_filter() {
        for h in harnesses() {
            h.edfs
                .put("/cats.csv", &categories_csv(), 1, Some("category"))
                .await
                .unwrap();

            let only_b = h.edfs.partition_locations("/cats.csv", Some("b")).await.unwrap();
            assert_eq!(only_b.partition_count(), 1);
            assert!(only_b.replicas[&1].contains_key(&2));

            assert!(matches!(
                h.edfs.partition_locations("/cats.csv", Some("zzz")).await,
                Err(EdfsError::NoPartitionsFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_cat_matches_parsed_source() {
        let h = memory_harness(config());
        let csv = "city,temp\n\"Las Palmas, GC\",21.5\nMadrid,\nOslo,-3\n";
        h.edfs.put("/w.csv", csv, 2, Some("city")).await.unwrap();

        let table = h.edfs.cat("/w.csv").await.unwrap().unwrap();
        let expected = parse_table(csv).unwrap();
        assert_eq!(table.rows, expected.rows);
    }

    #[tokio::test]
    async fn test_cat_keeps_text_that_looks_numeric() {
        for h in harnesses() {
            let csv = "code,qty\n007,1\nabc,2\n";
            h.edfs.put("/k.csv", csv, 1, Some("code")).await.unwrap();

            // "007" lands alone in its bucket but stays text.
            let table = h.edfs.cat("/k.csv").await.unwrap().unwrap();
            assert_eq!(table.columns[0].kind, ColumnKind::Text);
            assert_eq!(
                table.rows[0],
                vec![Value::Text("007".to_string()), Value::Number(1.0)]
            );
            assert_eq!(encode_table(&table), csv);

            let first = h.edfs.read_partition("/k.csv", 0).await.unwrap();
            assert_eq!(first.rows[0][0], Value::Text("007".to_string()));
        }
    }
}
