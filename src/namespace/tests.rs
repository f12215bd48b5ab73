//! Namespace Tests
//!
//! Runs every namespace law against both backends.
//!
//! ## Test Scopes
//! - **Resolver**: prefix matching, path normalization, bulk vs. point lookups.
//! - **Manager**: mkdir -p, rm of files and directories, ls.
//! - **Permissions**: `ls`-style rendering.
//! - **Locks**: ordering and exclusion.

#[cfg(test)]
mod tests {
    use crate::error::EdfsError;
    use crate::fixtures::{harnesses, prices_csv};
    use crate::namespace::locks::PathLocks;
    use crate::namespace::permission::PermissionFormatter;
    use crate::namespace::resolver::normalize;
    use crate::namespace::types::{InodeKind, parent_path, path_prefixes};
    use std::sync::Arc;
    use std::time::Duration;

    // ============================================================
    // RESOLVER TESTS
    // ============================================================

    #[test]
    fn test_normalize_rejects_relative_and_dot_segments() {
        assert!(matches!(normalize("a/b"), Err(EdfsError::InvalidPath(_))));
        assert!(matches!(normalize(""), Err(EdfsError::InvalidPath(_))));
        assert!(matches!(normalize("/a/../b"), Err(EdfsError::InvalidPath(_))));
        assert_eq!(normalize("//a///b/").unwrap(), vec!["a", "b"]);
        assert!(normalize("/").unwrap().is_empty());
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(parent_path("/a/b/c"), "/a/b");
        assert_eq!(parent_path("/a"), "/");
        assert_eq!(parent_path("/"), "/");
        assert_eq!(path_prefixes("/a/b"), vec!["/", "/a", "/a/b"]);
    }

    #[tokio::test]
    async fn test_resolve_root_always_exists() {
        for h in harnesses() {
            let res = h.edfs.resolve("/").await.unwrap();
            assert!(res.exists, "{}", h.edfs.backend_name());
            assert_eq!(res.chain.len(), 1);
            assert_eq!(res.missing_depth, 0);
        }
    }

    #[tokio::test]
    async fn test_resolve_reports_deepest_existing_prefix() {
        for h in harnesses() {
            h.edfs.mkdir("/a/b").await.unwrap();

            let res = h.edfs.resolve("/a/b/c/d").await.unwrap();
            assert!(!res.exists);
            assert_eq!(res.missing_depth, 2);
            assert_eq!(res.chain.len(), 3);
            assert_eq!(res.existing_prefix(), "/a/b");
            assert_eq!(res.target(), None);
        }
    }

    #[tokio::test]
    async fn test_resolve_is_identical_across_backends() {
        let mut outcomes = Vec::new();
        for h in harnesses() {
            h.edfs.mkdir("/x/y").await.unwrap();
            h.edfs.mkdir("/x/z").await.unwrap();
            let mut triples = Vec::new();
            for path in ["/", "/x", "/x/y", "/x/z/w", "/q", "/x/y/z/w"] {
                let res = h.edfs.resolve(path).await.unwrap();
                triples.push((res.exists, res.chain.len(), res.missing_depth));
            }
            outcomes.push(triples);
        }
        assert_eq!(outcomes[0], outcomes[1]);
    }

    // ============================================================
    // MANAGER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_mkdir_then_resolve_exists() {
        for h in harnesses() {
            for path in ["/a", "/a/b", "/data/2024/q1"] {
                if h.edfs.resolve(path).await.unwrap().exists {
                    continue;
                }
                h.edfs.mkdir(path).await.unwrap();
                assert!(h.edfs.resolve(path).await.unwrap().exists, "{}", path);
            }
        }
    }

    #[tokio::test]
    async fn test_mkdir_creates_missing_ancestors() {
        for h in harnesses() {
            h.edfs.mkdir("/a").await.unwrap();
            let leaf = h.edfs.mkdir("/a/b/c").await.unwrap();

            assert_eq!(leaf.path, "/a/b/c");
            assert!(h.edfs.resolve("/a/b").await.unwrap().exists);
            assert!(h.edfs.resolve("/a/b/c").await.unwrap().exists);

            let b = h.edfs.stat("/a/b").await.unwrap();
            assert_eq!(b.kind, InodeKind::Directory);
            assert_eq!(b.permission, 755);
            assert_eq!(leaf.parent, Some(b.id));
        }
    }

    #[tokio::test]
    async fn test_mkdir_existing_fails() {
        for h in harnesses() {
            h.edfs.mkdir("/a").await.unwrap();
            assert!(matches!(
                h.edfs.mkdir("/a").await,
                Err(EdfsError::AlreadyExists(_))
            ));
            assert!(matches!(
                h.edfs.mkdir("/").await,
                Err(EdfsError::AlreadyExists(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_mkdir_under_file_fails() {
        for h in harnesses() {
            h.edfs.put("/f.csv", &prices_csv(), 1, None).await.unwrap();
            assert!(matches!(
                h.edfs.mkdir("/f.csv/sub").await,
                Err(EdfsError::NotADirectory(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_rm_root_forbidden() {
        for h in harnesses() {
            assert!(matches!(
                h.edfs.rm("/").await,
                Err(EdfsError::RootDeletionForbidden(_))
            ));
            h.edfs.mkdir("/a").await.unwrap();
            assert!(matches!(
                h.edfs.rm("///").await,
                Err(EdfsError::RootDeletionForbidden(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_rm_missing_path() {
        for h in harnesses() {
            assert!(matches!(
                h.edfs.rm("/nope").await,
                Err(EdfsError::PathNotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_rm_non_empty_directory() {
        for h in harnesses() {
            h.edfs.mkdir("/a/b").await.unwrap();

            assert!(matches!(
                h.edfs.rm("/a").await,
                Err(EdfsError::DirectoryNotEmpty(_))
            ));
            h.edfs.rm("/a/b").await.unwrap();
            h.edfs.rm("/a").await.unwrap();

            assert!(!h.edfs.resolve("/a").await.unwrap().exists);
        }
    }

    #[tokio::test]
    async fn test_rm_file_releases_blocks() {
        for h in harnesses() {
            h.edfs.put("/f.csv", &prices_csv(), 2, None).await.unwrap();
            let before: u64 = h
                .edfs
                .datanode_stats()
                .await
                .unwrap()
                .iter()
                .map(|s| s.block_count)
                .sum();
            assert_eq!(before, 4);

            h.edfs.rm("/f.csv").await.unwrap();

            let stats = h.edfs.datanode_stats().await.unwrap();
            assert!(stats.iter().all(|s| s.empty && s.byte_count == 0));
            assert!(matches!(
                h.edfs.cat("/f.csv").await,
                Err(EdfsError::PathNotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_ls_lists_children_sorted() {
        for h in harnesses() {
            h.edfs.mkdir("/d/zeta").await.unwrap();
            h.edfs.mkdir("/d/alpha").await.unwrap();
            h.edfs.put("/d/data.csv", &prices_csv(), 1, None).await.unwrap();

            let listing = h.edfs.ls("/d").await.unwrap();
            let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["alpha", "data.csv", "zeta"]);

            let file = &listing.entries[1];
            assert_eq!(file.kind, InodeKind::File);
            assert_eq!(file.replication, Some(2));
            assert_eq!(file.permission, 644);
            assert!(file.size_bytes > 0);
            assert_eq!(listing.entries[0].size_bytes, 0);
        }
    }

    #[tokio::test]
    async fn test_ls_errors() {
        for h in harnesses() {
            h.edfs.put("/f.csv", &prices_csv(), 1, None).await.unwrap();
            assert!(matches!(
                h.edfs.ls("/missing").await,
                Err(EdfsError::PathNotFound(_))
            ));
            assert!(matches!(
                h.edfs.ls("/f.csv").await,
                Err(EdfsError::NotADirectory(_))
            ));
        }
    }

    // ============================================================
    // PERMISSION TESTS
    // ============================================================

    #[test]
    fn test_permission_format() {
        assert_eq!(
            PermissionFormatter::format(InodeKind::Directory, 755),
            "drwxr-xr-x"
        );
        assert_eq!(PermissionFormatter::format(InodeKind::File, 644), "-rw-r--r--");
        assert_eq!(PermissionFormatter::format(InodeKind::File, 700), "-rwx------");
        assert_eq!(PermissionFormatter::format(InodeKind::File, 55), "----r-xr-x");
        assert_eq!(PermissionFormatter::format(InodeKind::File, 0), "----------");
        assert_eq!(PermissionFormatter::mode(1755), "rwxr-xr-x");
    }

    // ============================================================
    // LOCK TESTS
    // ============================================================

    #[tokio::test]
    async fn test_path_lock_excludes_second_writer() {
        let locks = Arc::new(PathLocks::new());
        let guard = locks.acquire(["/a".to_string()]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(["/a".to_string(), "/b".to_string()]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_path_lock_entries_released_when_idle() {
        let locks = Arc::new(PathLocks::new());
        let first = locks.acquire(["/a".to_string(), "/b".to_string()]).await;
        assert_eq!(locks.tracked(), 2);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(["/a".to_string()]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // "/a" still has a waiter, "/b" is idle once released.
        drop(first);
        assert_eq!(locks.tracked(), 1);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_namespace_writes_leave_no_lock_entries() {
        let h = crate::fixtures::memory_harness(crate::fixtures::config());
        h.edfs.mkdir("/a/b/c").await.unwrap();
        h.edfs.put("/a/f.csv", "v\n1\n", 1, None).await.unwrap();
        h.edfs.rm("/a/f.csv").await.unwrap();
        h.edfs.rm("/a/b/c").await.unwrap();
        assert_eq!(h.edfs.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_path_lock_duplicates_do_not_deadlock() {
        let locks = PathLocks::new();
        let acquire = locks.acquire(["/a".to_string(), "/a".to_string()]);
        tokio::time::timeout(Duration::from_secs(1), acquire)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_mkdir_same_path_one_wins() {
        let h = crate::fixtures::memory_harness(crate::fixtures::config());
        let edfs = Arc::new(h.edfs);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let edfs = edfs.clone();
            tasks.push(tokio::spawn(async move { edfs.mkdir("/race/dir").await.is_ok() }));
        }
        let mut wins = 0;
        for t in tasks {
            if t.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(edfs.ls("/race").await.unwrap().entries.len(), 1);
    }
}
