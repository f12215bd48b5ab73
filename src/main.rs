use edfs::api;
use edfs::config::EdfsConfig;
use edfs::service::Edfs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --bind <addr:port> [--backend memory|sqlite] [--db <file>]",
            args[0]
        );
        eprintln!("Example: {} --bind 127.0.0.1:5000", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:5000 --backend sqlite --db edfs.db",
            args[0]
        );

        std::process::exit(1);
    }

    let mut bind_addr: Option<SocketAddr> = None;
    let mut backend = String::from("memory");
    let mut db_path = PathBuf::from("edfs.db");

    let mut i = 1;
    while i < args.len() {
        match (args[i].as_str(), args.get(i + 1)) {
            ("--bind", Some(value)) => {
                bind_addr = Some(value.parse()?);
                i += 2;
            }
            ("--backend", Some(value)) => {
                backend = value.clone();
                i += 2;
            }
            ("--db", Some(value)) => {
                db_path = PathBuf::from(value);
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.ok_or_else(|| anyhow::anyhow!("--bind is required"))?;

    // 1. Configuration:
    let config = EdfsConfig::from_env()?;
    tracing::info!("Configuration: {:?}", config);

    // 2. Storage backend:
    let edfs = match backend.as_str() {
        "memory" => Edfs::in_memory(config)?,
        "sqlite" => {
            tracing::info!("Using database {}", db_path.display());
            Edfs::sqlite(&db_path, config)?
        }
        other => anyhow::bail!("unknown backend '{}', expected memory or sqlite", other),
    };
    let edfs = Arc::new(edfs);

    // 3. HTTP Router:
    let app = api::router(edfs.clone());

    // 4. Spawn datanode stats reporter:
    let stats_edfs = edfs.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));

        loop {
            interval.tick().await;
            match stats_edfs.datanode_stats().await {
                Ok(stats) => {
                    for node in stats {
                        tracing::info!(
                            "  - {} blocks={} bytes={}{}",
                            node.node,
                            node.block_count,
                            node.byte_count,
                            if node.empty { " (empty)" } else { "" }
                        );
                    }
                }
                Err(e) => tracing::warn!("Cannot read datanode stats: {}", e),
            }
            tracing::debug!("Path locks held: {}", stats_edfs.lock_count());
        }
    });

    // 5. Start HTTP server:
    tracing::info!("HTTP server listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
