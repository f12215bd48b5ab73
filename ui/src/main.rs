use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::{Json, Router, routing::get};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Clone)]
struct AppState {
    node_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct CommandParams {
    line: String,
    node: Option<String>,
}

#[derive(Deserialize)]
struct BrowseParams {
    path: Option<String>,
    node: Option<String>,
}

#[derive(Serialize)]
struct ProxyResponse {
    status: u16,
    body: serde_json::Value,
}

/// A terminal line translated into a node request.
#[derive(Debug, PartialEq)]
struct NodeRequest {
    endpoint: &'static str,
    query: Vec<(&'static str, String)>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let node_url =
        std::env::var("NODE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());
    let bind_addr: SocketAddr = std::env::var("UI_BIND")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    let state = AppState {
        node_url: node_url.trim_end_matches('/').to_string(),
        client: reqwest::Client::new(),
    };

    let app = Router::new()
        .route("/", get(ui))
        .route("/api/command", get(api_command))
        .route("/api/browse", get(api_browse))
        .with_state(state);

    tracing::info!("UI listening on {}", bind_addr);
    axum::serve(tokio::net::TcpListener::bind(bind_addr).await?, app).await?;

    Ok(())
}

async fn ui() -> Html<&'static str> {
    Html(UI_HTML)
}

async fn api_command(
    State(state): State<AppState>,
    Query(params): Query<CommandParams>,
) -> Result<Json<ProxyResponse>, (StatusCode, String)> {
    let request = parse_command(&params.line).map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    let node_url = resolve_node_url(&state, params.node);
    forward(&state, &node_url, request).await
}

async fn api_browse(
    State(state): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> Result<Json<ProxyResponse>, (StatusCode, String)> {
    let node_url = resolve_node_url(&state, params.node);
    let path = params
        .path
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string());
    let request = NodeRequest {
        endpoint: "ls",
        query: vec![("path", path)],
    };
    forward(&state, &node_url, request).await
}

async fn forward(
    state: &AppState,
    node_url: &str,
    request: NodeRequest,
) -> Result<Json<ProxyResponse>, (StatusCode, String)> {
    let url = format!("{}/{}", node_url, request.endpoint);
    tracing::info!("-> {} {:?}", url, request.query);

    let resp = state
        .client
        .get(url)
        .query(&request.query)
        .send()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    let status = resp.status().as_u16();
    let body = resp
        .json::<serde_json::Value>()
        .await
        .unwrap_or_else(|_| serde_json::json!({"error": "invalid json"}));

    Ok(Json(ProxyResponse { status, body }))
}

fn parse_command(line: &str) -> Result<NodeRequest, String> {
    let mut words: Vec<&str> = line.split_whitespace().collect();
    let debug = words.iter().any(|w| *w == "--debug");
    words.retain(|w| *w != "--debug");

    let Some((&command, args)) = words.split_first() else {
        return Err("empty command".to_string());
    };
    let arg = |i: usize, name: &str| -> Result<String, String> {
        args.get(i)
            .map(|s| s.to_string())
            .ok_or_else(|| format!("{}: missing <{}>", command, name))
    };

    let request = match command {
        "mkdir" | "rm" | "cat" => NodeRequest {
            endpoint: match command {
                "mkdir" => "mkdir",
                "rm" => "rm",
                _ => "cat",
            },
            query: vec![("path", arg(0, "path")?)],
        },
        "ls" => NodeRequest {
            endpoint: "ls",
            query: vec![("path", args.first().unwrap_or(&"/").to_string())],
        },
        "put" => {
            let mut query = vec![
                ("source", arg(0, "source")?),
                ("destination", arg(1, "destination")?),
                ("partitions", arg(2, "partitions")?),
            ];
            if let Some(hash) = args.get(3) {
                query.push(("hash", hash.to_string()));
            }
            NodeRequest {
                endpoint: "put",
                query,
            }
        }
        "getPartitionLocations" => {
            let mut query = vec![("path", arg(0, "path")?)];
            if let Some(hash) = args.get(1) {
                query.push(("hash", hash.to_string()));
            }
            NodeRequest {
                endpoint: "getPartitionLocations",
                query,
            }
        }
        "readPartition" => NodeRequest {
            endpoint: "readPartition",
            query: vec![
                ("path", arg(0, "path")?),
                ("partition", arg(1, "partition")?),
            ],
        },
        "getAvg" | "getMax" | "getMin" => {
            let mut query = vec![("path", arg(0, "path")?), ("col", arg(1, "col")?)];
            if let Some(hash) = args.get(2) {
                query.push(("hash", hash.to_string()));
            }
            if debug {
                query.push(("debug", "true".to_string()));
            }
            NodeRequest {
                endpoint: match command {
                    "getAvg" => "getAvg",
                    "getMax" => "getMax",
                    _ => "getMin",
                },
                query,
            }
        }
        "datanodes" => NodeRequest {
            endpoint: "datanodes",
            query: Vec::new(),
        },
        other => return Err(format!("{}: command not found", other)),
    };

    Ok(request)
}

fn resolve_node_url(state: &AppState, override_url: Option<String>) -> String {
    let candidate = override_url.unwrap_or_else(|| state.node_url.clone());
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return state.node_url.clone();
    }

    let normalized = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    normalized.trim_end_matches('/').to_string()
}

const UI_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>EDFS</title>
<style>
  body { background: #111; color: #ddd; font-family: monospace; margin: 0; display: flex; height: 100vh; }
  #browser { width: 30%; border-right: 1px solid #333; padding: 1em; overflow: auto; }
  #terminal { flex: 1; padding: 1em; overflow: auto; }
  .entry { cursor: pointer; padding: 2px 0; }
  .dir { color: #7ab; }
  input { background: transparent; color: #ddd; border: none; outline: none; font: inherit; width: 70%; }
  pre { margin: 0 0 0.5em 0; white-space: pre-wrap; }
</style>
</head>
<body>
<div id="browser"><div id="cwd">/</div><div id="items"></div></div>
<div id="terminal">
  <div>node: <input id="node" placeholder="default"></div>
  <div id="history"></div>
  <div>edfs-terminal-user $ <input id="line" autofocus></div>
</div>
<script>
const history = document.getElementById("history");
const line = document.getElementById("line");
const node = () => document.getElementById("node").value;
let cwd = "/";

function show(text) {
  const pre = document.createElement("pre");
  pre.textContent = text;
  history.appendChild(pre);
}

async function browse(path) {
  cwd = path;
  document.getElementById("cwd").textContent = path;
  const res = await fetch("/api/browse?" + new URLSearchParams({ path, node: node() }));
  const data = await res.json();
  const items = document.getElementById("items");
  items.innerHTML = "";
  if (path !== "/") {
    const up = document.createElement("div");
    up.className = "entry dir";
    up.textContent = "..";
    up.onclick = () => browse("/" + path.split("/").filter(e => e).slice(0, -1).join("/"));
    items.appendChild(up);
  }
  const text = (data.body && data.body.response) || "";
  text.split("\n").slice(1).filter(e => e).forEach(row => {
    const cols = row.split("\t");
    const name = cols[cols.length - 1];
    const isDir = cols[0][0] === "d";
    const el = document.createElement("div");
    el.className = "entry" + (isDir ? " dir" : "");
    el.textContent = name;
    if (isDir) el.ondblclick = () => browse((path === "/" ? "" : path) + "/" + name);
    items.appendChild(el);
  });
}

line.addEventListener("keyup", async (event) => {
  if (event.key !== "Enter") return;
  const cmd = line.value.trim();
  line.value = "";
  if (cmd === "clear") { history.innerHTML = ""; return; }
  show("$ " + cmd);
  const res = await fetch("/api/command?" + new URLSearchParams({ line: cmd, node: node() }));
  if (!res.ok) { show(await res.text()); return; }
  const data = await res.json();
  const body = data.body || {};
  const out = typeof body.response === "string" ? body.response : JSON.stringify(body.response, null, 2);
  show(out + (body.status && body.status !== "EDFS200" ? "\n[" + body.status + "]" : ""));
  browse(cwd);
});

browse("/");
</script>
</body>
</html>
"#;
