//! End-to-end tests for Codewright.
//!
//! These drive the whole stack: HTTP router → orchestrator → real tools on a
//! temporary workspace → SQLite on disk, with only the model scripted.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use codewright_agent::testing::{ScriptedProvider, text, tool_use};
use codewright_agent::{ConversationCache, Orchestrator};
use codewright_config::{AppConfig, GatewayConfig, ToolsConfig};
use codewright_core::message::Turn;
use codewright_core::store::MetadataStore;
use codewright_gateway::{AppState, build_router};
use codewright_store::SqliteStore;
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn post_json(app: &axum::Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn create_file_over_http_persists_everything() {
    let workspace = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let db_path = data.path().join("storage.db");

    let store: Arc<dyn MetadataStore> =
        Arc::new(SqliteStore::new(db_path.to_str().unwrap(), 2).await.unwrap());
    let tools = codewright_tools::default_registry(&ToolsConfig {
        workspace_root: workspace.path().to_path_buf(),
        ..ToolsConfig::default()
    });
    let provider = Arc::new(ScriptedProvider::new([
        Ok(tool_use(
            "toolu_1",
            "create_file",
            serde_json::json!({"path": "app/main.py", "content": "print('hello')\n"}),
        )),
        Ok(text("Created app/main.py.")),
    ]));
    let cache = Arc::new(ConversationCache::new(Arc::clone(&store)));
    let orchestrator = Orchestrator::new(provider.clone(), Arc::new(tools), cache);
    let app = build_router(Arc::new(AppState::new(orchestrator)), &GatewayConfig::default());

    // Create a project, then chat about it.
    let (status, project) =
        post_json(&app, "/api/chat/projects", serde_json::json!({"name": "hello"})).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = project["id"].as_i64().unwrap();

    let (status, reply) = post_json(
        &app,
        "/api/chat",
        serde_json::json!({"project_id": id, "message": "write a hello world"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["message"], "Created app/main.py.");

    // The tool really ran against the workspace.
    let written = std::fs::read_to_string(workspace.path().join("app/main.py")).unwrap();
    assert_eq!(written, "print('hello')\n");

    // History shows the text turns only.
    let (status, history) = get_json(&app, &format!("/api/chat/history?project_id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        history,
        serde_json::json!([
            {"isUser": true, "content": "write a hello world"},
            {"isUser": false, "content": "Created app/main.py."}
        ])
    );

    // The follow-up request carried the tool pair.
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 3);
    assert_eq!(
        requests[1].messages[2],
        Turn::tool_result("toolu_1", "File created: app/main.py")
    );

    // A fresh connection sees the full transcript.
    drop(app);
    let reopened = SqliteStore::new(db_path.to_str().unwrap(), 1).await.unwrap();
    let data = reopened.load_project(id).await.unwrap();
    let turns: Vec<Turn> = data
        .turns
        .iter()
        .map(|t| Turn::decode(&t.payload).unwrap())
        .collect();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[0], Turn::user("write a hello world"));
    assert_eq!(
        turns[1],
        Turn::tool_use(
            "toolu_1",
            "create_file",
            serde_json::json!({"path": "app/main.py", "content": "print('hello')\n"})
        )
    );
    assert_eq!(turns[3], Turn::assistant("Created app/main.py."));
    assert!(data.records.is_empty());
}

#[tokio::test]
async fn path_escape_is_reported_to_the_model() {
    let workspace = tempfile::tempdir().unwrap();
    let store: Arc<dyn MetadataStore> = Arc::new(SqliteStore::new(":memory:", 1).await.unwrap());
    let project = store.create_project("jail").await.unwrap();

    let tools = codewright_tools::default_registry(&ToolsConfig {
        workspace_root: workspace.path().to_path_buf(),
        ..ToolsConfig::default()
    });
    let provider = Arc::new(ScriptedProvider::new([
        Ok(tool_use(
            "toolu_1",
            "read_file",
            serde_json::json!({"path": "../../etc/passwd"}),
        )),
        Ok(text("I can't read outside the workspace.")),
    ]));
    let cache = Arc::new(ConversationCache::new(Arc::clone(&store)));
    let orchestrator = Orchestrator::new(provider, Arc::new(tools), cache);

    let answer = orchestrator
        .handle_message(project.id, "show me /etc/passwd")
        .await
        .unwrap();
    assert_eq!(answer, "I can't read outside the workspace.");

    let data = store.load_project(project.id).await.unwrap();
    let result = Turn::decode(&data.turns[2].payload).unwrap();
    match result.content {
        codewright_core::message::TurnContent::ToolResult { content, .. } => {
            assert!(content.starts_with("Error executing tool: Permission denied"));
        }
        other => panic!("expected tool result, got {other:?}"),
    }
}

#[test]
fn init_writes_a_loadable_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_codewright"))
        .arg("--config")
        .arg(&path)
        .arg("init")
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    assert!(path.exists());

    let config = AppConfig::load_from(&path).unwrap();
    assert_eq!(config.model, AppConfig::default().model);
    assert_eq!(config.gateway.port, 8000);

    // A second run leaves the file alone.
    std::fs::write(&path, "model = \"custom\"\n").unwrap();
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_codewright"))
        .arg("--config")
        .arg(&path)
        .arg("init")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "model = \"custom\"\n");
}

#[test]
fn projects_command_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    let db = dir.path().join("cli.db");
    std::fs::write(
        &config_path,
        format!("[store]\ndatabase_url = \"sqlite://{}\"\n", db.display()),
    )
    .unwrap();

    let run = |args: &[&str]| {
        std::process::Command::new(env!("CARGO_BIN_EXE_codewright"))
            .arg("--config")
            .arg(&config_path)
            .args(args)
            .env_remove("CODEWRIGHT_DATABASE_URL")
            .output()
            .unwrap()
    };

    let created = run(&["projects", "new", "storefront"]);
    assert!(created.status.success(), "{created:?}");
    assert!(String::from_utf8_lossy(&created.stdout).contains("storefront"));

    let listed = run(&["projects"]);
    assert!(listed.status.success(), "{listed:?}");
    assert!(String::from_utf8_lossy(&listed.stdout).contains("storefront"));

    let history = run(&["history", "--project", "1"]);
    assert!(history.status.success(), "{history:?}");
    assert!(String::from_utf8_lossy(&history.stdout).contains("No messages yet"));
}
