//! A deploy keeps running when the webhook caller hangs up.

use deploy_hook::AppState;
use deploy_hook::api::build_router;
use deploy_hook::config::{DeployConfig, TargetKind};
use deploy_hook::signature::{compute_signature, format_signature_header};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

const SECRET: &str = "disconnect-secret";

#[tokio::test]
async fn deploy_finishes_after_caller_disconnects() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DeployConfig::from_lookup(|key| match key {
        "GITHUB_SECRET" => Some(SECRET.to_string()),
        "BACKEND_BRANCH" => Some("main".to_string()),
        _ => None,
    })
    .unwrap();
    let backend = config.target_mut(TargetKind::Backend);
    backend.command = "sh".to_string();
    backend.args = vec!["-c".to_string(), "sleep 1; touch done".to_string()];
    config.deploy_root = dir.path().to_path_buf();
    config.command_timeout = Duration::from_secs(10);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(Arc::new(AppState::new(config)));
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    let body = r#"{"ref":"refs/heads/main"}"#;
    let signature = format_signature_header(&compute_signature(body.as_bytes(), SECRET.as_bytes()));
    let request = format!(
        "POST /api/v1/backend HTTP/1.1\r\n\
         Host: {addr}\r\n\
         Content-Type: application/json\r\n\
         X-GitHub-Event: push\r\n\
         X-Hub-Signature-256: {signature}\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {body}",
        body.len()
    );

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    drop(stream);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(
        dir.path().join("done").exists(),
        "deploy was cut short when the caller hung up"
    );
}
