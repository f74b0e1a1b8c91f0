use deploy_hook::api::build_router;
use deploy_hook::config::DeployConfig;
use deploy_hook::logging::{FileLogger, setup_logging};
use deploy_hook::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    // First loaded wins, so .env.local takes precedence over .env
    dotenv::from_filename(".env.local").ok();
    dotenv::dotenv().ok();

    let config = match DeployConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let _log_guards = match setup_logging(&FileLogger::new(config.log_dir.clone())) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("Logging setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let bind_address = format!("{}:{}", config.bind_host, config.port);
    let service_name = config.service_name.to_uppercase();
    info!("Deploy root: {:?}", config.deploy_root);
    info!("Command timeout: {:?}", config.command_timeout);

    let app = build_router(Arc::new(AppState::new(config)));

    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Could not bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };
    info!("Service {} is listening on {}", service_name, bind_address);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {}", e);
    }
}
