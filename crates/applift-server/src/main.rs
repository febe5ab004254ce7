use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use applift_kube::{
    AppConfig, BuildPipeline, ClusterClient, DeployPipeline, ManifestFactory,
};
use applift_registry::RegistryClient;

mod dto;
mod error;
mod routes;
mod stream;

use routes::AppState;

/// Application controller: builds container images and deploys them as
/// autoscaling services.
#[derive(Parser)]
#[command(name = "applift-server", version)]
struct Args {
    /// Path to the controller configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "applift=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config =
        Arc::new(AppConfig::from_file(&args.config).expect("Failed to load configuration"));

    let build_cluster = ClusterClient::from_kubeconfig(
        config.kube_config.as_deref(),
        config.build_context.as_deref(),
        config.build_namespace.clone(),
    )
    .await
    .expect("Failed to connect to the build cluster");

    let deploy_cluster = ClusterClient::from_kubeconfig(
        config.kube_config.as_deref(),
        config.deploy_context.as_deref(),
        config.deploy_namespace.clone(),
    )
    .await
    .expect("Failed to connect to the deploy cluster");

    let factory = ManifestFactory::new(config.clone());
    let registry = RegistryClient::new(config.registry.clone());

    let state = AppState {
        build: Arc::new(BuildPipeline::new(
            build_cluster,
            factory.clone(),
            registry,
            config.clone(),
        )),
        deploy: Arc::new(DeployPipeline::new(
            deploy_cluster,
            factory,
            config.clone(),
        )),
        heartbeat_period: Duration::from_secs(config.heartbeat_period_sec),
        default_runtime: config.default_runtime.clone(),
    };

    let app = routes::create_router(state);

    tracing::info!("Listening on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
