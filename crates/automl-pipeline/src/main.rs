//! AutoML object detection pipeline binary.

use anyhow::Context;
use tracing::{error, info};

use automl_client::VertexClient;
use automl_pipeline::{init_tracing, Pipeline, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting automl-pipeline");

    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    info!("Pipeline config: {:?}", config);

    let client = VertexClient::from_env()
        .await
        .context("Failed to create Vertex AI client")?;
    info!(
        project = %client.config().project_id,
        region = %client.config().region,
        "Vertex AI client ready"
    );

    match Pipeline::new(client, config).run().await {
        Ok(report) => {
            info!(
                model = report.model.as_deref().unwrap_or("-"),
                endpoint = report.endpoint.as_deref().unwrap_or("-"),
                detections = report.detections.len(),
                "Pipeline finished"
            );
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            Err(e.into())
        }
    }
}
