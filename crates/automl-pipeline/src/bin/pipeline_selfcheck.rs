use automl_client::VertexConfig;
use automl_models::Manifest;
use automl_pipeline::{ImagePayload, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    ensure_env_present(&["GCP_PROJECT_ID"])?;

    let vertex = VertexConfig::from_env()?;
    println!(
        "pipeline-selfcheck: project={} region={} endpoint={}",
        vertex.project_id, vertex.region, vertex.api_endpoint
    );

    let config = PipelineConfig::from_env()?;
    println!("pipeline-selfcheck: run={}", config.display_name);

    if let Some(path) = &config.local_manifest {
        let stats = Manifest::from_path(path)?.stats();
        println!(
            "pipeline-selfcheck: manifest {} has {} images, {} boxes, labels {:?}",
            path.display(),
            stats.images,
            stats.annotations,
            stats.labels.keys().collect::<Vec<_>>()
        );
    }

    if let Some(path) = &config.predict_image {
        let payload = ImagePayload::from_path(path).await?;
        println!(
            "pipeline-selfcheck: image {} is {}x{} {}",
            path.display(),
            payload.width,
            payload.height,
            payload.format
        );
    }

    println!("pipeline-selfcheck: ok");
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
