use crate::{
    config::{Config, ModelConfig},
    model_loader::{load_first_available, ModelCache, ModelLoadError},
    ort_service::OrtModelService,
    server::HttpServer,
};
use std::{error::Error, sync::Arc};

static MODEL: ModelCache<OrtModelService> = ModelCache::new();

/// Returns the process-wide classifier, loading it from the configured
/// candidates on first use.
pub fn load_model(model_config: &ModelConfig) -> Result<Arc<OrtModelService>, ModelLoadError> {
    MODEL.get_or_load(|| {
        load_first_available(&model_config.candidate_paths(), |path| {
            OrtModelService::new(path, model_config.intra_threads)
        })
    })
}

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let model = match load_model(&config.model) {
        Ok(model) => model,
        Err(e) => {
            tracing::error!("Failed to load model: {}", e);
            return Err(Box::new(e));
        }
    };
    tracing::info!("Serving model {}", model.model_path().display());

    let server = HttpServer::new(model, &config.server).await?;
    server.run().await?;

    Ok(())
}
