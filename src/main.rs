use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod annotate;
mod audio;
mod chat;
mod config;
mod detection;
mod error;
mod llm;
mod maintenance;
mod model;
mod pipeline;
mod routes;
mod storage;
#[cfg(test)]
mod testing;
mod utils;

use annotate::Annotator;
use audio::AudioStub;
use chat::ChatRelay;
use config::Config;
use detection::RoboflowClient;
use llm::MistralClient;
use maintenance::{MaintenanceLookup, PgMaintenanceLookup};
use model::ClassNames;
use pipeline::UploadPipeline;
use routes::{router, AppState};
use storage::Storage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    config.warn_on_gaps();

    let storage = Storage::open(&config.upload_dir, &config.results_dir)
        .await?
        .with_results_keep(config.results_keep);
    let annotator = Annotator::bundled()?;

    let classes = match &config.class_list_path {
        Some(path) => {
            tracing::info!("Loading class list from {}", path.display());
            ClassNames::from_file(path)?
        }
        None => ClassNames::default(),
    };

    let lookup: Option<Arc<dyn MaintenanceLookup>> =
        match (&config.database_url, config.maintenance_lookup) {
            (Some(url), true) => Some(Arc::new(PgMaintenanceLookup::connect_lazy(url)?)),
            _ => None,
        };
    tracing::info!(
        "Maintenance enrichment {}",
        if lookup.is_some() { "enabled" } else { "disabled" }
    );

    let state = Arc::new(AppState {
        pipeline: UploadPipeline::new(
            Arc::new(RoboflowClient::new(&config.detection)),
            classes,
            annotator,
            storage.clone(),
        ),
        chat: ChatRelay::new(Arc::new(MistralClient::new(&config.llm)), lookup),
        audio: AudioStub::new(storage.clone(), config.audio_message.clone()),
        storage,
        public_base_url: config.public_base_url.clone(),
    });

    let app = router(state, config.body_limit_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
