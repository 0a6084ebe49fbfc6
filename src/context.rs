//! Shared engine context.
//!
//! [`EngineContext`] is the one object that owns the store lifecycle
//! manager and the generation capability. It is constructed once at
//! startup from the loaded config and passed (shared behind `Arc`) to
//! every ingestion and query operation. Nothing is rebuilt per request;
//! the only structural invalidation is an explicit
//! [`StoreLifecycle::reset`].

use anyhow::Result;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generate::{create_generator, Generator};
use crate::lifecycle::StoreLifecycle;
use crate::store::memory::MemoryStoreFactory;
use crate::store::sqlite::SqliteStoreFactory;
use crate::store::StoreFactory;

pub struct EngineContext {
    pub config: Config,
    pub lifecycle: StoreLifecycle,
    pub generator: Box<dyn Generator>,
}

impl EngineContext {
    /// Build the context from a loaded config: embedder, store factory,
    /// initial generation, generator.
    pub async fn from_config(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;

        let factory: Box<dyn StoreFactory> = match config.store.backend.as_str() {
            "memory" => Box::new(MemoryStoreFactory::new(embedder)),
            _ => Box::new(SqliteStoreFactory::new(
                config.store.path.clone(),
                embedder,
                config.embedding.batch_size,
            )),
        };

        let lifecycle = StoreLifecycle::open(factory).await?;
        let generator = create_generator(&config.generation)?;

        Ok(Self {
            config,
            lifecycle,
            generator,
        })
    }
}
