mod engine;
mod whisper_cli;
mod whisper_native;

pub use engine::*;
pub use whisper_cli::WhisperCliEngine;
pub use whisper_native::WhisperNativeEngine;

use std::sync::Arc;

use crate::config::TranscriberConfig;

/// Priority-ordered set of registered engines.
///
/// Registration is static configuration; ordering is ascending priority with
/// ties broken by registration order. An empty registry is valid and simply
/// yields no candidates.
pub struct EngineRegistry {
    engines: Vec<Arc<dyn TranscriptionEngine>>,
}

impl EngineRegistry {
    pub fn new(mut engines: Vec<Arc<dyn TranscriptionEngine>>) -> Self {
        // Stable sort preserves registration order between equal priorities.
        engines.sort_by_key(|e| e.descriptor().priority);
        Self { engines }
    }

    /// Build the production engines out of persisted configuration.
    pub fn from_config(config: &TranscriberConfig) -> Self {
        let engines = config
            .engines
            .iter()
            .map(|engine_config| -> Arc<dyn TranscriptionEngine> {
                match engine_config.kind {
                    EngineKind::ExternalProcess => Arc::new(WhisperCliEngine::from_config(
                        engine_config,
                        &config.transcripts_dir,
                    )),
                    EngineKind::InProcessModel => {
                        Arc::new(WhisperNativeEngine::from_config(engine_config))
                    }
                }
            })
            .collect();
        Self::new(engines)
    }

    pub fn engines(&self) -> &[Arc<dyn TranscriptionEngine>] {
        &self.engines
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn TranscriptionEngine>> {
        self.engines
            .iter()
            .find(|e| e.descriptor().id == id)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Probe every engine, in priority order.
    pub async fn probe_all(&self) -> Vec<EngineAvailability> {
        let mut availabilities = Vec::with_capacity(self.engines.len());
        for engine in &self.engines {
            availabilities.push(engine.probe().await);
        }
        availabilities
    }
}
