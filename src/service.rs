//! Process-wide voice service tying configuration, the embedding cache, the
//! speech model and the emotion engine together.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::app_dirs;
use crate::config::{self, VoiceConfig};
use crate::ser::{EmotionOutcome, SerInferenceEngine};
use crate::text::{CharTokenizer, TextTokenizer, normalize_text};
use crate::tts::{CommandSpeechModel, SpeechModel, SpeechSynthesizer, SynthesisError, SynthesisReport};
use crate::voice::{
    EmbeddingCache, EmbeddingOutcome, FallbackPolicy, ReferenceAudioSet, ReferenceResolver,
    SpeakerEmbeddingExtractor, SpeakerEncoder, VoiceError, VoiceSelection, select_encoder,
};

static GLOBAL: OnceLock<VoiceService> = OnceLock::new();

/// Directories the service reads from or writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePaths {
    pub embedding_cache: Option<PathBuf>,
    pub voice_refs: Option<PathBuf>,
    pub ser_model: Option<PathBuf>,
}

impl ServicePaths {
    /// Configured directories, with gaps filled from the app root.
    pub fn resolve(config: &VoiceConfig) -> Self {
        let from_app = |label: &str, dir: Result<PathBuf, app_dirs::AppDirError>| match dir {
            Ok(dir) => Some(dir),
            Err(err) => {
                warn!("No default {label} directory: {err}");
                None
            }
        };
        Self {
            embedding_cache: config
                .voice
                .cache_dir
                .clone()
                .or_else(|| from_app("embedding cache", app_dirs::embedding_cache_dir())),
            voice_refs: config
                .voice
                .refs_root
                .clone()
                .or_else(|| from_app("voice reference", app_dirs::voice_refs_dir())),
            ser_model: config
                .ser
                .model_dir
                .clone()
                .or_else(|| from_app("emotion model", app_dirs::ser_model_dir())),
        }
    }
}

/// Voice pipeline and emotion detection behind one object.
///
/// The speaker encoder is chosen at construction; the speech model and the
/// emotion model are built on first use and shared afterwards.
pub struct VoiceService {
    config: VoiceConfig,
    tokenizer: Arc<dyn TextTokenizer>,
    encoder: Result<Arc<dyn SpeakerEncoder>, String>,
    extractor: SpeakerEmbeddingExtractor,
    cache: EmbeddingCache,
    resolver: ReferenceResolver,
    synthesizer: OnceLock<Result<Arc<SpeechSynthesizer>, String>>,
    emotion: SerInferenceEngine,
}

impl VoiceService {
    pub fn new(config: VoiceConfig) -> Self {
        let paths = ServicePaths::resolve(&config);
        Self::with_paths(config, paths)
    }

    pub fn with_paths(config: VoiceConfig, paths: ServicePaths) -> Self {
        let encoder = select_encoder(&config.voice).map_err(|err| {
            error!("Speaker embeddings unavailable: {err}");
            err.to_string()
        });
        let resolver = ReferenceResolver {
            ref_wavs: config.voice.ref_wavs.clone(),
            ref_dir: config.voice.ref_dir.clone(),
            refs_root: paths.voice_refs,
            default_voice: config.tts.default_voice.clone(),
        };
        Self {
            tokenizer: Arc::new(CharTokenizer),
            encoder,
            extractor: SpeakerEmbeddingExtractor::from_settings(&config.voice),
            cache: EmbeddingCache::new(paths.embedding_cache, config.voice.memory_cache_entries),
            resolver,
            synthesizer: OnceLock::new(),
            emotion: SerInferenceEngine::new(
                paths.ser_model,
                &config.ser.adapter_subdir,
                config.ser.load_timeout(),
            ),
            config,
        }
    }

    /// Use `model` instead of the configured synthesis command.
    pub fn with_speech_model(mut self, model: Arc<dyn SpeechModel>) -> Self {
        let synthesizer =
            SpeechSynthesizer::new(self.config.tts.clone(), model, Arc::clone(&self.tokenizer));
        self.synthesizer = OnceLock::from(Ok(Arc::new(synthesizer)));
        self
    }

    /// Shared instance built from the on-disk config and the environment.
    pub fn global() -> &'static VoiceService {
        GLOBAL.get_or_init(|| {
            let config = config::load().unwrap_or_else(|err| {
                warn!("Using default voice configuration: {err}");
                VoiceConfig::default().normalized()
            });
            VoiceService::new(config)
        })
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    pub fn embedding_cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn emotion_engine(&self) -> &SerInferenceEngine {
        &self.emotion
    }

    /// Reference files that `voice` currently resolves to.
    pub fn reference_files(&self, voice: &VoiceSelection) -> Vec<PathBuf> {
        self.resolver.resolve(voice)
    }

    /// Speaker embedding for `voice`, served from the cache when possible.
    ///
    /// Real embeddings are only insisted on when reference audio exists.
    pub fn speaker_embedding(&self, voice: &VoiceSelection) -> Result<EmbeddingOutcome, VoiceError> {
        let encoder = self
            .encoder
            .as_ref()
            .map_err(|reason| VoiceError::NoEncoder {
                reason: reason.clone(),
            })?;
        let references = ReferenceAudioSet::new(self.resolver.resolve(voice));
        let settings = &self.config.voice;
        let policy = FallbackPolicy {
            require_real: settings.require_real_embedding && !references.is_empty(),
            allow_random: settings.allow_random_fallback,
            seed: settings.random_seed,
        };
        self.cache
            .get_or_compute(&references, encoder.as_ref(), &self.extractor, policy)
    }

    /// Precompute the embedding for `voice` so the first request does not pay for it.
    pub fn warm_embedding_cache(
        &self,
        voice: &VoiceSelection,
    ) -> Result<EmbeddingOutcome, VoiceError> {
        let outcome = self.speaker_embedding(voice)?;
        info!("Speaker embedding cache warmed ({:?})", outcome.source);
        Ok(outcome)
    }

    fn synthesizer(&self) -> Result<Arc<SpeechSynthesizer>, SynthesisError> {
        self.synthesizer
            .get_or_init(|| {
                let settings = &self.config.tts.model;
                let model = CommandSpeechModel::from_settings(settings, Arc::clone(&self.tokenizer))
                    .ok_or_else(|| "no synthesis command configured".to_string())?;
                if let Some(command) = settings.command.as_deref() {
                    info!("Speech model command: {}", command.display());
                }
                Ok(Arc::new(SpeechSynthesizer::new(
                    self.config.tts.clone(),
                    Arc::new(model),
                    Arc::clone(&self.tokenizer),
                )))
            })
            .clone()
            .map_err(SynthesisError::Model)
    }

    /// Synthesize `text` into a new WAV file under `output_dir`.
    pub fn try_synthesize(
        &self,
        text: &str,
        output_dir: &Path,
        voice: &VoiceSelection,
    ) -> Result<SynthesisReport, SynthesisError> {
        if !self.config.tts.enabled {
            return Err(SynthesisError::Disabled);
        }
        if normalize_text(text).is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        let synthesizer = self.synthesizer()?;
        let speaker = self.speaker_embedding(voice)?;
        synthesizer.synthesize_to(text, &speaker.embedding, speaker.source, output_dir)
    }

    /// [`Self::try_synthesize`] with errors logged; `None` when nothing was written.
    pub fn synthesize(&self, text: &str, output_dir: &Path, voice: &VoiceSelection) -> Option<PathBuf> {
        match self.try_synthesize(text, output_dir, voice) {
            Ok(report) => Some(report.path),
            Err(err @ (SynthesisError::Disabled | SynthesisError::EmptyText)) => {
                debug!("Skipping synthesis: {err}");
                None
            }
            Err(err) => {
                error!("Speech synthesis failed: {err}");
                None
            }
        }
    }

    /// Emotion distribution for `audio_path`; `None` uses the configured budget.
    pub fn detect_emotion(&self, audio_path: &Path, timeout: Option<Duration>) -> EmotionOutcome {
        let timeout = timeout.unwrap_or_else(|| self.config.ser.timeout());
        self.emotion.detect(audio_path, timeout)
    }
}
