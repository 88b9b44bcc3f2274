use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::adapter::attach_optional;
use super::error::{LoadPhase, SerError};
use super::features::{FeatureExtractorConfig, LogMelFeatures};
use super::labels::EmotionDistribution;
use super::model::{ClassificationHead, ENCODER_FILE, EmotionModel, FrameEncoder};
use crate::config::EmotionSettings;
use crate::signal::{decode_mono, resample_linear};

/// Cumulative share of the load budget available after each phase.
const ENCODER_BUDGET_SHARE: f64 = 0.6;
const ADAPTER_BUDGET_SHARE: f64 = 0.8;
const PROCESSOR_BUDGET_SHARE: f64 = 1.0;

/// Result of one detection request.
#[derive(Debug, Clone, PartialEq)]
pub enum EmotionOutcome {
    Inferred(EmotionDistribution),
    /// Uniform distribution returned because detection could not complete.
    Fallback {
        distribution: EmotionDistribution,
        reason: String,
    },
}

impl EmotionOutcome {
    fn fallback(reason: impl Into<String>) -> Self {
        Self::Fallback {
            distribution: EmotionDistribution::uniform(),
            reason: reason.into(),
        }
    }

    pub fn distribution(&self) -> &EmotionDistribution {
        match self {
            Self::Inferred(distribution) | Self::Fallback { distribution, .. } => distribution,
        }
    }

    pub fn into_distribution(self) -> EmotionDistribution {
        match self {
            Self::Inferred(distribution) | Self::Fallback { distribution, .. } => distribution,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

enum LoadState {
    Unloaded,
    Loading,
    Ready(Arc<EmotionModel>),
    Failed(SerError),
}

/// Lazily loaded speech emotion classifier shared by all callers.
///
/// The first caller loads the model while concurrent callers wait; a failed
/// load is remembered and never retried.
pub struct SerInferenceEngine {
    model_dir: Option<PathBuf>,
    adapter_subdir: String,
    load_budget: Duration,
    state: Mutex<LoadState>,
    ready: Condvar,
}

impl SerInferenceEngine {
    pub fn new(model_dir: Option<PathBuf>, adapter_subdir: &str, load_budget: Duration) -> Self {
        Self {
            model_dir,
            adapter_subdir: adapter_subdir.to_string(),
            load_budget,
            state: Mutex::new(LoadState::Unloaded),
            ready: Condvar::new(),
        }
    }

    /// `model_dir` overrides the configured directory when the settings leave it unset.
    pub fn from_settings(settings: &EmotionSettings, default_dir: Option<PathBuf>) -> Self {
        Self::new(
            settings.model_dir.clone().or(default_dir),
            &settings.adapter_subdir,
            settings.load_timeout(),
        )
    }

    pub fn model_dir(&self) -> Option<&Path> {
        self.model_dir.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(|err| err.into_inner()),
            LoadState::Ready(_)
        )
    }

    /// The loaded model, loading it on first use.
    pub fn model(&self) -> Result<Arc<EmotionModel>, SerError> {
        let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
        loop {
            match &*state {
                LoadState::Ready(model) => return Ok(Arc::clone(model)),
                LoadState::Failed(err) => return Err(err.clone()),
                LoadState::Loading => {}
                LoadState::Unloaded => break,
            }
            state = self.ready.wait(state).unwrap_or_else(|err| err.into_inner());
        }
        *state = LoadState::Loading;
        drop(state);

        let mut guard = LoadingGuard { engine: self, done: false };
        let result = self.load().map(Arc::new);
        guard.done = true;

        let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());
        *state = match &result {
            Ok(model) => LoadState::Ready(Arc::clone(model)),
            Err(err) => LoadState::Failed(err.clone()),
        };
        self.ready.notify_all();
        result
    }

    fn load(&self) -> Result<EmotionModel, SerError> {
        let Some(dir) = self.model_dir.as_deref() else {
            return Err(SerError::Load {
                path: PathBuf::new(),
                message: "no emotion model directory configured".to_string(),
            });
        };
        let load_err = |message: String| SerError::Load {
            path: dir.to_path_buf(),
            message,
        };
        let started = Instant::now();
        info!("Loading emotion model from {}", dir.display());

        let mut encoder = FrameEncoder::load(&dir.join(ENCODER_FILE)).map_err(load_err)?;
        self.check_budget(started, ENCODER_BUDGET_SHARE, LoadPhase::Encoder)?;

        let mut head = ClassificationHead::zeros(encoder.d_model());
        attach_optional(&dir.join(&self.adapter_subdir), &mut encoder, &mut head);
        self.check_budget(started, ADAPTER_BUDGET_SHARE, LoadPhase::Adapter)?;

        let features = FeatureExtractorConfig::load_from_dir(dir)
            .and_then(LogMelFeatures::new)
            .map_err(load_err)?;
        self.check_budget(started, PROCESSOR_BUDGET_SHARE, LoadPhase::Processor)?;

        let model = EmotionModel::new(encoder, head, features).map_err(load_err)?;
        info!(
            "Emotion model ready in {:.2}s",
            started.elapsed().as_secs_f32()
        );
        Ok(model)
    }

    fn check_budget(&self, started: Instant, share: f64, phase: LoadPhase) -> Result<(), SerError> {
        if started.elapsed() > self.load_budget.mul_f64(share) {
            return Err(SerError::LoadTimeout { phase });
        }
        Ok(())
    }

    /// Emotion distribution for the audio at `path`, uniform on any failure.
    pub fn detect(&self, path: &Path, timeout: Duration) -> EmotionOutcome {
        if timeout.is_zero() {
            debug!("Zero emotion budget; returning uniform distribution");
            return EmotionOutcome::fallback("zero timeout");
        }
        match self.try_detect(path, timeout) {
            Ok(distribution) => EmotionOutcome::Inferred(distribution),
            Err(err) => {
                warn!("Emotion detection fell back to uniform: {err}");
                EmotionOutcome::fallback(err.to_string())
            }
        }
    }

    /// Like [`Self::detect`] but reports why detection failed.
    pub fn try_detect(
        &self,
        path: &Path,
        timeout: Duration,
    ) -> Result<EmotionDistribution, SerError> {
        let model = self.model()?;
        classify(model.as_ref(), path, timeout)
    }
}

/// Anything that turns mono samples at its own rate into label probabilities.
pub trait EmotionClassifier {
    fn sampling_rate(&self) -> u32;
    fn predict(&self, samples: &[f32]) -> Result<Vec<f32>, String>;
}

impl EmotionClassifier for EmotionModel {
    fn sampling_rate(&self) -> u32 {
        EmotionModel::sampling_rate(self)
    }

    fn predict(&self, samples: &[f32]) -> Result<Vec<f32>, String> {
        EmotionModel::predict(self, samples)
    }
}

/// Decode `path` and classify it.
///
/// Reading and inference each get the full `timeout`; the budget is checked after
/// each phase, never inside the forward pass.
pub fn classify(
    model: &dyn EmotionClassifier,
    path: &Path,
    timeout: Duration,
) -> Result<EmotionDistribution, SerError> {
    let read_started = Instant::now();
    let audio = decode_mono(path).map_err(|message| SerError::Decode {
        path: path.to_path_buf(),
        message,
    })?;
    if audio.samples.is_empty() {
        return Err(SerError::Decode {
            path: path.to_path_buf(),
            message: "no audio samples".to_string(),
        });
    }
    let samples = resample_linear(&audio.samples, audio.sample_rate, model.sampling_rate());
    if read_started.elapsed() > timeout {
        return Err(SerError::Timeout { phase: "read" });
    }
    let inference_started = Instant::now();
    let probabilities = model.predict(&samples).map_err(SerError::Inference)?;
    if inference_started.elapsed() > timeout {
        return Err(SerError::Timeout { phase: "inference" });
    }
    EmotionDistribution::from_probabilities(&probabilities).map_err(SerError::Inference)
}

/// Marks the load as failed if the loading thread unwinds, so waiters wake up.
struct LoadingGuard<'a> {
    engine: &'a SerInferenceEngine,
    done: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut state = self
            .engine
            .state
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        *state = LoadState::Failed(SerError::Load {
            path: self.engine.model_dir.clone().unwrap_or_default(),
            message: "model loading panicked".to_string(),
        });
        self.engine.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::EmotionLabel;
    use tempfile::tempdir;

    #[test]
    fn zero_timeout_is_uniform_without_loading() {
        let engine = SerInferenceEngine::new(None, "adapter", Duration::from_secs(5));
        let outcome = engine.detect(Path::new("/nowhere.wav"), Duration::ZERO);
        assert!(outcome.is_fallback());
        assert_eq!(*outcome.distribution(), EmotionDistribution::uniform());
        assert!(!engine.is_ready());
    }

    #[test]
    fn missing_model_fails_once_and_stays_failed() {
        let dir = tempdir().unwrap();
        let engine = SerInferenceEngine::new(
            Some(dir.path().to_path_buf()),
            "adapter",
            Duration::from_secs(5),
        );
        assert!(matches!(engine.model(), Err(SerError::Load { .. })));
        std::fs::write(
            dir.path().join(ENCODER_FILE),
            r#"{"d_model": 2, "n_mels": 80, "weights": [], "bias": [0, 0]}"#,
        )
        .unwrap();
        assert!(matches!(engine.model(), Err(SerError::Load { .. })));
    }

    #[test]
    fn zero_load_budget_times_out_in_encoder_phase() {
        let dir = tempdir().unwrap();
        let weights = serde_json::json!({
            "d_model": 2,
            "n_mels": 80,
            "weights": vec![0.0; 160],
            "bias": [0.0, 0.0],
        });
        std::fs::write(dir.path().join(ENCODER_FILE), weights.to_string()).unwrap();
        let engine = SerInferenceEngine::new(Some(dir.path().to_path_buf()), "adapter", Duration::ZERO);
        assert!(matches!(
            engine.model(),
            Err(SerError::LoadTimeout {
                phase: LoadPhase::Encoder
            })
        ));
    }

    #[test]
    fn concurrent_callers_share_one_load() {
        let dir = tempdir().unwrap();
        let weights = serde_json::json!({
            "d_model": 2,
            "n_mels": 80,
            "weights": vec![0.0; 160],
            "bias": [0.0, 0.0],
        });
        std::fs::write(dir.path().join(ENCODER_FILE), weights.to_string()).unwrap();
        let engine = Arc::new(SerInferenceEngine::new(
            Some(dir.path().to_path_buf()),
            "adapter",
            Duration::from_secs(30),
        ));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || engine.model().unwrap())
            })
            .collect();
        let models: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(models.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    /// Stand-in classifier that stalls in each phase and always answers sad.
    struct StallingClassifier {
        read_delay: Duration,
        infer_delay: Duration,
    }

    impl EmotionClassifier for StallingClassifier {
        fn sampling_rate(&self) -> u32 {
            std::thread::sleep(self.read_delay);
            16_000
        }

        fn predict(&self, _samples: &[f32]) -> Result<Vec<f32>, String> {
            std::thread::sleep(self.infer_delay);
            let mut probabilities = vec![0.0; 8];
            probabilities[EmotionLabel::Sad.index()] = 1.0;
            Ok(probabilities)
        }
    }

    fn short_clip(dir: &Path) -> PathBuf {
        let path = dir.join("clip.wav");
        let samples: Vec<f32> = (0..8_000).map(|i| (i as f32 * 0.05).sin() * 0.3).collect();
        crate::signal::write_wav_pcm16(&path, &samples, 16_000).unwrap();
        path
    }

    #[test]
    fn slow_inference_times_out() {
        let dir = tempdir().unwrap();
        let clip = short_clip(dir.path());
        let model = StallingClassifier {
            read_delay: Duration::ZERO,
            infer_delay: Duration::from_millis(200),
        };
        let err = classify(&model, &clip, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, SerError::Timeout { phase: "inference" }));
    }

    #[test]
    fn read_and_inference_have_separate_budgets() {
        let dir = tempdir().unwrap();
        let clip = short_clip(dir.path());
        let model = StallingClassifier {
            read_delay: Duration::from_millis(150),
            infer_delay: Duration::from_millis(150),
        };
        let distribution = classify(&model, &clip, Duration::from_millis(250)).unwrap();
        assert!(distribution.total() > 99.0);
        assert_eq!(distribution.dominant(), EmotionLabel::Sad);
    }
}
