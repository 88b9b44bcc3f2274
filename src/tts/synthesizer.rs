use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::assemble::Assembly;
use super::error::SynthesisError;
use super::model::SpeechModel;
use crate::config::{OutputFormat, TtsSettings};
use crate::dsp::{apply_timbre, shift_pitch};
use crate::signal::{match_rms_in_place, write_wav_pcm16};
use crate::text::{TextChunker, TextTokenizer, normalize_text};
use crate::voice::EmbeddingSource;

const CHUNK_RMS_EPS: f32 = 1e-8;

/// Joined waveform of one request, before it is written anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSpeech {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Chunks the text was split into.
    pub chunks: usize,
    /// Chunks that produced audio.
    pub voiced_chunks: usize,
    /// Whether pitch and timbre shaping ran.
    pub post_processed: bool,
}

impl RenderedSpeech {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate.max(1) as f64)
    }
}

/// What a finished synthesis request produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisReport {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub chunks: usize,
    pub embedding_source: EmbeddingSource,
    pub duration: Duration,
}

/// Chunked long-text synthesis with a shared speaker embedding.
pub struct SpeechSynthesizer {
    settings: TtsSettings,
    model: Arc<dyn SpeechModel>,
    tokenizer: Arc<dyn TextTokenizer>,
}

impl SpeechSynthesizer {
    pub fn new(
        settings: TtsSettings,
        model: Arc<dyn SpeechModel>,
        tokenizer: Arc<dyn TextTokenizer>,
    ) -> Self {
        Self {
            settings,
            model,
            tokenizer,
        }
    }

    pub fn model(&self) -> &dyn SpeechModel {
        self.model.as_ref()
    }

    /// Token ceiling per model call: the configured hard limit, capped by the model.
    fn token_ceiling(&self) -> usize {
        self.settings
            .hard_token_limit
            .min(self.model.max_input_tokens())
            .max(1)
    }

    /// Chunk, generate, normalize, join and shape `text` in memory.
    pub fn render(&self, text: &str, speaker: &[f32]) -> Result<RenderedSpeech, SynthesisError> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        let chunker = TextChunker::new(self.settings.max_chunk_tokens);
        let chunks = chunker.chunk(&normalized, self.tokenizer.as_ref());
        let ceiling = self.token_ceiling();
        let sample_rate = self.model.sample_rate();
        info!(
            "Synthesizing {} chunk(s) with {} at {sample_rate} Hz",
            chunks.len(),
            self.model.name()
        );

        let text_chars: usize = chunks.iter().map(|chunk| chunk.text.chars().count()).sum();
        let mut voiced = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let mut ids = self.tokenizer.encode(&chunk.text);
            if ids.len() > ceiling {
                warn!(
                    "Chunk {index} has {} tokens; truncating to {ceiling}",
                    ids.len()
                );
                ids.truncate(ceiling);
            }
            if ids.is_empty() {
                debug!("Skipping empty chunk {index}");
                continue;
            }
            match self.model.generate(&ids, speaker) {
                Ok(mut audio) if !audio.is_empty() => {
                    match_rms_in_place(&mut audio, self.settings.chunk_target_rms, CHUNK_RMS_EPS);
                    voiced.push(audio);
                }
                Ok(_) => warn!("Chunk {index} produced no samples"),
                Err(err) => warn!("Chunk {index} failed: {err}"),
            }
        }
        if voiced.is_empty() {
            return Err(SynthesisError::NoAudio {
                chunks: chunks.len(),
            });
        }

        let voiced_chunks = voiced.len();
        let mut samples = Assembly::from_settings(&self.settings).join(voiced, sample_rate);
        let post_processed = text_chars <= self.settings.long_form_chars;
        if post_processed {
            samples = self.shape(samples, sample_rate);
        } else {
            debug!("Long-form text ({text_chars} chars); skipping pitch and timbre");
        }
        Ok(RenderedSpeech {
            samples,
            sample_rate,
            chunks: chunks.len(),
            voiced_chunks,
            post_processed,
        })
    }

    fn shape(&self, samples: Vec<f32>, sample_rate: u32) -> Vec<f32> {
        let semitones = self.settings.pitch_shift_semitones;
        let mut samples = if semitones != 0.0 {
            shift_pitch(&samples, sample_rate, semitones)
        } else {
            samples
        };
        if self.settings.timbre.enabled {
            apply_timbre(&mut samples, sample_rate, &self.settings.timbre);
        }
        samples
    }

    /// Render `text` and write it to a fresh `<uuid>.wav` under `output_dir`.
    pub fn synthesize_to(
        &self,
        text: &str,
        speaker: &[f32],
        embedding_source: EmbeddingSource,
        output_dir: &Path,
    ) -> Result<SynthesisReport, SynthesisError> {
        if !self.settings.enabled {
            return Err(SynthesisError::Disabled);
        }
        let rendered = self.render(text, speaker)?;
        std::fs::create_dir_all(output_dir).map_err(|source| SynthesisError::CreateDir {
            path: output_dir.to_path_buf(),
            source,
        })?;
        if self.settings.output_format == OutputFormat::Mp3 {
            warn!("MP3 output is not available; writing WAV instead");
        }
        let path = output_dir.join(format!("{}.wav", Uuid::new_v4().simple()));
        write_wav_pcm16(&path, &rendered.samples, rendered.sample_rate).map_err(|message| {
            SynthesisError::Write {
                path: path.clone(),
                message,
            }
        })?;
        let duration = rendered.duration();
        info!(
            "Wrote {} ({:.2}s, {} chunk(s))",
            path.display(),
            duration.as_secs_f32(),
            rendered.chunks
        );
        Ok(SynthesisReport {
            path,
            sample_rate: rendered.sample_rate,
            chunks: rendered.chunks,
            embedding_source,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::CharTokenizer;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Emits one sample per token, failing on ids listed in `fail_on`.
    struct EchoModel {
        calls: Mutex<Vec<usize>>,
        fail_on: Option<u32>,
    }

    impl EchoModel {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }
    }

    impl SpeechModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        fn sample_rate(&self) -> u32 {
            16_000
        }

        fn max_input_tokens(&self) -> usize {
            50
        }

        fn generate(&self, token_ids: &[u32], _speaker: &[f32]) -> Result<Vec<f32>, String> {
            self.calls.lock().unwrap().push(token_ids.len());
            if self.fail_on.is_some_and(|id| token_ids.contains(&id)) {
                return Err("boom".into());
            }
            Ok((0..token_ids.len() * 100)
                .map(|i| (i as f32 * 0.1).sin() * 0.3)
                .collect())
        }
    }

    fn plain_settings(max_chunk_tokens: usize) -> TtsSettings {
        let mut settings = TtsSettings::default();
        settings.max_chunk_tokens = max_chunk_tokens;
        settings.pitch_shift_semitones = 0.0;
        settings.timbre.enabled = false;
        settings
    }

    fn synth(settings: TtsSettings, model: Arc<EchoModel>) -> SpeechSynthesizer {
        SpeechSynthesizer::new(settings, model, Arc::new(CharTokenizer))
    }

    #[test]
    fn chunks_join_with_pauses() {
        let model = Arc::new(EchoModel::new());
        let synth = synth(plain_settings(20), model.clone());
        let rendered = synth.render("First one here. Second one here.", &[]).unwrap();
        let calls = model.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![15, 16]);
        let gap = Assembly::from_settings(&plain_settings(20)).gap_samples(16_000);
        assert_eq!(rendered.samples.len(), (15 + 16) * 100 + gap);
        assert_eq!(rendered.chunks, 2);
        assert!(rendered.post_processed);
    }

    #[test]
    fn chunks_are_truncated_to_model_ceiling() {
        let model = Arc::new(EchoModel::new());
        let synth = synth(plain_settings(280), model.clone());
        synth.render(&"a".repeat(120), &[]).unwrap();
        assert_eq!(model.calls.lock().unwrap().clone(), vec![50]);
    }

    #[test]
    fn failed_chunks_are_skipped() {
        let model = Arc::new(EchoModel {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(u32::from('x')),
        });
        let synth = synth(plain_settings(10), model.clone());
        let rendered = synth.render("Fine. Also xx.", &[]).unwrap();
        assert_eq!(rendered.chunks, 2);
        assert_eq!(rendered.voiced_chunks, 1);
        assert_eq!(rendered.samples.len(), 500);
    }

    #[test]
    fn all_chunks_failing_is_no_audio() {
        let model = Arc::new(EchoModel {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(u32::from('.')),
        });
        let synth = synth(plain_settings(280), model);
        let err = synth.render("Nothing works", &[]).unwrap_err();
        assert!(matches!(err, SynthesisError::NoAudio { chunks: 1 }));
    }

    #[test]
    fn blank_text_is_rejected() {
        let synth = synth(plain_settings(280), Arc::new(EchoModel::new()));
        assert!(matches!(
            synth.render("  \n ", &[]),
            Err(SynthesisError::EmptyText)
        ));
    }

    #[test]
    fn long_form_skips_shaping() {
        let mut settings = plain_settings(40);
        settings.long_form_chars = 30;
        settings.pitch_shift_semitones = -1.0;
        let synth = synth(settings, Arc::new(EchoModel::new()));
        let rendered = synth
            .render("This sentence is long enough. So is this one here.", &[])
            .unwrap();
        assert!(!rendered.post_processed);
    }

    #[test]
    fn long_form_counts_chunks_that_failed() {
        let model = Arc::new(EchoModel {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(u32::from('x')),
        });
        let mut settings = plain_settings(40);
        settings.long_form_chars = 30;
        settings.pitch_shift_semitones = -1.0;
        let synth = synth(settings, model);
        let text = format!("Short ok. {}.", "x".repeat(39));
        let rendered = synth.render(&text, &[]).unwrap();
        assert_eq!(rendered.chunks, 2);
        assert_eq!(rendered.voiced_chunks, 1);
        assert!(!rendered.post_processed);
    }

    #[test]
    fn writes_uuid_named_wav() {
        let dir = tempdir().unwrap();
        let synth = synth(plain_settings(280), Arc::new(EchoModel::new()));
        let report = synth
            .synthesize_to("Hello there.", &[], EmbeddingSource::Computed, dir.path())
            .unwrap();
        assert_eq!(report.path.extension().unwrap(), "wav");
        assert_eq!(report.path.file_stem().unwrap().len(), 32);
        assert_eq!(report.sample_rate, 16_000);
        let reader = hound::WavReader::open(&report.path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.len(), 1_200);
    }

    #[test]
    fn disabled_synthesis_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut settings = plain_settings(280);
        settings.enabled = false;
        let synth = synth(settings, Arc::new(EchoModel::new()));
        let err = synth
            .synthesize_to("Hello.", &[], EmbeddingSource::Computed, dir.path())
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Disabled));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
