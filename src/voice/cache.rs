use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::encoder::{SpeakerEncoder, seeded_gaussian};
use super::error::VoiceError;
use super::extract::SpeakerEmbeddingExtractor;
use super::signature::{ReferenceAudioSet, cache_key};
use super::vector::{
    EmbeddingStats, decode_f32_le_blob, encode_f32_le_blob, l2_normalize, mean_vector,
};

const DISK_EXTENSION: &str = "f32";

/// Where a returned speaker embedding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingSource {
    MemoryHit,
    DiskHit,
    Computed,
    /// Seeded random vector; never cached.
    RandomFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingOutcome {
    pub embedding: Vec<f32>,
    pub source: EmbeddingSource,
}

/// When a random vector may stand in for a real speaker embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    pub require_real: bool,
    pub allow_random: bool,
    pub seed: u64,
}

impl FallbackPolicy {
    fn permits_random(&self) -> bool {
        self.allow_random && !self.require_real
    }
}

/// Two-tier store of averaged speaker embeddings.
///
/// The memory tier is a bounded LRU; the disk tier holds one little-endian
/// `f32` blob per key and is never evicted.
pub struct EmbeddingCache {
    dir: Option<PathBuf>,
    memory: Mutex<MemoryTier>,
}

impl EmbeddingCache {
    pub fn new(dir: Option<PathBuf>, memory_entries: usize) -> Self {
        Self {
            dir,
            memory: Mutex::new(MemoryTier::new(memory_entries)),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn get_or_compute(
        &self,
        references: &ReferenceAudioSet,
        encoder: &dyn SpeakerEncoder,
        extractor: &SpeakerEmbeddingExtractor,
        policy: FallbackPolicy,
    ) -> Result<EmbeddingOutcome, VoiceError> {
        if references.is_empty() {
            return self.random_or(policy, encoder, VoiceError::NoReferenceAudio);
        }
        if !encoder.is_real() {
            return self.random_or(
                policy,
                encoder,
                VoiceError::NoEncoder {
                    reason: format!("{} ignores reference audio", encoder.name()),
                },
            );
        }
        let key = cache_key(&encoder.identity(), extractor.window(), &references.signature());

        if let Some(embedding) = self.memory_get(&key) {
            debug!("Speaker embedding memory hit {key}");
            return Ok(EmbeddingOutcome {
                embedding,
                source: EmbeddingSource::MemoryHit,
            });
        }
        if let Some(embedding) = self.disk_get(&key, encoder.dim()) {
            debug!("Speaker embedding disk hit {key}");
            self.memory_put(&key, &embedding);
            return Ok(EmbeddingOutcome {
                embedding,
                source: EmbeddingSource::DiskHit,
            });
        }

        let segments = match extractor.extract(references, encoder) {
            Ok(segments) => segments,
            Err(err) => return self.random_or(policy, encoder, err),
        };
        let Some(mut embedding) = mean_vector(&segments) else {
            return self.random_or(
                policy,
                encoder,
                VoiceError::Encoder {
                    encoder: encoder.name().to_string(),
                    message: "segment embeddings have inconsistent lengths".to_string(),
                },
            );
        };
        l2_normalize(&mut embedding);
        log_stats(encoder.name(), &embedding);
        info!(
            "Computed speaker embedding from {} segment(s) of {} file(s)",
            segments.len(),
            references.len()
        );
        self.memory_put(&key, &embedding);
        if let Err(err) = self.disk_put(&key, &embedding) {
            warn!("Failed to persist speaker embedding: {err}");
        }
        Ok(EmbeddingOutcome {
            embedding,
            source: EmbeddingSource::Computed,
        })
    }

    fn random_or(
        &self,
        policy: FallbackPolicy,
        encoder: &dyn SpeakerEncoder,
        err: VoiceError,
    ) -> Result<EmbeddingOutcome, VoiceError> {
        if !policy.permits_random() {
            return Err(err);
        }
        warn!("Using random speaker embedding (seed {}): {err}", policy.seed);
        let embedding = seeded_gaussian(policy.seed, encoder.dim());
        log_stats("random:seeded", &embedding);
        Ok(EmbeddingOutcome {
            embedding,
            source: EmbeddingSource::RandomFallback,
        })
    }

    fn memory_get(&self, key: &str) -> Option<Vec<f32>> {
        self.memory
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .get(key)
    }

    fn memory_put(&self, key: &str, embedding: &[f32]) {
        self.memory
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .insert(key.to_string(), embedding.to_vec());
    }

    fn disk_path(&self, key: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{key}.{DISK_EXTENSION}")))
    }

    /// Corrupt or wrong-length entries are reported and treated as misses.
    fn disk_get(&self, key: &str, dim: usize) -> Option<Vec<f32>> {
        let path = self.disk_path(key)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("Unreadable embedding cache entry {}: {err}", path.display());
                return None;
            }
        };
        match decode_f32_le_blob(&bytes) {
            Ok(values) if values.len() == dim && values.iter().all(|v| v.is_finite()) => {
                Some(values)
            }
            Ok(values) => {
                warn!(
                    "Ignoring embedding cache entry {} ({} values, expected {dim})",
                    path.display(),
                    values.len()
                );
                None
            }
            Err(err) => {
                warn!("Ignoring corrupt embedding cache entry {}: {err}", path.display());
                None
            }
        }
    }

    /// Whole-file write through a temp file in the cache dir, then rename.
    fn disk_put(&self, key: &str, embedding: &[f32]) -> Result<(), VoiceError> {
        let (Some(dir), Some(path)) = (self.dir.as_ref(), self.disk_path(key)) else {
            return Ok(());
        };
        let io_err = |source| VoiceError::CacheIo {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;
        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        file.write_all(&encode_f32_le_blob(embedding)).map_err(io_err)?;
        file.persist(&path).map_err(|err| io_err(err.error))?;
        Ok(())
    }
}

fn log_stats(encoder: &str, embedding: &[f32]) {
    let stats = EmbeddingStats::of(embedding);
    debug!(
        "Embedding encoder={encoder} mean={:.4} std={:.4} norm={:.3}",
        stats.mean, stats.std, stats.norm
    );
}

struct MemoryTier {
    entries: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
    max_entries: usize,
}

impl MemoryTier {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    fn get(&mut self, key: &str) -> Option<Vec<f32>> {
        let value = self.entries.get(key).cloned();
        if value.is_some() {
            self.touch(key);
        }
        value
    }

    fn insert(&mut self, key: String, value: Vec<f32>) {
        self.touch(&key);
        self.entries.insert(key, value);
        while self.order.len() > self.max_entries {
            if let Some(evicted) = self.order.pop_back() {
                self.entries.remove(&evicted);
            }
        }
    }

    fn touch(&mut self, key: &str) {
        self.order.retain(|existing| existing != key);
        self.order.push_front(key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingEncoder {
        calls: AtomicUsize,
    }

    impl SpeakerEncoder for CountingEncoder {
        fn name(&self) -> &str {
            "counting"
        }
        fn sample_rate(&self) -> u32 {
            16_000
        }
        fn dim(&self) -> usize {
            4
        }
        fn embed(&self, segment: &[f32]) -> Result<Vec<f32>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let level = segment.iter().map(|v| v.abs()).sum::<f32>() / segment.len() as f32;
            Ok(vec![level, 1.0, 0.5, 0.25])
        }
    }

    fn write_tone(path: &Path, seconds: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..(seconds * 16_000.0) as usize {
            let v = (i as f32 * 0.06).sin() * 0.3;
            writer.write_sample((v * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn strict() -> FallbackPolicy {
        FallbackPolicy {
            require_real: true,
            allow_random: true,
            seed: 0,
        }
    }

    #[test]
    fn tiers_are_consulted_in_order() {
        let dir = tempdir().unwrap();
        let wav = dir.path().join("ref.wav");
        write_tone(&wav, 3.0);
        let refs = ReferenceAudioSet::new([&wav]);
        let encoder = CountingEncoder {
            calls: AtomicUsize::new(0),
        };
        let extractor = SpeakerEmbeddingExtractor::default();
        let cache_dir = dir.path().join("cache");

        let cache = EmbeddingCache::new(Some(cache_dir.clone()), 4);
        let computed = cache.get_or_compute(&refs, &encoder, &extractor, strict()).unwrap();
        assert_eq!(computed.source, EmbeddingSource::Computed);
        let calls = encoder.calls.load(Ordering::SeqCst);
        assert!(calls > 0);

        let hit = cache.get_or_compute(&refs, &encoder, &extractor, strict()).unwrap();
        assert_eq!(hit.source, EmbeddingSource::MemoryHit);
        assert_eq!(hit.embedding, computed.embedding);

        let fresh = EmbeddingCache::new(Some(cache_dir.clone()), 4);
        let disk = fresh.get_or_compute(&refs, &encoder, &extractor, strict()).unwrap();
        assert_eq!(disk.source, EmbeddingSource::DiskHit);
        assert_eq!(disk.embedding, computed.embedding);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), calls);
        assert_eq!(std::fs::read_dir(&cache_dir).unwrap().count(), 1);
    }

    fn projection(scale: f32) -> crate::voice::ProjectionEncoder {
        crate::voice::ProjectionEncoder::from_weights(crate::voice::ProjectionWeights {
            input_dim: 80,
            output_dim: 4,
            weights: (0..320).map(|i| ((i % 5) as f32 - 2.0) * scale).collect(),
            bias: vec![0.0; 4],
        })
        .unwrap()
    }

    #[test]
    fn replaced_projection_weights_miss_the_cache() {
        let dir = tempdir().unwrap();
        let wav = dir.path().join("ref.wav");
        write_tone(&wav, 3.0);
        let refs = ReferenceAudioSet::new([&wav]);
        let extractor = SpeakerEmbeddingExtractor::default();
        let cache_dir = dir.path().join("cache");

        let cache = EmbeddingCache::new(Some(cache_dir.clone()), 4);
        let first = cache
            .get_or_compute(&refs, &projection(0.01), &extractor, strict())
            .unwrap();
        assert_eq!(first.source, EmbeddingSource::Computed);
        let same = cache
            .get_or_compute(&refs, &projection(0.01), &extractor, strict())
            .unwrap();
        assert_eq!(same.source, EmbeddingSource::MemoryHit);

        let replaced = cache
            .get_or_compute(&refs, &projection(0.02), &extractor, strict())
            .unwrap();
        assert_eq!(replaced.source, EmbeddingSource::Computed);
        assert_eq!(std::fs::read_dir(&cache_dir).unwrap().count(), 2);
    }

    #[test]
    fn corrupt_disk_entry_is_recomputed() {
        let dir = tempdir().unwrap();
        let wav = dir.path().join("ref.wav");
        write_tone(&wav, 3.0);
        let refs = ReferenceAudioSet::new([&wav]);
        let encoder = CountingEncoder {
            calls: AtomicUsize::new(0),
        };
        let extractor = SpeakerEmbeddingExtractor::default();
        let cache_dir = dir.path().join("cache");
        let key = cache_key("counting", extractor.window(), &refs.signature());
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::write(cache_dir.join(format!("{key}.f32")), [1_u8, 2, 3]).unwrap();

        let cache = EmbeddingCache::new(Some(cache_dir), 4);
        let outcome = cache.get_or_compute(&refs, &encoder, &extractor, strict()).unwrap();
        assert_eq!(outcome.source, EmbeddingSource::Computed);
    }

    #[test]
    fn empty_set_uses_random_only_when_permitted() {
        let cache = EmbeddingCache::new(None, 2);
        let encoder = CountingEncoder {
            calls: AtomicUsize::new(0),
        };
        let extractor = SpeakerEmbeddingExtractor::default();
        let empty = ReferenceAudioSet::default();
        assert!(matches!(
            cache.get_or_compute(&empty, &encoder, &extractor, strict()),
            Err(VoiceError::NoReferenceAudio)
        ));

        let relaxed = FallbackPolicy {
            require_real: false,
            allow_random: true,
            seed: 3,
        };
        let first = cache.get_or_compute(&empty, &encoder, &extractor, relaxed).unwrap();
        let second = cache.get_or_compute(&empty, &encoder, &extractor, relaxed).unwrap();
        assert_eq!(first.source, EmbeddingSource::RandomFallback);
        assert_eq!(second.source, EmbeddingSource::RandomFallback);
        assert_eq!(first.embedding, second.embedding);
        assert_eq!(first.embedding.len(), 4);
    }

    #[test]
    fn unreadable_references_fail_without_fallback() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.wav");
        std::fs::write(&broken, b"").unwrap();
        let cache = EmbeddingCache::new(None, 2);
        let encoder = CountingEncoder {
            calls: AtomicUsize::new(0),
        };
        let result = cache.get_or_compute(
            &ReferenceAudioSet::new([&broken]),
            &encoder,
            &SpeakerEmbeddingExtractor::default(),
            strict(),
        );
        assert!(matches!(
            result,
            Err(VoiceError::NoValidEmbeddings { files: 1 })
        ));
    }

    #[test]
    fn random_encoder_output_is_never_cached() {
        let dir = tempdir().unwrap();
        let wav = dir.path().join("ref.wav");
        write_tone(&wav, 3.0);
        let cache_dir = dir.path().join("cache");
        let cache = EmbeddingCache::new(Some(cache_dir.clone()), 2);
        let relaxed = FallbackPolicy {
            require_real: false,
            allow_random: true,
            seed: 9,
        };
        let outcome = cache
            .get_or_compute(
                &ReferenceAudioSet::new([&wav]),
                &crate::voice::RandomEncoder::new(9),
                &SpeakerEmbeddingExtractor::default(),
                relaxed,
            )
            .unwrap();
        assert_eq!(outcome.source, EmbeddingSource::RandomFallback);
        assert!(!cache_dir.exists());
    }

    #[test]
    fn memory_tier_evicts_least_recent() {
        let mut tier = MemoryTier::new(2);
        tier.insert("a".into(), vec![1.0]);
        tier.insert("b".into(), vec![2.0]);
        assert!(tier.get("a").is_some());
        tier.insert("c".into(), vec![3.0]);
        assert!(tier.get("b").is_none());
        assert!(tier.get("a").is_some());
        assert!(tier.get("c").is_some());
    }
}
