/// Scale to unit length; all-zero or non-finite vectors are returned unchanged.
pub fn l2_normalize(values: &mut [f32]) {
    let norm = l2_norm(values);
    if norm.is_finite() && norm > f32::EPSILON {
        for value in values.iter_mut() {
            *value /= norm;
        }
    }
}

pub fn l2_norm(values: &[f32]) -> f32 {
    values
        .iter()
        .map(|&v| (v as f64) * (v as f64))
        .sum::<f64>()
        .sqrt() as f32
}

/// Element-wise mean of equally sized vectors; `None` for empty input or ragged lengths.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dim = vectors.first()?.len();
    if vectors.iter().any(|v| v.len() != dim) {
        return None;
    }
    let mut sum = vec![0.0_f64; dim];
    for vector in vectors {
        for (acc, &value) in sum.iter_mut().zip(vector) {
            *acc += value as f64;
        }
    }
    let count = vectors.len() as f64;
    Some(sum.into_iter().map(|v| (v / count) as f32).collect())
}

pub fn encode_f32_le_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_f32_le_blob(blob: &[u8]) -> Result<Vec<f32>, String> {
    if blob.len() % 4 != 0 {
        return Err(format!("blob length {} is not a multiple of 4", blob.len()));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Summary logged whenever a speaker embedding is produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbeddingStats {
    pub mean: f32,
    pub std: f32,
    pub norm: f32,
}

impl EmbeddingStats {
    pub fn of(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std: 0.0,
                norm: 0.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0).max(1.0);
        Self {
            mean: mean as f32,
            std: var.sqrt() as f32,
            norm: l2_norm(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip_and_length_check() {
        let values = vec![1.5_f32, -0.25, f32::MIN_POSITIVE];
        assert_eq!(decode_f32_le_blob(&encode_f32_le_blob(&values)).unwrap(), values);
        assert!(decode_f32_le_blob(&[0, 1, 2]).is_err());
    }

    #[test]
    fn mean_then_normalize_gives_unit_vector() {
        let mut mean = mean_vector(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(mean, vec![0.5, 0.5]);
        l2_normalize(&mut mean);
        assert!((l2_norm(&mean) - 1.0).abs() < 1e-6);
        assert!(mean_vector(&[vec![1.0], vec![1.0, 2.0]]).is_none());
    }
}
