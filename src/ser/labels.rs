use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Emotions the classifier distinguishes, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmotionLabel {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgust,
    Surprised,
    Calm,
}

pub const LABEL_COUNT: usize = 8;

impl EmotionLabel {
    pub const ALL: [EmotionLabel; LABEL_COUNT] = [
        Self::Neutral,
        Self::Happy,
        Self::Sad,
        Self::Angry,
        Self::Fearful,
        Self::Disgust,
        Self::Surprised,
        Self::Calm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Fearful => "fearful",
            Self::Disgust => "disgust",
            Self::Surprised => "surprised",
            Self::Calm => "calm",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentages per label, one decimal each, summing to roughly 100.
///
/// Serializes as a JSON object with the labels in their fixed order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionDistribution {
    percentages: [f32; LABEL_COUNT],
}

impl EmotionDistribution {
    /// Every label at 12.5 %.
    pub fn uniform() -> Self {
        Self {
            percentages: [100.0 / LABEL_COUNT as f32; LABEL_COUNT],
        }
    }

    /// Build from softmax probabilities in label order.
    pub fn from_probabilities(probabilities: &[f32]) -> Result<Self, String> {
        if probabilities.len() != LABEL_COUNT {
            return Err(format!(
                "Expected {LABEL_COUNT} probabilities, got {}",
                probabilities.len()
            ));
        }
        if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err("Probabilities must be finite and non-negative".to_string());
        }
        let mut percentages = [0.0; LABEL_COUNT];
        for (slot, probability) in percentages.iter_mut().zip(probabilities) {
            *slot = round_one_decimal(probability * 100.0).clamp(0.0, 100.0);
        }
        Ok(Self { percentages })
    }

    pub fn get(&self, label: EmotionLabel) -> f32 {
        self.percentages[label.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, f32)> + '_ {
        EmotionLabel::ALL
            .iter()
            .map(|label| (*label, self.percentages[label.index()]))
    }

    /// Highest-scoring label; the first in order wins ties.
    pub fn dominant(&self) -> EmotionLabel {
        let mut best = EmotionLabel::Neutral;
        for (label, value) in self.iter() {
            if value > self.get(best) {
                best = label;
            }
        }
        best
    }

    pub fn total(&self) -> f32 {
        self.percentages.iter().sum()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for EmotionDistribution {
    fn default() -> Self {
        Self::uniform()
    }
}

impl Serialize for EmotionDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(LABEL_COUNT))?;
        for (label, value) in self.iter() {
            map.serialize_entry(label.as_str(), &value)?;
        }
        map.end()
    }
}

fn round_one_decimal(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_is_twelve_and_a_half_each() {
        let uniform = EmotionDistribution::uniform();
        assert!(uniform.iter().all(|(_, value)| value == 12.5));
        assert_eq!(uniform.total(), 100.0);
    }

    #[test]
    fn json_keeps_label_order() {
        let json = EmotionDistribution::uniform().to_json();
        assert_eq!(
            json,
            "{\"neutral\":12.5,\"happy\":12.5,\"sad\":12.5,\"angry\":12.5,\
             \"fearful\":12.5,\"disgust\":12.5,\"surprised\":12.5,\"calm\":12.5}"
        );
    }

    #[test]
    fn probabilities_round_to_one_decimal() {
        let dist = EmotionDistribution::from_probabilities(&[
            0.7234, 0.1, 0.05, 0.05, 0.03, 0.02, 0.0166, 0.01,
        ])
        .unwrap();
        assert_eq!(dist.get(EmotionLabel::Neutral), 72.3);
        assert_eq!(dist.get(EmotionLabel::Surprised), 1.7);
        assert_eq!(dist.dominant(), EmotionLabel::Neutral);
        assert!((dist.total() - 100.0).abs() < 0.5);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(EmotionDistribution::from_probabilities(&[1.0; 7]).is_err());
        assert!(EmotionDistribution::from_probabilities(&[f32::NAN; 8]).is_err());
    }
}
