//! Emotion categories and the per-text measures built on them: word
//! spectra, normalized frequency maps and dominant-emotion sets.

use crate::error::{AttackError, Result};
use crate::utils::math::euclidean_distance;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The eight basic emotions, in the fixed order used by every spectrum.
///
/// Negative emotions come first so that the two polarity groups are
/// adjacent. Arithmetic between spectra relies on this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Anger,
    Disgust,
    Fear,
    Sadness,
    Anticipation,
    Joy,
    Surprise,
    Trust,
}

impl Emotion {
    pub const ALL: [Emotion; 8] = [
        Emotion::Anger,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Sadness,
        Emotion::Anticipation,
        Emotion::Joy,
        Emotion::Surprise,
        Emotion::Trust,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Anger => "anger",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Sadness => "sadness",
            Emotion::Anticipation => "anticipation",
            Emotion::Joy => "joy",
            Emotion::Surprise => "surprise",
            Emotion::Trust => "trust",
        }
    }

    /// Position of this emotion inside a spectrum.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn polarity(self) -> Polarity {
        match self {
            Emotion::Anger | Emotion::Disgust | Emotion::Fear | Emotion::Sadness => {
                Polarity::Negative
            }
            _ => Polarity::Positive,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = AttackError;

    fn from_str(s: &str) -> Result<Self> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| AttackError::Validation {
                message: format!("unknown emotion category '{}'", s),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
}

/// A label attached to a word by the lexical affect source: one of the
/// eight emotions or one of the two polarity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AffectTag {
    Emotion(Emotion),
    Polarity(Polarity),
}

impl AffectTag {
    /// Tags in the column order of the word-level NRC file.
    pub const NRC_ORDER: [AffectTag; 10] = [
        AffectTag::Emotion(Emotion::Anger),
        AffectTag::Emotion(Emotion::Anticipation),
        AffectTag::Emotion(Emotion::Disgust),
        AffectTag::Emotion(Emotion::Fear),
        AffectTag::Emotion(Emotion::Joy),
        AffectTag::Polarity(Polarity::Negative),
        AffectTag::Polarity(Polarity::Positive),
        AffectTag::Emotion(Emotion::Sadness),
        AffectTag::Emotion(Emotion::Surprise),
        AffectTag::Emotion(Emotion::Trust),
    ];

    pub fn emotion(self) -> Option<Emotion> {
        match self {
            AffectTag::Emotion(e) => Some(e),
            AffectTag::Polarity(_) => None,
        }
    }
}

impl FromStr for AffectTag {
    type Err = AttackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "positive" => Ok(AffectTag::Polarity(Polarity::Positive)),
            "negative" => Ok(AffectTag::Polarity(Polarity::Negative)),
            other => other.parse().map(AffectTag::Emotion),
        }
    }
}

/// Per-word emotion association values in [`Emotion::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EmotionSpectrum([f32; 8]);

impl EmotionSpectrum {
    pub fn zero() -> Self {
        Self([0.0; 8])
    }

    pub fn from_values(values: [f32; 8]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f32; 8] {
        &self.0
    }

    pub fn get(&self, emotion: Emotion) -> f32 {
        self.0[emotion.index()]
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    /// Euclidean distance between two spectra.
    pub fn distance(&self, other: &EmotionSpectrum) -> f32 {
        euclidean_distance(&self.0, &other.0)
    }
}

/// Normalized share of each emotion among all emotion tags of a text,
/// rounded to two decimals. All eight categories are always present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionFrequencies([f64; 8]);

impl EmotionFrequencies {
    /// Builds the frequency map from raw per-category tag counts.
    ///
    /// Fails with [`AttackError::EmptyAffectInput`] when every count is zero.
    pub fn from_counts(counts: &[u32; 8]) -> Result<Self> {
        let total: u32 = counts.iter().sum();
        if total == 0 {
            return Err(AttackError::EmptyAffectInput);
        }
        let mut shares = [0.0; 8];
        for (share, &count) in shares.iter_mut().zip(counts) {
            *share = round2(count as f64 / total as f64);
        }
        Ok(Self(shares))
    }

    pub fn from_shares(shares: [f64; 8]) -> Self {
        Self(shares)
    }

    pub fn get(&self, emotion: Emotion) -> f64 {
        self.0[emotion.index()]
    }

    pub fn shares(&self) -> &[f64; 8] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL.into_iter().map(|e| (e, self.0[e.index()]))
    }

    /// Categories attaining the maximum share; ties keep every maximum.
    pub fn dominant(&self) -> DominantEmotions {
        let max = self.0.iter().copied().fold(f64::MIN, f64::max);
        DominantEmotions(
            Emotion::ALL
                .into_iter()
                .filter(|e| self.0[e.index()] == max)
                .collect(),
        )
    }
}

impl Serialize for EmotionFrequencies {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(8))?;
        for (emotion, share) in self.iter() {
            map.serialize_entry(emotion.as_str(), &share)?;
        }
        map.end()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The emotion(s) with maximal share in a text, in [`Emotion::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DominantEmotions(Vec<Emotion>);

impl DominantEmotions {
    pub fn new(mut emotions: Vec<Emotion>) -> Self {
        emotions.sort();
        emotions.dedup();
        Self(emotions)
    }

    pub fn emotions(&self) -> &[Emotion] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, emotion: Emotion) -> bool {
        self.0.contains(&emotion)
    }

    /// Fraction of the set that belongs to `polarity`.
    ///
    /// An empty set comes from emotionless text, where every category ties
    /// at zero, so it is scored as the full spectrum.
    pub fn polarity_share(&self, polarity: Polarity) -> f64 {
        let members: &[Emotion] = if self.0.is_empty() { &Emotion::ALL } else { &self.0 };
        let hits = members.iter().filter(|e| e.polarity() == polarity).count();
        hits as f64 / members.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequencies_are_normalized_and_rounded() {
        // joy x2, trust x1
        let mut counts = [0u32; 8];
        counts[Emotion::Joy.index()] = 2;
        counts[Emotion::Trust.index()] = 1;
        let freqs = EmotionFrequencies::from_counts(&counts).unwrap();
        assert_eq!(freqs.get(Emotion::Joy), 0.67);
        assert_eq!(freqs.get(Emotion::Trust), 0.33);
        assert_eq!(freqs.get(Emotion::Anger), 0.0);
    }

    #[test]
    fn zero_counts_are_rejected() {
        let err = EmotionFrequencies::from_counts(&[0; 8]).unwrap_err();
        assert!(matches!(err, AttackError::EmptyAffectInput));
    }

    #[test]
    fn dominant_keeps_ties() {
        let mut counts = [0u32; 8];
        counts[Emotion::Joy.index()] = 1;
        counts[Emotion::Trust.index()] = 1;
        counts[Emotion::Fear.index()] = 0;
        let dominant = EmotionFrequencies::from_counts(&counts).unwrap().dominant();
        assert_eq!(dominant.emotions(), &[Emotion::Joy, Emotion::Trust]);
        assert_eq!(dominant.polarity_share(Polarity::Positive), 1.0);
        assert_eq!(dominant.polarity_share(Polarity::Negative), 0.0);
    }

    #[test]
    fn emotionless_set_splits_polarity_evenly() {
        let empty = DominantEmotions::default();
        assert_eq!(empty.polarity_share(Polarity::Negative), 0.5);
        assert_eq!(empty.polarity_share(Polarity::Positive), 0.5);
    }

    #[test]
    fn spectrum_distance_is_euclidean() {
        let a = EmotionSpectrum::from_values([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let b = EmotionSpectrum::from_values([0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert!((a.distance(&b) - 2f32.sqrt()).abs() < 1e-6);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn tags_parse_including_polarity() {
        assert_eq!(
            "positive".parse::<AffectTag>().unwrap(),
            AffectTag::Polarity(Polarity::Positive)
        );
        assert_eq!(
            "trust".parse::<AffectTag>().unwrap().emotion(),
            Some(Emotion::Trust)
        );
        assert!("bliss".parse::<AffectTag>().is_err());
    }

    #[test]
    fn frequencies_serialize_in_fixed_order() {
        let mut counts = [0u32; 8];
        counts[Emotion::Anger.index()] = 1;
        let json = serde_json::to_string(&EmotionFrequencies::from_counts(&counts).unwrap())
            .unwrap();
        assert!(json.starts_with("{\"anger\":1.0,\"disgust\":0.0"));
        assert!(json.ends_with("\"trust\":0.0}"));
    }
}
