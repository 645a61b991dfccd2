//! Fixed emotion vocabulary and the percentage vector built over it.
//!
//! Classifier output is validated against [`Emotion`] at the boundary, so the rest of
//! the crate never deals with free-form label strings.

use std::{fmt, str::FromStr};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    /// Vocabulary order. Dominant-label ties resolve to the earliest entry.
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let lowered = value.trim().to_ascii_lowercase();
        Emotion::ALL
            .into_iter()
            .find(|emotion| emotion.as_str() == lowered)
            .ok_or_else(|| anyhow!("unknown emotion label '{value}'"))
    }
}

/// One raw `{label, score}` pair as returned by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Percentages in `[0, 100]` per emotion, rounded to two decimals.
///
/// Values only sum to roughly 100: each label is rounded independently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct EmotionVector {
    pub angry: f64,
    pub disgust: f64,
    pub fear: f64,
    pub happy: f64,
    pub sad: f64,
    pub surprise: f64,
    pub neutral: f64,
}

impl EmotionVector {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Substituted when an image could not be classified.
    pub fn neutral_fallback() -> Self {
        Self {
            neutral: 100.0,
            ..Self::default()
        }
    }

    pub fn get(&self, emotion: Emotion) -> f64 {
        match emotion {
            Emotion::Angry => self.angry,
            Emotion::Disgust => self.disgust,
            Emotion::Fear => self.fear,
            Emotion::Happy => self.happy,
            Emotion::Sad => self.sad,
            Emotion::Surprise => self.surprise,
            Emotion::Neutral => self.neutral,
        }
    }

    pub fn set(&mut self, emotion: Emotion, value: f64) {
        let slot = match emotion {
            Emotion::Angry => &mut self.angry,
            Emotion::Disgust => &mut self.disgust,
            Emotion::Fear => &mut self.fear,
            Emotion::Happy => &mut self.happy,
            Emotion::Sad => &mut self.sad,
            Emotion::Surprise => &mut self.surprise,
            Emotion::Neutral => &mut self.neutral,
        };
        *slot = value;
    }

    /// Rescale the recognized labels of a classifier response to percentages of their sum.
    ///
    /// Unknown labels are skipped. Returns an error when nothing usable remains, which
    /// callers treat the same as a failed classifier call.
    pub fn from_scores(scores: &[LabelScore]) -> Result<Self> {
        let recognized: Vec<(Emotion, f64)> = scores
            .iter()
            .filter_map(|entry| {
                entry
                    .label
                    .parse::<Emotion>()
                    .ok()
                    .map(|emotion| (emotion, entry.score))
            })
            .collect();

        if recognized.is_empty() {
            return Err(anyhow!("classifier response contained no known emotion labels"));
        }

        let total: f64 = recognized.iter().map(|(_, score)| score).sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(anyhow!("classifier scores sum to {total}, cannot normalize"));
        }

        let mut vector = Self::zero();
        for (emotion, score) in recognized {
            // duplicate labels accumulate rather than overwrite
            let value = vector.get(emotion) + score / total * 100.0;
            vector.set(emotion, value);
        }

        Ok(vector.rounded())
    }

    /// Per-label arithmetic mean. An empty input yields the zero vector.
    pub fn mean<'a, I>(vectors: I) -> Self
    where
        I: IntoIterator<Item = &'a EmotionVector>,
    {
        let mut totals = Self::zero();
        let mut count = 0usize;

        for vector in vectors {
            count += 1;
            for emotion in Emotion::ALL {
                totals.set(emotion, totals.get(emotion) + vector.get(emotion));
            }
        }

        if count == 0 {
            return totals;
        }

        let mut mean = Self::zero();
        for emotion in Emotion::ALL {
            mean.set(emotion, totals.get(emotion) / count as f64);
        }
        mean.rounded()
    }

    /// Highest-valued label; the first in vocabulary order wins ties, and an all-zero
    /// vector is neutral.
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::Neutral;
        let mut best_value = 0.0;

        for emotion in Emotion::ALL {
            let value = self.get(emotion);
            if value > best_value {
                best = emotion;
                best_value = value;
            }
        }

        best
    }

    pub fn total(&self) -> f64 {
        Emotion::ALL.iter().map(|emotion| self.get(*emotion)).sum()
    }

    fn rounded(mut self) -> Self {
        for emotion in Emotion::ALL {
            let value = self.get(emotion);
            self.set(emotion, round2(value));
        }
        self
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
