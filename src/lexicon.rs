//! Word-level emotion lexicon.
//!
//! The raw resource is the NRC word-emotion association table: one
//! tab-separated row per (word, category) with a binary flag. It is pivoted
//! into one row per word. [`AffectTable`] keeps all ten categories and backs
//! the lexical affect source; [`Lexicon`] keeps the eight emotions only, in
//! spectrum order, and drops words without any emotion.

use crate::emotion::{AffectTag, Emotion, EmotionSpectrum};
use crate::error::{AttackError, Result};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Pivoted raw table: word -> flag per tag in [`AffectTag::NRC_ORDER`].
#[derive(Debug, Clone, Default)]
pub struct AffectTable {
    rows: BTreeMap<String, [Option<u8>; 10]>,
}

fn nrc_slot(tag: AffectTag) -> usize {
    AffectTag::NRC_ORDER
        .iter()
        .position(|t| *t == tag)
        .unwrap_or_default()
}

impl AffectTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| AttackError::Lexicon {
            message: format!("cannot open {}: {}", path.display(), e),
        })?;
        Self::from_reader(file)
    }

    /// Parse `word<TAB>category<TAB>flag` rows. For a repeated
    /// (word, category) pair the first flag wins.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows: BTreeMap<String, [Option<u8>; 10]> = BTreeMap::new();
        let mut skipped = 0usize;
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            if record.len() < 3 {
                return Err(AttackError::Lexicon {
                    message: format!("line {}: expected 3 fields, got {}", line + 1, record.len()),
                });
            }
            let word = crate::text::normalize(record[0].trim()).to_lowercase();
            let tag: AffectTag = match record[1].trim().parse() {
                Ok(tag) => tag,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            let flag: u8 = record[2].trim().parse().map_err(|_| AttackError::Lexicon {
                message: format!("line {}: invalid flag '{}'", line + 1, &record[2]),
            })?;
            let slot = &mut rows.entry(word).or_default()[nrc_slot(tag)];
            if slot.is_none() {
                *slot = Some(flag);
            }
        }
        if skipped > 0 {
            warn!("Skipped {} lexicon rows with unknown categories", skipped);
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Tags flagged for `word`, polarity included, in NRC order.
    pub fn tags(&self, word: &str) -> Option<Vec<AffectTag>> {
        self.rows.get(word).map(|flags| {
            AffectTag::NRC_ORDER
                .iter()
                .zip(flags.iter())
                .filter(|(_, flag)| flag.unwrap_or(0) > 0)
                .map(|(tag, _)| *tag)
                .collect()
        })
    }

    fn spectrum(flags: &[Option<u8>; 10]) -> EmotionSpectrum {
        let mut values = [0.0f32; 8];
        for emotion in Emotion::ALL {
            let flag = flags[nrc_slot(AffectTag::Emotion(emotion))].unwrap_or(0);
            values[emotion.index()] = flag as f32;
        }
        EmotionSpectrum::from_values(values)
    }
}

/// Cleaned word -> emotion spectrum table. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lexicon {
    spectra: BTreeMap<String, EmotionSpectrum>,
}

impl Lexicon {
    /// Drop polarity, reorder to spectrum order and keep words whose
    /// spectrum sums to a positive value.
    pub fn from_table(table: &AffectTable) -> Self {
        let spectra: BTreeMap<String, EmotionSpectrum> = table
            .rows
            .iter()
            .map(|(word, flags)| (word.clone(), AffectTable::spectrum(flags)))
            .filter(|(_, spectrum)| spectrum.sum() > 0.0)
            .collect();
        info!(
            "Lexicon loaded: {} of {} words carry an emotion",
            spectra.len(),
            table.len()
        );
        Self { spectra }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, EmotionSpectrum)>) -> Self {
        Self {
            spectra: entries
                .into_iter()
                .filter(|(_, s)| s.sum() > 0.0)
                .collect(),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.spectra.contains_key(word)
    }

    pub fn spectrum(&self, word: &str) -> Option<&EmotionSpectrum> {
        self.spectra.get(word)
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.spectra.keys().map(String::as_str)
    }

    /// Canonical serialization: header then one row per word, sorted.
    pub fn to_tsv(&self) -> String {
        let mut out = String::from("word");
        for emotion in Emotion::ALL {
            out.push('\t');
            out.push_str(emotion.as_str());
        }
        out.push('\n');
        for (word, spectrum) in &self.spectra {
            out.push_str(word);
            for v in spectrum.values() {
                out.push('\t');
                out.push_str(&v.to_string());
            }
            out.push('\n');
        }
        out
    }

    /// blake3 digest of [`Lexicon::to_tsv`].
    pub fn fingerprint(&self) -> String {
        blake3::hash(self.to_tsv().as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "abandon\tanger\t0\nabandon\tfear\t1\nabandon\tnegative\t1\nabandon\tsadness\t1\n\
                       table\tanger\t0\ntable\tjoy\t0\ntable\tpositive\t0\n\
                       good\tjoy\t1\ngood\tpositive\t1\ngood\ttrust\t1\n";

    #[test]
    fn pivot_keeps_emotion_order() {
        let table = AffectTable::from_reader(RAW.as_bytes()).unwrap();
        let lexicon = Lexicon::from_table(&table);
        let spectrum = lexicon.spectrum("abandon").unwrap();
        assert_eq!(spectrum.values(), &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let good = lexicon.spectrum("good").unwrap();
        assert_eq!(good.get(Emotion::Joy), 1.0);
        assert_eq!(good.get(Emotion::Trust), 1.0);
    }

    #[test]
    fn emotionless_words_are_dropped() {
        let table = AffectTable::from_reader(RAW.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        let lexicon = Lexicon::from_table(&table);
        assert!(!lexicon.contains("table"));
        assert_eq!(lexicon.len(), 2);
    }

    #[test]
    fn raw_tags_include_polarity() {
        let table = AffectTable::from_reader(RAW.as_bytes()).unwrap();
        let tags = table.tags("good").unwrap();
        assert!(tags.contains(&AffectTag::Polarity(crate::emotion::Polarity::Positive)));
        assert_eq!(tags.len(), 3);
        assert!(table.tags("missing").is_none());
    }

    #[test]
    fn first_flag_wins_on_duplicates() {
        let raw = "w\tanger\t1\nw\tanger\t0\n";
        let lexicon = Lexicon::from_table(&AffectTable::from_reader(raw.as_bytes()).unwrap());
        assert_eq!(lexicon.spectrum("w").unwrap().get(Emotion::Anger), 1.0);
    }

    #[test]
    fn bad_flag_is_an_error() {
        let err = AffectTable::from_reader("w\tanger\tyes\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AttackError::Lexicon { .. }));
    }
}
