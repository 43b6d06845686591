use rand::Rng;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

static BUILTIN_WORDS: &str = include_str!("../data/words.csv");

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("failed to open word table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read word table: {0}")]
    Csv(#[from] csv::Error),
}

/// A word and how often it should be drawn relative to the rest of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordEntry {
    pub text: String,
    pub weight: u64,
}

impl WordEntry {
    pub fn new(text: impl Into<String>, weight: u64) -> Self {
        Self {
            text: text.into(),
            weight,
        }
    }
}

/// Cumulative-frequency word sampler.
///
/// The table is fixed after construction. Sampling never mutates it, so one
/// sampler can feed any number of tests; the random source is supplied per
/// call so callers decide whether runs are seeded or not.
#[derive(Debug, Clone, Default)]
pub struct WordSampler {
    entries: Vec<WordEntry>,
    total_weight: u64,
}

impl WordSampler {
    /// Builds a sampler, dropping entries with an empty word or a zero weight.
    /// An entry whose weight would push the total past `u64::MAX` is dropped too.
    pub fn new(entries: impl IntoIterator<Item = WordEntry>) -> Self {
        let mut total_weight: u64 = 0;
        let entries: Vec<WordEntry> = entries
            .into_iter()
            .filter(|e| !e.text.is_empty() && e.weight > 0)
            .filter(|e| match total_weight.checked_add(e.weight) {
                Some(total) => {
                    total_weight = total;
                    true
                }
                None => {
                    log::debug!("skipping {:?}: weight {} overflows the table", e.text, e.weight);
                    false
                }
            })
            .collect();

        Self {
            entries,
            total_weight,
        }
    }

    /// Builds a sampler from raw `(word, weight)` pairs as they come out of a
    /// word table. Unparsable or non-positive weights skip the row.
    pub fn from_entries<S: AsRef<str>>(rows: impl IntoIterator<Item = (S, S)>) -> Self {
        Self::new(rows.into_iter().filter_map(|(text, weight)| {
            parse_row(text.as_ref(), weight.as_ref())
        }))
    }

    /// Reads a headerless two-column CSV table (`word,weight`)
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, SamplerError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                // bad utf-8 or a broken quote only loses this row
                Err(err) if !is_io_error(&err) => {
                    log::debug!("skipping word table row {}: {}", line + 1, err);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if record.len() != 2 {
                log::debug!(
                    "skipping word table row {}: expected 2 columns, got {}",
                    line + 1,
                    record.len()
                );
                continue;
            }

            match parse_row(&record[0], &record[1]) {
                Some(entry) => entries.push(entry),
                None => log::debug!("skipping word table row {}: {:?}", line + 1, record),
            }
        }

        Ok(Self::new(entries))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SamplerError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SamplerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let sampler = Self::from_csv_reader(file)?;
        log::info!(
            "loaded {} words (total weight {}) from {}",
            sampler.len(),
            sampler.total_weight,
            path.display()
        );
        Ok(sampler)
    }

    /// The English frequency table shipped with the binary
    pub fn builtin() -> Self {
        Self::from_csv_reader(BUILTIN_WORDS.as_bytes()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn entries(&self) -> &[WordEntry] {
        &self.entries
    }

    /// Draws one word with probability `weight / total_weight`.
    /// Returns an empty string for an empty table.
    pub fn sample_one<R: Rng>(&self, rng: &mut R) -> String {
        let Some(last) = self.entries.last() else {
            return String::new();
        };

        let target = rng.gen_range(0..self.total_weight);
        let mut cumulative = 0;
        for entry in &self.entries {
            cumulative += entry.weight;
            if cumulative > target {
                return entry.text.clone();
            }
        }

        last.text.clone()
    }

    /// `count` independent draws with replacement, in test order
    pub fn sample_sequence<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<String> {
        (0..count).map(|_| self.sample_one(rng)).collect()
    }
}

fn parse_row(text: &str, weight: &str) -> Option<WordEntry> {
    let text = text.trim();
    let weight = weight.trim().parse::<i64>().ok()?;
    if text.is_empty() || weight <= 0 {
        return None;
    }
    Some(WordEntry::new(text, weight as u64))
}

fn is_io_error(err: &csv::Error) -> bool {
    matches!(err.kind(), csv::ErrorKind::Io(_))
}
