use std::{
    convert::TryFrom,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{alphabet::LabelAlphabet, Result};

/// An input sequence and its aligned target output.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencePair<I, O> {
    pub input: Vec<I>,
    pub output: Vec<O>,
}

impl<I, O> Default for SequencePair<I, O> {
    fn default() -> Self {
        Self {
            input: Vec::new(),
            output: Vec::new(),
        }
    }
}

impl<I, O> SequencePair<I, O> {
    pub fn new(input: Vec<I>, output: Vec<O>) -> Self {
        Self { input, output }
    }

    pub fn push(&mut self, item: I, label: O) {
        self.input.push(item);
        self.output.push(label);
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.output.clear();
    }
}

/// Labeled token sequences.
///
/// The text format has one `label<TAB>token` line per item and blank lines
/// between sequences.
#[derive(Debug, Default)]
pub struct Dataset {
    pub seqs: Vec<SequencePair<String, String>>,
}

impl Dataset {
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut this = Self::default();
        let mut seq = SequencePair::default();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if !line.is_empty() {
                if let Some((label, token)) = line.split_once('\t') {
                    seq.push(token.to_string(), label.to_string());
                } else {
                    log::warn!("invalid line {}: {line}", lineno + 1);
                }
            } else if !seq.is_empty() {
                this.seqs.push(std::mem::take(&mut seq));
            }
        }
        if !seq.is_empty() {
            this.seqs.push(seq);
        }
        log::info!(
            "read {} sequences ({} items, max length {})",
            this.len(),
            this.total_items(),
            this.max_length()
        );
        Ok(this)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::try_from(File::open(path)?)
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SequencePair<String, String>> {
        self.seqs.iter()
    }

    pub fn max_length(&self) -> usize {
        self.seqs.iter().map(|x| x.len()).max().unwrap_or_default()
    }

    pub fn total_items(&self) -> usize {
        self.seqs.iter().map(|x| x.len()).sum()
    }

    /// Every target label, in order of first appearance.
    pub fn labels(&self) -> LabelAlphabet<String> {
        self.seqs.iter().flat_map(|s| s.output.iter().cloned()).collect()
    }
}

impl TryFrom<File> for Dataset {
    type Error = crate::Error;

    fn try_from(f: File) -> Result<Self> {
        Self::read(BufReader::new(f))
    }
}
