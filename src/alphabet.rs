use std::{collections::HashMap, hash::Hash};

/// Frozen dictionary from output symbols to dense indices.
#[derive(Debug, Clone, Default)]
pub struct LabelAlphabet<O> {
    v: Vec<O>,
    m: HashMap<O, usize>,
}

impl<O: Clone + Eq + Hash> LabelAlphabet<O> {
    fn find_or_insert(&mut self, key: O) -> usize {
        if let Some(&idx) = self.m.get(&key) {
            return idx;
        }
        let idx = self.v.len();
        self.m.insert(key.clone(), idx);
        self.v.push(key);
        idx
    }

    pub fn lookup_index(&self, symbol: &O) -> Option<usize> {
        self.m.get(symbol).copied()
    }

    pub fn lookup_symbol(&self, index: usize) -> Option<&O> {
        self.v.get(index)
    }

    pub fn len(&self) -> usize {
        self.v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &O> {
        self.v.iter()
    }
}

impl<O: Clone + Eq + Hash> FromIterator<O> for LabelAlphabet<O> {
    /// Duplicates keep the index of their first occurrence.
    fn from_iter<T: IntoIterator<Item = O>>(iter: T) -> Self {
        let mut this = Self {
            v: Vec::new(),
            m: HashMap::new(),
        };
        for symbol in iter {
            this.find_or_insert(symbol);
        }
        this
    }
}

impl<O: Clone + Eq + Hash> From<Vec<O>> for LabelAlphabet<O> {
    fn from(value: Vec<O>) -> Self {
        value.into_iter().collect()
    }
}

/// Probability mass over the symbols of a [`LabelAlphabet`], indexed like it.
#[derive(Debug, Clone, PartialEq)]
pub struct Labeling {
    values: Vec<f64>,
}

impl Labeling {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn value(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or_default()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Index of the most probable symbol; the first one on ties.
    pub fn best_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &v) in self.values.iter().enumerate() {
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((i, v));
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn best_label<'a, O: Clone + Eq + Hash>(&self, alphabet: &'a LabelAlphabet<O>) -> Option<&'a O> {
        self.best_index().and_then(|i| alphabet.lookup_symbol(i))
    }

    pub fn probability_of<O: Clone + Eq + Hash>(&self, alphabet: &LabelAlphabet<O>, symbol: &O) -> f64 {
        alphabet.lookup_index(symbol).map_or(0.0, |i| self.value(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_by_symbol() {
        let alphabet: LabelAlphabet<&str> =
            ["zero", "one", "two", "three", "two", "one", "zero", "four"].into_iter().collect();
        for (s, id) in [("zero", 0), ("one", 1), ("two", 2), ("three", 3), ("four", 4)] {
            assert_eq!(Some(id), alphabet.lookup_index(&s), "{} != {}", s, id);
        }
        assert_eq!(alphabet.len(), 5);
        assert_eq!(alphabet.lookup_index(&"five"), None);
    }

    #[test]
    fn find_by_index() {
        let alphabet = LabelAlphabet::from(vec!["zero".to_string(), "one".to_string()]);
        assert_eq!(alphabet.lookup_symbol(0).map(String::as_str), Some("zero"));
        assert_eq!(alphabet.lookup_symbol(1).map(String::as_str), Some("one"));
        assert_eq!(alphabet.lookup_symbol(2), None);
    }

    #[test]
    fn best_label() {
        let alphabet = LabelAlphabet::from(vec!["sunny", "rainy"]);
        let labeling = Labeling::new(vec![0.25, 0.75]);
        assert_eq!(labeling.best_label(&alphabet), Some(&"rainy"));
        assert_eq!(labeling.probability_of(&alphabet, &"sunny"), 0.25);
        assert_eq!(labeling.probability_of(&alphabet, &"foggy"), 0.0);
        assert_eq!(labeling.sum(), 1.0);
        assert_eq!(Labeling::new(Vec::new()).best_index(), None);
    }
}
