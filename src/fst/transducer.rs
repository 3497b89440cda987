use std::{fmt::Display, hash::Hash};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::{
    cost::INFINITE_COST,
    lattice::{ExpectedCounts, Lattice},
    viterbi::ViterbiPath,
};
use crate::{alphabet::LabelAlphabet, dataset::SequencePair, Error, Result};

bitflags! {
    /// What a transducer supports beyond input-driven transition enumeration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Capabilities: u8 {
        /// Transitions can be enumerated without an input sequence.
        const ITERATE_ALL = 0x01;
        /// Transitions enumerated without input carry valid costs and outputs.
        const GENERATIVE = 0x02 | Self::ITERATE_ALL.bits();
        /// The count hooks accumulate expected sufficient statistics.
        const TRAINABLE = 0x04;
    }
}

/// A node of the transducer's state graph.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    index: usize,
    name: String,
    initial_cost: f64,
    final_cost: f64,
}

impl State {
    pub fn new(index: usize, name: impl Into<String>, initial_cost: f64, final_cost: f64) -> Self {
        Self {
            index,
            name: name.into(),
            initial_cost,
            final_cost,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn initial_cost(&self) -> f64 {
        self.initial_cost
    }

    pub fn set_initial_cost(&mut self, cost: f64) {
        self.initial_cost = cost;
    }

    #[inline]
    pub fn final_cost(&self) -> f64 {
        self.final_cost
    }

    pub fn set_final_cost(&mut self, cost: f64) {
        self.final_cost = cost;
    }

    pub fn is_initial(&self) -> bool {
        self.initial_cost < INFINITE_COST
    }

    pub fn is_final(&self) -> bool {
        self.final_cost < INFINITE_COST
    }
}

/// One outgoing edge yielded by a transition iterator.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<O> {
    pub source: usize,
    pub destination: usize,
    /// Dense index of this edge among the source state's edges. Count hooks
    /// are addressed by `(source, edge)`.
    pub edge: usize,
    pub output: O,
    pub cost: f64,
}

/// Cursor over the transitions leaving one state at one position.
pub type Transitions<'a, O> = Box<dyn Iterator<Item = Transition<O>> + 'a>;

/// A weighted finite-state transducer.
///
/// The only extension point is [`Transducer::transitions`]; lattices and
/// Viterbi paths are computed from it alone. Every transition consumes
/// exactly one input item and emits exactly one output symbol.
pub trait Transducer {
    type Input;
    type Output: Clone + Eq + Hash + Display;

    fn num_states(&self) -> usize;

    /// Fails with [`Error::IndexOutOfRange`] for an invalid index.
    fn state(&self, index: usize) -> Result<&State>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    /// Transitions leaving `source` that are consistent with
    /// `input[input_position]` and, when given, `output[output_position]`.
    ///
    /// With `input == None` every transition is returned, which is legal only
    /// when [`Transducer::can_iterate_all_transitions`] holds; otherwise this
    /// fails with [`Error::NotGenerative`].
    fn transitions<'a>(
        &'a self,
        source: usize,
        input: Option<&'a [Self::Input]>,
        input_position: usize,
        output: Option<&'a [Self::Output]>,
        output_position: usize,
    ) -> Result<Transitions<'a, Self::Output>>;

    fn increment_initial_count(&mut self, _state: usize, _count: f64) -> Result<()> {
        Err(Error::NotTrainable)
    }

    fn increment_final_count(&mut self, _state: usize, _count: f64) -> Result<()> {
        Err(Error::NotTrainable)
    }

    fn increment_transition_count(&mut self, _source: usize, _edge: usize, _count: f64) -> Result<()> {
        Err(Error::NotTrainable)
    }

    /// States with a finite initial cost. May be empty.
    fn initial_states(&self) -> Box<dyn Iterator<Item = &State> + '_> {
        Box::new(
            (0..self.num_states())
                .filter_map(move |i| self.state(i).ok())
                .filter(|s| s.is_initial()),
        )
    }

    fn can_iterate_all_transitions(&self) -> bool {
        self.capabilities().contains(Capabilities::ITERATE_ALL)
    }

    fn is_generative(&self) -> bool {
        self.capabilities().contains(Capabilities::GENERATIVE)
    }

    fn is_trainable(&self) -> bool {
        self.capabilities().contains(Capabilities::TRAINABLE)
    }

    /// Every transition leaving `source`, without input constraint.
    fn all_transitions(&self, source: usize) -> Result<Transitions<'_, Self::Output>> {
        if !self.can_iterate_all_transitions() {
            return Err(Error::NotGenerative);
        }
        self.transitions(source, None, 0, None, 0)
    }

    fn viterbi_path<'a>(
        &self,
        input: &'a [Self::Input],
        output: Option<&'a [Self::Output]>,
    ) -> Result<ViterbiPath<'a, Self::Input, Self::Output>>
    where
        Self: Sized,
    {
        ViterbiPath::new(self, input, output)
    }

    /// Forward-backward without accumulation.
    fn lattice(
        &self,
        input: &[Self::Input],
        output: Option<&[Self::Output]>,
        alphabet: Option<&LabelAlphabet<Self::Output>>,
    ) -> Result<Lattice>
    where
        Self: Sized,
    {
        Lattice::new(self, input, output, false, alphabet)
    }

    /// Forward-backward; with `increment` the expected counts of this
    /// sequence are added to the transducer's counters.
    fn forward_backward(
        &mut self,
        input: &[Self::Input],
        output: Option<&[Self::Output]>,
        increment: bool,
        alphabet: Option<&LabelAlphabet<Self::Output>>,
    ) -> Result<Lattice>
    where
        Self: Sized,
    {
        let lattice = Lattice::new(&*self, input, output, increment, alphabet)?;
        if let Some(counts) = lattice.expected_counts() {
            counts.apply(self)?;
        }
        Ok(lattice)
    }

    /// Sums the expected counts of a batch of sequences and applies them once.
    ///
    /// Nothing is applied when no sequence in the batch is feasible.
    fn accumulate_batch<'s>(
        &mut self,
        pairs: impl IntoIterator<Item = &'s SequencePair<Self::Input, Self::Output>>,
        constrain_output: bool,
    ) -> Result<ExpectedCounts>
    where
        Self: Sized,
        Self::Input: 's,
        Self::Output: 's,
    {
        let mut total = ExpectedCounts::new(self.num_states());
        let mut feasible = 0;
        for pair in pairs {
            let output = constrain_output.then_some(pair.output.as_slice());
            let lattice = Lattice::new(&*self, &pair.input[..], output, true, None)?;
            if let Some(counts) = lattice.expected_counts() {
                total.merge(counts);
                feasible += 1;
            }
        }
        if feasible > 0 {
            total.apply(self)?;
        } else {
            log::debug!("no feasible sequence in batch, nothing to apply");
        }
        Ok(total)
    }

    /// Mean of the per-sequence Viterbi token accuracies.
    fn average_token_accuracy(&self, pairs: &[SequencePair<Self::Input, Self::Output>]) -> Result<f64>
    where
        Self: Sized,
    {
        if pairs.is_empty() {
            return Ok(0.0);
        }
        let mut accuracy = 0.0;
        for pair in pairs {
            if pair.input.len() != pair.output.len() {
                return Err(Error::LengthMismatch {
                    input: pair.input.len(),
                    output: pair.output.len(),
                });
            }
            let path_accuracy = self.viterbi_path(&pair.input, None)?.token_accuracy(&pair.output)?;
            log::info!("transducer path accuracy = {path_accuracy}");
            accuracy += path_accuracy;
        }
        Ok(accuracy / pairs.len() as f64)
    }
}
