use serde::{Deserialize, Serialize};

use super::{
    cost::{probability, sum_neg_log_prob, INFINITE_COST},
    transducer::Transducer,
};
use crate::{
    alphabet::{LabelAlphabet, Labeling},
    Error, Result,
};

/// Posterior-weighted usage of initial states, final states and transitions
/// for one or more sequences.
///
/// Lattices fill these locally; [`ExpectedCounts::apply`] is the only place a
/// transducer's counters get mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedCounts {
    initial: Vec<f64>,
    #[serde(rename = "final")]
    finals: Vec<f64>,
    /// Indexed by [source][edge].
    transitions: Vec<Vec<f64>>,
}

impl ExpectedCounts {
    pub fn new(num_states: usize) -> Self {
        Self {
            initial: vec![0.0; num_states],
            finals: vec![0.0; num_states],
            transitions: vec![Vec::new(); num_states],
        }
    }

    pub fn num_states(&self) -> usize {
        self.initial.len()
    }

    fn grow(&mut self, num_states: usize) {
        if self.initial.len() < num_states {
            self.initial.resize(num_states, 0.0);
            self.finals.resize(num_states, 0.0);
            self.transitions.resize(num_states, Vec::new());
        }
    }

    pub(crate) fn add_initial(&mut self, state: usize, count: f64) {
        self.grow(state + 1);
        self.initial[state] += count;
    }

    pub(crate) fn add_final(&mut self, state: usize, count: f64) {
        self.grow(state + 1);
        self.finals[state] += count;
    }

    pub(crate) fn add_transition(&mut self, source: usize, edge: usize, count: f64) {
        self.grow(source + 1);
        let row = &mut self.transitions[source];
        if row.len() <= edge {
            row.resize(edge + 1, 0.0);
        }
        row[edge] += count;
    }

    pub fn initial(&self, state: usize) -> f64 {
        self.initial.get(state).copied().unwrap_or_default()
    }

    pub fn final_count(&self, state: usize) -> f64 {
        self.finals.get(state).copied().unwrap_or_default()
    }

    pub fn transition(&self, source: usize, edge: usize) -> f64 {
        self.transitions
            .get(source)
            .and_then(|row| row.get(edge))
            .copied()
            .unwrap_or_default()
    }

    /// Adds the counts of another sequence (or batch) into this one.
    pub fn merge(&mut self, other: &ExpectedCounts) {
        self.grow(other.num_states());
        for (s, c) in other.initial.iter().enumerate() {
            self.initial[s] += c;
        }
        for (s, c) in other.finals.iter().enumerate() {
            self.finals[s] += c;
        }
        for (s, row) in other.transitions.iter().enumerate() {
            for (edge, &c) in row.iter().enumerate() {
                self.add_transition(s, edge, c);
            }
        }
    }

    /// Pushes every count into the transducer's trainable counters.
    pub fn apply<T: Transducer + ?Sized>(&self, transducer: &mut T) -> Result<()> {
        for (s, &c) in self.initial.iter().enumerate() {
            transducer.increment_initial_count(s, c)?;
        }
        for (s, &c) in self.finals.iter().enumerate() {
            transducer.increment_final_count(s, c)?;
        }
        for (s, row) in self.transitions.iter().enumerate() {
            for (edge, &c) in row.iter().enumerate() {
                transducer.increment_transition_count(s, edge, c)?;
            }
        }
        Ok(())
    }
}

/// Forward-backward lattice over one input sequence.
///
/// Nodes are stored row-major in `[position][state]` order, with
/// `len() == input.len() + 1` positions.
#[derive(Debug, Clone)]
pub struct Lattice {
    num_states: usize,
    length: usize,
    /// Negative log of the total probability of all paths (the normalizer).
    cost: f64,
    /// Cost of all paths from a start state arriving at (ip, s).
    alpha: Vec<f64>,
    /// Cost of all paths from (ip, s) to an end state.
    beta: Vec<f64>,
    /// Posterior occupancy cost of (ip, s).
    gammas: Vec<f64>,
    /// Distribution over output symbols per input position, only built when
    /// an alphabet is supplied.
    labelings: Option<Vec<Labeling>>,
    counts: Option<ExpectedCounts>,
}

impl Lattice {
    /// Runs forward-backward over `input`, optionally constrained to emit
    /// `output`.
    ///
    /// With `increment`, the expected counts are recorded and exposed by
    /// [`Lattice::expected_counts`]; nothing is recorded for an infeasible
    /// sequence. With `alphabet`, every output symbol on a transition must be
    /// in it.
    pub fn new<T: Transducer + ?Sized>(
        transducer: &T,
        input: &[T::Input],
        output: Option<&[T::Output]>,
        increment: bool,
        alphabet: Option<&LabelAlphabet<T::Output>>,
    ) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::EmptyInput);
        }
        if let Some(output) = output {
            if output.len() != input.len() {
                return Err(Error::LengthMismatch {
                    input: input.len(),
                    output: output.len(),
                });
            }
        }

        let num_states = transducer.num_states();
        let length = input.len() + 1;
        let mut this = Self {
            num_states,
            length,
            cost: INFINITE_COST,
            alpha: vec![INFINITE_COST; length * num_states],
            beta: vec![INFINITE_COST; length * num_states],
            gammas: vec![INFINITE_COST; length * num_states],
            labelings: None,
            counts: None,
        };

        this.forward(transducer, input, output)?;
        this.cost = this.total_cost(transducer)?;
        log::debug!("lattice cost: {} (length: {})", this.cost, input.len());

        // Nothing is counted from `inf - inf`.
        if this.cost == INFINITE_COST {
            return Ok(this);
        }

        let mut counts = increment.then(|| ExpectedCounts::new(num_states));
        let mut output_counts = alphabet.map(|a| vec![0.0; (length - 1) * a.len()]);
        this.backward(
            transducer,
            input,
            output,
            counts.as_mut(),
            alphabet.zip(output_counts.as_mut()),
        )?;

        if let (Some(alphabet), Some(output_counts)) = (alphabet, output_counts) {
            let labelings: Vec<Labeling> = output_counts
                .chunks(alphabet.len().max(1))
                .take(length - 1)
                .map(|masses| Labeling::new(masses.to_vec()))
                .collect();
            for labeling in &labelings {
                debug_assert!(
                    (1.0 - labeling.sum()).abs() < 1e-6,
                    "output marginals sum to {}",
                    labeling.sum()
                );
            }
            this.labelings = Some(labelings);
        }
        this.counts = counts;
        Ok(this)
    }

    #[inline]
    fn at(&self, ip: usize, s: usize) -> usize {
        self.num_states * ip + s
    }

    fn forward<T: Transducer + ?Sized>(
        &mut self,
        transducer: &T,
        input: &[T::Input],
        output: Option<&[T::Output]>,
    ) -> Result<()> {
        let mut has_initial = false;
        for s in transducer.initial_states() {
            let i = self.at(0, s.index());
            self.alpha[i] = s.initial_cost();
            has_initial = true;
        }
        if !has_initial {
            log::warn!("there are no starting states");
        }

        for ip in 0..self.length - 1 {
            for s in 0..self.num_states {
                let alpha = self.alpha[self.at(ip, s)];
                if alpha == INFINITE_COST {
                    continue;
                }
                for t in transducer.transitions(s, Some(input), ip, output, ip)? {
                    let d = self.at(ip + 1, t.destination);
                    log::trace!(
                        "forward[{ip}][{s} -> {}] cost: {} alpha: {alpha} dest alpha: {}",
                        t.destination,
                        t.cost,
                        self.alpha[d]
                    );
                    self.alpha[d] = sum_neg_log_prob(self.alpha[d], alpha + t.cost);
                }
            }
        }
        Ok(())
    }

    fn total_cost<T: Transducer + ?Sized>(&self, transducer: &T) -> Result<f64> {
        let last = self.length - 1;
        let mut cost = INFINITE_COST;
        for s in 0..self.num_states {
            let alpha = self.alpha[self.at(last, s)];
            if alpha < INFINITE_COST {
                cost = sum_neg_log_prob(cost, alpha + transducer.state(s)?.final_cost());
            }
        }
        Ok(cost)
    }

    fn backward<T: Transducer + ?Sized>(
        &mut self,
        transducer: &T,
        input: &[T::Input],
        output: Option<&[T::Output]>,
        mut counts: Option<&mut ExpectedCounts>,
        mut labels: Option<(&LabelAlphabet<T::Output>, &mut Vec<f64>)>,
    ) -> Result<()> {
        let last = self.length - 1;
        for s in 0..self.num_states {
            let i = self.at(last, s);
            if self.alpha[i] == INFINITE_COST {
                continue;
            }
            self.beta[i] = transducer.state(s)?.final_cost();
            self.gammas[i] = self.alpha[i] + self.beta[i] - self.cost;
            if let Some(counts) = counts.as_deref_mut() {
                counts.add_final(s, probability(self.gammas[i]));
            }
        }

        for ip in (0..last).rev() {
            for s in 0..self.num_states {
                let i = self.at(ip, s);
                let alpha = self.alpha[i];
                // Betas of unreachable nodes are left infinite; their gamma is
                // infinite either way.
                if alpha == INFINITE_COST {
                    continue;
                }
                for t in transducer.transitions(s, Some(input), ip, output, ip)? {
                    let d = self.at(ip + 1, t.destination);
                    if self.alpha[d] == INFINITE_COST {
                        continue;
                    }
                    debug_assert!(!t.cost.is_nan());
                    self.beta[i] = sum_neg_log_prob(self.beta[i], self.beta[d] + t.cost);
                    log::trace!(
                        "backward[{ip}][{s} -> {}] cost: {} beta: {}",
                        t.destination,
                        t.cost,
                        self.beta[i]
                    );

                    if counts.is_none() && labels.is_none() {
                        continue;
                    }
                    let xi = alpha + t.cost + self.beta[d] - self.cost;
                    let p = probability(xi);
                    debug_assert!(!p.is_nan(), "xi[{ip}][{s}][{}] = {xi}", t.destination);
                    if let Some(counts) = counts.as_deref_mut() {
                        counts.add_transition(s, t.edge, p);
                    }
                    if let Some((alphabet, output_counts)) = labels.as_mut() {
                        // One output symbol per input position.
                        let k = alphabet
                            .lookup_index(&t.output)
                            .ok_or_else(|| Error::UnknownLabel(t.output.to_string()))?;
                        output_counts[ip * alphabet.len() + k] += p;
                    }
                }
                self.gammas[i] = alpha + self.beta[i] - self.cost;
            }
        }

        if let Some(counts) = counts {
            for s in 0..self.num_states {
                counts.add_initial(s, probability(self.gammas[self.at(0, s)]));
            }
        }
        Ok(())
    }

    /// Number of lattice positions, one more than the input length.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Always false: a lattice is built only over a non-empty input, so it
    /// has at least two positions.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Total cost of the sequence; `+inf` when no path is consistent with it.
    pub fn cost(&self) -> f64 {
        debug_assert!(!self.cost.is_nan());
        self.cost
    }

    pub fn is_feasible(&self) -> bool {
        self.cost < INFINITE_COST
    }

    pub fn alpha(&self, position: usize, state: usize) -> f64 {
        self.alpha[self.at(position, state)]
    }

    pub fn beta(&self, position: usize, state: usize) -> f64 {
        self.beta[self.at(position, state)]
    }

    /// Posterior cost of being in `state` at `position`.
    pub fn gamma_cost(&self, position: usize, state: usize) -> f64 {
        self.gammas[self.at(position, state)]
    }

    pub fn gamma_probability(&self, position: usize, state: usize) -> f64 {
        probability(self.gamma_cost(position, state))
    }

    /// Output-symbol marginals at `position`, present only when the lattice
    /// was built with an alphabet and the sequence is feasible.
    pub fn labeling_at(&self, position: usize) -> Option<&Labeling> {
        self.labelings.as_ref().and_then(|v| v.get(position))
    }

    /// Counts recorded when built with `increment` on a feasible sequence.
    pub fn expected_counts(&self) -> Option<&ExpectedCounts> {
        self.counts.as_ref()
    }
}
