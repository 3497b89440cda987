//! Inference over a transducer implemented outside the crate, checked
//! against brute-force enumeration of every state sequence.

use fst_lattice::{
    fst::Transitions, sum_neg_log_prob, Capabilities, Error, LabelAlphabet, Lattice, Result, State,
    Transducer, Transition, INFINITE_COST,
};
use proptest::prelude::*;

/// A hidden Markov model read as a transducer: every transition enters a
/// state, pays the move and emission costs, and outputs the state index.
#[derive(Debug)]
struct Hmm {
    states: Vec<State>,
    moves: Vec<Vec<f64>>,
    emissions: Vec<Vec<f64>>,
}

impl Hmm {
    fn new(initial: &[f64], moves: Vec<Vec<f64>>, emissions: Vec<Vec<f64>>) -> Self {
        let states = initial
            .iter()
            .enumerate()
            .map(|(i, &c)| State::new(i, format!("s{i}"), c, 0.0))
            .collect();
        Self {
            states,
            moves,
            emissions,
        }
    }
}

impl Transducer for Hmm {
    type Input = usize;
    type Output = usize;

    fn num_states(&self) -> usize {
        self.states.len()
    }

    fn state(&self, index: usize) -> Result<&State> {
        self.states.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.states.len(),
        })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::GENERATIVE
    }

    fn transitions<'a>(
        &'a self,
        source: usize,
        input: Option<&'a [usize]>,
        input_position: usize,
        output: Option<&'a [usize]>,
        output_position: usize,
    ) -> Result<Transitions<'a, usize>> {
        let symbol = match input {
            Some(seq) => Some(*seq.get(input_position).ok_or(Error::IndexOutOfRange {
                index: input_position,
                len: seq.len(),
            })?),
            None => None,
        };
        let wanted = output.and_then(|o| o.get(output_position).copied());
        Ok(Box::new(
            (0..self.states.len())
                .filter(move |d| wanted.map_or(true, |w| w == *d))
                .map(move |d| Transition {
                    source,
                    destination: d,
                    edge: d,
                    output: d,
                    cost: self.moves[source][d] + symbol.map_or(0.0, |x| self.emissions[d][x]),
                }),
        ))
    }
}

/// Cost of every state sequence of length `input.len() + 1`.
fn enumerate_paths(hmm: &Hmm, input: &[usize]) -> Vec<(Vec<usize>, f64)> {
    let n = hmm.num_states();
    let mut paths: Vec<(Vec<usize>, f64)> =
        (0..n).map(|s| (vec![s], hmm.states[s].initial_cost())).collect();
    for &x in input {
        paths = paths
            .into_iter()
            .flat_map(|(states, cost)| {
                (0..n).map(move |d| {
                    let s = states[states.len() - 1];
                    let mut next = states.clone();
                    next.push(d);
                    (next, cost + hmm.moves[s][d] + hmm.emissions[d][x])
                })
            })
            .collect();
    }
    paths
        .into_iter()
        .map(|(states, cost)| {
            let last = states[states.len() - 1];
            let total = cost + hmm.states[last].final_cost();
            (states, total)
        })
        .collect()
}

fn weather_hmm() -> Hmm {
    Hmm::new(
        &[0.4, 1.1],
        vec![vec![0.3, 1.4], vec![0.9, 0.5]],
        vec![vec![0.2, 1.6, 2.3], vec![2.0, 1.1, 0.4]],
    )
}

#[test]
fn lattice_matches_enumeration() {
    let hmm = weather_hmm();
    let input = [0, 2, 1, 2];
    let lattice = hmm.lattice(&input, None, None).unwrap();
    let expected = enumerate_paths(&hmm, &input)
        .iter()
        .fold(INFINITE_COST, |acc, (_, c)| sum_neg_log_prob(acc, *c));
    assert!((lattice.cost() - expected).abs() < 1e-9);
}

#[test]
fn viterbi_matches_enumeration() {
    let hmm = weather_hmm();
    let input = [0, 2, 1, 2];
    let path = hmm.viterbi_path(&input, None).unwrap();
    let (states, cost) = enumerate_paths(&hmm, &input)
        .into_iter()
        .fold((Vec::new(), INFINITE_COST), |best, p| if p.1 < best.1 { p } else { best });
    assert!((path.cost() - cost).abs() < 1e-9);
    assert_eq!(path.states().unwrap(), &states[..]);
    assert_eq!(path.output().unwrap(), &states[1..]);
}

#[test]
fn output_marginals_are_state_marginals() {
    let hmm = weather_hmm();
    let alphabet = LabelAlphabet::from(vec![0, 1]);
    let input = [1, 1, 2];
    let lattice = hmm.lattice(&input, None, Some(&alphabet)).unwrap();
    for ip in 0..input.len() {
        let labeling = lattice.labeling_at(ip).unwrap();
        for d in 0..2 {
            assert!((labeling.value(d) - lattice.gamma_probability(ip + 1, d)).abs() < 1e-9);
        }
    }
}

#[test]
fn enumerate_all_transitions() {
    let hmm = weather_hmm();
    assert!(hmm.is_generative());
    let costs: Vec<f64> = hmm.all_transitions(1).unwrap().map(|t| t.cost).collect();
    assert_eq!(costs, [0.9, 0.5]);
}

#[test]
fn default_hooks_are_not_trainable() {
    let mut hmm = weather_hmm();
    assert!(!hmm.is_trainable());
    let input = [0, 1];
    assert!(matches!(
        hmm.forward_backward(&input, None, true, None),
        Err(Error::NotTrainable)
    ));
    let lattice = Lattice::new(&hmm, &input[..], None, true, None).unwrap();
    assert!(lattice.expected_counts().is_some());
    let path = hmm.viterbi_path(&input, None).unwrap();
    assert!(matches!(path.increment_transducer_counts(&mut hmm), Err(Error::NotTrainable)));
}

fn arb_hmm() -> impl Strategy<Value = Hmm> {
    (
        prop::collection::vec(0.0f64..5.0, 3),
        prop::collection::vec(prop::collection::vec(0.0f64..5.0, 3), 3),
        prop::collection::vec(prop::collection::vec(0.0f64..5.0, 2), 3),
    )
        .prop_map(|(initial, moves, emissions)| Hmm::new(&initial, moves, emissions))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn forward_backward_agrees_with_enumeration(
        hmm in arb_hmm(),
        input in prop::collection::vec(0usize..2, 1..5),
    ) {
        let paths = enumerate_paths(&hmm, &input);
        let total = paths.iter().fold(INFINITE_COST, |acc, (_, c)| sum_neg_log_prob(acc, *c));
        let best = paths.iter().map(|(_, c)| *c).fold(INFINITE_COST, f64::min);

        let lattice = hmm.lattice(&input, None, None).unwrap();
        prop_assert!((lattice.cost() - total).abs() < 1e-8);
        for ip in 0..lattice.len() {
            let sum: f64 = (0..hmm.num_states()).map(|s| lattice.gamma_probability(ip, s)).sum();
            prop_assert!((sum - 1.0).abs() < 1e-6);
        }

        let path = hmm.viterbi_path(&input, None).unwrap();
        prop_assert!((path.cost() - best).abs() < 1e-8);
        prop_assert!(path.cost() >= lattice.cost());
    }
}
