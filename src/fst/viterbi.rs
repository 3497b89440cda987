use std::fmt::Display;

use super::{cost::INFINITE_COST, transducer::Transducer};
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct ViterbiNode<O> {
    delta: f64,
    /// State of the minimum-cost predecessor in the previous column.
    predecessor: Option<usize>,
    /// Output emitted on the transition from the predecessor.
    output: Option<O>,
}

impl<O> ViterbiNode<O> {
    fn new() -> Self {
        Self {
            delta: INFINITE_COST,
            predecessor: None,
            output: None,
        }
    }
}

/// Tags the states by tracing the backward links from `last` in the final
/// column.
fn backtrack<O>(nodes: &mut [ViterbiNode<O>], num_states: usize, last: usize) -> Result<(Vec<usize>, Vec<O>)> {
    let length = nodes.len() / num_states;
    let mut states = vec![0; length];
    let mut output = Vec::with_capacity(length - 1);
    let mut s = last;
    for ip in (1..length).rev() {
        states[ip] = s;
        let node = &mut nodes[num_states * ip + s];
        match (node.predecessor, node.output.take()) {
            (Some(p), Some(o)) => {
                output.push(o);
                s = p;
            }
            _ => return Err(Error::MissingBackPointer { position: ip }),
        }
    }
    states[0] = s;
    output.reverse();
    Ok((states, output))
}

/// Output sequence and cost of a path, without state information.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencePairAlignment<O> {
    pub output: Vec<O>,
    pub cost: f64,
}

/// Minimum-cost path through a transducer for one input sequence.
#[derive(Debug, Clone)]
pub struct ViterbiPath<'a, I, O> {
    input: &'a [I],
    provided_output: Option<&'a [O]>,
    cost: f64,
    /// `input.len() + 1` states; empty when no path exists.
    states: Vec<usize>,
    /// `input.len()` symbols; empty when no path exists.
    output: Vec<O>,
}

impl<'a, I, O: Clone + PartialEq + Display> ViterbiPath<'a, I, O> {
    /// Finds the best path for `input`, optionally constrained to `output`.
    ///
    /// An input with no consistent path is not an error: the path has an
    /// infinite cost and no output.
    pub fn new<T>(transducer: &T, input: &'a [I], output: Option<&'a [O]>) -> Result<Self>
    where
        T: Transducer<Input = I, Output = O> + ?Sized,
    {
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
        let mut nodes: Vec<ViterbiNode<O>> = (0..length * num_states).map(|_| ViterbiNode::new()).collect();

        let mut has_initial = false;
        for s in transducer.initial_states() {
            nodes[s.index()].delta = s.initial_cost();
            has_initial = true;
        }
        if !has_initial {
            log::warn!("there are no starting states");
        }

        for ip in 0..length - 1 {
            for s in 0..num_states {
                let delta = nodes[num_states * ip + s].delta;
                if delta == INFINITE_COST {
                    continue;
                }
                for t in transducer.transitions(s, Some(input), ip, output, ip)? {
                    let mut cost = delta + t.cost;
                    // Final costs only count on the way into the last column.
                    if ip == length - 2 {
                        cost += transducer.state(t.destination)?.final_cost();
                    }
                    let node = &mut nodes[num_states * (ip + 1) + t.destination];
                    if cost < node.delta {
                        log::trace!("viterbi[{ip}][{s} -> {}] cost reduced to {cost}", t.destination);
                        node.delta = cost;
                        node.predecessor = Some(s);
                        node.output = Some(t.output);
                    }
                }
            }
        }

        /* Find the node in the last column with the minimum cost. */
        let last = length - 1;
        let mut cost = INFINITE_COST;
        let mut best = None;
        for s in 0..num_states {
            let delta = nodes[num_states * last + s].delta;
            if delta < cost {
                cost = delta;
                best = Some(s);
            }
        }
        log::debug!("viterbi cost: {cost} (length: {})", input.len());

        let (states, path_output) = match best {
            Some(s) => backtrack(&mut nodes, num_states, s)?,
            None => (Vec::new(), Vec::new()),
        };

        Ok(Self {
            input,
            provided_output: output,
            cost,
            states,
            output: path_output,
        })
    }

    /// Cost of the best path; `+inf` when none exists.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn is_feasible(&self) -> bool {
        self.cost < INFINITE_COST
    }

    pub fn input(&self) -> &'a [I] {
        self.input
    }

    /// The emitted symbols, one per input item.
    pub fn output(&self) -> Option<&[O]> {
        self.is_feasible().then_some(self.output.as_slice())
    }

    /// The visited states, one per lattice position.
    pub fn states(&self) -> Option<&[usize]> {
        self.is_feasible().then_some(self.states.as_slice())
    }

    pub fn alignment(&self) -> Option<SequencePairAlignment<O>> {
        self.output().map(|output| SequencePairAlignment {
            output: output.to_vec(),
            cost: self.cost,
        })
    }

    /// Fraction of positions whose output is textually equal to the reference.
    ///
    /// A path that does not exist gets every position wrong.
    pub fn token_accuracy(&self, reference: &[O]) -> Result<f64> {
        if reference.len() != self.input.len() {
            return Err(Error::LengthMismatch {
                input: self.input.len(),
                output: reference.len(),
            });
        }
        let correct = self
            .output
            .iter()
            .zip(reference)
            .filter(|(p, r)| p.to_string() == r.to_string())
            .count();
        log::info!("number correct: {correct} out of {}", reference.len());
        Ok(correct as f64 / reference.len() as f64)
    }

    /// Counts this path once in the transducer ("Viterbi training").
    ///
    /// Every step must be matched by exactly one transition with the same
    /// destination and output; nothing is incremented otherwise.
    pub fn increment_transducer_counts<T>(&self, transducer: &mut T) -> Result<()>
    where
        T: Transducer<Input = I, Output = O> + ?Sized,
    {
        if !self.is_feasible() {
            return Err(Error::NoPath);
        }

        let mut edges = Vec::with_capacity(self.output.len());
        for ip in 0..self.output.len() {
            let (source, destination) = (self.states[ip], self.states[ip + 1]);
            let matches: Vec<usize> = transducer
                .transitions(source, Some(self.input), ip, self.provided_output, ip)?
                .filter(|t| t.destination == destination && t.output == self.output[ip])
                .map(|t| t.edge)
                .collect();
            match matches.as_slice() {
                [edge] => edges.push((source, *edge)),
                [] => return Err(Error::NoMatchingTransition { position: ip }),
                _ => {
                    return Err(Error::AmbiguousTransition {
                        position: ip,
                        count: matches.len(),
                    })
                }
            }
        }

        transducer.increment_initial_count(self.states[0], 1.0)?;
        transducer.increment_final_count(self.states[self.states.len() - 1], 1.0)?;
        for (source, edge) in edges {
            transducer.increment_transition_count(source, edge, 1.0)?;
        }
        Ok(())
    }
}
