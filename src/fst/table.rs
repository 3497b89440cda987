use std::{collections::HashMap, fs::File, io::Read, path::Path};

use serde::{Deserialize, Serialize};

use super::{
    cost::{INFINITE_COST, ZERO_COST},
    transducer::{Capabilities, State, Transducer, Transition, Transitions},
};
use crate::{alphabet::LabelAlphabet, Error, Result};

fn zero_cost() -> Option<f64> {
    Some(ZERO_COST)
}

/// Serialized form of a [`TableTransducer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    #[serde(default = "Capabilities::empty")]
    pub capabilities: Capabilities,
    pub states: Vec<StateDef>,
}

/// A state and its outgoing transitions. A `null` cost is infinite; a
/// missing one is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDef {
    pub name: String,
    #[serde(default = "zero_cost")]
    pub initial_cost: Option<f64>,
    #[serde(default = "zero_cost")]
    pub final_cost: Option<f64>,
    #[serde(default)]
    pub transitions: Vec<TransitionDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDef {
    /// Input symbol this transition reads; `None` reads any symbol.
    #[serde(default)]
    pub input: Option<String>,
    pub output: String,
    /// Name of the destination state.
    pub destination: String,
    #[serde(default)]
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Edge {
    input: Option<String>,
    output: String,
    destination: usize,
    cost: f64,
}

impl Edge {
    #[inline]
    fn accepts(&self, symbol: &str) -> bool {
        self.input.as_deref().map_or(true, |s| s == symbol)
    }
}

/// A transducer whose transitions are listed explicitly per state.
///
/// Inputs and outputs are strings. When trainable, it keeps expected counts
/// for every initial state, final state and transition; an external
/// optimizer may read them and update the costs.
#[derive(Debug, Clone)]
pub struct TableTransducer {
    states: Vec<State>,
    /// Outgoing edges, indexed by [source][edge].
    edges: Vec<Vec<Edge>>,
    names: HashMap<String, usize>,
    capabilities: Capabilities,
    initial_counts: Vec<f64>,
    final_counts: Vec<f64>,
    edge_counts: Vec<Vec<f64>>,
}

impl TableTransducer {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            states: Vec::new(),
            edges: Vec::new(),
            names: HashMap::new(),
            capabilities,
            initial_counts: Vec::new(),
            final_counts: Vec::new(),
            edge_counts: Vec::new(),
        }
    }

    pub fn from_def(def: &TableDef) -> Result<Self> {
        let mut this = Self::new(def.capabilities);
        for s in &def.states {
            this.add_state(
                &s.name,
                s.initial_cost.unwrap_or(INFINITE_COST),
                s.final_cost.unwrap_or(INFINITE_COST),
            )?;
        }
        for (source, s) in def.states.iter().enumerate() {
            for t in &s.transitions {
                let destination = this.state_index(&t.destination).ok_or_else(|| {
                    Error::Definition(format!(
                        "state {:?} has a transition to unknown state {:?}",
                        s.name, t.destination
                    ))
                })?;
                this.add_transition(source, t.input.as_deref(), &t.output, destination, t.cost)?;
            }
        }
        log::debug!(
            "loaded transducer (states: {}, transitions: {})",
            this.num_states(),
            this.num_transitions()
        );
        Ok(this)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Self::from_def(&serde_json::from_str(s)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_def(&serde_json::from_reader(reader)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub fn to_def(&self) -> TableDef {
        let finite = |c: f64| (c < INFINITE_COST).then_some(c);
        let states = self
            .states
            .iter()
            .zip(&self.edges)
            .map(|(s, edges)| StateDef {
                name: s.name().to_string(),
                initial_cost: finite(s.initial_cost()),
                final_cost: finite(s.final_cost()),
                transitions: edges
                    .iter()
                    .map(|e| TransitionDef {
                        input: e.input.clone(),
                        output: e.output.clone(),
                        destination: self.states[e.destination].name().to_string(),
                        cost: e.cost,
                    })
                    .collect(),
            })
            .collect();
        TableDef {
            capabilities: self.capabilities,
            states,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_def())?)
    }

    /// Adds a state and returns its index. Names must be unique.
    pub fn add_state(&mut self, name: &str, initial_cost: f64, final_cost: f64) -> Result<usize> {
        if self.names.contains_key(name) {
            return Err(Error::Definition(format!("duplicate state name {name:?}")));
        }
        let index = self.states.len();
        self.states.push(State::new(index, name, initial_cost, final_cost));
        self.names.insert(name.to_string(), index);
        self.edges.push(Vec::new());
        self.initial_counts.push(0.0);
        self.final_counts.push(0.0);
        self.edge_counts.push(Vec::new());
        Ok(index)
    }

    /// Adds a transition and returns its edge index within `source`.
    pub fn add_transition(
        &mut self,
        source: usize,
        input: Option<&str>,
        output: &str,
        destination: usize,
        cost: f64,
    ) -> Result<usize> {
        self.check_state(destination)?;
        self.check_state(source)?;
        let edges = &mut self.edges[source];
        edges.push(Edge {
            input: input.map(str::to_string),
            output: output.to_string(),
            destination,
            cost,
        });
        self.edge_counts[source].push(0.0);
        Ok(edges.len() - 1)
    }

    fn check_state(&self, index: usize) -> Result<()> {
        if index < self.states.len() {
            Ok(())
        } else {
            Err(Error::IndexOutOfRange {
                index,
                len: self.states.len(),
            })
        }
    }

    fn edge_mut(&mut self, source: usize, edge: usize) -> Result<&mut Edge> {
        self.check_state(source)?;
        let edges = &mut self.edges[source];
        let len = edges.len();
        edges.get_mut(edge).ok_or(Error::IndexOutOfRange { index: edge, len })
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn num_transitions(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn set_initial_cost(&mut self, state: usize, cost: f64) -> Result<()> {
        self.check_state(state)?;
        self.states[state].set_initial_cost(cost);
        Ok(())
    }

    pub fn set_final_cost(&mut self, state: usize, cost: f64) -> Result<()> {
        self.check_state(state)?;
        self.states[state].set_final_cost(cost);
        Ok(())
    }

    pub fn transition_cost(&self, source: usize, edge: usize) -> Option<f64> {
        self.edges.get(source)?.get(edge).map(|e| e.cost)
    }

    pub fn set_transition_cost(&mut self, source: usize, edge: usize, cost: f64) -> Result<()> {
        self.edge_mut(source, edge)?.cost = cost;
        Ok(())
    }

    /// Every output symbol, in order of first appearance.
    pub fn output_alphabet(&self) -> LabelAlphabet<String> {
        self.edges.iter().flatten().map(|e| e.output.clone()).collect()
    }

    /// Turning training on clears the counters.
    pub fn set_trainable(&mut self, trainable: bool) {
        if trainable {
            self.reset_counts();
        }
        self.capabilities.set(Capabilities::TRAINABLE, trainable);
    }

    pub fn reset_counts(&mut self) {
        self.initial_counts.iter_mut().for_each(|c| *c = 0.0);
        self.final_counts.iter_mut().for_each(|c| *c = 0.0);
        self.edge_counts.iter_mut().flatten().for_each(|c| *c = 0.0);
    }

    pub fn initial_count(&self, state: usize) -> f64 {
        self.initial_counts.get(state).copied().unwrap_or_default()
    }

    pub fn final_count(&self, state: usize) -> f64 {
        self.final_counts.get(state).copied().unwrap_or_default()
    }

    pub fn transition_count(&self, source: usize, edge: usize) -> f64 {
        self.edge_counts
            .get(source)
            .and_then(|row| row.get(edge))
            .copied()
            .unwrap_or_default()
    }

    fn ensure_trainable(&self) -> Result<()> {
        if self.is_trainable() {
            Ok(())
        } else {
            Err(Error::NotTrainable)
        }
    }
}

impl Transducer for TableTransducer {
    type Input = String;
    type Output = String;

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
        self.capabilities
    }

    fn transitions<'a>(
        &'a self,
        source: usize,
        input: Option<&'a [String]>,
        input_position: usize,
        output: Option<&'a [String]>,
        output_position: usize,
    ) -> Result<Transitions<'a, String>> {
        self.check_state(source)?;
        let symbol = match input {
            Some(seq) => Some(seq.get(input_position).ok_or(Error::IndexOutOfRange {
                index: input_position,
                len: seq.len(),
            })?),
            None if self.can_iterate_all_transitions() => None,
            None => return Err(Error::NotGenerative),
        };
        let wanted = match output {
            Some(seq) => Some(seq.get(output_position).ok_or(Error::IndexOutOfRange {
                index: output_position,
                len: seq.len(),
            })?),
            None => None,
        };
        Ok(Box::new(
            self.edges[source]
                .iter()
                .enumerate()
                .filter(move |(_, e)| symbol.map_or(true, |s| e.accepts(s)))
                .filter(move |(_, e)| wanted.map_or(true, |w| e.output == *w))
                .map(move |(edge, e)| Transition {
                    source,
                    destination: e.destination,
                    edge,
                    output: e.output.clone(),
                    cost: e.cost,
                }),
        ))
    }

    fn increment_initial_count(&mut self, state: usize, count: f64) -> Result<()> {
        self.ensure_trainable()?;
        self.check_state(state)?;
        self.initial_counts[state] += count;
        Ok(())
    }

    fn increment_final_count(&mut self, state: usize, count: f64) -> Result<()> {
        self.ensure_trainable()?;
        self.check_state(state)?;
        self.final_counts[state] += count;
        Ok(())
    }

    fn increment_transition_count(&mut self, source: usize, edge: usize, count: f64) -> Result<()> {
        self.ensure_trainable()?;
        self.edge_mut(source, edge)?;
        self.edge_counts[source][edge] += count;
        Ok(())
    }
}
