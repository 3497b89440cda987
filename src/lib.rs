//! Inference over weighted finite-state transducers.
//!
//! A [`Transducer`] exposes its states and, for each state and input
//! position, the transitions consistent with the input (and optionally a
//! constraining output). On top of that single interface:
//!
//! - [`Lattice`] runs forward-backward in negative log space, giving the
//!   total cost of a sequence, posterior state marginals, per-position output
//!   marginals and expected counts for training;
//! - [`ViterbiPath`] finds the minimum-cost output sequence.
//!
//! ```
//! use fst_lattice::{TableTransducer, Transducer};
//!
//! let fst = TableTransducer::from_json(r#"{
//!     "states": [{
//!         "name": "q",
//!         "transitions": [{"output": "X", "destination": "q", "cost": 0.5}]
//!     }]
//! }"#)?;
//! let input = ["a", "b", "c"].map(String::from);
//! let path = fst.viterbi_path(&input, None)?;
//! assert_eq!(path.output().unwrap(), ["X", "X", "X"]);
//! assert!((path.cost() - 1.5).abs() < 1e-12);
//! # Ok::<(), fst_lattice::Error>(())
//! ```

pub mod alphabet;
pub mod dataset;
mod error;
pub mod evaluation;
pub mod fst;

pub use alphabet::{LabelAlphabet, Labeling};
pub use dataset::{Dataset, SequencePair};
pub use error::{Error, Result};
pub use evaluation::{Estimation, Evaluation};
pub use fst::{
    sum_neg_log_prob, Capabilities, ExpectedCounts, Lattice, State, TableTransducer, Transducer,
    Transition, ViterbiPath, INFINITE_COST, ZERO_COST,
};
