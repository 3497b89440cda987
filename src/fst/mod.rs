pub mod cost;
pub mod lattice;
pub mod table;
pub mod transducer;
pub mod viterbi;

pub use cost::{sum_neg_log_prob, INFINITE_COST, ZERO_COST};
pub use lattice::{ExpectedCounts, Lattice};
pub use table::{StateDef, TableDef, TableTransducer, TransitionDef};
pub use transducer::{Capabilities, State, Transducer, Transition, Transitions};
pub use viterbi::{SequencePairAlignment, ViterbiPath};
