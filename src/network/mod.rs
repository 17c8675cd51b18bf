//! Random recurrent network: description, sparse storage and weights.
//!
//! - `spec`: size, density, synaptic scale and plastic fraction
//! - `sparse`: CSR storage for the recurrent matrix
//! - `weights`: initialization and the serialized training write path

pub mod sparse;
pub mod spec;
pub mod weights;

pub use sparse::CsrMatrix;
pub use spec::NetworkSpec;
pub use weights::{initialize_weights, RecurrentDelta, RowDelta, Weights};
