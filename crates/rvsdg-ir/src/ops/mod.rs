//! Built-in operator library.
//!
//! The minimal operator set needed by the reduction catalogue and the
//! structural nodes: bitstring constants and arithmetic, control
//! tokens, and the state-threaded memory operators. Anything beyond
//! this library is supplied by downstream crates implementing
//! [`Operator`](crate::operator::Operator).

pub mod bitstring;
pub mod control;
pub mod memory;
