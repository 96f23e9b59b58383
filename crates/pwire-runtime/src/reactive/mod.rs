#![forbid(unsafe_code)]

//! Observable data: nodes, values, and change propagation.
//!
//! # Architecture
//!
//! - [`ObservableNode`]: shared object/array with lazy child wrapping and
//!   subscriber inheritance on replacement.
//! - [`Value`]: what a node property holds.
//! - [`propagation`]: the upward notification walk and its re-entrancy
//!   guard.

pub mod node;
pub mod propagation;
pub mod value;

pub use node::{Change, MAX_ARRAY_GAP, NodeKey, ObservableNode};
pub use value::{Callable, Value, is_private_key};
