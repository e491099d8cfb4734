pub mod pool;
pub mod probe;

pub use pool::{EgressPath, EgressPool, Outcome};
