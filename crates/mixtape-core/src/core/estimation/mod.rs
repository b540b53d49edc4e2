pub mod propagation;
pub mod transitions;
pub mod wells;
