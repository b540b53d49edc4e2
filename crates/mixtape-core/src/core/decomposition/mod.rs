pub mod deflation;
pub mod speigh;
