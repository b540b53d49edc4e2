pub mod kmeans;
pub mod matching;
