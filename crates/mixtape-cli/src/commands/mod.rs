pub mod components;
pub mod msm;
