//! Track analysis engine

pub mod anomaly;
pub mod geo;
pub mod grouping;
pub mod issue;
pub mod point;
pub mod segments;
