//! Tabular outputs of a run.

pub mod csv;
