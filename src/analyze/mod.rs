// src/analyze/mod.rs
//! Headline annotation: the classifier boundary and its implementations.

pub mod annotator;

pub use annotator::{annotate_or_neutral, build_annotator, Annotator, DynAnnotator};
