//! stubsearch core library: searches for ambient declaration patches that
//! reduce a TypeScript project's type-check diagnostics, using the checker
//! itself as the oracle.
//!
//! The main entry point is [`pipeline::SearchRunner`], which runs
//! [`pipeline::ProjectSearch`] over many projects and appends each result to
//! a [`store::TrialLog`]. The [`rerank`] module trains and applies the
//! pairwise model that orders candidates before they are tried.

pub mod adapter;
pub mod candidates;
pub mod config;
pub mod decl;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod localize;
pub mod oracle;
pub mod pipeline;
pub mod progress;
pub mod rerank;
pub mod selection;
pub mod store;
pub mod stub;
pub mod trial;
pub mod types;
