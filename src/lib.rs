//! Mutation-status classification of tumour expression profiles.
//!
//! [`data`] fetches and caches the figshare dataset, [`learn`] holds the
//! estimators, and [`classifier`] runs a train/test evaluation that ends in a
//! [`report::Report`].

pub mod classifier;
pub mod config;
pub mod data;
pub mod error;
pub mod learn;
pub mod logging;
pub mod metrics;
pub mod report;

pub use classifier::{classify, CognomlClassifier};
pub use config::Config;
pub use report::Report;
