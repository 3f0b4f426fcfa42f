//! Data layer: acquisition, table parsing and caching, label alignment.
//!
//! Architecture:
//! ```text
//!   figshare API / label feed
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ figshare  │  versions → manifest → v{N}/ downloads
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  TSV(.bz2) → NumericTable / CovariateTable, parquet cache
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  align expression rows with labelled sample ids
//!   └──────────┘
//! ```

pub mod dataset;
pub mod figshare;
pub mod files;
pub mod filter;
pub mod labels;
pub mod loader;
pub mod model;
pub mod remote;
pub mod synthetic;
