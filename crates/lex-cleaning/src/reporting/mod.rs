//! Report generation module.
//!
//! This module assembles the terminal [`Report`](crate::types::Report) of a
//! run and writes run artifacts to disk:
//! - `{base}_report.json`: the pretty-printed report (`--emit-report`)
//! - `{base}_cleaned.csv`: the cleaned dataset
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_cleaning::reporting::ReportGenerator;
//!
//! let generator = ReportGenerator::new(PathBuf::from("output"));
//! generator.write_report_to_file(&outcome.report, "customers")?;
//! generator.write_dataset_csv(&mut outcome.dataset, "customers")?;
//! ```

mod generator;

pub use generator::{ReportGenerator, ReportParams};
