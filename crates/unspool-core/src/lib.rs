//! Concurrent recursive archive extraction engine.
//!
//! `unspool-core` classifies input files by content, unpacks zip, tar,
//! tar.gz, rar and 7z containers into a destination directory (recursing
//! into tar containers found inside tar containers), bounds the number of
//! concurrently running extraction tasks, and reclaims directories left
//! empty in the watched inbox.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::Path;
//! use unspool_core::Dispatcher;
//! use unspool_core::UnpackConfig;
//!
//! let dispatcher = Dispatcher::new(UnpackConfig::default().with_concurrency(4));
//! let result = dispatcher.dispatch(Path::new("inbox/bundle.tar.gz"), Path::new("out"));
//! if result.outcome.is_success() {
//!     println!("{} handled as {}", result.source.display(), result.format);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod formats;
pub mod io;
pub mod limiter;
pub mod reaper;
pub mod report;
pub mod types;

#[doc(hidden)]
pub mod test_utils;

pub use config::SourcePolicy;
pub use config::UnpackConfig;
pub use dispatch::DispatchOutcome;
pub use dispatch::DispatchResult;
pub use dispatch::Dispatcher;
pub use dispatch::Disposal;
pub use error::ExtractionError;
pub use error::Result;
pub use formats::FormatTag;
pub use limiter::Limiter;
pub use reaper::Reaper;
pub use reaper::ReaperHandle;
pub use reaper::SweepStats;
pub use report::EntryFailure;
pub use report::ExtractionReport;
pub use report::SharedReport;
pub use types::ExtractionTask;
