//! Types describing container entries before they touch the filesystem.
//!
//! Entry paths are validated on construction; an [`EntryPath`] can only be
//! obtained through [`EntryPath::parse`], so a value of that type always
//! resolves inside the destination it is joined to.

pub mod entry_path;
pub mod entry_type;
pub mod task;

pub use entry_path::EntryPath;
pub use entry_type::EntryKind;
pub use task::ExtractionTask;
