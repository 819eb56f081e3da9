//! I/O utilities for archive operations.

pub mod shared_file;

pub use shared_file::SharedFile;
