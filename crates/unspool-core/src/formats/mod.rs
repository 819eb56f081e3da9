//! Format detection and per-format unpackers.

pub mod common;
pub mod detect;
pub mod rar;
pub mod sevenz;
pub mod tar;
pub mod traits;
pub mod zip;

pub use detect::FormatTag;
pub use detect::detect_path;
pub use detect::detect_reader;
pub use detect::sniff;
pub use rar::CommandUnpacker;
pub use sevenz::SevenZUnpacker;
pub use self::tar::TarUnpacker;
pub use traits::DelegatedUnpacker;
pub use self::zip::ZipUnpacker;
