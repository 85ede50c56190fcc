#![no_std]
extern crate alloc;

pub use crate::entry::{EntryInfo, IndexEntry, Value};
pub use crate::error::Error;
pub use crate::file::{FileArrays, FileInfo};
pub use crate::flags::{DigestAlgorithm, FileFlags, Mode};
pub use crate::header::{Header, ENTRY_INFO_SIZE, HEADER_MAX_BYTES};
pub use crate::package::PackageInfo;
pub use crate::tag::Type;

mod entry;
mod error;
pub mod file;
mod flags;
pub mod header;
mod package;
pub mod tag;
