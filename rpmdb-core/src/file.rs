//! Reconstruction of file records from the per-file header arrays
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{Display, Formatter, Result as FmtResult};

use crate::tag;
use crate::{Error, FileFlags, Mode};

/// One file owned by a package
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileInfo {
    /// Absolute path
    pub path: String,
    /// Raw mode bits, including the file type
    pub mode: u16,
    pub size: u64,
    /// Lowercase hex digest, empty when the file has no regular content
    pub digest: String,
    pub flags: FileFlags,
    pub username: String,
    pub groupname: String,
}

impl FileInfo {
    pub fn mode_bits(&self) -> Mode {
        Mode::from_bits_retain(self.mode)
    }

    pub fn is_ghost(&self) -> bool {
        self.flags.contains(FileFlags::GHOST)
    }
}

impl Display for FileInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "path={} mode={:o} size={} digest={}",
            self.path, self.mode, self.size, self.digest
        )
    }
}

/// The parallel arrays describing a package's files.
///
/// Fields left `None` were absent from the header. Every present per-file
/// array must have one element per file.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileArrays<'a> {
    pub dir_names: &'a [String],
    pub dir_indexes: Option<&'a [u64]>,
    pub base_names: &'a [String],
    /// Absolute paths of legacy headers without `BASENAMES`
    pub old_file_names: Option<&'a [String]>,
    pub modes: Option<&'a [u64]>,
    pub sizes: Option<&'a [u64]>,
    /// 64-bit sizes, used instead of `sizes` when present
    pub long_sizes: Option<&'a [u64]>,
    pub digests: Option<&'a [String]>,
    pub flags: Option<&'a [u64]>,
    pub usernames: Option<&'a [String]>,
    pub groupnames: Option<&'a [String]>,
}

fn check_len<T>(tag: i32, array: Option<&[T]>, expected: usize) -> Result<(), Error> {
    match array {
        Some(array) if array.len() != expected => Err(Error::FileArrayMismatch {
            tag,
            expected,
            actual: array.len(),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn narrow<T: TryFrom<u64>>(tag: i32, value: u64) -> Result<T, Error> {
    T::try_from(value).map_err(|_| Error::ValueOutOfRange { tag, value })
}

/// Zip the per-file arrays into file records, in array order.
///
/// Arrays of unequal length are an error rather than being truncated to the
/// shortest. Digests are copied as given, whatever the file mode says.
pub fn assemble(arrays: &FileArrays<'_>) -> Result<Vec<FileInfo>, Error> {
    let legacy = arrays.base_names.is_empty() && arrays.old_file_names.is_some();
    let count = match arrays.old_file_names {
        Some(names) if legacy => names.len(),
        _ => arrays.base_names.len(),
    };

    if !legacy {
        if count > 0 && arrays.dir_indexes.is_none() {
            return Err(Error::MissingTag(tag::DIRINDEXES));
        }
        check_len(tag::DIRINDEXES, arrays.dir_indexes, count)?;
    }
    check_len(tag::FILEMODES, arrays.modes, count)?;
    check_len(tag::FILESIZES, arrays.sizes, count)?;
    check_len(tag::LONGFILESIZES, arrays.long_sizes, count)?;
    check_len(tag::FILEDIGESTS, arrays.digests, count)?;
    check_len(tag::FILEFLAGS, arrays.flags, count)?;
    check_len(tag::FILEUSERNAME, arrays.usernames, count)?;
    check_len(tag::FILEGROUPNAME, arrays.groupnames, count)?;

    let sizes = arrays.long_sizes.or(arrays.sizes);
    let string_at = |array: Option<&[String]>, i: usize| {
        array.map(|array| array[i].clone()).unwrap_or_default()
    };

    let mut files = Vec::with_capacity(count);
    for i in 0..count {
        let path = match (legacy, arrays.old_file_names, arrays.dir_indexes) {
            (true, Some(names), _) => names[i].clone(),
            (_, _, Some(indexes)) => {
                let index = indexes[i];
                let dir = usize::try_from(index)
                    .ok()
                    .and_then(|index| arrays.dir_names.get(index))
                    .ok_or(Error::DirIndexOutOfRange {
                        file: i,
                        index,
                        dirs: arrays.dir_names.len(),
                    })?;
                format!("{}{}", dir, arrays.base_names[i])
            }
            _ => return Err(Error::MissingTag(tag::DIRINDEXES)),
        };

        let mode = match arrays.modes {
            Some(modes) => narrow(tag::FILEMODES, modes[i])?,
            None => 0,
        };
        let flags = match arrays.flags {
            Some(flags) => narrow(tag::FILEFLAGS, flags[i])?,
            None => 0,
        };

        files.push(FileInfo {
            path,
            mode,
            size: sizes.map_or(0, |sizes| sizes[i]),
            digest: string_at(arrays.digests, i),
            flags: FileFlags::from_bits_retain(flags),
            username: string_at(arrays.usernames, i),
            groupname: string_at(arrays.groupnames, i),
        });
    }
    Ok(files)
}
