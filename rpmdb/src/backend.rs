use std::fmt;
use std::fs::File;
use std::path::Path;

use tracing::debug;

use crate::bdb::BdbReader;
use crate::sqlite::SqliteReader;
use crate::{wrap_io_err, Error, ErrorKind};

/// On-disk container holding the package headers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Berkeley DB hash database, usually `/var/lib/rpm/Packages`
    BerkeleyDb,
    /// SQLite database, usually `/var/lib/rpm/rpmdb.sqlite`
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::BerkeleyDb => "Berkeley DB",
            BackendKind::Sqlite => "SQLite",
        })
    }
}

/// A serialized header as stored in the container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawBlob {
    /// Record key for Berkeley DB, rowid for SQLite
    pub key: u64,
    pub data: Vec<u8>,
}

/// A container reader yielding header blobs in container order
pub trait BlobSrc {
    fn kind(&self) -> BackendKind;

    /// Read the next blob, `None` once the container is exhausted.
    ///
    /// Each call performs only the reads needed for one record.
    fn next_blob(&mut self) -> Result<Option<RawBlob>, Error>;

    /// Restart from the first record
    fn rewind(&mut self);
}

/// Open `path`, trying SQLite first and Berkeley DB when the file is not SQLite
pub(crate) fn open(path: &Path) -> Result<Box<dyn BlobSrc + Send>, Error> {
    let file = File::open(path).map_err(wrap_io_err!(path, "Opening database"))?;
    match SqliteReader::new(file) {
        Ok(reader) => {
            debug!(path = %path.display(), "selected SQLite backend");
            return Ok(Box::new(reader));
        }
        Err(err) if err.kind() == ErrorKind::NotThisFormat => {
            debug!(path = %path.display(), %err, "SQLite backend rejected");
        }
        Err(err) => return Err(err),
    }

    let file = File::open(path).map_err(wrap_io_err!(path, "Opening database"))?;
    match BdbReader::new(file) {
        Ok(reader) => {
            debug!(path = %path.display(), "selected Berkeley DB backend");
            Ok(Box::new(reader))
        }
        Err(err) => {
            debug!(path = %path.display(), %err, "Berkeley DB backend rejected");
            Err(err)
        }
    }
}
