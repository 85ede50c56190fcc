mod backend;
pub mod bdb;
mod bin;
mod error;
pub mod sqlite;

pub use backend::{BackendKind, BlobSrc, RawBlob};
pub use bin::*;
pub use error::{Error, ErrorKind};

pub use rpmdb_core::{DigestAlgorithm, FileFlags, FileInfo, Header, Mode, PackageInfo};

use std::path::{Path, PathBuf};

use tracing::trace;

/// An opened package database of either supported format
pub struct RpmDb {
    path: PathBuf,
    src: Box<dyn BlobSrc + Send>,
}

impl RpmDb {
    /// Open the database at `path`, detecting its format.
    ///
    /// SQLite is tried first. Any error other than the file not being SQLite
    /// is returned without trying Berkeley DB.
    pub fn open(path: impl AsRef<Path>) -> Result<RpmDb, Error> {
        let path = path.as_ref().to_path_buf();
        let src = backend::open(&path)?;
        Ok(RpmDb { path, src })
    }

    /// Wrap an already constructed reader
    pub fn from_src(path: impl AsRef<Path>, src: Box<dyn BlobSrc + Send>) -> RpmDb {
        RpmDb {
            path: path.as_ref().to_path_buf(),
            src,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.src.kind()
    }

    /// Raw header blobs in container order, starting from the first record
    pub fn blobs(&mut self) -> Blobs<'_> {
        self.src.rewind();
        Blobs {
            src: self.src.as_mut(),
            done: false,
        }
    }

    /// Packages in container order, decoded one record at a time
    pub fn packages(&mut self) -> Packages<'_> {
        Packages {
            blobs: self.blobs(),
        }
    }

    /// Decode every package, failing on the first bad record
    pub fn list_packages(&mut self) -> Result<Vec<PackageInfo>, Error> {
        self.packages().collect()
    }
}

/// Iterator over the raw blobs of a database; stops after the first error
pub struct Blobs<'a> {
    src: &'a mut (dyn BlobSrc + Send),
    done: bool,
}

impl Iterator for Blobs<'_> {
    type Item = Result<RawBlob, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.src.next_blob() {
            Ok(Some(blob)) => Some(Ok(blob)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Iterator over the packages of a database; stops after the first error
pub struct Packages<'a> {
    blobs: Blobs<'a>,
}

impl Iterator for Packages<'_> {
    type Item = Result<PackageInfo, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let blob = match self.blobs.next()? {
            Ok(blob) => blob,
            Err(err) => return Some(Err(err)),
        };
        let package = PackageInfo::parse(&blob.data).map_err(|source| Error::Record {
            key: blob.key,
            source,
        });
        match &package {
            Ok(package) => trace!(key = blob.key, package = %package, "decoded package"),
            Err(_) => self.blobs.done = true,
        }
        Some(package)
    }
}
