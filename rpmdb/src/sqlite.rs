//! Reader for the SQLite databases used by rpm since 4.16.
//!
//! The file is parsed directly: the schema table on page 1 locates the
//! `Packages` table, whose b-tree is then walked in rowid order. Only the
//! `blob` column is read. A pending write-ahead log is not replayed.
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, trace};

use crate::{wrap_io_err, BackendKind, BlobSrc, Error, RawBlob};

mod record;

pub use self::record::{parse_record, varint, Column, TableSchema};

const BACKEND: BackendKind = BackendKind::Sqlite;

pub const SIGNATURE: &[u8; 16] = b"SQLite format 3\0";
pub const FILE_HEADER_SIZE: usize = 100;
pub const PACKAGES_TABLE: &str = "Packages";
pub const BLOB_COLUMN: &str = "blob";

/// B-tree page types
pub const INTERIOR_TABLE: u8 = 5;
pub const LEAF_TABLE: u8 = 13;

/// Bytes of payload stored on the b-tree page itself, the rest overflows
pub fn local_payload(payload: usize, usable: usize) -> usize {
    let max_local = usable - 35;
    if payload <= max_local {
        return payload;
    }
    let min_local = (usable - 12) * 32 / 255 - 23;
    let local = min_local + (payload - min_local) % (usable - 4);
    if local <= max_local {
        local
    } else {
        min_local
    }
}

/// Page access with bounds and overflow handling
struct Pager<R> {
    src: R,
    page_size: usize,
    usable: usize,
    page_count: u32,
}

impl<R: Read + Seek> Pager<R> {
    fn read_page(&mut self, pgno: u32) -> Result<Vec<u8>, Error> {
        if pgno == 0 || pgno > self.page_count {
            return Err(Error::corrupt(
                BACKEND,
                format!("page {} out of range 1..={}", pgno, self.page_count),
            ));
        }
        let mut page = vec![0; self.page_size];
        self.src
            .seek(SeekFrom::Start(u64::from(pgno - 1) * self.page_size as u64))
            .map_err(wrap_io_err!("Seeking page"))?;
        self.src
            .read_exact(&mut page)
            .map_err(wrap_io_err!("Reading page"))?;
        Ok(page)
    }

    /// Read a leaf cell at `offset` in `page`, returning its rowid and payload
    fn leaf_cell(&mut self, pgno: u32, page: &[u8], offset: usize) -> Result<(i64, Vec<u8>), Error> {
        let bad_cell = || Error::corrupt(BACKEND, format!("page {} has a malformed cell", pgno));
        let cell = page.get(offset..self.usable).ok_or_else(bad_cell)?;

        let (payload_len, n1) = varint(cell).ok_or_else(bad_cell)?;
        let (rowid, n2) = varint(&cell[n1..]).ok_or_else(bad_cell)?;
        let payload_len = usize::try_from(payload_len).map_err(|_| bad_cell())?;
        let start = n1 + n2;

        let local = local_payload(payload_len, self.usable);
        let local_end = start.checked_add(local).ok_or_else(bad_cell)?;
        let room = (self.page_count as usize).saturating_mul(self.usable - 4);
        if payload_len - local > room {
            return Err(bad_cell());
        }
        let mut payload = Vec::with_capacity(payload_len);
        payload.extend_from_slice(cell.get(start..local_end).ok_or_else(bad_cell)?);

        if local < payload_len {
            let next = cell.get(local_end..local_end + 4).ok_or_else(bad_cell)?;
            let first = u32::from_be_bytes([next[0], next[1], next[2], next[3]]);
            self.read_overflow(first, payload_len - local, &mut payload)?;
        }
        Ok((rowid as i64, payload))
    }

    /// Append `len` bytes from the overflow chain starting at `pgno`
    fn read_overflow(&mut self, mut pgno: u32, mut len: usize, payload: &mut Vec<u8>) -> Result<(), Error> {
        let mut seen = HashSet::new();
        while len > 0 {
            if pgno == 0 || pgno > self.page_count {
                return Err(Error::corrupt(
                    BACKEND,
                    format!("dangling overflow page {}", pgno),
                ));
            }
            if !seen.insert(pgno) {
                return Err(Error::corrupt(
                    BACKEND,
                    format!("overflow chain loops at page {}", pgno),
                ));
            }
            let page = self.read_page(pgno)?;
            let take = len.min(self.usable - 4);
            payload.extend_from_slice(&page[4..4 + take]);
            len -= take;
            pgno = u32::from_be_bytes([page[0], page[1], page[2], page[3]]);
        }
        Ok(())
    }
}

/// A b-tree page being walked
struct Frame {
    pgno: u32,
    page: Vec<u8>,
    leaf: bool,
    cells: Vec<usize>,
    next: usize,
    right: Option<u32>,
}

impl Frame {
    fn load<R: Read + Seek>(pager: &mut Pager<R>, pgno: u32) -> Result<Frame, Error> {
        let page = pager.read_page(pgno)?;
        let bad_page = |reason: &str| Error::corrupt(BACKEND, format!("page {} {}", pgno, reason));

        let base = if pgno == 1 { FILE_HEADER_SIZE } else { 0 };
        let leaf = match page[base] {
            LEAF_TABLE => true,
            INTERIOR_TABLE => false,
            kind => return Err(bad_page(&format!("has type {}, expected a table b-tree page", kind))),
        };
        let header_len = if leaf { 8 } else { 12 };
        let count = usize::from(u16::from_be_bytes([page[base + 3], page[base + 4]]));
        let right = (!leaf).then(|| {
            u32::from_be_bytes([page[base + 8], page[base + 9], page[base + 10], page[base + 11]])
        });

        let pointers = page
            .get(base + header_len..base + header_len + count * 2)
            .ok_or_else(|| bad_page("has too many cells"))?;
        let mut cells = Vec::with_capacity(count);
        for pointer in pointers.chunks_exact(2) {
            let offset = usize::from(u16::from_be_bytes([pointer[0], pointer[1]]));
            if offset < base + header_len + count * 2 || offset >= pager.usable {
                return Err(bad_page("has a cell pointer out of range"));
            }
            cells.push(offset);
        }

        Ok(Frame {
            pgno,
            page,
            leaf,
            cells,
            next: 0,
            right,
        })
    }
}

/// In-order walk over the rows of one table b-tree
struct TableCursor {
    root: u32,
    stack: Vec<Frame>,
    visited: HashSet<u32>,
    started: bool,
}

impl TableCursor {
    fn new(root: u32) -> TableCursor {
        TableCursor {
            root,
            stack: Vec::new(),
            visited: HashSet::new(),
            started: false,
        }
    }

    fn rewind(&mut self) {
        self.stack.clear();
        self.visited.clear();
        self.started = false;
    }

    fn push<R: Read + Seek>(&mut self, pager: &mut Pager<R>, pgno: u32) -> Result<(), Error> {
        if !self.visited.insert(pgno) {
            return Err(Error::corrupt(
                BACKEND,
                format!("b-tree page {} is reachable twice", pgno),
            ));
        }
        self.stack.push(Frame::load(pager, pgno)?);
        Ok(())
    }

    fn next<R: Read + Seek>(&mut self, pager: &mut Pager<R>) -> Result<Option<(i64, Vec<u8>)>, Error> {
        if !self.started {
            self.started = true;
            self.push(pager, self.root)?;
        }

        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };

            if frame.next < frame.cells.len() {
                let offset = frame.cells[frame.next];
                frame.next += 1;
                if frame.leaf {
                    return pager.leaf_cell(frame.pgno, &frame.page, offset).map(Some);
                }
                let child = frame
                    .page
                    .get(offset..offset + 4)
                    .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
                    .ok_or_else(|| {
                        Error::corrupt(BACKEND, format!("page {} has a malformed cell", frame.pgno))
                    })?;
                self.push(pager, child)?;
            } else if let Some(right) = frame.right.take() {
                self.push(pager, right)?;
            } else {
                self.stack.pop();
            }
        }
    }
}

/// Lazy reader over the `blob` column of the `Packages` table
pub struct SqliteReader<R> {
    pager: Pager<R>,
    schema: TableSchema,
    blob_column: usize,
    cursor: TableCursor,
}

impl<R: Read + Seek> SqliteReader<R> {
    /// Validate the file header and locate the `Packages` table
    pub fn new(mut src: R) -> Result<SqliteReader<R>, Error> {
        let len = src
            .seek(SeekFrom::End(0))
            .map_err(wrap_io_err!("Seeking end of database"))?;
        let mut header = [0; FILE_HEADER_SIZE];
        if len < FILE_HEADER_SIZE as u64 {
            return Err(Error::NotThisFormat {
                backend: BACKEND,
                reason: "file too short",
            });
        }
        src.seek(SeekFrom::Start(0))
            .map_err(wrap_io_err!("Seeking file header"))?;
        src.read_exact(&mut header)
            .map_err(wrap_io_err!("Reading file header"))?;

        if &header[..16] != SIGNATURE {
            return Err(Error::NotThisFormat {
                backend: BACKEND,
                reason: "signature mismatch",
            });
        }

        let page_size = match u16::from_be_bytes([header[16], header[17]]) {
            1 => 65536,
            size => usize::from(size),
        };
        if !page_size.is_power_of_two() || !(512..=65536).contains(&page_size) {
            return Err(Error::corrupt(BACKEND, format!("invalid page size {}", page_size)));
        }
        let usable = page_size - usize::from(header[20]);
        if usable < 480 {
            return Err(Error::corrupt(BACKEND, format!("usable page size {} too small", usable)));
        }
        let encoding = u32::from_be_bytes([header[56], header[57], header[58], header[59]]);
        if encoding != 1 {
            return Err(Error::unsupported(BACKEND, format!("text encoding {}", encoding)));
        }
        if len % page_size as u64 != 0 {
            return Err(Error::corrupt(
                BACKEND,
                format!("file length {} is not a multiple of the page size {}", len, page_size),
            ));
        }
        let page_count = u32::try_from(len / page_size as u64)
            .map_err(|_| Error::corrupt(BACKEND, "too many pages"))?;

        let mut pager = Pager {
            src,
            page_size,
            usable,
            page_count,
        };
        let (root, schema) = find_table(&mut pager, PACKAGES_TABLE)?;
        let blob_column = schema.column(BLOB_COLUMN).ok_or(Error::NotThisFormat {
            backend: BACKEND,
            reason: "Packages table has no blob column",
        })?;
        debug!(
            root,
            page_size,
            columns = ?schema.columns,
            rowid_alias = ?schema.rowid_alias,
            "found Packages table"
        );

        Ok(SqliteReader {
            pager,
            schema,
            blob_column,
            cursor: TableCursor::new(root),
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.pager.page_size
    }
}

/// Look up `name` in the schema table, returning its root page and columns
fn find_table<R: Read + Seek>(pager: &mut Pager<R>, name: &str) -> Result<(u32, TableSchema), Error> {
    let mut cursor = TableCursor::new(1);
    while let Some((rowid, payload)) = cursor.next(pager)? {
        let bad_row = || Error::corrupt(BACKEND, format!("schema row {} is malformed", rowid));
        let columns = parse_record(&payload).ok_or_else(bad_row)?;
        let text = |i: usize| columns.get(i).and_then(Column::as_text);

        if text(0) != Some("table") || text(1) != Some(name) {
            continue;
        }
        let root = match columns.get(3) {
            Some(Column::Int(root)) => u32::try_from(*root).map_err(|_| bad_row())?,
            _ => return Err(bad_row()),
        };
        let schema = text(4).and_then(TableSchema::parse).ok_or_else(bad_row)?;
        return Ok((root, schema));
    }
    Err(Error::NotThisFormat {
        backend: BACKEND,
        reason: "no Packages table",
    })
}

impl<R: Read + Seek> BlobSrc for SqliteReader<R> {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    fn next_blob(&mut self) -> Result<Option<RawBlob>, Error> {
        let Some((rowid, payload)) = self.cursor.next(&mut self.pager)? else {
            return Ok(None);
        };
        let columns = parse_record(&payload)
            .ok_or_else(|| Error::corrupt(BACKEND, format!("row {} is malformed", rowid)))?;
        match columns.get(self.blob_column) {
            Some(Column::Blob(data)) => {
                trace!(key = rowid, len = data.len(), "read SQLite row");
                Ok(Some(RawBlob {
                    key: rowid as u64,
                    data: data.to_vec(),
                }))
            }
            _ => Err(Error::corrupt(
                BACKEND,
                format!("row {} has no blob in column {}", rowid, BLOB_COLUMN),
            )),
        }
    }

    fn rewind(&mut self) {
        self.cursor.rewind();
    }
}
