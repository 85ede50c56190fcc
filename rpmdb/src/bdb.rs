//! Reader for the Berkeley DB hash databases used by rpm up to 4.16.
//!
//! Only the parts of the format rpm relies on are read: the hash metadata
//! page, hash pages holding key/value pairs, and the overflow pages that hold
//! every package header. Values stored inline are not package headers and
//! are skipped.
use std::collections::{HashSet, VecDeque};
use std::io::{Read, Seek, SeekFrom};
use std::mem;

use bytemuck::{Pod, Zeroable};
use tracing::trace;

use crate::{wrap_io_err, BackendKind, BlobSrc, Error, RawBlob};

const BACKEND: BackendKind = BackendKind::BerkeleyDb;
/// End of the magic number within the metadata page
const MAGIC_END: usize = 16;

pub const HASH_MAGIC: u32 = 0x061561;
pub const BTREE_MAGIC: u32 = 0x053162;
pub const QUEUE_MAGIC: u32 = 0x042253;
pub const HEAP_MAGIC: u32 = 0x074582;

pub const MIN_PAGE_SIZE: u32 = 512;
pub const MAX_PAGE_SIZE: u32 = 64 * 1024;

/// Page types
pub const P_HASH_UNSORTED: u8 = 2;
pub const P_OVERFLOW: u8 = 7;
pub const P_HASHMETA: u8 = 8;
pub const P_HASH: u8 = 13;

/// Hash item types
pub const H_KEYDATA: u8 = 1;
pub const H_DUPLICATE: u8 = 2;
pub const H_OFFPAGE: u8 = 3;
pub const H_OFFDUP: u8 = 4;

/// Size of an `H_OFFPAGE` item
pub const OFFPAGE_SIZE: usize = 12;

pub const META_SIZE: usize = mem::size_of::<MetaPage>();
pub const PAGE_HEADER_SIZE: usize = mem::size_of::<PageHeader>();

/// Generic metadata at the start of page 0, fields in database byte order
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(packed, C)]
pub struct MetaPage {
    pub lsn: [u8; 8],
    pub pgno: u32,
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    pub encrypt_alg: u8,
    pub kind: u8,
    pub meta_flags: u8,
    pub unused: u8,
    pub free: u32,
    pub last_pgno: u32,
    pub nparts: u32,
    pub key_count: u32,
    pub record_count: u32,
    pub flags: u32,
    pub uid: [u8; 20],
}

/// Header of every page but the metadata page, fields in database byte order
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(packed, C)]
pub struct PageHeader {
    pub lsn: [u8; 8],
    pub pgno: u32,
    pub prev_pgno: u32,
    pub next_pgno: u32,
    pub entries: u16,
    /// Free space offset; on overflow pages the count of used bytes
    pub hf_offset: u16,
    pub level: u8,
    pub kind: u8,
}

/// Byte order of a database, decided by its magic
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    fn detect(raw: [u8; 4]) -> Result<Endian, Error> {
        let (le, be) = (u32::from_le_bytes(raw), u32::from_be_bytes(raw));
        if le == HASH_MAGIC {
            return Ok(Endian::Little);
        }
        if be == HASH_MAGIC {
            return Ok(Endian::Big);
        }
        for magic in [le, be] {
            let layout = match magic {
                BTREE_MAGIC => "btree",
                QUEUE_MAGIC => "queue",
                HEAP_MAGIC => "heap",
                _ => continue,
            };
            return Err(Error::unsupported(BACKEND, format!("{} access method", layout)));
        }
        Err(Error::NotThisFormat {
            backend: BACKEND,
            reason: "unknown magic",
        })
    }

    /// Convert a field read in native order
    pub fn u32(self, value: u32) -> u32 {
        match self {
            Endian::Little => u32::from_le(value),
            Endian::Big => u32::from_be(value),
        }
    }

    pub fn u16(self, value: u16) -> u16 {
        match self {
            Endian::Little => u16::from_le(value),
            Endian::Big => u16::from_be(value),
        }
    }

    fn read_u16(self, bytes: &[u8]) -> u16 {
        self.u16(u16::from_ne_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(self, bytes: &[u8]) -> u32 {
        self.u32(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// A value stored on a chain of overflow pages
#[derive(Clone, Copy, Debug)]
struct OffPage {
    key: u64,
    pgno: u32,
    len: u32,
}

/// Lazy reader over the package headers of a hash database
pub struct BdbReader<R> {
    src: R,
    endian: Endian,
    page_size: usize,
    last_pgno: u32,
    /// Next hash page to scan
    pgno: u32,
    /// Values found on the last scanned page, not yet read
    pending: VecDeque<OffPage>,
    page: Vec<u8>,
}

impl<R: Read + Seek> BdbReader<R> {
    /// Validate the metadata page of `src`
    pub fn new(mut src: R) -> Result<BdbReader<R>, Error> {
        let len = src
            .seek(SeekFrom::End(0))
            .map_err(wrap_io_err!("Seeking end of database"))?;
        let mut raw = [0; META_SIZE];
        src.seek(SeekFrom::Start(0))
            .map_err(wrap_io_err!("Seeking metadata page"))?;
        if len < META_SIZE as u64 {
            // Only a file that already shows the magic is a damaged database
            let mut head = [0; MAGIC_END];
            if len < MAGIC_END as u64 {
                return Err(Error::NotThisFormat {
                    backend: BACKEND,
                    reason: "file too short",
                });
            }
            src.read_exact(&mut head)
                .map_err(wrap_io_err!("Reading metadata page"))?;
            Endian::detect([head[12], head[13], head[14], head[15]])?;
            return Err(Error::corrupt(BACKEND, "truncated metadata page"));
        }
        src.read_exact(&mut raw)
            .map_err(wrap_io_err!("Reading metadata page"))?;
        let meta: MetaPage = bytemuck::pod_read_unaligned(&raw);

        let endian = Endian::detect(meta.magic.to_ne_bytes())?;
        if meta.kind != P_HASHMETA {
            return Err(Error::corrupt(
                BACKEND,
                format!("metadata page has type {}", meta.kind),
            ));
        }
        if meta.encrypt_alg != 0 {
            return Err(Error::unsupported(BACKEND, "encrypted database"));
        }

        let page_size = endian.u32(meta.page_size);
        if !page_size.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(Error::corrupt(BACKEND, format!("invalid page size {}", page_size)));
        }
        let last_pgno = endian.u32(meta.last_pgno);
        let needed = (u64::from(last_pgno) + 1) * u64::from(page_size);
        if needed > len {
            return Err(Error::corrupt(
                BACKEND,
                format!("truncated: {} pages need {} bytes, file has {}", last_pgno + 1, needed, len),
            ));
        }

        Ok(BdbReader {
            src,
            endian,
            page_size: page_size as usize,
            last_pgno,
            pgno: 1,
            pending: VecDeque::new(),
            page: vec![0; page_size as usize],
        })
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Read page `pgno` into the page buffer and return its header
    fn read_page(&mut self, pgno: u32) -> Result<PageHeader, Error> {
        if pgno > self.last_pgno {
            return Err(Error::corrupt(
                BACKEND,
                format!("page {} past last page {}", pgno, self.last_pgno),
            ));
        }
        self.src
            .seek(SeekFrom::Start(u64::from(pgno) * self.page_size as u64))
            .map_err(wrap_io_err!("Seeking page"))?;
        self.src
            .read_exact(&mut self.page)
            .map_err(wrap_io_err!("Reading page"))?;
        Ok(bytemuck::pod_read_unaligned(&self.page[..PAGE_HEADER_SIZE]))
    }

    /// Queue the off-page values of the hash page in the page buffer
    fn scan_hash_page(&mut self, pgno: u32, header: &PageHeader) -> Result<(), Error> {
        let entries = usize::from(self.endian.u16(header.entries));
        if entries % 2 != 0 {
            return Err(Error::corrupt(
                BACKEND,
                format!("page {} has an odd number of items", pgno),
            ));
        }

        let items = item_extents(&self.page, entries, self.endian)
            .ok_or_else(|| Error::corrupt(BACKEND, format!("page {} has invalid item offsets", pgno)))?;

        for pair in items.chunks_exact(2) {
            let key = &self.page[pair[0].clone()];
            let value = &self.page[pair[1].clone()];

            let key = match key.split_first() {
                Some((&H_KEYDATA, data)) if data.len() == 4 => u64::from(self.endian.read_u32(data)),
                _ => 0,
            };
            match value.first() {
                Some(&H_OFFPAGE) => {
                    if value.len() < OFFPAGE_SIZE {
                        return Err(Error::corrupt(
                            BACKEND,
                            format!("page {} has a short off-page item", pgno),
                        ));
                    }
                    self.pending.push_back(OffPage {
                        key,
                        pgno: self.endian.read_u32(&value[4..8]),
                        len: self.endian.read_u32(&value[8..12]),
                    });
                }
                Some(&(H_KEYDATA | H_DUPLICATE | H_OFFDUP)) => {}
                Some(kind) => {
                    return Err(Error::corrupt(
                        BACKEND,
                        format!("page {} has item of unknown type {}", pgno, kind),
                    ));
                }
                None => {
                    return Err(Error::corrupt(BACKEND, format!("page {} has an empty item", pgno)));
                }
            }
        }
        Ok(())
    }

    /// Concatenate the overflow chain starting at `value.pgno`
    fn read_overflow(&mut self, value: OffPage) -> Result<Vec<u8>, Error> {
        let len = value.len as usize;
        // Every page but the metadata page could belong to the chain
        let room = (self.last_pgno as usize).saturating_mul(self.page_size - PAGE_HEADER_SIZE);
        if len > room {
            return Err(Error::corrupt(
                BACKEND,
                format!("record {} declares {} bytes, more than the file holds", value.key, len),
            ));
        }
        let mut data = Vec::with_capacity(len);
        let mut seen = HashSet::new();
        let mut pgno = value.pgno;

        while pgno != 0 {
            if !seen.insert(pgno) {
                return Err(Error::corrupt(
                    BACKEND,
                    format!("overflow chain of record {} loops at page {}", value.key, pgno),
                ));
            }
            let header = self.read_page(pgno)?;
            if header.kind != P_OVERFLOW {
                return Err(Error::corrupt(
                    BACKEND,
                    format!("overflow page {} has type {}", pgno, header.kind),
                ));
            }
            let used = usize::from(self.endian.u16(header.hf_offset));
            let chunk = self
                .page
                .get(PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + used)
                .ok_or_else(|| {
                    Error::corrupt(BACKEND, format!("overflow page {} overruns the page", pgno))
                })?;
            if data.len() + chunk.len() > len {
                break;
            }
            data.extend_from_slice(chunk);
            pgno = self.endian.u32(header.next_pgno);
        }

        if data.len() != len || pgno != 0 {
            return Err(Error::corrupt(
                BACKEND,
                format!(
                    "overflow chain of record {} holds a different length than the {} bytes declared",
                    value.key, len
                ),
            ));
        }
        Ok(data)
    }
}

/// Byte ranges of the first `entries` items of a hash page.
///
/// Items are stored from the end of the page downward, so each one ends where
/// the previous one starts.
fn item_extents(page: &[u8], entries: usize, endian: Endian) -> Option<Vec<std::ops::Range<usize>>> {
    let slots_end = PAGE_HEADER_SIZE + entries * 2;
    let slots = page.get(PAGE_HEADER_SIZE..slots_end)?;

    let mut end = page.len();
    let mut extents = Vec::with_capacity(entries);
    for slot in slots.chunks_exact(2) {
        let start = usize::from(endian.read_u16(slot));
        if start < slots_end || start > end {
            return None;
        }
        extents.push(start..end);
        end = start;
    }
    Some(extents)
}

impl<R: Read + Seek> BlobSrc for BdbReader<R> {
    fn kind(&self) -> BackendKind {
        BACKEND
    }

    fn next_blob(&mut self) -> Result<Option<RawBlob>, Error> {
        loop {
            if let Some(value) = self.pending.pop_front() {
                let data = self.read_overflow(value)?;
                trace!(key = value.key, len = data.len(), "read Berkeley DB record");
                return Ok(Some(RawBlob {
                    key: value.key,
                    data,
                }));
            }
            if self.pgno > self.last_pgno {
                return Ok(None);
            }

            let pgno = self.pgno;
            self.pgno += 1;
            let header = self.read_page(pgno)?;
            if matches!(header.kind, P_HASH | P_HASH_UNSORTED) {
                self.scan_hash_page(pgno, &header)?;
            }
        }
    }

    fn rewind(&mut self) {
        self.pgno = 1;
        self.pending.clear();
    }
}
