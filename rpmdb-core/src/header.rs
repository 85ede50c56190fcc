//! Decoding of a serialized RPM header into its index entries
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::mem;

use crate::tag::{self, Type, REGION_TAG_COUNT};
use crate::{EntryInfo, Error, IndexEntry, Value};

/// Leading bytes of a header carrying its own magic
pub const HEADER_MAGIC: [u8; 3] = [0x8e, 0xad, 0xe8];
pub const HEADER_VERSION: u8 = 1;
/// Magic, version and four reserved bytes
pub const MAGIC_SIZE: usize = 8;
/// Index count and data length
pub const INTRO_SIZE: usize = 8;
pub const ENTRY_INFO_SIZE: usize = mem::size_of::<EntryInfo>();
/// Upper bound on the size of one header
pub const HEADER_MAX_BYTES: usize = 256 * 1024 * 1024;

/// A decoded header: index entries in index order, unique by tag
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    entries: Vec<IndexEntry>,
}

/// Extent of the immutable region found at the start of the index
struct Region {
    /// Offset of the trailer, as declared by the region tag
    offset: usize,
    /// Entries covered by the region, including the region tag itself
    ril: usize,
    /// Data length covered by the region, including the trailer
    rdl: usize,
}

impl Header {
    /// Parse a header blob as stored in the package database.
    ///
    /// Every offset and length is checked against the data region before it is
    /// read; any violation fails the whole header.
    pub fn parse(blob: &[u8]) -> Result<Header, Error> {
        let data = strip_magic(blob)?;

        let intro = data.get(..INTRO_SIZE).ok_or(Error::TooShort {
            needed: INTRO_SIZE,
            actual: data.len(),
        })?;
        let il = i32::from_be_bytes([intro[0], intro[1], intro[2], intro[3]]);
        let dl = i32::from_be_bytes([intro[4], intro[5], intro[6], intro[7]]);
        if il < 1 {
            return Err(Error::NoTags);
        }
        let il = il as usize;
        let dl = usize::try_from(dl).map_err(|_| Error::InvalidRegion("negative data length"))?;

        let data_start = il
            .checked_mul(ENTRY_INFO_SIZE)
            .and_then(|size| size.checked_add(INTRO_SIZE))
            .ok_or(Error::Overflow)?;
        let data_end = data_start.checked_add(dl).ok_or(Error::Overflow)?;
        if data_end >= HEADER_MAX_BYTES {
            return Err(Error::TooLarge(data_end));
        }
        if data_end > data.len() {
            return Err(Error::TooShort {
                needed: data_end,
                actual: data.len(),
            });
        }

        let infos: &[EntryInfo] = bytemuck::try_cast_slice(&data[INTRO_SIZE..data_start])
            .map_err(|_| Error::InvalidRegion("unaligned index"))?;
        let store = &data[data_start..data_end];

        let region = verify_region(infos, store)?;
        verify_info(infos, store, region.as_ref())?;

        let mut entries;
        let mut rdlen;
        match region {
            Some(region) => {
                let ril = if region.offset == 0 { il } else { region.ril };
                let (region_entries, len) = import(&infos[1..ril], store, 0)?;
                entries = region_entries;
                rdlen = len;

                if ril < infos.len() {
                    let (dribble, len) = import(&infos[ril..], store, rdlen)?;
                    rdlen = len;
                    // Entries added after the region replace region entries
                    let region_tags: BTreeMap<i32, usize> = entries
                        .iter()
                        .enumerate()
                        .map(|(i, entry)| (entry.tag, i))
                        .collect();
                    for entry in dribble {
                        match region_tags.get(&entry.tag) {
                            Some(&i) => entries[i] = entry,
                            None => entries.push(entry),
                        }
                    }
                }
                rdlen = rdlen
                    .checked_add(REGION_TAG_COUNT as usize)
                    .ok_or(Error::Overflow)?;
            }
            None => {
                // Legacy header without a region
                let (all, len) = import(infos, store, 0)?;
                entries = all;
                rdlen = len;
            }
        }

        if rdlen != dl {
            return Err(Error::DataLength {
                calculated: rdlen,
                declared: dl,
            });
        }

        Ok(Header { entries })
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, tag: i32) -> Option<&IndexEntry> {
        self.entries.iter().find(|entry| entry.tag == tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn strip_magic(blob: &[u8]) -> Result<&[u8], Error> {
    if !blob.starts_with(&HEADER_MAGIC) {
        return Ok(blob);
    }
    let magic = blob.get(..MAGIC_SIZE).ok_or(Error::BadMagic)?;
    if magic[3] != HEADER_VERSION {
        return Err(Error::BadVersion(magic[3]));
    }
    if magic[4..] != [0; 4] {
        return Err(Error::BadMagic);
    }
    Ok(&blob[MAGIC_SIZE..])
}

/// Validate the region tag and its trailer, `None` when the header has no region
fn verify_region(infos: &[EntryInfo], store: &[u8]) -> Result<Option<Region>, Error> {
    let first = &infos[0];
    let region_tag = first.tag();
    if !tag::is_region(region_tag) {
        return Ok(None);
    }
    if first.kind() != Type::Bin as u32 || first.count() != REGION_TAG_COUNT {
        return Err(Error::InvalidRegion("region tag"));
    }

    let offset = usize::try_from(first.offset())
        .map_err(|_| Error::InvalidRegion("region offset"))?;
    let rdl = offset
        .checked_add(REGION_TAG_COUNT as usize)
        .filter(|&end| end <= store.len())
        .ok_or(Error::InvalidRegion("region offset"))?;
    let trailer: EntryInfo = bytemuck::pod_read_unaligned(&store[offset..rdl]);

    let mut trailer_tag = trailer.tag();
    // Some old packages carry an image trailer in the signature region
    if region_tag == tag::HEADERSIGNATURES && trailer_tag == tag::HEADERIMAGE {
        trailer_tag = tag::HEADERSIGNATURES;
    }
    if trailer_tag != region_tag
        || trailer.kind() != Type::Bin as u32
        || trailer.count() != REGION_TAG_COUNT
    {
        return Err(Error::InvalidRegion("region trailer"));
    }

    // The trailer offset is the negated size of the region index
    let region_size = trailer
        .offset()
        .checked_neg()
        .and_then(|size| usize::try_from(size).ok())
        .ok_or(Error::InvalidRegion("region size"))?;
    let ril = region_size / ENTRY_INFO_SIZE;
    if region_size % ENTRY_INFO_SIZE != 0 || ril == 0 || ril > infos.len() {
        return Err(Error::InvalidRegion("region size"));
    }

    Ok(Some(Region { offset, ril, rdl }))
}

/// Check tag, type, alignment and extent of every data entry
fn verify_info(infos: &[EntryInfo], store: &[u8], region: Option<&Region>) -> Result<(), Error> {
    let skip = usize::from(region.is_some());
    let mut end = 0;
    for (index, info) in infos.iter().enumerate().skip(skip) {
        let invalid = |reason| Error::InvalidEntry { index, reason };

        let offset = usize::try_from(info.offset()).map_err(|_| invalid("negative offset"))?;
        if end > offset {
            return Err(invalid("overlaps previous entry"));
        }
        if info.tag() < tag::HEADERI18NTABLE {
            return Err(invalid("reserved tag"));
        }
        let kind = Type::from_raw(info.kind()).ok_or_else(|| invalid("unknown type"))?;
        if offset % kind.align() != 0 {
            return Err(invalid("misaligned offset"));
        }
        if offset > store.len() {
            return Err(invalid("offset out of range"));
        }

        let len = data_length(kind, info.count(), store, offset)
            .ok_or_else(|| invalid("data out of range"))?;
        if len == 0 && kind != Type::Null {
            return Err(invalid("empty data"));
        }
        end = offset + len;

        if let Some(region) = region {
            // The region trailer is not an entry, so guard it explicitly
            if end > region.rdl - REGION_TAG_COUNT as usize && offset < region.rdl {
                return Err(invalid("overlaps region trailer"));
            }
        }
    }
    Ok(())
}

/// Decode a run of entries, returning them with the accumulated data length
fn import(infos: &[EntryInfo], store: &[u8], mut dl: usize) -> Result<(Vec<IndexEntry>, usize), Error> {
    let mut entries: Vec<IndexEntry> = Vec::with_capacity(infos.len());
    let mut tags = BTreeSet::new();
    for (index, info) in infos.iter().enumerate() {
        let invalid = |reason| Error::InvalidEntry { index, reason };

        let tag = info.tag();
        let count = info.count();
        let kind = Type::from_raw(info.kind()).ok_or_else(|| invalid("unknown type"))?;
        let start = usize::try_from(info.offset()).map_err(|_| invalid("negative offset"))?;
        if start > store.len() || (start == store.len() && kind != Type::Null) {
            return Err(invalid("offset out of range"));
        }

        let len = data_length(kind, count, store, start)
            .ok_or_else(|| invalid("data out of range"))?;
        // String data runs up to the next entry, padding included
        let span = match infos.get(index + 1) {
            Some(next) if kind.size().is_none() => usize::try_from(next.offset())
                .ok()
                .and_then(|next| next.checked_sub(start))
                .filter(|&span| span >= len)
                .ok_or_else(|| invalid("data out of range"))?,
            _ => len,
        };

        if !tags.insert(tag) {
            return Err(Error::DuplicateTag(tag));
        }
        entries.push(IndexEntry {
            tag,
            kind,
            offset: start,
            count,
            value: Value::decode(kind, count, &store[start..start + len]),
        });

        dl = dl
            .checked_add(kind.align_diff(dl))
            .and_then(|dl| dl.checked_add(span))
            .ok_or(Error::Overflow)?;
    }
    Ok((entries, dl))
}

/// Byte length of an entry's data, `None` when it does not fit in `store`
fn data_length(kind: Type, count: u32, store: &[u8], start: usize) -> Option<usize> {
    match kind {
        Type::String => {
            if count != 1 {
                return None;
            }
            string_length(store, 1, start)
        }
        Type::StringArray | Type::I18nString => string_length(store, count, start),
        _ => {
            let len = kind.size()?.checked_mul(count as usize)?;
            let end = start.checked_add(len)?;
            (end <= store.len()).then_some(len)
        }
    }
}

/// Length of `count` consecutive NUL-terminated strings, terminators included
fn string_length(store: &[u8], count: u32, start: usize) -> Option<usize> {
    let mut pos = start;
    for _ in 0..count {
        let rest = store.get(pos..)?;
        let nul = rest.iter().position(|&b| b == 0)?;
        pos += nul + 1;
    }
    Some(pos - start)
}
