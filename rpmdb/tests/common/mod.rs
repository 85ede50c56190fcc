//! Writers for small package databases in both container formats
#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use rpmdb::{FileFlags, FileInfo};
use rpmdb_core::tag;
use rpmdb_core::test::HeaderBuilder;
use tempfile::TempDir;

pub const SO_DIGEST: &str = "2009cab32d65011e653d7c87b49ad74541484467b3dc96be05bb2198b6c7a730";

/// Path, mode, digest and size of one installed file
pub type FileRecord = (&'static str, u16, &'static str, u32);

/// Files of libffi-3.0.5-3.2.el6 as installed on CentOS 6
pub const LIBFFI_FILES: &[FileRecord] = &[
    ("/usr/lib64/libffi.so.5", 41471, "", 15),
    ("/usr/lib64/libffi.so.5.0.6", 33261, SO_DIGEST, 31720),
    ("/usr/share/doc/libffi-3.0.5", 16877, "", 4096),
    (
        "/usr/share/doc/libffi-3.0.5/LICENSE",
        33188,
        "b0421fa2fcb17d5d603cc46c66d69a8d943a03d48edbdfd672f24068bf6b2b65",
        1119,
    ),
    (
        "/usr/share/doc/libffi-3.0.5/README",
        33188,
        "d8a1231d9090231272d547f7a7ee922298c20d34d4c79772f5ed4badc3a86f8d",
        10042,
    ),
];

/// Files of ncurses-5.9 as installed on CentOS 7
pub const NCURSES_FILES: &[FileRecord] = &[
    ("/usr/bin/captoinfo", 41471, "", 3),
    ("/usr/bin/clear", 33261, "68353b0b989463d9e202362c843ee42c408dd1e08dd5e8e93733753749a96208", 7192),
    ("/usr/bin/infocmp", 33261, "469fd67a3bdc7967a4c05b39a1b9a87635448520a619e608e702310480cef153", 57416),
    ("/usr/bin/infotocap", 41471, "", 3),
    ("/usr/bin/reset", 41471, "", 4),
    ("/usr/bin/tabs", 33261, "85a7fb2d93019eb9ff1dd907dc649e9be5a49c704a26d94572418aea77affe46", 15680),
    ("/usr/bin/tic", 33261, "df2ea23f0fdcd9a13a846de6d1880197d2fd60afe7b9b2945aa77f8595137a0c", 65800),
    ("/usr/bin/toe", 33261, "b6cad57397f83d187c1361daf20d2b6a59982f9aa553a95d659edebe3116d26a", 15800),
    ("/usr/bin/tput", 33261, "737da2a672c9ac17f86ebba733d316639365ad8459e16939fa03faea8e7d720f", 15784),
    ("/usr/bin/tset", 33261, "50fa6ec48545da72f5c92040a39fbacb61ff1e45e14f9998a281b6c3285564c1", 20072),
    ("/usr/share/doc/ncurses-5.9", 16877, "", 75),
    ("/usr/share/doc/ncurses-5.9/ANNOUNCE", 33188, "1694388b7f5ce0819e1f8fd1c2b40979e82df58541ceb0c8b60c683f29378b78", 13750),
    ("/usr/share/doc/ncurses-5.9/AUTHORS", 33188, "5e59823796c266525a92a6cd31bf144603a7d1b65362e48aa85e74a2b8093d50", 2529),
    ("/usr/share/doc/ncurses-5.9/NEWS.bz2", 33188, "bb48de080557f81b9626ebd0baf48e559ae241dace93d57b7d618a441f8737fb", 131412),
    ("/usr/share/doc/ncurses-5.9/README", 33188, "37e56186af1edbc4b0c41b85e224295fe2ef114399a488651ebc658f57bf80c7", 10212),
    ("/usr/share/doc/ncurses-5.9/TO-DO", 33188, "9a40247610befa57d2c47d0fcd5d3ff3587edad07287f17a8279b98e4221692a", 9651),
    ("/usr/share/man/man1/captoinfo.1m.gz", 33188, "40940eef25e38baaaa2ceb1cd7edb3508718400846485ed6f5c1e13bba1f1a34", 2904),
    ("/usr/share/man/man1/clear.1.gz", 33188, "1ce7d795bb239d39ca5e11808f0766b456766ad1a914c6097beb7f9c8af638b9", 1262),
    ("/usr/share/man/man1/infocmp.1m.gz", 33188, "2649e8bf304f00eb5624293515c4bd6eb7c7f847f33c3308dd8b76c5e44122dd", 6952),
    ("/usr/share/man/man1/infotocap.1m.gz", 33188, "edd4d4bb4d79044d32f3422d5ba1e15302769b8a9a5e2fe0f8ce13967443bc25", 1579),
    ("/usr/share/man/man1/reset.1.gz", 41471, "", 9),
    ("/usr/share/man/man1/tabs.1.gz", 33188, "d9841dc62123346f2973dafb79874f794690f88725135a4d21805284cb973492", 2253),
    ("/usr/share/man/man1/tic.1m.gz", 33188, "a5f8512a7a0e252225bd18efd0bcdbcee752e9bf5d539aef5948d3ab9230da8e", 5677),
    ("/usr/share/man/man1/toe.1m.gz", 33188, "ca295431aa6b43954409c314bb15687dfc93b95ad8fbd5fcc183bd205008f995", 1874),
    ("/usr/share/man/man1/tput.1.gz", 33188, "2f0d53ffbf8bef6d1a932a9955701ada4842f133ecdfb5b324604a703376bd2f", 4529),
    ("/usr/share/man/man1/tset.1.gz", 33188, "7a2332f6d2305af034eafc9c94ed427f5d63c12087f611c4a499546fa9240a9c", 4907),
    ("/usr/share/man/man5/term.5.gz", 33188, "0d53e8274fcd0c91ec79d1c7911c68d6993025335f0ed688413c38cf80edb04a", 4431),
    ("/usr/share/man/man5/terminfo.5.gz", 33188, "c94c45d9713db4c2380b53fc5130e41ec3034e256a0cfc6f523676a49cf7f02e", 33598),
    ("/usr/share/man/man7/term.7.gz", 33188, "29346e334d22d23120a45e692b0dc8f2d8262ef077149dbac3f775fbe0c9125d", 4114),
];

/// Store `files` the way rpm does: directory names in first-seen order,
/// per-file directory indexes and base names, and the per-file attributes
pub fn with_files(builder: HeaderBuilder, files: &[FileRecord]) -> HeaderBuilder {
    let mut dirs: Vec<&str> = Vec::new();
    let mut indexes = Vec::new();
    let mut bases = Vec::new();
    for (path, ..) in files {
        let split = path.rfind('/').unwrap() + 1;
        let (dir, base) = path.split_at(split);
        let index = match dirs.iter().position(|&d| d == dir) {
            Some(index) => index,
            None => {
                dirs.push(dir);
                dirs.len() - 1
            }
        };
        indexes.push(index as u32);
        bases.push(base);
    }
    let modes: Vec<u16> = files.iter().map(|f| f.1).collect();
    let digests: Vec<&str> = files.iter().map(|f| f.2).collect();
    let sizes: Vec<u32> = files.iter().map(|f| f.3).collect();
    let owners = vec!["root"; files.len()];

    builder
        .int32s(tag::FILESIZES, &sizes)
        .int16s(tag::FILEMODES, &modes)
        .strings(tag::FILEDIGESTS, &digests)
        .strings(tag::FILEUSERNAME, &owners)
        .strings(tag::FILEGROUPNAME, &owners)
        .int32s(tag::DIRINDEXES, &indexes)
        .strings(tag::BASENAMES, &bases)
        .strings(tag::DIRNAMES, &dirs)
}

/// The libffi package as installed on CentOS 6
pub fn libffi() -> Vec<u8> {
    let builder = HeaderBuilder::new()
        .string(tag::NAME, "libffi")
        .string(tag::VERSION, "3.0.5")
        .string(tag::RELEASE, "3.2.el6")
        .i18n(tag::SUMMARY, "A portable foreign function interface library")
        .int32(tag::SIZE, 42_232)
        .string(tag::VENDOR, "CentOS")
        .string(tag::LICENSE, "BSD")
        .string(tag::ARCH, "x86_64");
    with_files(builder, LIBFFI_FILES)
        .string(tag::SOURCERPM, "libffi-3.0.5-3.2.el6.src.rpm")
        .build()
}

/// The ncurses package as installed on CentOS 7
pub fn ncurses() -> Vec<u8> {
    let builder = HeaderBuilder::new()
        .string(tag::NAME, "ncurses")
        .string(tag::VERSION, "5.9")
        .string(tag::RELEASE, "14.20130511.el7_4")
        .int32(tag::SIZE, 442_921)
        .string(tag::VENDOR, "CentOS")
        .string(tag::LICENSE, "MIT")
        .string(tag::ARCH, "x86_64");
    with_files(builder, NCURSES_FILES)
        .string(tag::SOURCERPM, "ncurses-5.9-14.20130511.el7_4.src.rpm")
        .build()
}

/// A package without files, padded with a summary of `summary_len` bytes
pub fn package(name: &str, version: &str, release: &str, summary_len: usize) -> Vec<u8> {
    HeaderBuilder::new()
        .string(tag::NAME, name)
        .int32(tag::EPOCH, 1)
        .string(tag::VERSION, version)
        .string(tag::RELEASE, release)
        .i18n(tag::SUMMARY, &"x".repeat(summary_len))
        .string(tag::ARCH, "noarch")
        .build()
}

pub fn temp_db(name: &str, data: &[u8]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::File::create(&path)
        .unwrap()
        .write_all(data)
        .unwrap();
    (dir, path)
}

pub fn page_at(data: &mut [u8], page_size: usize, index: usize) -> &mut [u8] {
    &mut data[index * page_size..(index + 1) * page_size]
}

enum BdbValue {
    OffPage(Vec<u8>),
    Inline(Vec<u8>),
}

/// Berkeley DB hash database with one key/value pair per record
pub struct BdbWriter {
    page_size: usize,
    big_endian: bool,
    magic: u32,
    records: Vec<(u32, BdbValue)>,
}

impl BdbWriter {
    pub fn new() -> BdbWriter {
        BdbWriter {
            page_size: 4096,
            big_endian: false,
            magic: 0x061561,
            records: Vec::new(),
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    /// A record whose value lives on overflow pages, as package headers do
    pub fn record(mut self, key: u32, blob: Vec<u8>) -> Self {
        self.records.push((key, BdbValue::OffPage(blob)));
        self
    }

    /// A record stored inline on the hash page
    pub fn inline(mut self, key: u32, value: &[u8]) -> Self {
        self.records.push((key, BdbValue::Inline(value.to_vec())));
        self
    }

    fn u16(&self, value: u16) -> [u8; 2] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn u32(&self, value: u32) -> [u8; 4] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn item_len(value: &BdbValue) -> usize {
        match value {
            BdbValue::OffPage(_) => 12,
            BdbValue::Inline(data) => 1 + data.len(),
        }
    }

    fn page_header(&self, page: &mut [u8], pgno: u32, next: u32, entries: u16, hf_offset: u16, kind: u8) {
        page[8..12].copy_from_slice(&self.u32(pgno));
        page[16..20].copy_from_slice(&self.u32(next));
        page[20..22].copy_from_slice(&self.u16(entries));
        page[22..24].copy_from_slice(&self.u16(hf_offset));
        page[24] = 1;
        page[25] = kind;
    }

    pub fn build(&self) -> Vec<u8> {
        let capacity = self.page_size - 26;
        let chunk = self.page_size - 26;

        // Group records onto hash pages
        let mut hash_pages: Vec<Vec<usize>> = vec![Vec::new()];
        let mut used = 0;
        for (i, (_, value)) in self.records.iter().enumerate() {
            let need = 4 + 5 + Self::item_len(value);
            if used + need > capacity {
                hash_pages.push(Vec::new());
                used = 0;
            }
            used += need;
            hash_pages.last_mut().unwrap().push(i);
        }

        // Overflow chains follow the hash pages
        let mut next_pgno = 1 + hash_pages.len() as u32;
        let mut chains = Vec::new();
        for (_, value) in &self.records {
            match value {
                BdbValue::OffPage(data) => {
                    let pages = data.len().div_ceil(chunk).max(1) as u32;
                    chains.push(Some(next_pgno));
                    next_pgno += pages;
                }
                BdbValue::Inline(_) => chains.push(None),
            }
        }
        let last_pgno = next_pgno - 1;

        let mut file = vec![0; self.page_size * (last_pgno as usize + 1)];

        let meta = page_at(&mut file, self.page_size, 0);
        meta[12..16].copy_from_slice(&self.u32(self.magic));
        meta[16..20].copy_from_slice(&self.u32(9));
        meta[20..24].copy_from_slice(&self.u32(self.page_size as u32));
        meta[25] = 8;
        meta[32..36].copy_from_slice(&self.u32(last_pgno));
        meta[40..44].copy_from_slice(&self.u32(self.records.len() as u32));
        meta[44..48].copy_from_slice(&self.u32(self.records.len() as u32));

        for (h, records) in hash_pages.iter().enumerate() {
            let pgno = 1 + h as u32;
            let mut page = vec![0; self.page_size];
            let mut end = self.page_size;
            let mut slot = 26;
            for &i in records {
                let (key, value) = &self.records[i];

                let mut key_item = vec![1];
                key_item.extend_from_slice(&self.u32(*key));
                let value_item = match value {
                    BdbValue::OffPage(data) => {
                        let mut item = vec![3, 0, 0, 0];
                        item.extend_from_slice(&self.u32(chains[i].unwrap()));
                        item.extend_from_slice(&self.u32(data.len() as u32));
                        item
                    }
                    BdbValue::Inline(data) => {
                        let mut item = vec![1];
                        item.extend_from_slice(data);
                        item
                    }
                };

                for item in [key_item, value_item] {
                    end -= item.len();
                    page[end..end + item.len()].copy_from_slice(&item);
                    page[slot..slot + 2].copy_from_slice(&self.u16(end as u16));
                    slot += 2;
                }
            }
            self.page_header(
                &mut page,
                pgno,
                0,
                (records.len() * 2) as u16,
                end as u16,
                13,
            );
            page_at(&mut file, self.page_size, pgno as usize).copy_from_slice(&page);
        }

        for (i, (_, value)) in self.records.iter().enumerate() {
            let (BdbValue::OffPage(data), Some(first)) = (value, chains[i]) else {
                continue;
            };
            let pieces: Vec<&[u8]> = if data.is_empty() {
                vec![&data[..]]
            } else {
                data.chunks(chunk).collect()
            };
            for (n, piece) in pieces.iter().enumerate() {
                let pgno = first + n as u32;
                let next = if n + 1 < pieces.len() { pgno + 1 } else { 0 };
                let mut page = vec![0; self.page_size];
                self.page_header(&mut page, pgno, next, 1, piece.len() as u16, 7);
                page[26..26 + piece.len()].copy_from_slice(piece);
                page_at(&mut file, self.page_size, pgno as usize).copy_from_slice(&page);
            }
        }

        file
    }
}

pub fn varint(mut value: u64) -> Vec<u8> {
    if value > 0x00ff_ffff_ffff_ffff {
        let mut out = Vec::with_capacity(9);
        let last = value as u8;
        value >>= 8;
        let mut groups = Vec::new();
        for _ in 0..8 {
            groups.push((value & 0x7f) as u8 | 0x80);
            value >>= 7;
        }
        groups.reverse();
        out.extend_from_slice(&groups);
        out.push(last);
        return out;
    }
    let mut groups = vec![(value & 0x7f) as u8];
    value >>= 7;
    while value > 0 {
        groups.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
    groups.reverse();
    groups
}

/// Record with the given serial types and body
fn record(serials: &[u64], body: &[u8]) -> Vec<u8> {
    let types: Vec<u8> = serials.iter().flat_map(|&s| varint(s)).collect();
    let mut header_len = types.len() + 1;
    if varint(header_len as u64).len() > 1 {
        header_len += 1;
    }
    let mut out = varint(header_len as u64);
    out.extend_from_slice(&types);
    out.extend_from_slice(body);
    out
}

fn text_serial(text: &str) -> u64 {
    13 + 2 * text.len() as u64
}

fn local_payload(payload: usize, usable: usize) -> usize {
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

/// SQLite database holding one rpm style table
pub struct SqliteWriter {
    page_size: usize,
    table: String,
    sql: String,
    rows: Vec<(i64, Option<Vec<u8>>)>,
}

struct Cell {
    rowid: i64,
    /// Cell bytes up to and including the local payload
    head: Vec<u8>,
    /// Payload bytes that go to overflow pages
    overflow: Vec<u8>,
}

impl Cell {
    fn size(&self) -> usize {
        self.head.len() + if self.overflow.is_empty() { 0 } else { 4 }
    }
}

impl SqliteWriter {
    pub fn new() -> SqliteWriter {
        SqliteWriter {
            page_size: 4096,
            table: "Packages".to_string(),
            sql: "CREATE TABLE 'Packages' (hnum INTEGER PRIMARY KEY AUTOINCREMENT,blob BLOB NOT NULL)"
                .to_string(),
            rows: Vec::new(),
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Rename the table, keeping its columns
    pub fn table(mut self, name: &str) -> Self {
        self.table = name.to_string();
        self.sql = format!(
            "CREATE TABLE '{}' (hnum INTEGER PRIMARY KEY AUTOINCREMENT,blob BLOB NOT NULL)",
            name
        );
        self
    }

    pub fn sql(mut self, sql: &str) -> Self {
        self.sql = sql.to_string();
        self
    }

    pub fn row(mut self, rowid: i64, blob: Vec<u8>) -> Self {
        self.rows.push((rowid, Some(blob)));
        self
    }

    /// A row whose blob column is NULL
    pub fn null_row(mut self, rowid: i64) -> Self {
        self.rows.push((rowid, None));
        self
    }

    fn cell(&self, rowid: i64, payload: &[u8]) -> Cell {
        let local = local_payload(payload.len(), self.page_size);
        let mut head = varint(payload.len() as u64);
        head.extend_from_slice(&varint(rowid as u64));
        head.extend_from_slice(&payload[..local]);
        Cell {
            rowid,
            head,
            overflow: payload[local..].to_vec(),
        }
    }

    /// Lay out a b-tree page: header at `base`, cells from the end downward
    fn btree_page(&self, page: &mut [u8], base: usize, kind: u8, cells: &[Vec<u8>], right: Option<u32>) {
        let header_len = if right.is_some() { 12 } else { 8 };
        let mut end = self.page_size;
        for (i, cell) in cells.iter().enumerate() {
            end -= cell.len();
            page[end..end + cell.len()].copy_from_slice(cell);
            let pointer = base + header_len + i * 2;
            page[pointer..pointer + 2].copy_from_slice(&(end as u16).to_be_bytes());
        }
        assert!(base + header_len + cells.len() * 2 <= end, "page overflow");
        page[base] = kind;
        page[base + 3..base + 5].copy_from_slice(&(cells.len() as u16).to_be_bytes());
        page[base + 5..base + 7].copy_from_slice(&((end % 65536) as u16).to_be_bytes());
        if let Some(right) = right {
            page[base + 8..base + 12].copy_from_slice(&right.to_be_bytes());
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let cells: Vec<Cell> = self
            .rows
            .iter()
            .map(|(rowid, blob)| {
                let payload = match blob {
                    Some(blob) => record(&[0, 12 + 2 * blob.len() as u64], blob),
                    None => record(&[0, 0], &[]),
                };
                self.cell(*rowid, &payload)
            })
            .collect();

        // Pack cells into leaves
        let mut leaves: Vec<Vec<usize>> = vec![Vec::new()];
        let mut used = 0;
        for (i, cell) in cells.iter().enumerate() {
            let need = cell.size() + 2;
            if used + need > self.page_size - 8 && !leaves.last().unwrap().is_empty() {
                leaves.push(Vec::new());
                used = 0;
            }
            used += need;
            leaves.last_mut().unwrap().push(i);
        }

        // Page 1 schema, page 2 table root, then leaves if the root is interior
        let interior = leaves.len() > 1;
        let leaf_pgnos: Vec<u32> = if interior {
            (0..leaves.len() as u32).map(|n| 3 + n).collect()
        } else {
            vec![2]
        };
        let mut next_pgno = *leaf_pgnos.last().unwrap() + 1;
        let mut overflow_first = vec![0u32; cells.len()];
        for (i, cell) in cells.iter().enumerate() {
            if !cell.overflow.is_empty() {
                overflow_first[i] = next_pgno;
                next_pgno += cell.overflow.len().div_ceil(self.page_size - 4) as u32;
            }
        }
        let page_count = next_pgno - 1;
        let mut file = vec![0; self.page_size * page_count as usize];

        // File header
        file[..16].copy_from_slice(b"SQLite format 3\0");
        let raw_size = if self.page_size == 65536 { 1 } else { self.page_size as u16 };
        file[16..18].copy_from_slice(&raw_size.to_be_bytes());
        file[18] = 1;
        file[19] = 1;
        file[21] = 64;
        file[22] = 32;
        file[23] = 32;
        file[24..28].copy_from_slice(&1u32.to_be_bytes());
        file[28..32].copy_from_slice(&page_count.to_be_bytes());
        file[40..44].copy_from_slice(&1u32.to_be_bytes());
        file[44..48].copy_from_slice(&4u32.to_be_bytes());
        file[56..60].copy_from_slice(&1u32.to_be_bytes());
        file[92..96].copy_from_slice(&1u32.to_be_bytes());
        file[96..100].copy_from_slice(&3_045_000u32.to_be_bytes());

        // Schema table: an index row first, then the table row
        let index_name = format!("sqlite_autoindex_{}_1", self.table);
        let mut index_body = Vec::new();
        index_body.extend_from_slice(b"index");
        index_body.extend_from_slice(index_name.as_bytes());
        index_body.extend_from_slice(self.table.as_bytes());
        index_body.push(0);
        let index_row = record(
            &[text_serial("index"), text_serial(&index_name), text_serial(&self.table), 1, 0],
            &index_body,
        );

        let mut table_body = Vec::new();
        table_body.extend_from_slice(b"table");
        table_body.extend_from_slice(self.table.as_bytes());
        table_body.extend_from_slice(self.table.as_bytes());
        table_body.push(2);
        table_body.extend_from_slice(self.sql.as_bytes());
        let table_row = record(
            &[
                text_serial("table"),
                text_serial(&self.table),
                text_serial(&self.table),
                1,
                text_serial(&self.sql),
            ],
            &table_body,
        );

        let schema_cells: Vec<Vec<u8>> = [(1, index_row), (2, table_row)]
            .into_iter()
            .map(|(rowid, payload)| {
                let mut cell = varint(payload.len() as u64);
                cell.extend_from_slice(&varint(rowid));
                cell.extend_from_slice(&payload);
                cell
            })
            .collect();
        let mut page = vec![0; self.page_size];
        page[..100].copy_from_slice(&file[..100]);
        self.btree_page(&mut page, 100, 13, &schema_cells, None);
        file[..self.page_size].copy_from_slice(&page);

        // Table leaves
        for (leaf, &pgno) in leaves.iter().zip(&leaf_pgnos) {
            let leaf_cells: Vec<Vec<u8>> = leaf
                .iter()
                .map(|&i| {
                    let mut bytes = cells[i].head.clone();
                    if !cells[i].overflow.is_empty() {
                        bytes.extend_from_slice(&overflow_first[i].to_be_bytes());
                    }
                    bytes
                })
                .collect();
            let mut page = vec![0; self.page_size];
            self.btree_page(&mut page, 0, 13, &leaf_cells, None);
            page_at(&mut file, self.page_size, pgno as usize - 1).copy_from_slice(&page);
        }

        if interior {
            let (last, rest) = leaf_pgnos.split_last().unwrap();
            let root_cells: Vec<Vec<u8>> = rest
                .iter()
                .zip(&leaves)
                .map(|(&pgno, leaf)| {
                    let max_rowid = leaf.iter().map(|&i| cells[i].rowid).max().unwrap();
                    let mut cell = pgno.to_be_bytes().to_vec();
                    cell.extend_from_slice(&varint(max_rowid as u64));
                    cell
                })
                .collect();
            let mut page = vec![0; self.page_size];
            self.btree_page(&mut page, 0, 5, &root_cells, Some(*last));
            page_at(&mut file, self.page_size, 1).copy_from_slice(&page);
        }

        // Overflow chains
        for (i, cell) in cells.iter().enumerate() {
            if cell.overflow.is_empty() {
                continue;
            }
            let pieces: Vec<&[u8]> = cell.overflow.chunks(self.page_size - 4).collect();
            for (n, piece) in pieces.iter().enumerate() {
                let pgno = overflow_first[i] + n as u32;
                let next = if n + 1 < pieces.len() { pgno + 1 } else { 0 };
                let page = page_at(&mut file, self.page_size, pgno as usize - 1);
                page[..4].copy_from_slice(&next.to_be_bytes());
                page[4..4 + piece.len()].copy_from_slice(piece);
            }
        }

        file
    }
}

pub fn write_bdb(writer: &BdbWriter) -> (TempDir, PathBuf) {
    temp_db("Packages", &writer.build())
}

pub fn write_sqlite(writer: &SqliteWriter) -> (TempDir, PathBuf) {
    temp_db("rpmdb.sqlite", &writer.build())
}

/// Compare a package's files against the recorded table, field by field
pub fn assert_files(package: &rpmdb::PackageInfo, files: &[FileRecord]) {
    let expected: Vec<FileInfo> = files
        .iter()
        .map(|&(path, mode, digest, size)| FileInfo {
            path: path.to_string(),
            mode,
            size: u64::from(size),
            digest: digest.to_string(),
            flags: FileFlags::empty(),
            username: "root".to_string(),
            groupname: "root".to_string(),
        })
        .collect();
    assert_eq!(package.files, expected);
}

/// Compare against the record written by [`libffi`]
pub fn assert_libffi(package: &rpmdb::PackageInfo) {
    assert_eq!(package.name, "libffi");
    assert_eq!(package.version, "3.0.5");
    assert_eq!(package.release, "3.2.el6");
    assert_eq!(package.epoch, None);
    assert_eq!(package.arch, "x86_64");
    assert_eq!(package.source_rpm, "libffi-3.0.5-3.2.el6.src.rpm");
    assert_eq!(package.vendor, "CentOS");
    assert_eq!(package.license, "BSD");
    assert_eq!(package.size, 42_232);
    assert_files(package, LIBFFI_FILES);
}
