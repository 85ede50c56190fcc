#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate rpmdb;

use std::io::Cursor;

use rpmdb::sqlite::SqliteReader;
use rpmdb::BlobSrc;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut reader) = SqliteReader::new(Cursor::new(data)) {
        while let Ok(Some(_blob)) = reader.next_blob() {}
    }
});
