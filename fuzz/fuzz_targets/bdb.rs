#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate rpmdb;

use std::io::Cursor;

use rpmdb::bdb::BdbReader;
use rpmdb::BlobSrc;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut reader) = BdbReader::new(Cursor::new(data)) {
        while let Ok(Some(_blob)) = reader.next_blob() {}
    }
});
