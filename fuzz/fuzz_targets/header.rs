#![no_main]
#[macro_use] extern crate libfuzzer_sys;
extern crate rpmdb_core;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = rpmdb_core::Header::parse(data) {
        let _result = rpmdb_core::PackageInfo::from_header(&header);
    }
});
