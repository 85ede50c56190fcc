//! Tag catalog and value types of the RPM header format.
//!
//! Only the tags this crate interprets are listed; unknown tags are still
//! decoded and kept in the [`Header`](crate::Header).

/// Legacy region tag of v3 headers upgraded in place
pub const HEADERIMAGE: i32 = 61;
/// Region tag of the signature header
pub const HEADERSIGNATURES: i32 = 62;
/// Region tag of the immutable main header
pub const HEADERIMMUTABLE: i32 = 63;
/// Smallest tag allowed on a data entry
pub const HEADERI18NTABLE: i32 = 100;

pub const SIGMD5: i32 = 261;

pub const NAME: i32 = 1000;
pub const VERSION: i32 = 1001;
pub const RELEASE: i32 = 1002;
pub const EPOCH: i32 = 1003;
pub const SUMMARY: i32 = 1004;
pub const INSTALLTIME: i32 = 1008;
pub const SIZE: i32 = 1009;
pub const VENDOR: i32 = 1011;
pub const LICENSE: i32 = 1014;
pub const ARCH: i32 = 1022;
pub const OLDFILENAMES: i32 = 1027;
pub const FILESIZES: i32 = 1028;
pub const FILEMODES: i32 = 1030;
pub const FILEDIGESTS: i32 = 1035;
pub const FILEFLAGS: i32 = 1037;
pub const FILEUSERNAME: i32 = 1039;
pub const FILEGROUPNAME: i32 = 1040;
pub const SOURCERPM: i32 = 1044;
pub const PROVIDENAME: i32 = 1047;
pub const REQUIRENAME: i32 = 1049;
pub const DIRINDEXES: i32 = 1116;
pub const BASENAMES: i32 = 1117;
pub const DIRNAMES: i32 = 1118;
pub const LONGFILESIZES: i32 = 5008;
pub const LONGSIZE: i32 = 5009;
pub const FILEDIGESTALGO: i32 = 5011;
pub const MODULARITYLABEL: i32 = 5096;

/// Size in bytes of a region tag trailer, also the count of a region entry
pub const REGION_TAG_COUNT: u32 = 16;

/// Human readable name of a known tag
pub fn name(tag: i32) -> Option<&'static str> {
    let name = match tag {
        HEADERIMAGE => "HEADERIMAGE",
        HEADERSIGNATURES => "HEADERSIGNATURES",
        HEADERIMMUTABLE => "HEADERIMMUTABLE",
        HEADERI18NTABLE => "HEADERI18NTABLE",
        SIGMD5 => "SIGMD5",
        NAME => "NAME",
        VERSION => "VERSION",
        RELEASE => "RELEASE",
        EPOCH => "EPOCH",
        SUMMARY => "SUMMARY",
        INSTALLTIME => "INSTALLTIME",
        SIZE => "SIZE",
        VENDOR => "VENDOR",
        LICENSE => "LICENSE",
        ARCH => "ARCH",
        OLDFILENAMES => "OLDFILENAMES",
        FILESIZES => "FILESIZES",
        FILEMODES => "FILEMODES",
        FILEDIGESTS => "FILEDIGESTS",
        FILEFLAGS => "FILEFLAGS",
        FILEUSERNAME => "FILEUSERNAME",
        FILEGROUPNAME => "FILEGROUPNAME",
        SOURCERPM => "SOURCERPM",
        PROVIDENAME => "PROVIDENAME",
        REQUIRENAME => "REQUIRENAME",
        DIRINDEXES => "DIRINDEXES",
        BASENAMES => "BASENAMES",
        DIRNAMES => "DIRNAMES",
        LONGFILESIZES => "LONGFILESIZES",
        LONGSIZE => "LONGSIZE",
        FILEDIGESTALGO => "FILEDIGESTALGO",
        MODULARITYLABEL => "MODULARITYLABEL",
        _ => return None,
    };
    Some(name)
}

pub(crate) fn is_region(tag: i32) -> bool {
    matches!(tag, HEADERIMAGE | HEADERSIGNATURES | HEADERIMMUTABLE)
}

/// Storage type of an index entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Type {
    Null = 0,
    Char = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    String = 6,
    Bin = 7,
    StringArray = 8,
    I18nString = 9,
}

impl Type {
    pub fn from_raw(value: u32) -> Option<Type> {
        let kind = match value {
            0 => Type::Null,
            1 => Type::Char,
            2 => Type::Int8,
            3 => Type::Int16,
            4 => Type::Int32,
            5 => Type::Int64,
            6 => Type::String,
            7 => Type::Bin,
            8 => Type::StringArray,
            9 => Type::I18nString,
            _ => return None,
        };
        Some(kind)
    }

    /// Width of one element, `None` for NUL-terminated string types
    pub fn size(self) -> Option<usize> {
        match self {
            Type::Null => Some(0),
            Type::Char | Type::Int8 | Type::Bin => Some(1),
            Type::Int16 => Some(2),
            Type::Int32 => Some(4),
            Type::Int64 => Some(8),
            Type::String | Type::StringArray | Type::I18nString => None,
        }
    }

    /// Required alignment of the entry offset within the data region
    pub fn align(self) -> usize {
        match self {
            Type::Int16 => 2,
            Type::Int32 => 4,
            Type::Int64 => 8,
            _ => 1,
        }
    }

    /// Padding needed to align `offset` for this type
    pub(crate) fn align_diff(self, offset: usize) -> usize {
        let align = self.align();
        let rem = offset % align;
        if rem == 0 {
            0
        } else {
            align - rem
        }
    }
}
