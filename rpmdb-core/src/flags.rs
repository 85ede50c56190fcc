use bitflags::bitflags;

bitflags! {
    /// Raw file mode bits as stored in a header
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Mode: u16 {
        const PERM = 0o007777;
        const KIND = 0o170000;
        const FIFO = 0o010000;
        const CHAR = 0o020000;
        const DIR = 0o040000;
        const BLOCK = 0o060000;
        const FILE = 0o100000;
        const SYMLINK = 0o120000;
        const SOCKET = 0o140000;
    }
}

impl Mode {
    pub fn perm(&self) -> Mode {
        *self & Mode::PERM
    }

    pub fn kind(&self) -> Mode {
        *self & Mode::KIND
    }

    /// True for regular files, the only kind with content to digest
    pub fn is_file(&self) -> bool {
        self.kind() == Mode::FILE
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == Mode::DIR
    }

    pub fn is_symlink(&self) -> bool {
        self.kind() == Mode::SYMLINK
    }
}

bitflags! {
    /// Per-file attributes from the `FILEFLAGS` tag
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FileFlags: u32 {
        const CONFIG = 1 << 0;
        const DOC = 1 << 1;
        const ICON = 1 << 2;
        const MISSINGOK = 1 << 3;
        const NOREPLACE = 1 << 4;
        const SPECFILE = 1 << 5;
        /// Owned by the package but not shipped in its payload
        const GHOST = 1 << 6;
        const LICENSE = 1 << 7;
        const README = 1 << 8;
        const PUBKEY = 1 << 11;
        const ARTIFACT = 1 << 12;
    }
}

/// Hash algorithm of the file digests, from `FILEDIGESTALGO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    /// Assumed when the tag is missing
    #[default]
    Md5,
    Sha1,
    RipeMd160,
    Md2,
    Tiger192,
    Haval5_160,
    Sha256,
    Sha384,
    Sha512,
    Sha224,
    Reserved(u32),
}

impl From<u32> for DigestAlgorithm {
    fn from(value: u32) -> Self {
        match value {
            1 => DigestAlgorithm::Md5,
            2 => DigestAlgorithm::Sha1,
            3 => DigestAlgorithm::RipeMd160,
            5 => DigestAlgorithm::Md2,
            6 => DigestAlgorithm::Tiger192,
            7 => DigestAlgorithm::Haval5_160,
            8 => DigestAlgorithm::Sha256,
            9 => DigestAlgorithm::Sha384,
            10 => DigestAlgorithm::Sha512,
            11 => DigestAlgorithm::Sha224,
            v => DigestAlgorithm::Reserved(v),
        }
    }
}

impl From<DigestAlgorithm> for u32 {
    fn from(algo: DigestAlgorithm) -> u32 {
        match algo {
            DigestAlgorithm::Md5 => 1,
            DigestAlgorithm::Sha1 => 2,
            DigestAlgorithm::RipeMd160 => 3,
            DigestAlgorithm::Md2 => 5,
            DigestAlgorithm::Tiger192 => 6,
            DigestAlgorithm::Haval5_160 => 7,
            DigestAlgorithm::Sha256 => 8,
            DigestAlgorithm::Sha384 => 9,
            DigestAlgorithm::Sha512 => 10,
            DigestAlgorithm::Sha224 => 11,
            DigestAlgorithm::Reserved(v) => v,
        }
    }
}
