//! Package records assembled from decoded headers
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::{Display, Formatter, Result as FmtResult};

use crate::file::{self, FileArrays, FileInfo};
use crate::tag::{self, Type};
use crate::{DigestAlgorithm, Error, Header, IndexEntry};

/// An installed package and the files it owns
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub release: String,
    /// `None` when the package has no epoch, which differs from an epoch of 0
    pub epoch: Option<u32>,
    pub arch: String,
    pub source_rpm: String,
    pub vendor: String,
    pub license: String,
    /// Installed size in bytes
    pub size: u64,
    pub summary: String,
    /// Seconds since the Unix epoch, 0 when unknown
    pub install_time: u64,
    pub modularity_label: String,
    /// Lowercase hex MD5 of header and payload, empty when absent
    pub sigmd5: String,
    pub digest_algorithm: DigestAlgorithm,
    pub provides: Vec<String>,
    pub requires: Vec<String>,
    pub files: Vec<FileInfo>,
}

impl PackageInfo {
    /// Build the package record from a decoded header.
    ///
    /// NAME, VERSION and RELEASE are required. A known tag stored with an
    /// unexpected type is rejected instead of being ignored.
    pub fn from_header(header: &Header) -> Result<PackageInfo, Error> {
        let required = |tag| string_tag(header, tag)?.ok_or(Error::MissingTag(tag));
        let optional = |tag| Ok::<_, Error>(string_tag(header, tag)?.unwrap_or_default().to_string());

        let epoch = match int_tag(header, tag::EPOCH)? {
            Some(epoch) => Some(file::narrow(tag::EPOCH, epoch)?),
            None => None,
        };
        let size = match int_tag(header, tag::LONGSIZE)? {
            Some(size) => size,
            None => int_tag(header, tag::SIZE)?.unwrap_or(0),
        };
        let digest_algorithm = match int_tag(header, tag::FILEDIGESTALGO)? {
            Some(algo) => DigestAlgorithm::from(file::narrow::<u32>(tag::FILEDIGESTALGO, algo)?),
            None => DigestAlgorithm::default(),
        };
        let sigmd5 = bin_tag(header, tag::SIGMD5)?
            .map(hex::encode)
            .unwrap_or_default();

        let files = file::assemble(&FileArrays {
            dir_names: strs_tag(header, tag::DIRNAMES)?.unwrap_or_default(),
            dir_indexes: ints_tag(header, tag::DIRINDEXES)?,
            base_names: strs_tag(header, tag::BASENAMES)?.unwrap_or_default(),
            old_file_names: strs_tag(header, tag::OLDFILENAMES)?,
            modes: ints_tag(header, tag::FILEMODES)?,
            sizes: ints_tag(header, tag::FILESIZES)?,
            long_sizes: ints_tag(header, tag::LONGFILESIZES)?,
            digests: strs_tag(header, tag::FILEDIGESTS)?,
            flags: ints_tag(header, tag::FILEFLAGS)?,
            usernames: strs_tag(header, tag::FILEUSERNAME)?,
            groupnames: strs_tag(header, tag::FILEGROUPNAME)?,
        })?;

        Ok(PackageInfo {
            name: required(tag::NAME)?.to_string(),
            version: required(tag::VERSION)?.to_string(),
            release: required(tag::RELEASE)?.to_string(),
            epoch,
            arch: optional(tag::ARCH)?,
            source_rpm: optional(tag::SOURCERPM)?,
            vendor: optional(tag::VENDOR)?,
            license: optional(tag::LICENSE)?,
            size,
            summary: optional(tag::SUMMARY)?,
            install_time: int_tag(header, tag::INSTALLTIME)?.unwrap_or(0),
            modularity_label: optional(tag::MODULARITYLABEL)?,
            sigmd5,
            digest_algorithm,
            provides: strs_tag(header, tag::PROVIDENAME)?
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
            requires: strs_tag(header, tag::REQUIRENAME)?
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
            files,
        })
    }

    /// Parse and assemble in one step
    pub fn parse(blob: &[u8]) -> Result<PackageInfo, Error> {
        PackageInfo::from_header(&Header::parse(blob)?)
    }

    /// `name-[epoch:]version-release[.arch]`
    pub fn nevra(&self) -> String {
        let mut nevra = format!("{}-", self.name);
        if let Some(epoch) = self.epoch {
            nevra.push_str(&format!("{}:", epoch));
        }
        nevra.push_str(&format!("{}-{}", self.version, self.release));
        if !self.arch.is_empty() {
            nevra.push('.');
            nevra.push_str(&self.arch);
        }
        nevra
    }
}

impl Display for PackageInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.nevra())
    }
}

fn check_type<'a>(
    header: &'a Header,
    tag: i32,
    allowed: &[Type],
    expected: Type,
) -> Result<Option<&'a IndexEntry>, Error> {
    match header.get(tag) {
        Some(entry) if !allowed.contains(&entry.kind) => Err(Error::InvalidTagType {
            tag,
            expected,
            actual: entry.kind,
        }),
        entry => Ok(entry),
    }
}

const INT_TYPES: &[Type] = &[Type::Char, Type::Int8, Type::Int16, Type::Int32, Type::Int64];

fn string_tag(header: &Header, tag: i32) -> Result<Option<&str>, Error> {
    let entry = check_type(header, tag, &[Type::String, Type::I18nString], Type::String)?;
    // Localized strings hold one value per locale, the first is the default
    Ok(entry.and_then(|entry| {
        entry
            .value
            .as_str()
            .or_else(|| entry.value.as_strs()?.first().map(String::as_str))
    }))
}

fn strs_tag(header: &Header, tag: i32) -> Result<Option<&[String]>, Error> {
    let entry = check_type(
        header,
        tag,
        &[Type::StringArray, Type::I18nString],
        Type::StringArray,
    )?;
    Ok(entry.and_then(|entry| entry.value.as_strs()))
}

fn int_tag(header: &Header, tag: i32) -> Result<Option<u64>, Error> {
    Ok(ints_tag(header, tag)?.and_then(|ints| ints.first().copied()))
}

fn ints_tag(header: &Header, tag: i32) -> Result<Option<&[u64]>, Error> {
    let entry = check_type(header, tag, INT_TYPES, Type::Int32)?;
    Ok(entry.and_then(|entry| entry.value.as_ints()))
}

fn bin_tag(header: &Header, tag: i32) -> Result<Option<&[u8]>, Error> {
    let entry = check_type(header, tag, &[Type::Bin], Type::Bin)?;
    Ok(entry.and_then(|entry| entry.value.as_bytes()))
}
