use std::io::Write;
use std::path::Path;

use crate::{wrap_io_err, Error, PackageInfo, RpmDb};

fn epoch_version(package: &PackageInfo) -> String {
    match package.epoch {
        Some(epoch) => format!("{}:{}-{}", epoch, package.version, package.release),
        None => format!("{}-{}", package.version, package.release),
    }
}

/// Print one line per package. Nothing is printed unless every record decodes.
pub fn list(db: impl AsRef<Path>, mut out: impl Write) -> Result<(), Error> {
    let packages = RpmDb::open(db)?.list_packages()?;
    for package in packages {
        let mut line = format!("{} {}", package.name, epoch_version(&package));
        if !package.arch.is_empty() {
            line.push('.');
            line.push_str(&package.arch);
        }
        writeln!(out, "{}\t{}\t{}", line, package.vendor, package.license)
            .map_err(wrap_io_err!("Writing package list"))?;
    }
    Ok(())
}

/// Print the files of every package named `name`, returning how many matched
pub fn files(db: impl AsRef<Path>, name: &str, mut out: impl Write) -> Result<usize, Error> {
    let packages = RpmDb::open(db)?.list_packages()?;
    let mut matched = 0;
    for package in packages {
        if package.name != name {
            continue;
        }
        matched += 1;
        for file in &package.files {
            writeln!(
                out,
                "{:06o} {:>10} {:<64} {}",
                file.mode, file.size, file.digest, file.path
            )
            .map_err(wrap_io_err!("Writing file list"))?;
        }
    }
    Ok(matched)
}

/// Count the packages, decoding each one
pub fn count(db: impl AsRef<Path>) -> Result<usize, Error> {
    let mut db = RpmDb::open(db)?;
    let mut count = 0;
    for package in db.packages() {
        package?;
        count += 1;
    }
    Ok(count)
}
