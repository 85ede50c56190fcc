//TODO: update clap to remove the need for this
#![allow(dangerous_implicit_autorefs)]

use std::io;

use anyhow::bail;
use clap::{
    crate_authors, crate_description, crate_name, crate_version, App, AppSettings, Arg, SubCommand,
};
use rpmdb::{count, files, list};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let arg_db = Arg::with_name("db")
        .help("Package database (Packages or rpmdb.sqlite)")
        .required(true)
        .value_name("DB");

    let matches = App::new(crate_name!())
        .author(crate_authors!(", "))
        .about(crate_description!())
        .version(crate_version!())
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("list")
                .about("List installed packages")
                .arg(&arg_db),
        )
        .subcommand(
            SubCommand::with_name("files")
                .about("List the files of a package")
                .arg(&arg_db)
                .arg(
                    Arg::with_name("name")
                        .help("Package name")
                        .required(true)
                        .value_name("NAME"),
                ),
        )
        .subcommand(
            SubCommand::with_name("count")
                .about("Count installed packages")
                .arg(&arg_db),
        )
        .get_matches();

    if let Some(matches) = matches.subcommand_matches("list") {
        list(matches.value_of("db").unwrap(), io::stdout().lock())?;
    } else if let Some(matches) = matches.subcommand_matches("files") {
        let name = matches.value_of("name").unwrap();
        if files(matches.value_of("db").unwrap(), name, io::stdout().lock())? == 0 {
            bail!("Package not found: {}", name);
        }
    } else if let Some(matches) = matches.subcommand_matches("count") {
        println!("{}", count(matches.value_of("db").unwrap())?);
    }
    Ok(())
}
