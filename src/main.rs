use clap::{CommandFactory, Parser};
use hivexml::hive::HiveFile;
use hivexml::rootkey::locate_root_key;
use hivexml::store::KeyStore;
use hivexml::walker::walk_key;
use hivexml::XmlWriter;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "hivexml",
    about = "Parse a Windows Registry hive file and print its keys and values as XML"
)]
struct Cli {
    /// Determine the root key name from the hive file itself
    #[arg(short = 'a', long = "auto-root", conflicts_with = "root_key")]
    auto_root: bool,

    /// Root key name to seed every cell path
    #[arg(short = 'r', long = "root", value_name = "ROOTKEY")]
    root_key: Option<String>,

    /// Registry hive file
    hive_file: PathBuf,
}

fn main() {
    // Logs go to stderr so stdout stays clean XML.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    // Windows-style help alias, before clap sees the arguments.
    if std::env::args().any(|arg| arg == "/?") {
        let _ = Cli::command().print_help();
        return;
    }

    let cli = Cli::parse();

    // Validate the hive before resolving anything else; nothing is printed
    // until the root key name is known.
    let mut hive = match HiveFile::open(&cli.hive_file) {
        Ok(hive) => hive,
        Err(e) => fatal("cannot open or validate Registry hive", &e),
    };

    let root_name = if cli.auto_root {
        match locate_root_key(&cli.hive_file) {
            Ok(info) => info.name,
            Err(e) => fatal("cannot determine hive root key", &e),
        }
    } else if let Some(name) = cli.root_key {
        name
    } else {
        // Default root key: the hive file's own name, extension included.
        cli.hive_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    if let Err(e) = dump(&mut hive, &root_name) {
        eprintln!("error: {e}");
        process::exit(-1);
    }
}

/// Stream the whole hive as one XML document on stdout.
fn dump(hive: &mut HiveFile, root_name: &str) -> io::Result<()> {
    let stdout = io::stdout();
    let mut xml = XmlWriter::new(BufWriter::new(stdout.lock()));

    xml.open_document()?;
    match hive.root_key() {
        Ok(root) => walk_key(hive, &mut xml, &root, root_name)?,
        Err(e) => tracing::debug!("root key unavailable: {e}"),
    }
    xml.close_document()
}

/// Print a fatal diagnostic with the OS error code and exit -1.
fn fatal(context: &str, err: &dyn std::error::Error) -> ! {
    println!(">>> ERROR: {context}: {err}");
    let code = io::Error::last_os_error().raw_os_error().unwrap_or(0);
    println!("  > System error code: {code}");
    let _ = io::stdout().flush();
    process::exit(-1);
}
