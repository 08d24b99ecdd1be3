//! Thin client binary: connects to a `cvsyncd`, syncs one collection into a
//! local directory, and exits.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use cvsync_core::{init_logging, run_client, ClientOptions};

/// Syncs one RCS collection from a remote `cvsyncd` into a local directory.
#[derive(Parser)]
#[command(name = "cvsync", version, about = None, long_about = None)]
struct Args {
    /// Server address, e.g. `cvs.example.org:7777`.
    server: SocketAddr,
    /// Collection name to request.
    collection: String,
    /// Local directory to materialize the collection under.
    local_root: PathBuf,
    /// Path to the cached scanfile for this collection, if any.
    #[arg(long)]
    scanfile: Option<PathBuf>,
    /// Disable zlib compression negotiation.
    #[arg(long)]
    no_compress: bool,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let mut opts = ClientOptions::new(args.server, args.collection, args.local_root);
    opts.collections[0].scanfile_path = args.scanfile;
    opts.wants_compression = !args.no_compress;

    run_client(opts)?;
    Ok(())
}
