//! Thin daemon binary: listens on a TCP port and serves one collection to
//! connecting clients, one connection at a time.
//!
//! Daemon lifecycle (forking, PID files, signal handling, a config-file
//! keyword grammar) is out of scope here; it accepts exactly the flags
//! needed to serve a single named collection and runs in the foreground.

use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;

use clap::Parser;
use cvsync_core::{init_logging, serve_connection, ServerOptions};
use cvsync_session::{Collection, CollectionList, Release};
use tracing::{error, info};

/// Serves one RCS collection to connecting `cvsync` clients.
#[derive(Parser)]
#[command(name = "cvsyncd", version, about = None, long_about = None)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], cvsync_proto::DEFAULT_PORT)))]
    listen: SocketAddr,
    /// Collection name offered to clients.
    name: String,
    /// Path to the collection's data on disk.
    prefix: PathBuf,
    /// Release format served under this collection.
    #[arg(long, default_value = "rcs")]
    release: String,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let release = Release::parse(&args.release)?;
    let collection = Collection::new(args.name, release, args.prefix.to_string_lossy().into_owned());
    let collections = CollectionList::new(vec![collection]);

    let listener = TcpListener::bind(args.listen)?;
    info!(addr = %args.listen, "cvsyncd listening");

    for stream in listener.incoming() {
        let stream = stream?;
        let opts = ServerOptions::new(collections.clone());
        if let Err(err) = serve_connection(stream, &opts) {
            error!(%err, "session failed");
        }
    }
    Ok(())
}
