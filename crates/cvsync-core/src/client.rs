//! Client-side session driver: connects, negotiates, requests a collection,
//! and runs the three client-resident pipeline stages (DirScan, FileScan,
//! Updater) to completion.

use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cvsync_checksum::HashAlgorithm;
use cvsync_mux::{channels, Mux, MuxOptions};
use cvsync_proto::{client_handshake, request_collection, signal_collections_done, ClientHello, CompressionMode};
use cvsync_scan::ScanFile;

use crate::context::SessionContext;
use crate::error::CoreError;

/// One collection to sync during a client session: its name on the server,
/// where its tree is materialized locally, and where the client's cached
/// scanfile for it lives.
pub struct CollectionTarget {
    pub name: String,
    /// Where the collection's tree is materialized locally.
    pub local_root: PathBuf,
    /// Where the client's cached scanfile lives, if it has one. When absent
    /// or missing on disk, DirScan walks and offers an empty inventory, as
    /// if this were the collection's first sync.
    pub scanfile_path: Option<PathBuf>,
}

impl CollectionTarget {
    #[must_use]
    pub fn new(name: impl Into<String>, local_root: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), local_root: local_root.into(), scanfile_path: None }
    }
}

/// What the caller needs to run one client session. The umask, Attic error
/// policy, and distfile filters a collection applies come from the server's
/// grant, negotiated once each collection request is answered, not from
/// anything set here.
pub struct ClientOptions {
    pub addr: SocketAddr,
    /// Collections to sync this session, requested and synced in order.
    pub collections: Vec<CollectionTarget>,
    pub hash_offers: Vec<HashAlgorithm>,
    pub wants_compression: bool,
}

impl ClientOptions {
    #[must_use]
    pub fn new(addr: SocketAddr, collection: impl Into<String>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            addr,
            collections: vec![CollectionTarget::new(collection, local_root)],
            hash_offers: HashAlgorithm::PREFERENCE_ORDER.to_vec(),
            wants_compression: true,
        }
    }
}

/// Connects to `opts.addr`, negotiates a session, and syncs every collection
/// in `opts.collections` in order, each requested fresh and run through the
/// full DirScan/FileScan/Updater round trip before the next begins. Signals
/// the server once the list is exhausted and returns once every collection
/// has synced (or the session failed).
pub fn run_client(opts: ClientOptions) -> Result<(), CoreError> {
    let mut stream = TcpStream::connect(opts.addr)?;

    let hello = ClientHello {
        hash_offers: opts.hash_offers.clone(),
        wants_compression: opts.wants_compression,
    };
    let params = client_handshake(&mut stream, &hello)?;
    let mux = spawn_mux(stream, params.compression == CompressionMode::Zlib)?;
    let _ctx = SessionContext::new(Arc::clone(&mux), params);

    for target in &opts.collections {
        sync_one_collection(&mux, params, target)?;
    }

    signal_collections_done(&mux, channels::PRIMARY)?;
    Ok(())
}

fn sync_one_collection(
    mux: &Arc<Mux>,
    params: cvsync_proto::SessionParams,
    target: &CollectionTarget,
) -> Result<(), CoreError> {
    let grant = request_collection(mux, channels::PRIMARY, &target.name)?;
    tracing::info!(collection = %target.name, hash = ?params.hash, release = ?grant.release, "collection granted");

    let client_scan = load_or_empty_scanfile(target.scanfile_path.as_deref())?;

    let dirscan_mux = Arc::clone(mux);
    let dirscan_handle = std::thread::Builder::new()
        .name("cvsync-dirscan".into())
        .spawn(move || cvsync_pipeline::send_dirscan(&dirscan_mux, channels::PRIMARY, &client_scan))
        .expect("spawning dirscan thread");

    let filescan_root = target.local_root.clone();
    let filescan_mux = Arc::clone(mux);
    let filescan_hash = params.hash;
    let filescan_filters = grant.filters.clone();
    let filescan_handle = std::thread::Builder::new()
        .name("cvsync-filescan".into())
        .spawn(move || {
            cvsync_pipeline::run_filescan(
                &filescan_mux,
                channels::SECONDARY,
                channels::PRIMARY,
                &filescan_root,
                filescan_hash,
                &filescan_filters,
            )
        })
        .expect("spawning filescan thread");

    let mut final_scan = ScanFile::new();
    let updater_result =
        cvsync_pipeline::run_updater(mux, channels::SECONDARY, &target.local_root, &mut final_scan, params.hash, grant.umask);
    if updater_result.is_err() {
        mux.abort();
    }

    let dirscan_result = join_worker(dirscan_handle);
    if dirscan_result.is_err() {
        mux.abort();
    }
    let filescan_result = join_worker(filescan_handle);
    if filescan_result.is_err() {
        mux.abort();
    }

    updater_result?;
    dirscan_result?;
    filescan_result?;

    if let Some(path) = &target.scanfile_path {
        final_scan.write(path)?;
    }
    Ok(())
}

fn spawn_mux(stream: TcpStream, compress: bool) -> Result<Arc<Mux>, CoreError> {
    let reader = stream.try_clone()?;
    let shutdown_stream = stream.try_clone()?;
    let shutdown_hook: Box<dyn FnMut() + Send> =
        Box::new(move || { let _ = shutdown_stream.shutdown(std::net::Shutdown::Both); });
    Ok(Mux::spawn(
        reader,
        stream,
        MuxOptions {
            channels: 2,
            bufsize: cvsync_mux::DEFAULT_BUFSIZE,
            mss: cvsync_mux::MAX_MSS,
            compress,
        },
        Some(shutdown_hook),
    )?)
}

fn load_or_empty_scanfile(path: Option<&Path>) -> Result<ScanFile, CoreError> {
    match path {
        Some(p) if p.exists() => Ok(ScanFile::open(p)?),
        _ => Ok(ScanFile::new()),
    }
}

fn join_worker<T>(handle: std::thread::JoinHandle<Result<T, cvsync_pipeline::PipelineError>>) -> Result<T, CoreError> {
    handle
        .join()
        .map_err(|_| CoreError::WorkerPanicked)?
        .map_err(CoreError::from)
}
