//! Server-side session driver: runs the handshake and collection grant over
//! an already-accepted connection, then drives the two server-resident
//! pipeline stages (DirCmp, FileCmp) to completion.

use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;

use cvsync_checksum::HashAlgorithm;
use cvsync_mux::{channels, Mux, MuxOptions};
use cvsync_proto::{answer_collection_request, server_handshake, CompressionMode, ServerHello};
use cvsync_scan::{walk, AtticPolicy, WalkOptions};
use cvsync_session::{CollectionList, ErrorMode};

use crate::context::SessionContext;
use crate::error::CoreError;

/// What the caller needs to answer client sessions.
pub struct ServerOptions {
    pub collections: CollectionList,
    pub hash_offers: Vec<HashAlgorithm>,
    pub wants_compression: bool,
}

impl ServerOptions {
    #[must_use]
    pub fn new(collections: CollectionList) -> Self {
        Self {
            collections,
            hash_offers: HashAlgorithm::PREFERENCE_ORDER.to_vec(),
            wants_compression: true,
        }
    }
}

/// Runs one client session to completion over an already-accepted
/// connection. The daemon accept loop itself (and fork/PID-file/signal
/// handling) is out of scope; callers hand us one connected socket at a
/// time, e.g. from a `TcpListener::incoming()` loop. Answers collection
/// requests in a loop until the client signals it has no more to ask for.
pub fn serve_connection(mut stream: TcpStream, opts: &ServerOptions) -> Result<(), CoreError> {
    let hello = ServerHello {
        hash_offers: opts.hash_offers.clone(),
        wants_compression: opts.wants_compression,
    };
    let params = server_handshake(&mut stream, &hello)?;
    let mux = spawn_mux(stream, params.compression == CompressionMode::Zlib)?;
    let _ctx = SessionContext::new(Arc::clone(&mux), params);

    while let Some(name) = answer_collection_request(&mux, channels::PRIMARY, &opts.collections)? {
        serve_one_collection(&mux, params, &opts.collections, &name)?;
    }
    Ok(())
}

fn serve_one_collection(
    mux: &Arc<Mux>,
    params: cvsync_proto::SessionParams,
    collections: &CollectionList,
    name: &str,
) -> Result<(), CoreError> {
    let collection = collections.get(name)?;
    tracing::info!(collection = %name, hash = ?params.hash, "syncing collection");

    let walk_opts = WalkOptions { fold_attic: true, attic_policy: attic_policy_for(collection.errormode) };
    let server_scan = walk(std::path::Path::new(&collection.prefix), &walk_opts)?;

    let dircmp_mux = Arc::clone(mux);
    let dircmp_filters = collection.filters.clone();
    let dircmp_handle = std::thread::Builder::new()
        .name("cvsync-dircmp".into())
        .spawn(move || cvsync_pipeline::run_dircmp(&dircmp_mux, channels::PRIMARY, channels::SECONDARY, &server_scan, &dircmp_filters))
        .expect("spawning dircmp thread");

    let filecmp_root = PathBuf::from(&collection.prefix);
    let filecmp_hash = params.hash;
    let filecmp_result =
        cvsync_pipeline::run_filecmp(mux, channels::PRIMARY, channels::SECONDARY, &filecmp_root, filecmp_hash);
    if filecmp_result.is_err() {
        mux.abort();
    }

    let dircmp_result = join_worker(dircmp_handle).map(|_directives| ());
    if dircmp_result.is_err() {
        mux.abort();
    }

    filecmp_result?;
    dircmp_result?;
    Ok(())
}

/// Translates a collection's configured error-handling policy into the
/// Attic-conflict policy the walk applies when a `,v` file exists both
/// live and under `Attic/` at once.
fn attic_policy_for(errormode: ErrorMode) -> AtticPolicy {
    match errormode {
        ErrorMode::Abort => AtticPolicy::Abort,
        ErrorMode::Fixup => AtticPolicy::Fixup,
        ErrorMode::Ignore => AtticPolicy::Ignore,
    }
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

fn join_worker<T>(handle: std::thread::JoinHandle<Result<T, cvsync_pipeline::PipelineError>>) -> Result<T, CoreError> {
    handle
        .join()
        .map_err(|_| CoreError::WorkerPanicked)?
        .map_err(CoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errormode_maps_onto_the_matching_attic_policy() {
        assert_eq!(attic_policy_for(ErrorMode::Abort), AtticPolicy::Abort);
        assert_eq!(attic_policy_for(ErrorMode::Fixup), AtticPolicy::Fixup);
        assert_eq!(attic_policy_for(ErrorMode::Ignore), AtticPolicy::Ignore);
    }
}
