//! Per-session shared state: the mux handle, the negotiated parameters, and
//! the cooperative-abort/directory-read coordination the pipeline stages
//! share for the lifetime of one session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cvsync_mux::Mux;
use cvsync_proto::SessionParams;

/// State shared by every pipeline stage thread running on one peer for one
/// session. Cheap to clone: everything behind it is already `Arc`-wrapped.
#[derive(Clone)]
pub struct SessionContext {
    pub mux: Arc<Mux>,
    pub params: SessionParams,
    interrupted: Arc<AtomicBool>,
    /// Serializes directory-read sequences the way a process-wide
    /// `opendir`/`readdir`/`closedir` mutex would on a platform where that
    /// API is non-reentrant. `walkdir`'s own reads don't need this, but
    /// DirScan and FileScan take it around their walk anyway so the two
    /// stages never read the filesystem concurrently within one session.
    dir_read_lock: Arc<Mutex<()>>,
}

impl SessionContext {
    #[must_use]
    pub fn new(mux: Arc<Mux>, params: SessionParams) -> Self {
        Self {
            mux,
            params,
            interrupted: Arc::new(AtomicBool::new(false)),
            dir_read_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Requests cooperative shutdown. Polled by DirScan/FileScan at
    /// directory-walk granularity; does not itself abort the mux.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Runs `f` while holding the directory-read lock.
    pub fn with_dir_read_lock<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.dir_read_lock.lock().expect("dir read lock poisoned");
        f()
    }
}
