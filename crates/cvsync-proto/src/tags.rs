//! Control-message tag bytes carried in every [`crate::envelope`] frame.
//!
//! RDIFF's own command bytes (`EOF`/`COPY`/`DATA`) are a separate, private
//! wire format scoped to a single file transfer and live in
//! `cvsync_rdiff::wire` instead of here.

/// Client -> server: opens a session, offering version/hash/compression.
pub const HELLO: u8 = 0x01;
/// Server -> client: replies to `HELLO` with its own offers.
pub const HELLO_ACK: u8 = 0x02;

/// Client -> server: requests a named collection.
pub const COLLECTION_REQUEST: u8 = 0x10;
/// Server -> client: the collection request was accepted.
pub const COLLECTION_OK: u8 = 0x11;
/// Server -> client: the collection request was denied.
pub const COLLECTION_DENIED: u8 = 0x12;

/// A scanfile record or batch, carried between DirScan/FileScan and their
/// downstream comparison stage.
pub const DIRSCAN_ENTRY: u8 = 0x20;
pub const DIRSCAN_DONE: u8 = 0x21;
pub const FILESCAN_ENTRY: u8 = 0x22;
pub const FILESCAN_DONE: u8 = 0x23;

/// DirCmp's verdict on a single pathname.
pub const DIRCMP_VERDICT: u8 = 0x30;
pub const DIRCMP_DONE: u8 = 0x31;
/// FileCmp's verdict on a single revision.
pub const FILECMP_VERDICT: u8 = 0x32;
pub const FILECMP_DONE: u8 = 0x33;

/// An update instruction delivered to the updater stage.
pub const UPDATE_PUT: u8 = 0x40;
pub const UPDATE_DELETE: u8 = 0x41;
pub const UPDATE_MKDIR: u8 = 0x42;
pub const UPDATE_RMDIR: u8 = 0x43;

/// Either side signals the whole session is finished.
pub const DONE: u8 = 0x50;
/// Either side reports an unrecoverable protocol or filesystem error.
pub const ERROR: u8 = 0x7f;

#[must_use]
pub fn name(tag: u8) -> &'static str {
    match tag {
        HELLO => "HELLO",
        HELLO_ACK => "HELLO_ACK",
        COLLECTION_REQUEST => "COLLECTION_REQUEST",
        COLLECTION_OK => "COLLECTION_OK",
        COLLECTION_DENIED => "COLLECTION_DENIED",
        DIRSCAN_ENTRY => "DIRSCAN_ENTRY",
        DIRSCAN_DONE => "DIRSCAN_DONE",
        FILESCAN_ENTRY => "FILESCAN_ENTRY",
        FILESCAN_DONE => "FILESCAN_DONE",
        DIRCMP_VERDICT => "DIRCMP_VERDICT",
        DIRCMP_DONE => "DIRCMP_DONE",
        FILECMP_VERDICT => "FILECMP_VERDICT",
        FILECMP_DONE => "FILECMP_DONE",
        UPDATE_PUT => "UPDATE_PUT",
        UPDATE_DELETE => "UPDATE_DELETE",
        UPDATE_MKDIR => "UPDATE_MKDIR",
        UPDATE_RMDIR => "UPDATE_RMDIR",
        DONE => "DONE",
        ERROR => "ERROR",
        _ => "UNKNOWN",
    }
}
