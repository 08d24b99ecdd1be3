//! The comparison-then-apply pipeline: DirScan and FileScan walk the
//! client's tree, DirCmp and FileCmp merge it against the server's, and the
//! Updater applies the result atomically.

mod dircmp;
mod directive;
mod dirscan;
mod error;
mod filecmp;
mod filescan;
mod rcsdiff;
pub mod tags;
mod updater;
mod wire;

pub use dircmp::compare;
pub use directive::{Directive, UpdateBody};
pub use dirscan::{frames_from_scan, Frame};
pub use error::PipelineError;
pub use filecmp::{read_server_copy, resolve, resolve_add, resolve_generic, resolve_rcs, resolve_rdiff, Resolution};
pub use filescan::{scan_directive, ScannedDirective};
pub use rcsdiff::{apply as apply_rcs_diff, delta_digest, diff as diff_rcs, ListChange, RcsDiff};
pub use updater::{
    apply_content, apply_mkdir, apply_rcs_attic, apply_remove_dir, apply_remove_file, apply_setattr, apply_symlink,
    record_add_or_update, record_remove, Content,
};
pub use wire::{
    recv_dirscan, recv_directives, run_dircmp, run_filecmp, run_filescan, run_updater, send_dirscan, Resolved,
};
