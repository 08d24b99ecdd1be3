//! Puts every other module in this crate on the actual mux wire: encodes
//! and decodes the DirScan/DirCmp/FileScan/FileCmp/Updater frame streams and
//! drives one collection's worth of each stage end to end.
//!
//! Each phase is collected as a batch rather than streamed instruction by
//! instruction, simpler to drive correctly than a fully pipelined version,
//! while still keeping every directive's directive-then-body bytes
//! contiguous on its channel.

use cvsync_checksum::HashAlgorithm;
use cvsync_mux::Mux;
use cvsync_proto::Envelope;
use cvsync_rdiff::{RdiffCommand, Signature};
use cvsync_scan::{Attr, EntryKind, ScanFile};
use cvsync_session::{FilterAction, FilterList};

use crate::directive::{Directive, UpdateBody};
use crate::dirscan::{frames_from_scan, Frame};
use crate::error::PipelineError;
use crate::filecmp::{self, Resolution};
use crate::filescan::{self, ScannedDirective};
use crate::tags;
use crate::updater;

const NO_BODY: u8 = 0xff;

fn dummy_attr(name: Vec<u8>, kind: EntryKind) -> Attr {
    Attr { kind, name, mtime: 0, size: 0, mode: 0, aux: Vec::new() }
}

fn encode_directive(directive: &Directive) -> Vec<u8> {
    let mut out = vec![directive.tag()];
    match directive {
        Directive::Add(a) | Directive::SetAttr(a) | Directive::Update(a) | Directive::RcsAttic(a) => a.encode(&mut out),
        Directive::Remove { name, kind } => dummy_attr(name.clone(), *kind).encode(&mut out),
    }
    out
}

fn decode_directive(payload: &[u8]) -> Result<Directive, PipelineError> {
    let &tag = payload.first().ok_or(PipelineError::UnknownBodyTag(0))?;
    let (attr, _) = Attr::decode(payload, 1)?;
    Ok(match tag {
        tags::directive::ADD => Directive::Add(attr),
        tags::directive::REMOVE => Directive::Remove { name: attr.name, kind: attr.kind },
        tags::directive::SETATTR => Directive::SetAttr(attr),
        tags::directive::UPDATE => Directive::Update(attr),
        tags::directive::RCS_ATTIC => Directive::RcsAttic(attr),
        other => return Err(PipelineError::UnknownBodyTag(other)),
    })
}

fn dirscan_tag(attr: &Attr) -> u8 {
    match attr.kind {
        EntryKind::Directory => tags::dirscan::DOWN,
        EntryKind::Symlink => tags::dirscan::SYMLINK,
        EntryKind::Attic => tags::dirscan::RCS_ATTIC,
        EntryKind::Rcs => tags::dirscan::RCS,
        EntryKind::File => tags::dirscan::FILE,
    }
}

/// Client-side DirScan: walks `scan` and ships the whole tree down `chan`,
/// bracketed by START/END.
pub fn send_dirscan(mux: &Mux, chan: u8, scan: &ScanFile) -> Result<(), PipelineError> {
    Envelope::new(tags::START, Vec::new()).write(mux, chan)?;
    for frame in frames_from_scan(scan) {
        match frame {
            Frame::Down(attr) | Frame::Leaf(attr) => {
                let tag = dirscan_tag(&attr);
                let mut payload = Vec::new();
                attr.encode(&mut payload);
                Envelope::new(tag, payload).write(mux, chan)?;
            }
            Frame::Up => Envelope::new(tags::dirscan::UP, Vec::new()).write(mux, chan)?,
            Frame::End => {}
        }
    }
    Envelope::new(tags::END, Vec::new()).write(mux, chan)?;
    Ok(())
}

/// Server-side DirScan receiver: every entry already carries its full path,
/// so reconstructing a flat, sorted [`ScanFile`] only needs the leaves —
/// DOWN/UP are read but not needed to place an entry.
pub fn recv_dirscan(mux: &Mux, chan: u8) -> Result<ScanFile, PipelineError> {
    let mut entries = Vec::new();
    loop {
        let envelope = Envelope::read(mux, chan)?;
        match envelope.tag {
            t if t == tags::END => break,
            t if t == tags::START || t == tags::dirscan::UP => {}
            _ => {
                let (attr, _) = Attr::decode(&envelope.payload, 0)?;
                entries.push(attr);
            }
        }
    }
    Ok(ScanFile::from_sorted(entries)?)
}

/// Server-side DirCmp: receives the client's tree, merges it against
/// `server_scan`, and ships the resulting directives down `out_chan`.
pub fn run_dircmp(
    mux: &Mux,
    in_chan: u8,
    out_chan: u8,
    server_scan: &ScanFile,
    filters: &FilterList,
) -> Result<Vec<Directive>, PipelineError> {
    let client_scan = recv_dirscan(mux, in_chan)?;
    let directives = crate::dircmp::compare(&client_scan, server_scan, filters);
    send_directives(mux, out_chan, &directives)?;
    Ok(directives)
}

fn send_directives(mux: &Mux, chan: u8, directives: &[Directive]) -> Result<(), PipelineError> {
    Envelope::new(tags::START, Vec::new()).write(mux, chan)?;
    for directive in directives {
        Envelope::new(directive.tag(), encode_directive(directive)).write(mux, chan)?;
    }
    Envelope::new(tags::END, Vec::new()).write(mux, chan)?;
    Ok(())
}

pub fn recv_directives(mux: &Mux, chan: u8) -> Result<Vec<Directive>, PipelineError> {
    let mut out = Vec::new();
    loop {
        let envelope = Envelope::read(mux, chan)?;
        if envelope.tag == tags::END {
            break;
        }
        if envelope.tag == tags::START {
            continue;
        }
        out.push(decode_directive(&envelope.payload)?);
    }
    Ok(out)
}

fn encode_body(body: &UpdateBody, out: &mut Vec<u8>) {
    match body {
        UpdateBody::Generic { size, hash } => {
            out.push(tags::update_body::GENERIC);
            out.extend_from_slice(&size.to_be_bytes());
            out.push(hash.len() as u8);
            out.extend_from_slice(hash);
        }
        UpdateBody::Rdiff(sig) => {
            out.push(tags::update_body::RDIFF);
            sig.write_to(out);
        }
        UpdateBody::Rcs(raw) => {
            out.push(tags::update_body::RCS);
            out.extend_from_slice(&(raw.len() as u32).to_be_bytes());
            out.extend_from_slice(raw);
        }
    }
}

fn decode_body(payload: &[u8]) -> Result<Option<UpdateBody>, PipelineError> {
    let &tag = payload.first().ok_or(PipelineError::UnknownBodyTag(0))?;
    if tag == NO_BODY {
        return Ok(None);
    }
    let rest = &payload[1..];
    match tag {
        tags::update_body::GENERIC => {
            let size = u64::from_be_bytes(rest.get(0..8).ok_or(PipelineError::UnknownBodyTag(tag))?.try_into().unwrap());
            let hashlen = *rest.get(8).ok_or(PipelineError::UnknownBodyTag(tag))? as usize;
            let hash = rest.get(9..9 + hashlen).ok_or(PipelineError::UnknownBodyTag(tag))?.to_vec();
            Ok(Some(UpdateBody::Generic { size, hash }))
        }
        tags::update_body::RDIFF => Ok(Some(UpdateBody::Rdiff(Signature::read_from(rest)?))),
        tags::update_body::RCS => {
            let len = u32::from_be_bytes(rest.get(0..4).ok_or(PipelineError::UnknownBodyTag(tag))?.try_into().unwrap()) as usize;
            let raw = rest.get(4..4 + len).ok_or(PipelineError::UnknownBodyTag(tag))?.to_vec();
            Ok(Some(UpdateBody::Rcs(raw)))
        }
        other => Err(PipelineError::UnknownBodyTag(other)),
    }
}

/// Client-side FileScan: attaches a content body to every directive that
/// needs one and ships the augmented stream down `out_chan`.
pub fn run_filescan(
    mux: &Mux,
    in_chan: u8,
    out_chan: u8,
    root: &std::path::Path,
    hash: HashAlgorithm,
    filters: &FilterList,
) -> Result<(), PipelineError> {
    let directives = recv_directives(mux, in_chan)?;
    Envelope::new(tags::START, Vec::new()).write(mux, out_chan)?;
    for directive in directives {
        let no_rdiff = filters.access(&String::from_utf8_lossy(directive.name())) == FilterAction::NoRdiff;
        let scanned = filescan::scan_directive(root, directive, hash, no_rdiff)?;
        let mut payload = encode_directive(&scanned.directive);
        match &scanned.body {
            Some(body) => encode_body(body, &mut payload),
            None => payload.push(NO_BODY),
        }
        Envelope::new(scanned.directive.tag(), payload).write(mux, out_chan)?;
    }
    Envelope::new(tags::END, Vec::new()).write(mux, out_chan)?;
    Ok(())
}

fn recv_scanned(mux: &Mux, chan: u8) -> Result<Vec<ScannedDirective>, PipelineError> {
    let mut out = Vec::new();
    loop {
        let envelope = Envelope::read(mux, chan)?;
        if envelope.tag == tags::END {
            break;
        }
        if envelope.tag == tags::START {
            continue;
        }
        let directive = decode_directive(&envelope.payload)?;
        let attr_len = 1 + directive_attr_len(&envelope.payload[1..])?;
        let body = decode_body(&envelope.payload[attr_len..])?;
        out.push(ScannedDirective { directive, body });
    }
    Ok(out)
}

/// How many bytes of `payload` (starting right after the directive tag
/// byte) the embedded [`Attr`] record consumes, so the caller can find
/// where the optional body starts.
fn directive_attr_len(payload: &[u8]) -> Result<usize, PipelineError> {
    let (_, next) = Attr::decode(payload, 0)?;
    Ok(next)
}

/// The fully resolved instruction the Updater replays for one directive.
pub struct Resolved {
    pub directive: Directive,
    pub resolution: Resolution,
}

const RES_NONE: u8 = 0;
const RES_GENERIC: u8 = 1;
const RES_RDIFF: u8 = 2;
const RES_RCS: u8 = 3;

fn encode_resolution(resolution: &Resolution, out: &mut Vec<u8>) {
    match resolution {
        Resolution::SetAttrOnly => out.push(RES_NONE),
        Resolution::Generic { data, hash } => {
            out.push(RES_GENERIC);
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            out.extend_from_slice(data);
            out.push(hash.len() as u8);
            out.extend_from_slice(hash);
        }
        Resolution::Rdiff { commands, whole_file_hash } => {
            out.push(RES_RDIFF);
            out.extend_from_slice(&(commands.len() as u32).to_be_bytes());
            for cmd in commands {
                cmd.write_to(out);
            }
            out.push(whole_file_hash.len() as u8);
            out.extend_from_slice(whole_file_hash);
        }
        Resolution::Rcs { diff, whole_file_hash } => {
            out.push(RES_RCS);
            let encoded = crate::rcsdiff::encode(diff);
            out.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
            out.extend_from_slice(&encoded);
            out.push(whole_file_hash.len() as u8);
            out.extend_from_slice(whole_file_hash);
        }
    }
}

fn decode_resolution(payload: &[u8]) -> Result<Resolution, PipelineError> {
    let &tag = payload.first().ok_or(PipelineError::UnknownBodyTag(0))?;
    let rest = &payload[1..];
    match tag {
        RES_NONE => Ok(Resolution::SetAttrOnly),
        RES_GENERIC => {
            let len = u32::from_be_bytes(rest.get(0..4).ok_or(PipelineError::UnknownBodyTag(tag))?.try_into().unwrap()) as usize;
            let data = rest.get(4..4 + len).ok_or(PipelineError::UnknownBodyTag(tag))?.to_vec();
            let hashlen = *rest.get(4 + len).ok_or(PipelineError::UnknownBodyTag(tag))? as usize;
            let hash = rest.get(5 + len..5 + len + hashlen).ok_or(PipelineError::UnknownBodyTag(tag))?.to_vec();
            Ok(Resolution::Generic { data, hash })
        }
        RES_RDIFF => {
            let count = u32::from_be_bytes(rest.get(0..4).ok_or(PipelineError::UnknownBodyTag(tag))?.try_into().unwrap());
            let mut pos = 4usize;
            let mut commands = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (cmd, used) = RdiffCommand::read_from(&rest[pos..])?;
                commands.push(cmd);
                pos += used;
            }
            let hashlen = *rest.get(pos).ok_or(PipelineError::UnknownBodyTag(tag))? as usize;
            let whole_file_hash = rest.get(pos + 1..pos + 1 + hashlen).ok_or(PipelineError::UnknownBodyTag(tag))?.to_vec();
            Ok(Resolution::Rdiff { commands, whole_file_hash })
        }
        RES_RCS => {
            let len = u32::from_be_bytes(rest.get(0..4).ok_or(PipelineError::UnknownBodyTag(tag))?.try_into().unwrap()) as usize;
            let encoded = rest.get(4..4 + len).ok_or(PipelineError::UnknownBodyTag(tag))?;
            let diff = crate::rcsdiff::decode(encoded)?;
            let hashlen = *rest.get(4 + len).ok_or(PipelineError::UnknownBodyTag(tag))? as usize;
            let whole_file_hash = rest.get(5 + len..5 + len + hashlen).ok_or(PipelineError::UnknownBodyTag(tag))?.to_vec();
            Ok(Resolution::Rcs { diff: Box::new(diff), whole_file_hash })
        }
        other => Err(PipelineError::UnknownBodyTag(other)),
    }
}

/// Server-side FileCmp: resolves every directive FileScan augmented (plus
/// ADD, which carries no client body at all) against `root` and ships the
/// result down `out_chan`.
pub fn run_filecmp(mux: &Mux, in_chan: u8, out_chan: u8, root: &std::path::Path, hash: HashAlgorithm) -> Result<(), PipelineError> {
    let scanned = recv_scanned(mux, in_chan)?;
    Envelope::new(tags::START, Vec::new()).write(mux, out_chan)?;
    for item in scanned {
        let resolution = match (&item.directive, &item.body) {
            (Directive::Add(_), _) => filecmp::resolve_add(root, &item.directive, hash)?,
            (Directive::Remove { .. } | Directive::SetAttr(_), _) => Resolution::SetAttrOnly,
            (Directive::Update(_) | Directive::RcsAttic(_), Some(body)) => filecmp::resolve(root, &item.directive, body, hash)?,
            (Directive::Update(_) | Directive::RcsAttic(_), None) => Resolution::SetAttrOnly,
        };
        let mut payload = encode_directive(&item.directive);
        encode_resolution(&resolution, &mut payload);
        Envelope::new(item.directive.tag(), payload).write(mux, out_chan)?;
    }
    Envelope::new(tags::END, Vec::new()).write(mux, out_chan)?;
    Ok(())
}

fn recv_resolved(mux: &Mux, chan: u8) -> Result<Vec<Resolved>, PipelineError> {
    let mut out = Vec::new();
    loop {
        let envelope = Envelope::read(mux, chan)?;
        if envelope.tag == tags::END {
            break;
        }
        if envelope.tag == tags::START {
            continue;
        }
        let directive = decode_directive(&envelope.payload)?;
        let attr_len = 1 + directive_attr_len(&envelope.payload[1..])?;
        let resolution = decode_resolution(&envelope.payload[attr_len..])?;
        out.push(Resolved { directive, resolution });
    }
    Ok(out)
}

/// Client-side Updater: receives the resolved directive stream and applies
/// each one to `root`, keeping `scan` (the client's own inventory) in sync.
pub fn run_updater(
    mux: &Mux,
    chan: u8,
    root: &std::path::Path,
    scan: &mut ScanFile,
    hash: HashAlgorithm,
    umask: u32,
) -> Result<(), PipelineError> {
    for item in recv_resolved(mux, chan)? {
        apply_resolved(root, scan, &item, hash, umask)?;
    }
    Ok(())
}

fn apply_resolved(
    root: &std::path::Path,
    scan: &mut ScanFile,
    item: &Resolved,
    hash: HashAlgorithm,
    umask: u32,
) -> Result<(), PipelineError> {
    match &item.directive {
        Directive::Remove { name, kind } => {
            if *kind == EntryKind::Directory {
                updater::apply_remove_dir(root, name)?;
            } else {
                updater::apply_remove_file(root, name, *kind)?;
            }
            updater::record_remove(scan, name);
        }
        Directive::SetAttr(attr) => {
            updater::apply_setattr(root, attr, umask)?;
            updater::record_add_or_update(scan, attr.clone());
        }
        Directive::Add(attr) | Directive::Update(attr) => {
            apply_content_directive(root, attr, &item.resolution, hash, umask)?;
            updater::record_add_or_update(scan, attr.clone());
        }
        Directive::RcsAttic(attr) => {
            let content = resolution_to_content(&item.resolution);
            let expected = resolution_hash(&item.resolution);
            updater::apply_rcs_attic(root, attr, content, expected.as_deref(), hash, umask)?;
            updater::record_add_or_update(scan, attr.clone());
        }
    }
    Ok(())
}

fn apply_content_directive(
    root: &std::path::Path,
    attr: &Attr,
    resolution: &Resolution,
    hash: HashAlgorithm,
    umask: u32,
) -> Result<(), PipelineError> {
    match attr.kind {
        EntryKind::Directory => updater::apply_mkdir(root, attr, umask),
        EntryKind::Symlink => updater::apply_symlink(root, attr),
        EntryKind::File | EntryKind::Rcs | EntryKind::Attic => match resolution {
            Resolution::SetAttrOnly => updater::apply_setattr(root, attr, umask),
            Resolution::Generic { data, hash: expected } => updater::apply_content(
                root,
                attr,
                updater::Content::Generic(data.clone()),
                Some(expected.as_slice()),
                hash,
                umask,
            ),
            Resolution::Rdiff { commands, whole_file_hash } => {
                let base = read_local(root, &attr.name)?;
                updater::apply_content(
                    root,
                    attr,
                    updater::Content::Rdiff { base, commands: commands.clone() },
                    Some(whole_file_hash.as_slice()),
                    hash,
                    umask,
                )
            }
            Resolution::Rcs { diff, whole_file_hash } => {
                let base = parse_local_rcs(root, &attr.name)?;
                updater::apply_content(
                    root,
                    attr,
                    updater::Content::Rcs { base, diff: (**diff).clone() },
                    Some(whole_file_hash.as_slice()),
                    hash,
                    umask,
                )
            }
        },
    }
}

fn read_local(root: &std::path::Path, name: &[u8]) -> Result<Vec<u8>, PipelineError> {
    let path = root.join(String::from_utf8_lossy(name).into_owned());
    std::fs::read(&path).map_err(|e| PipelineError::Io { path: path.display().to_string(), source: e })
}

fn parse_local_rcs(root: &std::path::Path, name: &[u8]) -> Result<cvsync_rcs::types::File, PipelineError> {
    let raw = read_local(root, name)?;
    Ok(cvsync_rcs::parse_file(&raw)?)
}

fn resolution_to_content(resolution: &Resolution) -> Option<updater::Content> {
    match resolution {
        Resolution::SetAttrOnly => None,
        Resolution::Generic { data, .. } => Some(updater::Content::Generic(data.clone())),
        Resolution::Rdiff { .. } | Resolution::Rcs { .. } => None,
    }
}

fn resolution_hash(resolution: &Resolution) -> Option<Vec<u8>> {
    match resolution {
        Resolution::SetAttrOnly => None,
        Resolution::Generic { hash, .. } => Some(hash.clone()),
        Resolution::Rdiff { whole_file_hash, .. } | Resolution::Rcs { whole_file_hash, .. } => Some(whole_file_hash.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvsync_mux::{channels, MuxOptions};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    fn spawn_mux(stream: TcpStream) -> Arc<Mux> {
        let opts = MuxOptions { channels: 2, bufsize: 16384, mss: 2048, compress: false };
        let read_half = stream.try_clone().unwrap();
        Mux::spawn(read_half, stream, opts, None).unwrap()
    }

    fn attr(name: &str, kind: EntryKind, mtime: i64, size: u64) -> Attr {
        Attr { kind, name: name.as_bytes().to_vec(), mtime, size, mode: 0o644, aux: Vec::new() }
    }

    #[test]
    fn dirscan_round_trips_through_a_real_mux() {
        let (client_io, server_io) = connected_pair();
        let client_mux = spawn_mux(client_io);
        let server_mux = spawn_mux(server_io);

        let scan = ScanFile::from_sorted(vec![
            attr("dir", EntryKind::Directory, 1, 0),
            attr("dir/a,v", EntryKind::Rcs, 10, 0),
        ])
        .unwrap();

        let sender = std::thread::spawn(move || send_dirscan(&client_mux, channels::PRIMARY, &scan));
        let received = recv_dirscan(&server_mux, channels::PRIMARY).unwrap();
        sender.join().unwrap().unwrap();

        assert_eq!(received.len(), 2);
        assert!(received.get(b"dir/a,v").is_some());
    }

    #[test]
    fn directive_encode_decode_round_trips() {
        let d = Directive::Update(attr("a,v", EntryKind::Rcs, 5, 0));
        let decoded = decode_directive(&encode_directive(&d)).unwrap();
        assert_eq!(decoded, d);

        let r = Directive::Remove { name: b"old,v".to_vec(), kind: EntryKind::Rcs };
        let decoded_r = decode_directive(&encode_directive(&r)).unwrap();
        assert_eq!(decoded_r, r);
    }

    #[test]
    fn body_encode_decode_round_trips() {
        let body = UpdateBody::Generic { size: 10, hash: vec![1, 2, 3] };
        let mut buf = Vec::new();
        encode_body(&body, &mut buf);
        assert_eq!(decode_body(&buf).unwrap(), Some(body));
    }

    #[test]
    fn rcs_body_encode_decode_round_trips() {
        let body = UpdateBody::Rcs(b"head 1.1;\n".to_vec());
        let mut buf = Vec::new();
        encode_body(&body, &mut buf);
        assert_eq!(decode_body(&buf).unwrap(), Some(body));
    }

    #[test]
    fn rcs_resolution_encode_decode_round_trips() {
        let diff = crate::rcsdiff::RcsDiff { locks_strict: Some(true), ..Default::default() };
        let resolution = Resolution::Rcs { diff: Box::new(diff), whole_file_hash: vec![9, 9, 9] };
        let mut buf = Vec::new();
        encode_resolution(&resolution, &mut buf);
        match decode_resolution(&buf).unwrap() {
            Resolution::Rcs { diff, whole_file_hash } => {
                assert_eq!(diff.locks_strict, Some(true));
                assert_eq!(whole_file_hash, vec![9, 9, 9]);
            }
            _ => panic!("expected an rcs resolution"),
        }
    }

    /// Exercises the Rcs content body end to end: client ships its own raw
    /// `,v` bytes, server diffs them against its own copy, and the client
    /// applies the resulting field-level diff against the base it already
    /// had on disk.
    #[test]
    fn full_pipeline_applies_an_rcs_field_diff_end_to_end() {
        fn rcs_text(text_11: &str) -> Vec<u8> {
            format!(
                "head 1.1;\naccess;\nsymbols;\nlocks;\n\n1.1\ndate\t95.01.01.00.00.00;\tauthor me;\tstate Exp;\nbranches;\nnext;\n\ndesc\n@@\n\n1.1\nlog\n@@\ntext\n@{text_11}@\n"
            )
            .into_bytes()
        }

        let server_root = tempfile::tempdir().unwrap();
        let client_root = tempfile::tempdir().unwrap();
        let client_copy = rcs_text("hello");
        let server_copy = rcs_text("world");
        std::fs::write(server_root.path().join("a.c,v"), &server_copy).unwrap();
        std::fs::write(client_root.path().join("a.c,v"), &client_copy).unwrap();

        let client_scan = ScanFile::from_sorted(vec![attr("a.c,v", EntryKind::Rcs, 1, 0)]).unwrap();
        let server_scan = ScanFile::from_sorted(vec![attr("a.c,v", EntryKind::Rcs, 2, 0)]).unwrap();

        let (c, s) = connected_pair();
        let client_mux = spawn_mux(c);
        let server_mux = spawn_mux(s);

        let dirscan_client = client_mux.clone();
        let dirscan_handle = std::thread::spawn(move || send_dirscan(&dirscan_client, channels::PRIMARY, &client_scan));
        let directives = run_dircmp(&server_mux, channels::PRIMARY, channels::SECONDARY, &server_scan, &FilterList::default()).unwrap();
        dirscan_handle.join().unwrap().unwrap();
        assert_eq!(directives.len(), 1);

        let filescan_root = client_root.path().to_path_buf();
        let filescan_client = client_mux.clone();
        let filescan_handle = std::thread::spawn(move || {
            run_filescan(&filescan_client, channels::SECONDARY, channels::PRIMARY, &filescan_root, HashAlgorithm::Md5, &FilterList::default())
        });
        run_filecmp(&server_mux, channels::PRIMARY, channels::SECONDARY, server_root.path(), HashAlgorithm::Md5).unwrap();
        filescan_handle.join().unwrap().unwrap();

        let mut final_scan = ScanFile::new();
        run_updater(&client_mux, channels::SECONDARY, client_root.path(), &mut final_scan, HashAlgorithm::Md5, 0).unwrap();

        let applied = cvsync_rcs::parse_file(&std::fs::read(client_root.path().join("a.c,v")).unwrap()).unwrap();
        let expected = cvsync_rcs::parse_file(&server_copy).unwrap();
        assert_eq!(applied.delta_text, expected.delta_text);
    }

    /// Drives every stage over one `Mux` pair, reusing `PRIMARY`/`SECONDARY`
    /// across phases exactly as the real client/server threads do — each
    /// phase fully drains its channel before the next phase reuses it.
    #[test]
    fn full_pipeline_applies_a_new_leaf_end_to_end() {
        let server_root = tempfile::tempdir().unwrap();
        let client_root = tempfile::tempdir().unwrap();
        std::fs::write(server_root.path().join("b,v"), b"new content").unwrap();

        let client_scan = ScanFile::new();
        let server_scan = ScanFile::from_sorted(vec![attr("b,v", EntryKind::Rcs, 42, 0)]).unwrap();

        let (c, s) = connected_pair();
        let client_mux = spawn_mux(c);
        let server_mux = spawn_mux(s);

        let dirscan_client = client_mux.clone();
        let dirscan_handle =
            std::thread::spawn(move || send_dirscan(&dirscan_client, channels::PRIMARY, &client_scan));
        let directives = run_dircmp(&server_mux, channels::PRIMARY, channels::SECONDARY, &server_scan, &FilterList::default()).unwrap();
        dirscan_handle.join().unwrap().unwrap();
        assert_eq!(directives.len(), 1);

        let filescan_root = client_root.path().to_path_buf();
        let filescan_client = client_mux.clone();
        let filescan_handle = std::thread::spawn(move || {
            run_filescan(&filescan_client, channels::SECONDARY, channels::PRIMARY, &filescan_root, HashAlgorithm::Md5, &FilterList::default())
        });
        run_filecmp(&server_mux, channels::PRIMARY, channels::SECONDARY, server_root.path(), HashAlgorithm::Md5).unwrap();
        filescan_handle.join().unwrap().unwrap();

        let mut final_scan = ScanFile::new();
        run_updater(&client_mux, channels::SECONDARY, client_root.path(), &mut final_scan, HashAlgorithm::Md5, 0).unwrap();

        assert_eq!(std::fs::read(client_root.path().join("b,v")).unwrap(), b"new content");
        assert!(final_scan.get(b"b,v").is_some());
    }
}
