//! The full handshake: banner exchange, version/hash/compression
//! negotiation, and the collection request/grant that follows it.
//!
//! The banner and HELLO/HELLO_ACK exchange runs directly over the raw
//! transport, before any [`Mux`] exists: compression is one of the things
//! being negotiated, and a [`Mux`] must be constructed with its compression
//! mode fixed up front, so it can only be spawned once [`SessionParams`] is
//! known. The collection request that follows runs over the real,
//! correctly-compressed mux instead.

use std::io::{Read, Write};
use std::sync::Arc;

use cvsync_checksum::HashAlgorithm;
use cvsync_mux::Mux;
use cvsync_session::{Collection, CollectionList, ErrorMode, FilterAction, FilterList, FilterRule, Release};
use tracing::{debug, info};

use crate::banner::{recv_banner_raw, send_banner_raw};
use crate::compression::CompressionMode;
use crate::envelope::Envelope;
use crate::error::ProtoError;
use crate::tags;
use crate::version::Version;

/// What the client offers when opening a session.
#[derive(Debug, Clone)]
pub struct ClientHello {
    pub hash_offers: Vec<HashAlgorithm>,
    pub wants_compression: bool,
}

/// What the server offers in reply.
#[derive(Debug, Clone)]
pub struct ServerHello {
    pub hash_offers: Vec<HashAlgorithm>,
    pub wants_compression: bool,
}

/// The agreed-upon parameters both peers run the rest of the session with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub version: Version,
    pub hash: HashAlgorithm,
    pub compression: CompressionMode,
}

/// Everything about a granted collection the client needs to drive its own
/// half of the pipeline: the release format, the path it should materialize
/// the tree under, the permission mask, how to react to Attic
/// inconsistencies, and the distfile-style path filters.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionGrant {
    pub release: Release,
    pub rprefix: String,
    pub umask: u32,
    pub errormode: ErrorMode,
    pub filters: FilterList,
}

fn release_byte(release: Release) -> u8 {
    match release {
        Release::List => 0,
        Release::Rcs => 1,
    }
}

fn release_from_byte(b: u8) -> Result<Release, ProtoError> {
    match b {
        0 => Ok(Release::List),
        1 => Ok(Release::Rcs),
        _ => Err(ProtoError::MalformedCollectionGrant),
    }
}

fn errormode_byte(mode: ErrorMode) -> u8 {
    match mode {
        ErrorMode::Abort => 0,
        ErrorMode::Fixup => 1,
        ErrorMode::Ignore => 2,
    }
}

fn errormode_from_byte(b: u8) -> Result<ErrorMode, ProtoError> {
    match b {
        0 => Ok(ErrorMode::Abort),
        1 => Ok(ErrorMode::Fixup),
        2 => Ok(ErrorMode::Ignore),
        _ => Err(ProtoError::MalformedCollectionGrant),
    }
}

fn filter_action_byte(action: FilterAction) -> u8 {
    match action {
        FilterAction::Allow => 0,
        FilterAction::Deny => 1,
        FilterAction::NoRdiff => 2,
    }
}

fn filter_action_from_byte(b: u8) -> Result<FilterAction, ProtoError> {
    match b {
        0 => Ok(FilterAction::Allow),
        1 => Ok(FilterAction::Deny),
        2 => Ok(FilterAction::NoRdiff),
        _ => Err(ProtoError::MalformedCollectionGrant),
    }
}

fn write_short_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn read_short_string<'a>(bytes: &'a [u8], pos: &mut usize) -> Result<&'a str, ProtoError> {
    let len_bytes = bytes.get(*pos..*pos + 2).ok_or(ProtoError::MalformedCollectionGrant)?;
    let len = u16::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
    *pos += 2;
    let s = bytes.get(*pos..*pos + len).ok_or(ProtoError::MalformedCollectionGrant)?;
    *pos += len;
    std::str::from_utf8(s).map_err(|_| ProtoError::MalformedCollectionGrant)
}

fn read_u8(bytes: &[u8], pos: &mut usize) -> Result<u8, ProtoError> {
    let b = *bytes.get(*pos).ok_or(ProtoError::MalformedCollectionGrant)?;
    *pos += 1;
    Ok(b)
}

fn encode_collection_grant(collection: &Collection) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(release_byte(collection.release));
    write_short_string(&mut out, &collection.rprefix);
    out.extend_from_slice(&collection.umask.to_be_bytes());
    out.push(errormode_byte(collection.errormode));
    let rules = collection.filters.rules();
    out.extend_from_slice(&(rules.len() as u16).to_be_bytes());
    for rule in rules {
        out.push(filter_action_byte(rule.action));
        write_short_string(&mut out, rule.pattern());
    }
    out
}

fn decode_collection_grant(bytes: &[u8]) -> Result<CollectionGrant, ProtoError> {
    let mut pos = 0;
    let release = release_from_byte(read_u8(bytes, &mut pos)?)?;
    let rprefix = read_short_string(bytes, &mut pos)?.to_string();
    let umask_bytes = bytes.get(pos..pos + 4).ok_or(ProtoError::MalformedCollectionGrant)?;
    let umask = u32::from_be_bytes(umask_bytes.try_into().unwrap());
    pos += 4;
    let errormode = errormode_from_byte(read_u8(bytes, &mut pos)?)?;
    let count_bytes = bytes.get(pos..pos + 2).ok_or(ProtoError::MalformedCollectionGrant)?;
    let count = u16::from_be_bytes(count_bytes.try_into().unwrap());
    pos += 2;
    let mut rules = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let action = filter_action_from_byte(read_u8(bytes, &mut pos)?)?;
        let pattern = read_short_string(bytes, &mut pos)?;
        let rule = FilterRule::new(action, pattern).map_err(|_| ProtoError::MalformedCollectionGrant)?;
        rules.push(rule);
    }
    Ok(CollectionGrant { release, rprefix, umask, errormode, filters: FilterList::new(rules) })
}

fn encode_hash_offers(offers: &[HashAlgorithm]) -> Vec<u8> {
    let mut out = vec![offers.len() as u8];
    out.extend(offers.iter().map(|h| *h as u8));
    out
}

fn decode_hash_offers(bytes: &[u8]) -> Vec<HashAlgorithm> {
    bytes
        .iter()
        .skip(1)
        .take(bytes.first().copied().unwrap_or(0) as usize)
        .filter_map(|b| HashAlgorithm::PREFERENCE_ORDER.iter().find(|h| **h as u8 == *b).copied())
        .collect()
}

/// Runs the client side of the handshake over the raw transport, before a
/// [`Mux`] has been spawned: sends our banner and HELLO, reads the server's
/// reply, and negotiates the session parameters. Does not send the
/// collection request itself; callers do that over a [`Mux`] spawned with
/// the returned [`SessionParams::compression`] once they've decided which
/// collection to ask for.
pub fn client_handshake<S: Read + Write>(
    stream: &mut S,
    hello: &ClientHello,
) -> Result<SessionParams, ProtoError> {
    send_banner_raw(stream, Version::OURS)?;
    let server_version = recv_banner_raw(stream)?;
    let version = Version::negotiate(Version::OURS, server_version)
        .ok_or(ProtoError::UnsupportedVersion {
            major: server_version.major,
            minor: server_version.minor,
            min_major: Version::OURS.major,
            min_minor: Version::OURS.minor,
        })?;
    version.check_supported()?;

    let mut payload = encode_hash_offers(&hello.hash_offers);
    payload.push(u8::from(hello.wants_compression));
    Envelope::new(tags::HELLO, payload).write_raw(stream)?;

    let reply = Envelope::read_raw(stream)?;
    if reply.tag != tags::HELLO_ACK {
        return Err(ProtoError::BadBanner);
    }
    let server_offers = decode_hash_offers(&reply.payload);
    let server_wants_compression = reply.payload.last().copied().unwrap_or(0) != 0;

    let hash = HashAlgorithm::negotiate(&server_offers);
    if !hello.hash_offers.contains(&hash) {
        return Err(ProtoError::NoCommonHash);
    }
    let compression = CompressionMode::negotiate(hello.wants_compression, server_wants_compression);

    debug!(%version, ?hash, ?compression, "client handshake complete");
    Ok(SessionParams { version, hash, compression })
}

/// Runs the server side of the handshake symmetrically to
/// [`client_handshake`].
pub fn server_handshake<S: Read + Write>(
    stream: &mut S,
    hello: &ServerHello,
) -> Result<SessionParams, ProtoError> {
    let client_version = recv_banner_raw(stream)?;
    send_banner_raw(stream, Version::OURS)?;
    let version = Version::negotiate(client_version, Version::OURS)
        .ok_or(ProtoError::UnsupportedVersion {
            major: client_version.major,
            minor: client_version.minor,
            min_major: Version::OURS.major,
            min_minor: Version::OURS.minor,
        })?;
    version.check_supported()?;

    let request = Envelope::read_raw(stream)?;
    if request.tag != tags::HELLO {
        return Err(ProtoError::BadBanner);
    }
    let client_offers = decode_hash_offers(&request.payload);
    let client_wants_compression = request.payload.last().copied().unwrap_or(0) != 0;

    let mut payload = encode_hash_offers(&hello.hash_offers);
    payload.push(u8::from(hello.wants_compression));
    Envelope::new(tags::HELLO_ACK, payload).write_raw(stream)?;

    let hash = HashAlgorithm::negotiate(&client_offers);
    if !hello.hash_offers.contains(&hash) {
        return Err(ProtoError::NoCommonHash);
    }
    let compression = CompressionMode::negotiate(client_wants_compression, hello.wants_compression);

    info!(%version, ?hash, ?compression, "server handshake complete");
    Ok(SessionParams { version, hash, compression })
}

/// Client-side collection request/response exchange, run after the
/// handshake has settled on [`SessionParams`]. On success, returns the full
/// collection record the server granted: release format, destination
/// prefix, umask, Attic error policy, and distfile filters.
pub fn request_collection(mux: &Arc<Mux>, chan: u8, name: &str) -> Result<CollectionGrant, ProtoError> {
    Envelope::new(tags::COLLECTION_REQUEST, name.as_bytes().to_vec()).write(mux, chan)?;
    let reply = Envelope::read(mux, chan)?;
    match reply.tag {
        tags::COLLECTION_OK => decode_collection_grant(&reply.payload),
        tags::COLLECTION_DENIED => {
            let reason = String::from_utf8_lossy(&reply.payload).into_owned();
            Err(ProtoError::CollectionDenied(name.to_string(), reason))
        }
        _ => Err(ProtoError::BadBanner),
    }
}

/// Client-side signal that it has no more collections to request this
/// session. Sent once after the client's last [`request_collection`] call;
/// the matching [`answer_collection_request`] on the server reads this as
/// `Ok(None)` and the server's per-connection collection loop ends.
pub fn signal_collections_done(mux: &Arc<Mux>, chan: u8) -> Result<(), ProtoError> {
    Envelope::new(tags::DONE, Vec::new()).write(mux, chan)?;
    Ok(())
}

/// Server-side half of [`request_collection`]: reads either a collection
/// request or the client's end-of-list signal. Checks a request against the
/// configured collections and on success replies with the full collection
/// record instead of a bare acknowledgement; returns `Ok(None)` once the
/// client signals it has no more collections to ask for, which ends the
/// per-connection collection loop.
pub fn answer_collection_request(
    mux: &Arc<Mux>,
    chan: u8,
    collections: &CollectionList,
) -> Result<Option<String>, ProtoError> {
    let request = Envelope::read(mux, chan)?;
    if request.tag == tags::DONE {
        return Ok(None);
    }
    if request.tag != tags::COLLECTION_REQUEST {
        return Err(ProtoError::BadBanner);
    }
    let name = String::from_utf8_lossy(&request.payload).into_owned();
    match collections.get(&name) {
        Ok(collection) => {
            let payload = encode_collection_grant(collection);
            Envelope::new(tags::COLLECTION_OK, payload).write(mux, chan)?;
            Ok(Some(name))
        }
        Err(err) => {
            Envelope::new(tags::COLLECTION_DENIED, err.to_string().into_bytes()).write(mux, chan)?;
            Err(ProtoError::CollectionDenied(name, err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvsync_mux::MuxOptions;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let addr = listener.local_addr().expect("local addr");
        let client = thread::spawn(move || TcpStream::connect(addr).expect("connect loopback"));
        let (server, _) = listener.accept().expect("accept loopback connection");
        (client.join().expect("client thread"), server)
    }

    fn spawn_mux(stream: TcpStream) -> Arc<Mux> {
        let reader = stream.try_clone().expect("clone stream for reading");
        Mux::spawn(
            reader,
            stream,
            MuxOptions {
                channels: 1,
                bufsize: 16384,
                mss: 2048,
                compress: false,
            },
            None,
        )
        .expect("mux options are valid")
    }

    #[test]
    fn client_and_server_agree_on_params() {
        let (mut client_stream, mut server_stream) = connected_pair();

        let client_hello = ClientHello {
            hash_offers: vec![HashAlgorithm::Sha1, HashAlgorithm::Md5],
            wants_compression: true,
        };
        let server_hello = ServerHello {
            hash_offers: vec![HashAlgorithm::Md5, HashAlgorithm::Ripemd160],
            wants_compression: true,
        };

        let client_thread = thread::spawn(move || client_handshake(&mut client_stream, &client_hello));
        let server_params = server_handshake(&mut server_stream, &server_hello).unwrap();
        let client_params = client_thread.join().unwrap().unwrap();

        assert_eq!(client_params, server_params);
        assert_eq!(client_params.hash, HashAlgorithm::Md5);
        assert_eq!(client_params.compression, CompressionMode::Zlib);
    }

    #[test]
    fn collection_request_is_denied_for_unknown_name() {
        let (client_stream, server_stream) = connected_pair();
        let client = spawn_mux(client_stream);
        let server = spawn_mux(server_stream);

        let collections = CollectionList::new(vec![Collection::new(
            "ports",
            Release::Rcs,
            "/cvs/ports",
        )]);

        let server_thread = thread::spawn(move || answer_collection_request(&server, 0, &collections));
        let err = request_collection(&client, 0, "nonexistent").unwrap_err();
        assert!(matches!(err, ProtoError::CollectionDenied(_, _)));
        assert!(server_thread.join().unwrap().is_err());
    }

    #[test]
    fn done_signal_ends_the_collection_loop_with_none() {
        let (client_stream, server_stream) = connected_pair();
        let client = spawn_mux(client_stream);
        let server = spawn_mux(server_stream);

        let collections = CollectionList::new(vec![Collection::new("ports", Release::Rcs, "/cvs/ports")]);

        let server_thread = thread::spawn(move || answer_collection_request(&server, 0, &collections));
        signal_collections_done(&client, 0).unwrap();
        assert_eq!(server_thread.join().unwrap().unwrap(), None);
    }

    #[test]
    fn granted_collection_carries_its_full_configuration_to_the_client() {
        let (client_stream, server_stream) = connected_pair();
        let client = spawn_mux(client_stream);
        let server = spawn_mux(server_stream);

        let filters = FilterList::new(vec![
            FilterRule::new(FilterAction::Deny, "*.orig").unwrap(),
            FilterRule::new(FilterAction::NoRdiff, "*.tar.gz").unwrap(),
        ]);
        let collections = CollectionList::new(vec![Collection::new("ports", Release::Rcs, "/cvs/ports")
            .with_rprefix("ports")
            .with_umask(0o027)
            .with_errormode(ErrorMode::Ignore)
            .with_filters(filters)]);

        let server_thread = thread::spawn(move || answer_collection_request(&server, 0, &collections));
        let grant = request_collection(&client, 0, "ports").unwrap();
        assert_eq!(server_thread.join().unwrap().unwrap(), Some("ports".to_string()));

        assert_eq!(grant.release, Release::Rcs);
        assert_eq!(grant.rprefix, "ports");
        assert_eq!(grant.umask, 0o027);
        assert_eq!(grant.errormode, ErrorMode::Ignore);
        assert_eq!(grant.filters.access("a.orig"), FilterAction::Deny);
        assert_eq!(grant.filters.access("a.tar.gz"), FilterAction::NoRdiff);
        assert_eq!(grant.filters.access("a.c"), FilterAction::Allow);
    }
}
