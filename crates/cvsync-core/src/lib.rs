//! Session orchestration: negotiates a connection, wires the pipeline
//! stages together on dedicated threads, and exposes the client and server
//! entry points the two thin binaries call into.

mod client;
mod context;
mod error;
mod logging;
mod server;

pub use client::{run_client, ClientOptions, CollectionTarget};
pub use context::SessionContext;
pub use error::CoreError;
pub use logging::init_logging;
pub use server::{serve_connection, ServerOptions};

#[cfg(test)]
mod tests {
    use super::*;
    use cvsync_session::{Collection, CollectionList, Release};
    use std::net::TcpListener;

    #[test]
    fn client_syncs_a_new_file_from_the_server_end_to_end() {
        let server_root = tempfile::tempdir().unwrap();
        let client_root = tempfile::tempdir().unwrap();
        std::fs::write(server_root.path().join("b,v"), b"hello from the server").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let collections = CollectionList::new(vec![Collection::new(
            "ports",
            Release::Rcs,
            server_root.path().to_string_lossy().into_owned(),
        )]);
        let server_opts = ServerOptions::new(collections);

        let server_thread = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve_connection(stream, &server_opts).unwrap();
        });

        let client_opts = ClientOptions::new(addr, "ports", client_root.path());
        run_client(client_opts).unwrap();
        server_thread.join().unwrap();

        assert_eq!(
            std::fs::read(client_root.path().join("b,v")).unwrap(),
            b"hello from the server"
        );
    }

    #[test]
    fn client_syncs_multiple_collections_in_one_session() {
        let ports_root = tempfile::tempdir().unwrap();
        let docs_root = tempfile::tempdir().unwrap();
        std::fs::write(ports_root.path().join("a,v"), b"from ports").unwrap();
        std::fs::write(docs_root.path().join("b,v"), b"from docs").unwrap();

        let client_ports_root = tempfile::tempdir().unwrap();
        let client_docs_root = tempfile::tempdir().unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let collections = CollectionList::new(vec![
            Collection::new("ports", Release::Rcs, ports_root.path().to_string_lossy().into_owned()),
            Collection::new("docs", Release::Rcs, docs_root.path().to_string_lossy().into_owned()),
        ]);
        let server_opts = ServerOptions::new(collections);

        let server_thread = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve_connection(stream, &server_opts).unwrap();
        });

        let mut client_opts = ClientOptions::new(addr, "ports", client_ports_root.path());
        client_opts.collections.push(CollectionTarget::new("docs", client_docs_root.path()));
        run_client(client_opts).unwrap();
        server_thread.join().unwrap();

        assert_eq!(std::fs::read(client_ports_root.path().join("a,v")).unwrap(), b"from ports");
        assert_eq!(std::fs::read(client_docs_root.path().join("b,v")).unwrap(), b"from docs");
    }

    #[test]
    fn client_is_told_about_an_unknown_collection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let collections = CollectionList::new(Vec::new());
        let server_opts = ServerOptions::new(collections);

        let server_thread = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let err = serve_connection(stream, &server_opts).unwrap_err();
            assert!(matches!(err, CoreError::Proto(_)));
        });

        let client_root = tempfile::tempdir().unwrap();
        let client_opts = ClientOptions::new(addr, "nonexistent", client_root.path());
        let err = run_client(client_opts).unwrap_err();
        assert!(matches!(err, CoreError::Proto(_)));
        server_thread.join().unwrap();
    }
}
