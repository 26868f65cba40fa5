//! End-to-end tests: a real server on an ephemeral port, driven by the
//! client library over HTTP.

use async_trait::async_trait;
use futures::TryStreamExt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use lockbox_client::{CardRecord, Client, ClientConfig, CredentialPair, Payload};
use lockbox_common::{Credentials, ResourceId, ResourceKind, Result};
use lockbox_crypto::{HashParams, SigningKey, TokenService};
use lockbox_rpc::Code;
use lockbox_server::{AuthInterceptor, AuthService, ResourceEngine, Server, VaultService};
use lockbox_storage::{
    BlobLocator, BlobReader, BlobStore, BlobWriter, Database, LocalBlobStore,
};

/// Blob store whose deletes always fail.
struct StuckBlobs(LocalBlobStore);

#[async_trait]
impl BlobStore for StuckBlobs {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn create(&self, locator: &BlobLocator) -> Result<Box<dyn BlobWriter>> {
        self.0.create(locator).await
    }

    async fn open(&self, locator: &BlobLocator) -> Result<BlobReader> {
        self.0.open(locator).await
    }

    async fn delete(&self, _locator: &BlobLocator) -> Result<()> {
        Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into())
    }

    async fn exists(&self, locator: &BlobLocator) -> Result<bool> {
        self.0.exists(locator).await
    }
}

struct TestServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(|files| Arc::new(LocalBlobStore::new(files).unwrap()) as Arc<dyn BlobStore>)
            .await
    }

    async fn start_with(blobs: impl FnOnce(&Path) -> Arc<dyn BlobStore>) -> Self {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("lockbox.db")).unwrap();
        let blobs = blobs(&dir.path().join("files"));

        let tokens = TokenService::new(&SigningKey::generate().unwrap());
        let auth = AuthService::new(db.clone(), tokens.clone(), chrono::Duration::hours(1))
            .with_hash_params(HashParams::minimal());
        let engine = ResourceEngine::new(db, blobs).with_chunk_size(16);
        let server = Server::new(
            AuthInterceptor::new(tokens),
            VaultService::new(auth, engine),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        Self {
            url,
            shutdown: Some(tx),
            handle,
            _dir: dir,
        }
    }

    fn client(&self) -> Client {
        Client::connect(&ClientConfig::default().with_server_url(&self.url)).unwrap()
    }

    async fn user(&self, login: &str) -> Client {
        let client = self.client();
        client.register(Credentials::new(login, "pw")).await.unwrap();
        client
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

fn credential(login: &str, password: &str) -> Payload {
    Payload::Credential(CredentialPair {
        login: login.to_string(),
        password: password.to_string(),
    })
}

#[tokio::test]
async fn test_register_then_login() {
    let server = TestServer::start().await;
    let client = server.client();

    let registered = client.register(Credentials::new("alice", "pw")).await.unwrap();
    let logged_in = client.login(Credentials::new("alice", "pw")).await.unwrap();
    assert!(!registered.token.is_empty());
    assert!(logged_in.expires_at > chrono::Utc::now());

    // The session token works for protected calls.
    client.resources().list(ResourceKind::File).await.unwrap();

    client.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_auth_failures() {
    let server = TestServer::start().await;
    let alice = server.user("alice").await;
    let client = server.client();

    let err = client
        .register(Credentials::new("alice", "other"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Code::AlreadyExists));

    let err = client
        .login(Credentials::new("nobody", "pw"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Code::NotFound));

    let err = client
        .login(Credentials::new("alice", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Code::NotFound));

    let err = client.register(Credentials::new("", "pw")).await.unwrap_err();
    assert_eq!(err.code(), Some(Code::InvalidArgument));

    let err = client.login(Credentials::new("bob", "")).await.unwrap_err();
    assert_eq!(err.code(), Some(Code::InvalidArgument));

    alice.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_missing_token_is_unauthenticated() {
    let server = TestServer::start().await;

    let response = post_without_token(&server.url, "/lockbox.Resources/ListResources").await;
    assert_eq!(response, 401);

    server.stop().await;
}

/// Raw POST without a token, via a plain TCP exchange.
async fn post_without_token(base: &str, path: &str) -> u16 {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let addr = base.trim_start_matches("http://");
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let body = r#"{"kind":"file"}"#;
    let request = format!(
        "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        path,
        addr,
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let text = String::from_utf8_lossy(&response);
    text.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap()
}

#[tokio::test]
async fn test_save_get_and_list() {
    let server = TestServer::start().await;
    let alice = server.user("alice").await;
    let resources = alice.resources();

    let id = resources
        .save_payload(&credential("a", "b"), b"work".to_vec())
        .await
        .unwrap();

    let fetched = resources.get(id).await.unwrap();
    assert_eq!(fetched.payload, credential("a", "b"));
    assert_eq!(fetched.meta_text(), "work");

    let listed = resources.list(ResourceKind::CredentialPair).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].meta, b"work");

    let card = Payload::Card(CardRecord {
        number: "4111111111111111".to_string(),
        until: "12/29".to_string(),
        name: "Ada".to_string(),
        surname: "Lovelace".to_string(),
    });
    let card_id = resources.save_payload(&card, b"visa".to_vec()).await.unwrap();
    assert_eq!(resources.get(card_id).await.unwrap().payload, card);
    assert_eq!(resources.list(ResourceKind::CardRecord).await.unwrap().len(), 1);
    assert_eq!(resources.list(ResourceKind::CredentialPair).await.unwrap().len(), 1);

    resources.delete(id).await.unwrap();
    let err = resources.get(id).await.unwrap_err();
    assert_eq!(err.code(), Some(Code::NotFound));
    assert!(resources.list(ResourceKind::CredentialPair).await.unwrap().is_empty());

    alice.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_owner_isolation() {
    let server = TestServer::start().await;
    let alice = server.user("alice").await;
    let bob = server.user("bob").await;

    let id = alice
        .resources()
        .save_payload(&credential("a", "b"), b"mine".to_vec())
        .await
        .unwrap();

    let err = bob.resources().get(id).await.unwrap_err();
    assert_eq!(err.code(), Some(Code::NotFound));
    let err = bob.resources().delete(id).await.unwrap_err();
    assert_eq!(err.code(), Some(Code::NotFound));
    assert!(bob
        .resources()
        .list(ResourceKind::CredentialPair)
        .await
        .unwrap()
        .is_empty());

    // Still there for its owner.
    alice.resources().get(id).await.unwrap();

    let err = bob
        .resources()
        .get(ResourceId::generate())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Code::NotFound));

    alice.shutdown().await;
    bob.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_file_round_trip() {
    let server = TestServer::start().await;
    let alice = server.user("alice").await;
    let resources = alice.resources().clone().with_chunk_size(7);

    let src = TempDir::new().unwrap();
    let content: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    let path = src.path().join("report.bin");
    tokio::fs::write(&path, &content).await.unwrap();

    let id = resources.save_file_from(&path).await.unwrap();

    let listed = resources.list(ResourceKind::File).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].meta, b"report.bin");

    let fetched = resources.get(id).await.unwrap();
    assert_eq!(fetched.payload, Payload::File);
    assert_eq!(fetched.meta_text(), "report.bin");

    let dst = TempDir::new().unwrap();
    let written = resources.get_file_to(id, dst.path()).await.unwrap();
    assert_eq!(written, dst.path().join("report.bin"));
    assert_eq!(tokio::fs::read(&written).await.unwrap(), content);

    resources.delete(id).await.unwrap();
    let err = resources.open_file(id).await.err().unwrap();
    assert_eq!(err.code(), Some(Code::NotFound));

    alice.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_empty_file_round_trip() {
    let server = TestServer::start().await;
    let alice = server.user("alice").await;

    let id = alice
        .resources()
        .upload(b"empty".to_vec(), tokio::io::empty())
        .await
        .unwrap();
    let (meta, data) = alice.resources().open_file(id).await.unwrap();
    assert_eq!(meta, b"empty");
    let chunks: Vec<bytes::Bytes> = data.try_collect().await.unwrap();
    assert!(chunks.iter().all(|c| c.is_empty()));

    alice.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_saving_file_kind_directly_is_rejected() {
    let server = TestServer::start().await;
    let alice = server.user("alice").await;

    let err = alice
        .resources()
        .save(ResourceKind::File, b"../../etc/passwd".to_vec(), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Code::InvalidArgument));

    alice.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_failed_blob_delete_keeps_record() {
    let server = TestServer::start_with(|files| {
        Arc::new(StuckBlobs(LocalBlobStore::new(files).unwrap())) as Arc<dyn BlobStore>
    })
    .await;
    let alice = server.user("alice").await;

    let id = alice
        .resources()
        .upload(b"keep.txt".to_vec(), &b"keep me"[..])
        .await
        .unwrap();

    let err = alice.resources().delete(id).await.unwrap_err();
    assert_eq!(err.code(), Some(Code::Internal));

    let (meta, data) = alice.resources().open_file(id).await.unwrap();
    assert_eq!(meta, b"keep.txt");
    let chunks: Vec<bytes::Bytes> = data.try_collect().await.unwrap();
    assert_eq!(chunks.concat(), b"keep me");

    alice.shutdown().await;
    server.stop().await;
}
