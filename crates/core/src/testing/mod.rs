//! Test doubles for the core ports
//!
//! In-memory implementations of every port plus builders for unsigned
//! tokens and a fully wired [`Harness`]. Available to other crates with the
//! `test-utils` feature.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use authlane_common::MockClock;
use authlane_domain::constants::storage_keys;
use authlane_domain::{AuthError, AuthResult, JwtKeys, OpenIdConfiguration, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Semaphore};

use crate::ports::{AuthStorage, NavigationSurface, OidcTransport, TokenSignatureVerifier};
use crate::service::{OidcPorts, OidcSecurityService};

pub const ISSUER: &str = "https://sts.example.com";
pub const CLIENT_ID: &str = "spa";
pub const DISCOVERY_URL: &str = "https://sts.example.com/.well-known/openid-configuration";
pub const TOKEN_URL: &str = "https://sts.example.com/connect/token";
pub const USERINFO_URL: &str = "https://sts.example.com/connect/userinfo";
pub const JWKS_URL: &str = "https://sts.example.com/.well-known/jwks";
pub const REDIRECT_URL: &str = "https://app.example.com/callback";
pub const SILENT_RENEW_URL: &str = "https://app.example.com/silent-renew.html";

/// A storage mutation seen by [`MockStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Write(String),
    Remove(String),
}

/// In-memory [`AuthStorage`] with an operation log.
#[derive(Default)]
pub struct MockStorage {
    values: Mutex<HashMap<String, Value>>,
    ops: Mutex<Vec<StorageOp>>,
    fail_writes: AtomicBool,
}

impl MockStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    /// Store a value without recording an operation.
    pub fn seed(&self, key: &str, value: Value) {
        self.values.lock().insert(key.to_string(), value);
    }

    #[must_use]
    pub fn ops(&self) -> Vec<StorageOp> {
        self.ops.lock().clone()
    }

    /// How many times `key` was removed.
    #[must_use]
    pub fn removals(&self, key: &str) -> usize {
        self.ops.lock().iter().filter(|op| matches!(op, StorageOp::Remove(k) if k == key)).count()
    }

    #[must_use]
    pub fn writes(&self, key: &str) -> usize {
        self.ops.lock().iter().filter(|op| matches!(op, StorageOp::Write(k) if k == key)).count()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().clear();
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl AuthStorage for MockStorage {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: Value) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AuthError::Storage(format!("write to {key} rejected")));
        }
        self.ops.lock().push(StorageOp::Write(key.to_string()));
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.ops.lock().push(StorageOp::Remove(key.to_string()));
        self.values.lock().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub form: Vec<(String, String)>,
}

impl RecordedRequest {
    #[must_use]
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// [`OidcTransport`] answering from per-URL scripts.
///
/// Responses queued for a URL are returned in order; the last one repeats.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<(Method, String), VecDeque<Result<Value>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    post_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport scripted with discovery and JWKS for [`ISSUER`].
    #[must_use]
    pub fn with_discovery() -> Self {
        let transport = Self::new();
        transport.on_get(DISCOVERY_URL, Ok(well_known_document(ISSUER)));
        transport.on_get(JWKS_URL, Ok(jwks_document()));
        transport
    }

    pub fn on_get(&self, url: &str, response: Result<Value>) {
        self.push(Method::Get, url, response);
    }

    pub fn on_post(&self, url: &str, response: Result<Value>) {
        self.push(Method::Post, url, response);
    }

    /// Replace any queued responses for `url`.
    pub fn reset_post(&self, url: &str, response: Result<Value>) {
        self.responses.lock().insert((Method::Post, url.to_string()), VecDeque::from([response]));
    }

    /// Hold every POST until a permit is added to the returned semaphore.
    #[must_use]
    pub fn gate_posts(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.post_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    #[must_use]
    pub fn requests_to(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|request| request.url == url).count()
    }

    /// Requests other than discovery and JWKS.
    #[must_use]
    pub fn token_and_userinfo_requests(&self) -> usize {
        self.requests.lock().iter().filter(|r| r.url != DISCOVERY_URL && r.url != JWKS_URL).count()
    }

    fn push(&self, method: Method, url: &str, response: Result<Value>) {
        self.responses.lock().entry((method, url.to_string())).or_default().push_back(response);
    }

    fn respond(&self, request: RecordedRequest) -> Result<Value> {
        let key = (request.method, request.url.clone());
        self.requests.lock().push(request);
        let mut responses = self.responses.lock();
        match responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => {
                queue.pop_front().unwrap_or_else(|| Err(unscripted(&key.1)))
            }
            Some(queue) => queue.front().cloned().unwrap_or_else(|| Err(unscripted(&key.1))),
            None => Err(unscripted(&key.1)),
        }
    }
}

fn unscripted(url: &str) -> AuthError {
    AuthError::Transport(format!("no response scripted for {url}"))
}

#[async_trait]
impl OidcTransport for MockTransport {
    async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value> {
        self.respond(RecordedRequest {
            method: Method::Get,
            url: url.to_string(),
            bearer: bearer.map(str::to_string),
            form: Vec::new(),
        })
    }

    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<Value> {
        let gate = self.post_gate.lock().clone();
        if let Some(gate) = gate {
            let permit = gate.acquire().await.map_err(|err| AuthError::Transport(err.to_string()))?;
            permit.forget();
        }
        self.respond(RecordedRequest {
            method: Method::Post,
            url: url.to_string(),
            bearer: None,
            form: form.to_vec(),
        })
    }
}

/// A renew-frame load seen by [`MockNavigation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLoad {
    pub url: String,
    pub generation: u64,
}

/// [`NavigationSurface`] that records what the client asked for.
pub struct MockNavigation {
    frame_loads: Mutex<Vec<FrameLoad>>,
    history: Mutex<Vec<String>>,
    navigations: Mutex<Vec<String>>,
    fail_frames: AtomicBool,
    frame_attempts: AtomicUsize,
    events: mpsc::UnboundedSender<FrameLoad>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<FrameLoad>>>,
}

impl Default for MockNavigation {
    fn default() -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        Self {
            frame_loads: Mutex::default(),
            history: Mutex::default(),
            navigations: Mutex::default(),
            fail_frames: AtomicBool::new(false),
            frame_attempts: AtomicUsize::new(0),
            events,
            receiver: Mutex::new(Some(receiver)),
        }
    }
}

impl MockNavigation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn frame_loads(&self) -> Vec<FrameLoad> {
        self.frame_loads.lock().clone()
    }

    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }

    /// Frame loads requested, including failed ones.
    #[must_use]
    pub fn frame_load_attempts(&self) -> usize {
        self.frame_attempts.load(Ordering::SeqCst)
    }

    /// Make frame loads fail as if no frame could be obtained.
    pub fn fail_frames(&self, fail: bool) {
        self.fail_frames.store(fail, Ordering::SeqCst);
    }

    /// Stream of frame loads. Only the first caller gets it.
    pub fn take_frame_load_events(&self) -> Option<mpsc::UnboundedReceiver<FrameLoad>> {
        self.receiver.lock().take()
    }
}

#[async_trait]
impl NavigationSurface for MockNavigation {
    async fn load_silent_renew_frame(&self, url: &str, generation: u64) -> Result<()> {
        self.frame_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_frames.load(Ordering::SeqCst) {
            return Err(AuthError::IframeRenew("no renew frame available".into()));
        }
        let load = FrameLoad { url: url.to_string(), generation };
        self.frame_loads.lock().push(load.clone());
        // Nobody listening is fine.
        let _ = self.events.send(load);
        Ok(())
    }

    fn replace_history_state(&self, url: &str) {
        self.history.lock().push(url.to_string());
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.navigations.lock().push(url.to_string());
        Ok(())
    }
}

/// Accepts every signature.
pub struct AcceptAllVerifier;

impl TokenSignatureVerifier for AcceptAllVerifier {
    fn verify(&self, _id_token: &str, _keys: &JwtKeys) -> bool {
        true
    }
}

/// Rejects every signature.
pub struct RejectingVerifier;

impl TokenSignatureVerifier for RejectingVerifier {
    fn verify(&self, _id_token: &str, _keys: &JwtKeys) -> bool {
        false
    }
}

/// A JWT with `claims` as payload and a dummy signature.
#[must_use]
pub fn unsigned_jwt(claims: &Value) -> String {
    let header = json!({ "alg": "RS256", "kid": "test-key", "typ": "JWT" });
    format!(
        "{}.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// Valid id-token claims for [`ISSUER`] and [`CLIENT_ID`], issued at `now`.
#[must_use]
pub fn id_token_claims(now: i64, nonce: Option<&str>) -> Value {
    let mut claims = json!({
        "iss": ISSUER,
        "sub": "alice",
        "aud": CLIENT_ID,
        "iat": now,
        "exp": now + 3600,
    });
    if let (Some(nonce), Some(object)) = (nonce, claims.as_object_mut()) {
        object.insert("nonce".into(), Value::String(nonce.to_string()));
    }
    claims
}

/// Discovery document with the usual endpoint layout under `issuer`.
#[must_use]
pub fn well_known_document(issuer: &str) -> Value {
    json!({
        "issuer": issuer,
        "jwks_uri": format!("{issuer}/.well-known/jwks"),
        "authorization_endpoint": format!("{issuer}/connect/authorize"),
        "token_endpoint": format!("{issuer}/connect/token"),
        "userinfo_endpoint": format!("{issuer}/connect/userinfo"),
        "end_session_endpoint": format!("{issuer}/connect/endsession"),
    })
}

#[must_use]
pub fn jwks_document() -> Value {
    json!({
        "keys": [{
            "kty": "RSA",
            "use": "sig",
            "kid": "test-key",
            "alg": "RS256",
            "n": "AQAB",
            "e": "AQAB"
        }]
    })
}

/// Token endpoint response carrying `id_token`.
#[must_use]
pub fn token_response(id_token: &str, refresh_token: Option<&str>) -> Value {
    let mut response = json!({
        "id_token": id_token,
        "access_token": "access-token",
        "token_type": "Bearer",
        "expires_in": 3600,
    });
    if let (Some(refresh_token), Some(object)) = (refresh_token, response.as_object_mut()) {
        object.insert("refresh_token".into(), Value::String(refresh_token.to_string()));
    }
    response
}

/// Code-flow configuration with silent renew through the renew frame.
#[must_use]
pub fn test_configuration() -> OpenIdConfiguration {
    OpenIdConfiguration {
        sts_server: ISSUER.into(),
        client_id: CLIENT_ID.into(),
        redirect_url: REDIRECT_URL.into(),
        silent_renew: true,
        silent_renew_url: Some(SILENT_RENEW_URL.into()),
        ..OpenIdConfiguration::default()
    }
}

/// A service wired to mock ports.
pub struct Harness {
    pub service: OidcSecurityService,
    pub storage: Arc<MockStorage>,
    pub transport: Arc<MockTransport>,
    pub navigation: Arc<MockNavigation>,
    pub clock: MockClock,
}

impl Harness {
    /// Build with discovery and JWKS scripted and the clock at `now`.
    ///
    /// # Errors
    /// Configuration rejected by [`OidcSecurityService::new`].
    pub fn new(config: OpenIdConfiguration, now: i64) -> Result<Self> {
        Self::with_verifier(config, now, Arc::new(AcceptAllVerifier))
    }

    /// # Errors
    /// Configuration rejected by [`OidcSecurityService::new`].
    pub fn with_verifier(
        config: OpenIdConfiguration,
        now: i64,
        verifier: Arc<dyn TokenSignatureVerifier>,
    ) -> Result<Self> {
        let storage = Arc::new(MockStorage::new());
        let transport = Arc::new(MockTransport::with_discovery());
        let navigation = Arc::new(MockNavigation::new());
        let clock = MockClock::at_unix(now);
        let service = OidcSecurityService::new(
            config,
            OidcPorts {
                storage: Arc::clone(&storage) as Arc<dyn AuthStorage>,
                transport: Arc::clone(&transport) as Arc<dyn OidcTransport>,
                navigation: Arc::clone(&navigation) as Arc<dyn NavigationSurface>,
                verifier,
                clock: Arc::new(clock.clone()),
            },
        )?;
        Ok(Self { service, storage, transport, navigation, clock })
    }

    /// Persist a session as a previous run would have left it: tokens
    /// issued at `issued_at`, the id token and access token valid for
    /// `lifetime` seconds, plus cached user data.
    pub fn seed_session(&self, issued_at: i64, lifetime: i64) {
        let claims = json!({
            "iss": ISSUER,
            "sub": "alice",
            "aud": CLIENT_ID,
            "iat": issued_at,
            "exp": issued_at + lifetime,
        });
        let auth_result = AuthResult {
            id_token: Some(unsigned_jwt(&claims)),
            access_token: Some("access-token".into()),
            refresh_token: Some("refresh-token".into()),
            expires_in: Some(lifetime),
            ..AuthResult::default()
        };
        let stored = serde_json::to_value(&auth_result).unwrap_or(Value::Null);
        self.storage.seed(storage_keys::AUTHN_RESULT, stored);
        self.storage.seed(storage_keys::AUTHZ_DATA, json!("access-token"));
        self.storage.seed(storage_keys::ACCESS_TOKEN_EXPIRES_AT, json!(issued_at + lifetime));
        self.storage.seed(storage_keys::USER_DATA, json!({ "sub": "alice" }));
    }
}
