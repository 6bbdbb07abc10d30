//! The relying party wired to the production adapters against a mock STS.

use std::sync::{Arc, Mutex};

use authlane_common::url_params::{param, query_params};
use authlane_core::{OidcPorts, OidcSecurityService, SilentRenewMessage};
use authlane_domain::OpenIdConfiguration;
use authlane_infra::{production_ports, MemoryStorage, NavigationCommand, WebviewBridge};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const PRIVATE_KEY: &[u8] = include_bytes!("fixtures/rsa_private.pem");
const JWKS: &str = include_str!("fixtures/jwks.json");
const REDIRECT_URL: &str = "https://app.example.com/callback";
const SILENT_RENEW_URL: &str = "https://app.example.com/silent-renew.html";

struct Sts {
    server: MockServer,
    id_token: Arc<Mutex<String>>,
}

impl Sts {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let issuer = server.uri();
        let id_token = Arc::new(Mutex::new(String::new()));

        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": issuer,
                "jwks_uri": format!("{issuer}/jwks"),
                "authorization_endpoint": format!("{issuer}/connect/authorize"),
                "token_endpoint": format!("{issuer}/connect/token"),
                "userinfo_endpoint": format!("{issuer}/connect/userinfo"),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_string(JWKS))
            .mount(&server)
            .await;
        let user_info = json!({ "sub": "alice", "name": "Alice" });
        Mock::given(method("GET"))
            .and(path("/connect/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_info))
            .mount(&server)
            .await;

        let current = Arc::clone(&id_token);
        Mock::given(method("POST"))
            .and(path("/connect/token"))
            .respond_with(move |_: &Request| {
                let id_token = current.lock().unwrap().clone();
                ResponseTemplate::new(200).set_body_json(json!({
                    "id_token": id_token,
                    "access_token": format!("access-{}", id_token.len()),
                    "refresh_token": "refresh-1",
                    "token_type": "Bearer",
                    "expires_in": 3600,
                }))
            })
            .mount(&server)
            .await;

        Self { server, id_token }
    }

    /// Sign the id token the next token request returns.
    fn issue_id_token(&self, nonce: Option<&str>) {
        let now = chrono::Utc::now().timestamp();
        let mut claims = json!({
            "iss": self.server.uri(),
            "sub": "alice",
            "aud": "spa",
            "iat": now,
            "exp": now + 3600,
        });
        if let Some(nonce) = nonce {
            claims["nonce"] = Value::String(nonce.to_string());
        }
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("authlane-test".into());
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY).unwrap();
        let token = encode(&header, &claims, &key).unwrap();
        *self.id_token.lock().unwrap() = token;
    }

    fn configuration(&self) -> OpenIdConfiguration {
        OpenIdConfiguration {
            sts_server: self.server.uri(),
            client_id: "spa".into(),
            redirect_url: REDIRECT_URL.into(),
            silent_renew_url: Some(SILENT_RENEW_URL.into()),
            ..OpenIdConfiguration::default()
        }
    }
}

fn service(
    config: OpenIdConfiguration,
) -> (Arc<OidcSecurityService>, mpsc::Receiver<NavigationCommand>) {
    let (bridge, host) = WebviewBridge::channel(8);
    let ports: OidcPorts =
        production_ports(Arc::new(MemoryStorage::new()), Arc::new(bridge)).unwrap();
    (Arc::new(OidcSecurityService::new(config, ports).unwrap()), host)
}

async fn login(
    sts: &Sts,
    service: &OidcSecurityService,
    host: &mut mpsc::Receiver<NavigationCommand>,
) {
    service.authorize(None).await.unwrap();
    let Some(NavigationCommand::Navigate { url }) = host.recv().await else {
        panic!("expected a navigation to the authorize endpoint");
    };
    let params = query_params(&url);
    sts.issue_id_token(param(&params, "nonce"));

    let state = param(&params, "state").unwrap();
    let callback = format!("{REDIRECT_URL}?code=code-1&state={state}");
    assert!(service.check_auth(Some(&callback)).await.unwrap());
}

#[tokio::test]
async fn code_flow_login_and_refresh_token_renewal() {
    let sts = Sts::start().await;
    let config = OpenIdConfiguration { use_refresh_token: true, ..sts.configuration() };
    let (service, mut host) = service(config);

    login(&sts, &service, &mut host).await;
    assert_eq!(service.get_user_data().unwrap()["name"], "Alice");
    assert_eq!(service.get_refresh_token().as_deref(), Some("refresh-1"));

    sts.issue_id_token(None);
    let tokens = service.force_refresh_session(None).await.unwrap().unwrap();
    assert_eq!(tokens.id_token, service.get_id_token());

    let grants = sts.server.received_requests().await.unwrap();
    let refresh = grants
        .iter()
        .filter(|request| request.url.path() == "/connect/token")
        .map(|request| String::from_utf8_lossy(&request.body).to_string())
        .find(|body| body.contains("grant_type=refresh_token"));
    assert!(refresh.unwrap().contains("refresh_token=refresh-1"));
}

#[tokio::test]
async fn forged_signature_is_rejected() {
    let sts = Sts::start().await;
    let (service, mut host) = service(sts.configuration());

    service.authorize(None).await.unwrap();
    let Some(NavigationCommand::Navigate { url }) = host.recv().await else {
        panic!("expected a navigation");
    };
    let params = query_params(&url);
    sts.issue_id_token(param(&params, "nonce"));
    {
        let mut token = sts.id_token.lock().unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[2] = parts[2].chars().rev().collect();
        *token = parts.join(".");
    }

    let callback = format!("{REDIRECT_URL}?code=code-1&state={}", param(&params, "state").unwrap());
    assert!(service.check_auth(Some(&callback)).await.is_err());
    assert!(!service.is_authenticated());
}

#[tokio::test]
async fn frame_renewal_through_the_webview_bridge() {
    let sts = Sts::start().await;
    let config = OpenIdConfiguration { silent_renew: true, ..sts.configuration() };
    let (service, mut host) = service(config);

    login(&sts, &service, &mut host).await;
    service.stop_periodic_validation();
    let first_token = service.get_id_token();

    let renewing = Arc::clone(&service);
    let host_task = tokio::spawn(async move {
        loop {
            match host.recv().await {
                Some(NavigationCommand::LoadRenewFrame { url, generation, loaded }) => {
                    loaded.send(Ok(())).unwrap();
                    return (url, generation, renewing);
                }
                Some(_) => continue,
                None => panic!("bridge closed"),
            }
        }
    });

    let (tokens, completed) = tokio::join!(service.force_refresh_session(None), async {
        let (url, generation, renewing) = host_task.await.unwrap();
        let params = query_params(&url);
        assert_eq!(param(&params, "prompt"), Some("none"));
        sts.issue_id_token(param(&params, "nonce"));

        let state = param(&params, "state").unwrap();
        renewing
            .handle_silent_renew_message(SilentRenewMessage {
                generation,
                url: format!("{SILENT_RENEW_URL}?code=code-2&state={state}"),
            })
            .await
    });

    assert!(completed.unwrap().is_some());
    let tokens = tokens.unwrap().unwrap();
    assert_ne!(tokens.id_token, first_token);
    assert!(sts.server.received_requests().await.unwrap().iter().any(|request| {
        request.url.path() == "/connect/token"
            && String::from_utf8_lossy(&request.body).contains("code=code-2")
    }));
}

#[tokio::test]
async fn sts_outage_fails_the_login_cleanly() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;
    Mock::given(method("POST"))
        .and(body_string_contains("grant_type"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = OpenIdConfiguration {
        sts_server: server.uri(),
        client_id: "spa".into(),
        redirect_url: REDIRECT_URL.into(),
        ..OpenIdConfiguration::default()
    };
    let (service, _host) = service(config);

    assert!(service.authorize(None).await.is_err());
    assert!(!service.is_authenticated());
}
