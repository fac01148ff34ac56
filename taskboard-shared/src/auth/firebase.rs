/// Firebase ID-token verification
///
/// Firebase Authentication issues RS256 JWTs signed by rotating Google keys.
/// The public keys are published as a JSON Web Key Set; the response's
/// `Cache-Control: max-age` says how long they stay valid.
///
/// # Checks
///
/// - `alg` is RS256 and `kid` names a published key
/// - signature, `exp`, `iat` not in the future
/// - `iss` is `https://securetoken.google.com/<project_id>`
/// - `aud` is `<project_id>`
/// - `sub` is non-empty and at most 128 characters
///
/// # Key refresh
///
/// Keys are re-fetched when the cached set expires or a token names an
/// unknown `kid`, but never more often than [`MIN_REFRESH_INTERVAL`].
/// Refreshes are serialized behind the cache's write lock, so concurrent
/// misses share one fetch. If a refresh fails, the expired keys keep
/// serving.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::auth::firebase::FirebaseVerifier;
/// use taskboard_shared::auth::verifier::TokenVerifier;
///
/// # async fn example(id_token: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let verifier = FirebaseVerifier::new("my-project")?;
/// verifier.initialize().await?;
///
/// let verified = verifier.verify(id_token).await?;
/// println!("signed in as {}", verified.subject);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::verifier::{validate_subject, TokenVerifier, VerifiedToken, VerifyError};

/// Google's JWKS endpoint for Firebase ID-token signing keys
pub const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Used when the key response carries no usable `max-age`
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(3600);

/// Floor between two fetches of the key set
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Clock skew tolerated for `exp` and `iat`
const LEEWAY_SECONDS: u64 = 60;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    iat: i64,
    #[serde(default)]
    auth_time: Option<i64>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug)]
struct KeyCache {
    keys: JwkSet,
    expires_at: Instant,
    /// Last fetch attempt, successful or not
    checked_at: Instant,
}

/// Outcome of looking a `kid` up in the cache
enum Lookup {
    Key(Result<DecodingKey, VerifyError>),
    Fetch,
}

fn unknown_key(kid: &str) -> VerifyError {
    VerifyError::Invalid(format!("unknown key id {}", kid))
}

impl KeyCache {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }

    fn decoding_key(&self, kid: &str) -> Option<Result<DecodingKey, VerifyError>> {
        self.keys.find(kid).map(|jwk| {
            DecodingKey::from_jwk(jwk)
                .map_err(|e| VerifyError::KeyUnavailable(format!("unusable key {}: {}", kid, e)))
        })
    }
}

/// [`TokenVerifier`] for Firebase Authentication ID tokens
pub struct FirebaseVerifier {
    project_id: String,
    jwks_url: String,
    http: reqwest::Client,
    cache: RwLock<Option<KeyCache>>,
    /// false when keys were supplied up front and must never be re-fetched
    refresh: bool,
    min_refresh: Duration,
}

impl std::fmt::Debug for FirebaseVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseVerifier")
            .field("project_id", &self.project_id)
            .field("jwks_url", &self.jwks_url)
            .field("refresh", &self.refresh)
            .field("min_refresh", &self.min_refresh)
            .finish()
    }
}

impl FirebaseVerifier {
    /// Verifier for `project_id` that fetches keys from [`GOOGLE_JWKS_URL`]
    pub fn new(project_id: impl Into<String>) -> Result<Self, VerifyError> {
        let project_id = project_id.into();
        if project_id.trim().is_empty() {
            return Err(VerifyError::Invalid("empty Firebase project id".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| VerifyError::KeyUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            project_id,
            jwks_url: GOOGLE_JWKS_URL.to_string(),
            http,
            cache: RwLock::new(None),
            refresh: true,
            min_refresh: MIN_REFRESH_INTERVAL,
        })
    }

    /// Overrides the key endpoint (emulators, tests)
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = url.into();
        self
    }

    /// Overrides [`MIN_REFRESH_INTERVAL`]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh = interval;
        self
    }

    /// Verifier with a fixed key set and no network access
    pub fn with_keys(project_id: impl Into<String>, keys: JwkSet) -> Self {
        Self {
            project_id: project_id.into(),
            jwks_url: String::new(),
            http: reqwest::Client::new(),
            cache: RwLock::new(Some(KeyCache {
                keys,
                // effectively never expires
                expires_at: Instant::now() + Duration::from_secs(100 * 365 * 24 * 3600),
                checked_at: Instant::now(),
            })),
            refresh: false,
            min_refresh: MIN_REFRESH_INTERVAL,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Expected `iss` claim
    pub fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    /// Fetches the signing keys now and returns how many were published
    ///
    /// Called once at startup; a failure here aborts the server.
    pub async fn initialize(&self) -> Result<usize, VerifyError> {
        if !self.refresh {
            let cache = self.cache.read().await;
            return Ok(cache.as_ref().map_or(0, |c| c.keys.keys.len()));
        }

        let fresh = self.fetch_keys().await?;
        let count = fresh.keys.keys.len();
        *self.cache.write().await = Some(fresh);

        tracing::info!(project_id = %self.project_id, keys = count, "Firebase signing keys loaded");
        Ok(count)
    }

    async fn fetch_keys(&self) -> Result<KeyCache, VerifyError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VerifyError::KeyUnavailable(e.to_string()))?;

        let ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(max_age)
            .unwrap_or(DEFAULT_KEY_TTL);

        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| VerifyError::KeyUnavailable(format!("malformed key set: {}", e)))?;

        tracing::debug!(keys = keys.keys.len(), ttl_secs = ttl.as_secs(), "Fetched signing keys");

        let now = Instant::now();
        Ok(KeyCache {
            keys,
            expires_at: now + ttl,
            checked_at: now,
        })
    }

    fn lookup(&self, cache: Option<&KeyCache>, kid: &str) -> Lookup {
        let Some(cache) = cache else {
            return Lookup::Fetch;
        };
        let key = cache.decoding_key(kid);
        if !self.refresh {
            return Lookup::Key(key.unwrap_or_else(|| Err(unknown_key(kid))));
        }

        let may_fetch = cache.checked_at.elapsed() >= self.min_refresh;
        match key {
            Some(key) if cache.is_fresh() || !may_fetch => Lookup::Key(key),
            None if !may_fetch => Lookup::Key(Err(unknown_key(kid))),
            _ => Lookup::Fetch,
        }
    }

    /// Resolves `kid`, refreshing the cache when stale or when the key is unknown
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, VerifyError> {
        if let Lookup::Key(key) = self.lookup(self.cache.read().await.as_ref(), kid) {
            return key;
        }

        let mut cache = self.cache.write().await;
        // another request may have refreshed while we waited for the lock
        if let Lookup::Key(key) = self.lookup(cache.as_ref(), kid) {
            return key;
        }

        match self.fetch_keys().await {
            Ok(fresh) => {
                let key = fresh.decoding_key(kid);
                *cache = Some(fresh);
                key.unwrap_or_else(|| Err(unknown_key(kid)))
            }
            Err(e) => {
                let Some(stale) = cache.as_mut() else {
                    return Err(e);
                };
                stale.checked_at = Instant::now();
                match stale.decoding_key(kid) {
                    Some(key) => {
                        tracing::warn!(error = %e, "Key refresh failed, using cached key");
                        key
                    }
                    None => Err(e),
                }
            }
        }
    }
}

/// Extracts `max-age` from a `Cache-Control` header value
pub fn max_age(cache_control: &str) -> Option<Duration> {
    cache_control
        .split(',')
        .map(str::trim)
        .find_map(|directive| {
            let (name, value) = directive.split_once('=')?;
            if name.trim().eq_ignore_ascii_case("max-age") {
                value.trim().parse::<u64>().ok()
            } else {
                None
            }
        })
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

#[async_trait]
impl TokenVerifier for FirebaseVerifier {
    fn provider(&self) -> &'static str {
        "firebase"
    }

    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifyError> {
        let header = decode_header(token).map_err(|e| VerifyError::Invalid(e.to_string()))?;

        if header.alg != Algorithm::RS256 {
            return Err(VerifyError::Invalid(format!("unexpected algorithm {:?}", header.alg)));
        }
        let kid = header
            .kid
            .ok_or_else(|| VerifyError::Invalid("missing 'kid' header".to_string()))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[self.issuer()]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);
        validation.leeway = LEEWAY_SECONDS;

        let data = decode::<FirebaseClaims>(token, &key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Invalid(e.to_string()),
            }
        })?;
        let claims = data.claims;

        let latest = Utc::now().timestamp() + LEEWAY_SECONDS as i64;
        if claims.iat > latest {
            return Err(VerifyError::Invalid("'iat' is in the future".to_string()));
        }
        if claims.auth_time.is_some_and(|t| t > latest) {
            return Err(VerifyError::Invalid("'auth_time' is in the future".to_string()));
        }
        validate_subject(&claims.sub)?;

        Ok(VerifiedToken {
            subject: claims.sub,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{header, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const PROJECT: &str = "taskboard-test";
    const KID: &str = "test-key-1";
    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/rsa_test_key.pem");
    const MODULUS: &str = "p--mbHs2Hv02QwfT9d40NX3k57ACgHhhJCLcTl4YxCsnBxSG7E4iY6VbYVO_melmLYfQj_dvEaD7OST-Q-02VLNvWGgjPGDDCISz5ZiBYm7iHl4pDoRg_Ndz5U1BDIew1r5MqlV8YhzMQrQTxJa7gwCv8RMh0uqB6yyDKfS1MWAnD1DkbU8kq4vvtTcKbuJx_iN4sa-z8eiJ8AZ70eSNxae3KJ9YPw-mz_UJPT1Vo7-w4grhekO7CHFHYscr4zeue6RXP6sYfi5M3BYamxyN-9OukYQGD-rtJ9gjL8pUpNQ9Zdbbv3afzyOqBpJN9-_gVp6TVy_V2Pk3P8NVwewzNQ";

    fn key_set() -> JwkSet {
        serde_json::from_value(json!({
            "keys": [{
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "kid": KID,
                "n": MODULUS,
                "e": "AQAB"
            }]
        }))
        .unwrap()
    }

    fn verifier() -> FirebaseVerifier {
        FirebaseVerifier::with_keys(PROJECT, key_set())
    }

    fn sign(claims: serde_json::Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    fn claims_for(sub: &str) -> serde_json::Value {
        let now = Utc::now().timestamp();
        json!({
            "sub": sub,
            "iss": format!("https://securetoken.google.com/{}", PROJECT),
            "aud": PROJECT,
            "iat": now,
            "auth_time": now,
            "exp": now + 3600,
            "email": "u1@example.com"
        })
    }

    #[tokio::test]
    async fn test_valid_token() {
        let token = sign(claims_for("u1"), KID);

        let verified = verifier().verify(&token).await.unwrap();
        assert_eq!(verified.subject, "u1");
        assert_eq!(verified.email.as_deref(), Some("u1@example.com"));
    }

    #[tokio::test]
    async fn test_wrong_audience() {
        let mut claims = claims_for("u1");
        claims["aud"] = json!("another-project");

        let result = verifier().verify(&sign(claims, KID)).await;
        assert!(matches!(result, Err(VerifyError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_wrong_issuer() {
        let mut claims = claims_for("u1");
        claims["iss"] = json!("https://securetoken.google.com/another-project");

        let result = verifier().verify(&sign(claims, KID)).await;
        assert!(matches!(result, Err(VerifyError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let mut claims = claims_for("u1");
        let past = Utc::now().timestamp() - 7200;
        claims["iat"] = json!(past);
        claims["auth_time"] = json!(past);
        claims["exp"] = json!(past + 60);

        let result = verifier().verify(&sign(claims, KID)).await;
        assert!(matches!(result, Err(VerifyError::Expired)));
    }

    #[tokio::test]
    async fn test_issued_in_the_future() {
        let mut claims = claims_for("u1");
        let future = Utc::now().timestamp() + 600;
        claims["iat"] = json!(future);
        claims["exp"] = json!(future + 3600);

        let result = verifier().verify(&sign(claims, KID)).await;
        assert!(matches!(result, Err(VerifyError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_unknown_kid_without_refresh() {
        let token = sign(claims_for("u1"), "rotated-away");

        let result = verifier().verify(&token).await;
        assert!(matches!(result, Err(VerifyError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_empty_subject() {
        let token = sign(claims_for(""), KID);
        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_hs256_token() {
        let token = crate::auth::jwt::create_token(
            &crate::auth::jwt::Claims::new("u1", "anyone"),
            "some-shared-secret-of-at-least-32-bytes",
        )
        .unwrap();

        let result = verifier().verify(&token).await;
        assert!(matches!(result, Err(VerifyError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_rejects_garbage() {
        assert!(verifier().verify("not.a.jwt").await.is_err());
        assert!(verifier().verify("").await.is_err());
    }

    #[tokio::test]
    async fn test_initialize_with_static_keys() {
        assert_eq!(verifier().initialize().await.unwrap(), 1);
    }

    #[test]
    fn test_new_requires_project() {
        assert!(FirebaseVerifier::new("  ").is_err());

        let verifier = FirebaseVerifier::new(PROJECT).unwrap();
        assert_eq!(verifier.issuer(), "https://securetoken.google.com/taskboard-test");
        assert_eq!(verifier.provider(), "firebase");
    }

    /// Local stand-in for Google's key endpoint
    #[derive(Clone)]
    struct KeyServer {
        keys: Arc<Mutex<serde_json::Value>>,
        max_age: u64,
        hits: Arc<AtomicUsize>,
        down: Arc<AtomicBool>,
    }

    async fn serve_keys(State(server): State<KeyServer>) -> Response {
        server.hits.fetch_add(1, Ordering::SeqCst);
        if server.down.load(Ordering::SeqCst) {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }

        let keys = server.keys.lock().unwrap().clone();
        (
            [(header::CACHE_CONTROL, format!("public, max-age={}", server.max_age))],
            Json(keys),
        )
            .into_response()
    }

    impl KeyServer {
        async fn start(keys: serde_json::Value, max_age: u64) -> (Self, String) {
            let server = Self {
                keys: Arc::new(Mutex::new(keys)),
                max_age,
                hits: Arc::new(AtomicUsize::new(0)),
                down: Arc::new(AtomicBool::new(false)),
            };
            let app = Router::new()
                .route("/keys", get(serve_keys))
                .with_state(server.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}/keys", listener.local_addr().unwrap());
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            (server, url)
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    fn key_set_json() -> serde_json::Value {
        serde_json::to_value(key_set()).unwrap()
    }

    fn remote_verifier(url: &str) -> FirebaseVerifier {
        FirebaseVerifier::new(PROJECT).unwrap().with_jwks_url(url)
    }

    #[tokio::test]
    async fn test_initialize_fetches_keys() {
        let (server, url) = KeyServer::start(key_set_json(), 3600).await;
        let verifier = remote_verifier(&url);

        assert_eq!(verifier.initialize().await.unwrap(), 1);
        assert!(verifier.verify(&sign(claims_for("u1"), KID)).await.is_ok());
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_initialize_fails_when_endpoint_is_down() {
        let (server, url) = KeyServer::start(key_set_json(), 3600).await;
        server.down.store(true, Ordering::SeqCst);

        let result = remote_verifier(&url).initialize().await;
        assert!(matches!(result, Err(VerifyError::KeyUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unknown_kid_refetch_is_throttled() {
        let (server, url) = KeyServer::start(key_set_json(), 3600).await;
        let verifier = remote_verifier(&url);
        verifier.initialize().await.unwrap();

        for i in 0..20 {
            let token = sign(claims_for("u1"), &format!("forged-{}", i));
            let result = verifier.verify(&token).await;
            assert!(matches!(result, Err(VerifyError::Invalid(_))));
        }
        assert_eq!(server.hits(), 1);

        assert!(verifier.verify(&sign(claims_for("u1"), KID)).await.is_ok());
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn test_rotated_key_is_picked_up() {
        let (server, url) = KeyServer::start(json!({ "keys": [] }), 3600).await;
        let verifier = remote_verifier(&url).with_min_refresh_interval(Duration::ZERO);
        assert_eq!(verifier.initialize().await.unwrap(), 0);

        *server.keys.lock().unwrap() = key_set_json();

        let verified = verifier.verify(&sign(claims_for("u1"), KID)).await.unwrap();
        assert_eq!(verified.subject, "u1");
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn test_expired_keys_are_refetched() {
        let (server, url) = KeyServer::start(key_set_json(), 1).await;
        let verifier = remote_verifier(&url).with_min_refresh_interval(Duration::ZERO);
        verifier.initialize().await.unwrap();

        assert!(verifier.verify(&sign(claims_for("u1"), KID)).await.is_ok());
        assert_eq!(server.hits(), 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(verifier.verify(&sign(claims_for("u1"), KID)).await.is_ok());
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn test_stale_keys_serve_while_endpoint_is_down() {
        let (server, url) = KeyServer::start(key_set_json(), 1).await;
        let verifier = remote_verifier(&url).with_min_refresh_interval(Duration::ZERO);
        verifier.initialize().await.unwrap();

        server.down.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let verified = verifier.verify(&sign(claims_for("u1"), KID)).await.unwrap();
        assert_eq!(verified.subject, "u1");
        assert_eq!(server.hits(), 2);

        let result = verifier.verify(&sign(claims_for("u1"), "never-published")).await;
        assert!(matches!(result, Err(VerifyError::KeyUnavailable(_))));
    }

    #[tokio::test]
    async fn test_failed_refresh_is_throttled() {
        let (server, url) = KeyServer::start(key_set_json(), 1).await;
        let verifier = remote_verifier(&url).with_min_refresh_interval(Duration::from_secs(1));
        verifier.initialize().await.unwrap();

        server.down.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        for _ in 0..5 {
            assert!(verifier.verify(&sign(claims_for("u1"), KID)).await.is_ok());
        }
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let (server, url) = KeyServer::start(key_set_json(), 3600).await;
        let verifier = Arc::new(remote_verifier(&url));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let verifier = verifier.clone();
                tokio::spawn(async move { verifier.verify(&sign(claims_for("u1"), KID)).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(server.hits(), 1);
    }

    #[test]
    fn test_max_age() {
        assert_eq!(
            max_age("public, max-age=19302, must-revalidate, no-transform"),
            Some(Duration::from_secs(19302))
        );
        assert_eq!(max_age("MAX-AGE = 60"), Some(Duration::from_secs(60)));
        assert_eq!(max_age("no-cache"), None);
        assert_eq!(max_age("max-age=0"), None);
        assert_eq!(max_age("max-age=soon"), None);
    }
}
