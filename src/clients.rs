// ABOUTME: OAuth2 dynamic client registry: registration, validation, lookup, lifecycle
// ABOUTME: Argon2-hashed secrets, byte-exact redirect matching, TTL-bounded read cache
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use crate::constants::{limits, oauth};
use crate::database_plugins::{factory, DatabaseProvider};
use crate::errors::{AppError, AppResult};
use crate::models::Client;
use crate::utils::time::bounded;
use crate::utils::{generate_client_id, generate_client_secret};
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Request payload for dynamic client registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistrationRequest {
    /// Redirect URIs the client may use; at least one is required
    pub redirect_uris: Vec<String>,
    /// Human-readable client name
    pub client_name: String,
    /// Requested grant types; defaults to authorization_code + refresh_token
    #[serde(default)]
    pub grant_types: Vec<String>,
    /// Requested response types; defaults to code
    #[serde(default)]
    pub response_types: Vec<String>,
    /// Space-delimited scope string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Preferred token signing algorithm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_alg: Option<String>,
    /// Informational client homepage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    /// Informational logo URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    /// Token endpoint authentication method; `"none"` registers a public
    /// client and no secret is issued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
}

/// Response returned on successful registration
///
/// The plaintext secret appears here exactly once; only its hash is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistrationResponse {
    /// Issued client identifier
    pub client_id: String,
    /// Plaintext client secret, shown only at registration time; absent for
    /// public clients
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Registered redirect URIs
    pub redirect_uris: Vec<String>,
    /// Granted grant types
    pub grant_types: Vec<String>,
    /// Granted response types
    pub response_types: Vec<String>,
    /// Granted scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

/// Partial update to a registered client; `None` fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientUpdate {
    /// Replacement redirect URI list
    pub redirect_uris: Option<Vec<String>>,
    /// Replacement grant type list
    pub grant_types: Option<Vec<String>>,
    /// Replacement response type list
    pub response_types: Option<Vec<String>>,
    /// Replacement scope string
    pub scope: Option<String>,
    /// Replacement signing algorithm
    pub signing_alg: Option<String>,
    /// Replacement display name
    pub client_name: Option<String>,
    /// Replacement homepage URI
    pub client_uri: Option<String>,
    /// Replacement logo URI
    pub logo_uri: Option<String>,
}

struct CachedClient {
    client: Client,
    cached_at: Instant,
}

/// Registry of relying parties with a TTL-bounded read cache
///
/// Mutations (update, delete) invalidate the cache entry synchronously, so a
/// lookup after a completed mutation never serves the pre-mutation record.
#[derive(Clone)]
pub struct ClientRegistry {
    database: Arc<factory::Database>,
    cache: Arc<Mutex<LruCache<String, CachedClient>>>,
    cache_ttl: Duration,
    op_timeout: Duration,
}

impl ClientRegistry {
    /// Create a registry over an open database
    ///
    /// # Errors
    /// `ConfigError` if the cache capacity is zero.
    pub fn new(
        database: Arc<factory::Database>,
        cache_capacity: usize,
        cache_ttl: Duration,
        op_timeout: Duration,
    ) -> AppResult<Self> {
        let capacity = NonZeroUsize::new(cache_capacity)
            .ok_or_else(|| AppError::config("client cache capacity must be nonzero"))?;
        Ok(Self {
            database,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            cache_ttl,
            op_timeout,
        })
    }

    /// Registry with default cache sizing
    ///
    /// # Errors
    /// `ConfigError` if the default capacity is invalid (it is not).
    pub fn with_defaults(database: Arc<factory::Database>) -> AppResult<Self> {
        Self::new(
            database,
            limits::CLIENT_CACHE_CAPACITY,
            Duration::from_secs(limits::CLIENT_CACHE_TTL_SECS),
            Duration::from_millis(limits::DEFAULT_OP_TIMEOUT_MS),
        )
    }

    /// Register a new client, validating its metadata and issuing credentials
    ///
    /// # Errors
    /// `InvalidClientSpec` on any validation failure; `DuplicateId` if the
    /// generated identifier collides.
    pub async fn register(
        &self,
        request: ClientRegistrationRequest,
        now: DateTime<Utc>,
    ) -> AppResult<ClientRegistrationResponse> {
        let grant_types = if request.grant_types.is_empty() {
            vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ]
        } else {
            request.grant_types
        };
        let response_types = if request.response_types.is_empty() {
            vec!["code".to_string()]
        } else {
            request.response_types
        };

        validate_registration(
            &request.redirect_uris,
            &request.client_name,
            &grant_types,
            &response_types,
            request.scope.as_deref(),
            request.signing_alg.as_deref(),
        )?;

        if let Some(method) = request.token_endpoint_auth_method.as_deref() {
            if !oauth::SUPPORTED_AUTH_METHODS.contains(&method) {
                return Err(AppError::invalid_client_spec(format!(
                    "unsupported token endpoint auth method: {method}"
                )));
            }
        }
        let public = request.token_endpoint_auth_method.as_deref()
            == Some(oauth::AUTH_METHOD_NONE);

        let client_id = generate_client_id();
        let (client_secret, secret_hash) = if public {
            (None, None)
        } else {
            let secret = generate_client_secret()?;
            let hash = hash_secret(&secret)?;
            (Some(secret), Some(hash))
        };

        let client = Client {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.clone(),
            client_secret_hash: secret_hash,
            redirect_uris: request.redirect_uris.clone(),
            grant_types: grant_types.clone(),
            response_types: response_types.clone(),
            scope: request.scope.clone(),
            signing_alg: request.signing_alg,
            client_name: Some(request.client_name),
            client_uri: request.client_uri,
            logo_uri: request.logo_uri,
            created_at: now,
            updated_at: now,
        };

        bounded(
            "register_client",
            self.op_timeout,
            self.database.insert_client(&client),
        )
        .await?;
        info!(client_id = %client_id, public, "client registered");

        Ok(ClientRegistrationResponse {
            client_id,
            client_secret,
            redirect_uris: request.redirect_uris,
            grant_types,
            response_types,
            scope: request.scope,
            created_at: now,
        })
    }

    /// Look up a client, serving from cache within the TTL window
    ///
    /// # Errors
    /// `NotFound` if no such client is registered.
    pub async fn lookup(&self, client_id: &str) -> AppResult<Client> {
        if let Some(client) = self.cache_get(client_id) {
            return Ok(client);
        }

        let client = bounded(
            "lookup_client",
            self.op_timeout,
            self.database.get_client(client_id),
        )
        .await?
        .ok_or_else(|| AppError::not_found("client"))?;

        self.cache_put(client.clone());
        Ok(client)
    }

    /// Check a redirect URI against the client's registered list
    ///
    /// Matching is byte-exact: no normalization, no prefix or substring
    /// matching, trailing slashes and case differences are mismatches.
    pub async fn authorize_redirect(&self, client_id: &str, redirect_uri: &str) -> AppResult<()> {
        let client = self.lookup(client_id).await?;
        if client.redirect_uri_registered(redirect_uri) {
            Ok(())
        } else {
            warn!(client_id, redirect_uri, "redirect uri mismatch");
            Err(AppError::redirect_mismatch(client_id))
        }
    }

    /// Verify a presented plaintext secret against the stored hash
    ///
    /// # Errors
    /// `NotFound` for unknown clients, `InvalidClientSpec` for public clients
    /// or a non-matching secret.
    pub async fn verify_secret(&self, client_id: &str, presented: &str) -> AppResult<()> {
        let client = self.lookup(client_id).await?;
        let Some(hash) = client.client_secret_hash.as_deref() else {
            return Err(AppError::invalid_client_spec(
                "client has no secret configured",
            ));
        };
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::internal(format!("stored secret hash is invalid: {e}")))?;
        Argon2::default()
            .verify_password(presented.as_bytes(), &parsed)
            .map_err(|_| AppError::invalid_client_spec("client secret verification failed"))
    }

    /// Apply a partial update to a registered client
    ///
    /// `client_id` and the secret hash are immutable here; replacement lists
    /// are re-validated before the write. The cache entry is dropped before
    /// returning.
    pub async fn update(
        &self,
        client_id: &str,
        update: ClientUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<Client> {
        let mut client = bounded(
            "load_client",
            self.op_timeout,
            self.database.get_client(client_id),
        )
        .await?
        .ok_or_else(|| AppError::not_found("client"))?;

        if let Some(uris) = update.redirect_uris {
            client.redirect_uris = uris;
        }
        if let Some(grants) = update.grant_types {
            client.grant_types = grants;
        }
        if let Some(responses) = update.response_types {
            client.response_types = responses;
        }
        if let Some(scope) = update.scope {
            client.scope = Some(scope);
        }
        if let Some(alg) = update.signing_alg {
            client.signing_alg = Some(alg);
        }
        if let Some(name) = update.client_name {
            client.client_name = Some(name);
        }
        if update.client_uri.is_some() {
            client.client_uri = update.client_uri;
        }
        if update.logo_uri.is_some() {
            client.logo_uri = update.logo_uri;
        }
        client.updated_at = now;

        validate_registration(
            &client.redirect_uris,
            client.client_name.as_deref().unwrap_or_default(),
            &client.grant_types,
            &client.response_types,
            client.scope.as_deref(),
            client.signing_alg.as_deref(),
        )?;

        bounded("update_client", self.op_timeout, self.database.update_client(&client)).await?;
        self.cache_invalidate(client_id);
        debug!(client_id, "client updated");
        Ok(client)
    }

    /// Delete a client registration
    ///
    /// With `cascade` the client's live grants are revoked in the same
    /// transaction as the delete; without it the delete is a single
    /// conditional statement that refuses with `ClientInUse` while any live
    /// grant remains. Neither path can race a concurrent grant insert into
    /// leaving a live grant pointing at a deleted client.
    pub async fn delete(
        &self,
        client_id: &str,
        cascade: bool,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if cascade {
            let revoked = bounded(
                "delete_client_cascade",
                self.op_timeout,
                self.database.delete_client_cascade(client_id, now),
            )
            .await?;
            if revoked > 0 {
                info!(client_id, count = revoked, "client grants revoked on delete");
            }
        } else {
            bounded(
                "delete_client",
                self.op_timeout,
                self.database.delete_client_unreferenced(client_id, now),
            )
            .await?;
        }

        self.cache_invalidate(client_id);
        info!(client_id, cascade, "client deleted");
        Ok(())
    }

    fn cache_get(&self, client_id: &str) -> Option<Client> {
        let mut cache = self.cache.lock().ok()?;
        match cache.get(client_id) {
            Some(entry) if entry.cached_at.elapsed() < self.cache_ttl => {
                Some(entry.client.clone())
            }
            Some(_) => {
                cache.pop(client_id);
                None
            }
            None => None,
        }
    }

    fn cache_put(&self, client: Client) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                client.client_id.clone(),
                CachedClient {
                    client,
                    cached_at: Instant::now(),
                },
            );
        }
    }

    fn cache_invalidate(&self, client_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(client_id);
        }
    }
}

fn hash_secret(secret: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(format!("failed to hash client secret: {e}")))
}

fn validate_registration(
    redirect_uris: &[String],
    client_name: &str,
    grant_types: &[String],
    response_types: &[String],
    scope: Option<&str>,
    signing_alg: Option<&str>,
) -> AppResult<()> {
    if client_name.trim().is_empty() {
        return Err(AppError::invalid_client_spec("client_name must not be empty"));
    }
    if redirect_uris.is_empty() {
        return Err(AppError::invalid_client_spec(
            "at least one redirect_uri is required",
        ));
    }

    for uri in redirect_uris {
        validate_redirect_uri(uri)?;
    }

    for grant in grant_types {
        if !oauth::SUPPORTED_GRANT_TYPES.contains(&grant.as_str()) {
            return Err(AppError::invalid_client_spec(format!(
                "unsupported grant type: {grant}"
            )));
        }
    }
    for response in response_types {
        if !oauth::SUPPORTED_RESPONSE_TYPES.contains(&response.as_str()) {
            return Err(AppError::invalid_client_spec(format!(
                "unsupported response type: {response}"
            )));
        }
    }
    if let Some(scope) = scope {
        for entry in scope.split_whitespace() {
            if !oauth::SUPPORTED_SCOPES.contains(&entry) {
                return Err(AppError::invalid_client_spec(format!(
                    "unsupported scope: {entry}"
                )));
            }
        }
    }
    if let Some(alg) = signing_alg {
        if !oauth::SUPPORTED_SIGNING_ALGS.contains(&alg) {
            return Err(AppError::invalid_client_spec(format!(
                "unsupported signing algorithm: {alg}"
            )));
        }
    }

    Ok(())
}

fn validate_redirect_uri(uri: &str) -> AppResult<()> {
    if uri == oauth::OOB_REDIRECT_URI {
        return Ok(());
    }
    if uri.contains('*') {
        return Err(AppError::invalid_client_spec(
            "redirect_uri must not contain wildcards",
        ));
    }

    let parsed = Url::parse(uri).map_err(|e| {
        AppError::invalid_client_spec(format!("redirect_uri is not an absolute URI: {e}"))
    })?;

    if parsed.fragment().is_some() {
        return Err(AppError::invalid_client_spec(
            "redirect_uri must not contain a fragment",
        ));
    }

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            let host = parsed.host_str().unwrap_or_default();
            if host == "localhost" || host == "127.0.0.1" || host == "[::1]" {
                Ok(())
            } else {
                Err(AppError::invalid_client_spec(
                    "http redirect_uri is only allowed for loopback hosts",
                ))
            }
        }
        // Custom schemes are allowed for native clients
        _ => Ok(()),
    }
}
