// # Cloudflare Record Provider
//
// Implements `RecordProvider` on top of the Cloudflare API v4 DNS records
// endpoints.
//
// ## Behavior
//
// - One HTTP request per operation; listings follow `result_info` pagination
// - No retry, no backoff, no caching: failures go straight back to the caller
// - HTTP timeout of 30 seconds per request
// - Error code 81058 ("an identical record already exists") becomes
//   `Error::AlreadyExists` so the reconciler can fall back to an update
// - TXT records are never proxied
// - Dry-run mode performs reads and logs the writes it would have made
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Provider construction fails if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use zonebeat_core::config::{ProviderConfig, default_ttl};
use zonebeat_core::traits::{DnsRecord, RecordProvider, RecordProviderFactory, RecordType};
use zonebeat_core::{Error, Result};

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per listing page
const PAGE_SIZE: u32 = 100;

/// Cloudflare error code for "An identical record already exists."
const ALREADY_EXISTS_CODE: i64 = 81058;

const PROVIDER: &str = "cloudflare";

/// Wraps every Cloudflare API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<Value>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    total_pages: u32,
}

/// Body of create and update requests
#[derive(Debug, Serialize)]
struct RecordPayload<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

/// What a request was for, used to shape its error
struct Context<'a> {
    action: &'static str,
    name: &'a str,
    record_type: RecordType,
}

/// Cloudflare record provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests
/// - Log the intended POST/PUT/DELETE payloads
/// - **NOT** modify any record
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone holding every managed record
    zone_id: String,

    /// TTL for created and updated records
    ttl: u32,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: reads happen, writes are only logged
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("ttl", &self.ttl)
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the token or zone ID is empty, or the HTTP
    /// client cannot be built.
    pub fn new(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        ttl: u32,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        let zone_id = zone_id.into();

        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }
        if zone_id.trim().is_empty() {
            return Err(Error::config("Cloudflare zone ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            ttl,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the provider at another API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether writes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, self.zone_id)
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/{}", self.records_url(), id)
    }

    fn payload<'a>(
        &self,
        name: &'a str,
        record_type: RecordType,
        content: &'a str,
        proxied: bool,
    ) -> RecordPayload<'a> {
        RecordPayload {
            record_type: record_type.as_str(),
            name,
            content,
            ttl: self.ttl,
            proxied: proxied && record_type != RecordType::Txt,
        }
    }

    /// List records of one type, optionally restricted to one name
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A&name=example.com&per_page=100&page=1
    /// Authorization: Bearer <token>
    /// ```
    async fn list(&self, name: Option<&str>, record_type: RecordType) -> Result<Vec<DnsRecord>> {
        let context = Context {
            action: "list records",
            name: name.unwrap_or("*"),
            record_type,
        };

        let mut records = Vec::new();
        let mut page: u32 = 1;
        loop {
            let mut query = vec![
                ("type", record_type.as_str().to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(name) = name {
                query.push(("name", name.to_string()));
            }

            let request = self.client.get(self.records_url()).query(&query);
            let response: ApiResponse<Vec<DnsRecord>> = self.send(request, &context).await?;
            records.extend(response.result.unwrap_or_default());

            match response.result_info {
                Some(info) if info.page.max(page) < info.total_pages => page += 1,
                _ => break,
            }
        }

        tracing::debug!(
            name = context.name,
            record_type = %record_type,
            count = records.len(),
            "Listed Cloudflare records"
        );
        Ok(records)
    }

    /// Send a request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &Context<'_>,
    ) -> Result<ApiResponse<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| {
                Error::transport(format!(
                    "{} for {} ({}): {}",
                    context.action, context.name, context.record_type, e
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Error::transport(format!(
                "{} for {} ({}): failed to read response: {}",
                context.action, context.name, context.record_type, e
            ))
        })?;

        let envelope = serde_json::from_str::<ApiResponse<T>>(&body);

        if status.is_success() {
            let envelope = envelope.map_err(|e| {
                Error::provider(
                    PROVIDER,
                    format!("{}: invalid response format: {}", context.action, e),
                )
            })?;
            if envelope.success {
                return Ok(envelope);
            }
            return Err(classify(status, &envelope.errors, context));
        }

        let errors = envelope.map(|e| e.errors).unwrap_or_default();
        Err(classify(status, &errors, context))
    }
}

/// Map a failed response to the core error taxonomy
fn classify(status: StatusCode, errors: &[Value], context: &Context<'_>) -> Error {
    if errors
        .iter()
        .any(|error| error["code"].as_i64() == Some(ALREADY_EXISTS_CODE))
    {
        return Error::already_exists(context.name, context.record_type);
    }

    let details = format_errors(errors);
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions. Status: {} - {}",
            status, details
        )),
        404 => Error::not_found(format!(
            "{} for {} ({}): {}",
            context.action, context.name, context.record_type, details
        )),
        409 => Error::provider(
            PROVIDER,
            format!("Conflict: {} for {}: {}", context.action, context.name, details),
        ),
        429 => Error::rate_limited(format!(
            "Rate limit exceeded. Please retry later. Status: {}",
            status
        )),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, details),
        ),
        _ => Error::provider(
            PROVIDER,
            format!(
                "Failed to {} for {} ({}): {} - {}",
                context.action, context.name, context.record_type, status, details
            ),
        ),
    }
}

/// Render the `errors` array of a response for logs
fn format_errors(errors: &[Value]) -> String {
    if errors.is_empty() {
        return "unknown error".to_string();
    }
    errors
        .iter()
        .map(|error| error.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl RecordProvider for CloudflareProvider {
    async fn list_records(&self, name: &str, record_type: RecordType) -> Result<Vec<DnsRecord>> {
        self.list(Some(name), record_type).await
    }

    async fn list_records_by_type(&self, record_type: RecordType) -> Result<Vec<DnsRecord>> {
        self.list(None, record_type).await
    }

    async fn create_record(
        &self,
        name: &str,
        record_type: RecordType,
        content: &str,
        proxied: bool,
    ) -> Result<DnsRecord> {
        let payload = self.payload(name, record_type, content, proxied);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                self.records_url(),
                serde_json::to_string(&payload)?
            );
            return Ok(DnsRecord {
                id: String::from("dry-run"),
                record_type,
                name: name.to_string(),
                content: content.to_string(),
                proxied: Some(payload.proxied),
            });
        }

        let context = Context {
            action: "create record",
            name,
            record_type,
        };
        let request = self.client.post(self.records_url()).json(&payload);
        let response: ApiResponse<DnsRecord> = self.send(request, &context).await?;

        let record = response.result.ok_or_else(|| {
            Error::provider(PROVIDER, "Invalid response format: create returned no record")
        })?;
        tracing::debug!(name, record_type = %record_type, id = %record.id, "Created Cloudflare record");
        Ok(record)
    }

    async fn update_record(
        &self,
        id: &str,
        name: &str,
        record_type: RecordType,
        content: &str,
        proxied: bool,
    ) -> Result<()> {
        let payload = self.payload(name, record_type, content, proxied);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                self.record_url(id),
                serde_json::to_string(&payload)?
            );
            return Ok(());
        }

        let context = Context {
            action: "update record",
            name,
            record_type,
        };
        let request = self.client.put(self.record_url(id)).json(&payload);
        self.send::<Value>(request, &context).await?;
        Ok(())
    }

    async fn delete_record(&self, id: &str, name: &str, record_type: RecordType) -> Result<()> {
        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send DELETE request to {} ({} {})",
                self.record_url(id),
                record_type,
                name
            );
            return Ok(());
        }

        let context = Context {
            action: "delete record",
            name,
            record_type,
        };
        let request = self.client.delete(self.record_url(id));
        self.send::<Value>(request, &context).await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl RecordProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn RecordProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                zone_id,
                ttl,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!(
                        "Cloudflare provider running in DRY-RUN mode - no changes will be made"
                    );
                }

                let ttl = if *ttl == 0 { default_ttl() } else { *ttl };
                Ok(Box::new(CloudflareProvider::new(
                    api_token.clone(),
                    zone_id.clone(),
                    ttl,
                    *dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use zonebeat_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// zonebeat_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &zonebeat_core::ProviderRegistry) {
    registry.register_provider(PROVIDER, Box::new(CloudflareFactory));
}
