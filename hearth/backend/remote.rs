use std::time::Duration;

use async_trait::async_trait;
use hearth_access::{Member, MemberPatch, NewMember};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    contract::{AdminLogin, DeviceReading, DeviceState, DeviceValue, DoorState, ExecutionBackend},
    error::{BackendError, BackendResult},
};

const DEVICE_SECRET_HEADER: &str = "x-device-secret";

/// Connection settings for the household server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// API root, e.g. `http://hub.local:8080/api`.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Shared secret sent on device-state writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_secret: Option<String>,
}

impl RemoteConfig {
    /// Settings with the default timeout and no device secret.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: default_timeout_ms(),
            device_secret: None,
        }
    }
}

const fn default_timeout_ms() -> u64 {
    5_000
}

/// HTTP adapter for the household server.
///
/// Transport failures (connect, timeout, unreadable body) surface as
/// [`BackendError::Unavailable`]; a non-2xx status or a `{"success": false}`
/// body surfaces as [`BackendError::Rejected`] with the server's message.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    base: Url,
    timeout: Duration,
    device_secret: Option<String>,
}

impl RemoteBackend {
    /// Builds the adapter.
    pub fn new(config: &RemoteConfig) -> BackendResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|err| BackendError::Config(format!("base url '{}': {err}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Config(format!(
                "base url '{}' cannot carry a path",
                config.base_url
            )));
        }
        let client = Client::builder()
            .user_agent(concat!("hearth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| BackendError::Config(err.to_string()))?;
        Ok(Self {
            client,
            base,
            timeout: Duration::from_millis(config.timeout_ms),
            device_secret: config.device_secret.clone(),
        })
    }

    /// Joins path segments onto the base, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::Config(format!("base url '{}' cannot carry a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> BackendResult<RequestBuilder> {
        Ok(self
            .client
            .request(method, self.endpoint(segments)?)
            .timeout(self.timeout))
    }

    fn admin(&self, method: Method, segments: &[&str], token: &str) -> BackendResult<RequestBuilder> {
        Ok(self.request(method, segments)?.bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Value> {
        let response = request
            .send()
            .await
            .map_err(|err| BackendError::Unavailable(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| BackendError::Unavailable(err.to_string()))?;
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        if !status.is_success() {
            return Err(BackendError::Rejected(
                server_message(&body).unwrap_or_else(|| status.to_string()),
            ));
        }
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(BackendError::Rejected(
                server_message(&body).unwrap_or_else(|| "request refused".into()),
            ));
        }
        Ok(body)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> BackendResult<T> {
        decode(self.send(request).await?)
    }

    async fn fetch_member(&self, request: RequestBuilder) -> BackendResult<Member> {
        let body = self.send(request).await?;
        decode(unwrap_field(body, "user"))
    }

    async fn fetch_members(&self, request: RequestBuilder) -> BackendResult<Vec<Member>> {
        let body = self.send(request).await?;
        let body = match body {
            Value::Object(mut fields) => fields
                .remove("members")
                .or_else(|| fields.remove("users"))
                .unwrap_or(Value::Object(fields)),
            other => other,
        };
        decode(body)
    }
}

/// Extracts the server's error text from a JSON body.
fn server_message(body: &Value) -> Option<String> {
    match body {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Object(fields) => ["error", "message"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

/// Some endpoints wrap the payload (`{"success": true, "user": {...}}`), others don't.
fn unwrap_field(body: Value, field: &str) -> Value {
    match body {
        Value::Object(mut fields) if fields.contains_key(field) => {
            fields.remove(field).unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> BackendResult<T> {
    serde_json::from_value(body)
        .map_err(|err| BackendError::Rejected(format!("unexpected response: {err}")))
}

#[derive(Deserialize)]
struct ToggleResponse {
    locked: bool,
}

#[async_trait]
impl ExecutionBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn get_doors(&self) -> BackendResult<DoorState> {
        let body = self.send(self.request(Method::GET, &["door"])?).await?;
        decode(unwrap_field(body, "doors"))
    }

    async fn toggle_door(&self, door: &str) -> BackendResult<bool> {
        let request = self
            .request(Method::POST, &["door", "toggle"])?
            .json(&json!({ "door": door }));
        let response: ToggleResponse = self.fetch(request).await?;
        Ok(response.locked)
    }

    async fn lock_all_doors(&self) -> BackendResult<()> {
        let request = self.request(Method::POST, &["door", "lock_all"])?.json(&json!({}));
        self.send(request).await.map(drop)
    }

    async fn unlock_all_doors(&self) -> BackendResult<()> {
        let request = self
            .request(Method::POST, &["door", "unlock_all"])?
            .json(&json!({}));
        self.send(request).await.map(drop)
    }

    async fn set_device_state(
        &self,
        device_id: &str,
        value: DeviceValue,
    ) -> BackendResult<DeviceReading> {
        let mut request = self
            .request(Method::POST, &["devices", device_id, "state"])?
            .json(&json!({ "value": value }));
        if let Some(secret) = &self.device_secret {
            request = request.header(DEVICE_SECRET_HEADER, secret);
        }
        self.fetch(request).await
    }

    async fn get_device_state(&self, device_id: &str) -> BackendResult<DeviceReading> {
        self.fetch(self.request(Method::GET, &["devices", device_id, "state"])?)
            .await
    }

    async fn get_device_states(&self, device_ids: &[String]) -> BackendResult<DeviceState> {
        let request = self
            .request(Method::GET, &["devices", "state"])?
            .query(&[("ids", device_ids.join(","))]);
        self.fetch(request).await
    }

    async fn list_members(&self) -> BackendResult<Vec<Member>> {
        self.fetch_members(self.request(Method::GET, &["members"])?)
            .await
    }

    async fn add_member(&self, member: &NewMember) -> BackendResult<Member> {
        self.fetch_member(self.request(Method::POST, &["members"])?.json(member))
            .await
    }

    async fn update_member(&self, member_id: &str, patch: &MemberPatch) -> BackendResult<Member> {
        self.fetch_member(
            self.request(Method::PATCH, &["members", member_id])?
                .json(patch),
        )
        .await
    }

    async fn delete_member(&self, member_id: &str) -> BackendResult<()> {
        self.send(self.request(Method::DELETE, &["members", member_id])?)
            .await
            .map(drop)
    }

    async fn admin_login(&self, email: &str, pin: &str) -> BackendResult<AdminLogin> {
        let request = self
            .request(Method::POST, &["admin", "login"])?
            .json(&json!({ "email": email, "pin": pin }));
        self.fetch(request).await
    }

    async fn admin_list_users(&self, token: &str) -> BackendResult<Vec<Member>> {
        self.fetch_members(self.admin(Method::GET, &["admin", "users"], token)?)
            .await
    }

    async fn admin_create_user(&self, token: &str, member: &NewMember) -> BackendResult<Member> {
        self.fetch_member(
            self.admin(Method::POST, &["admin", "users"], token)?
                .json(member),
        )
        .await
    }

    async fn admin_update_user(
        &self,
        token: &str,
        member_id: &str,
        patch: &MemberPatch,
    ) -> BackendResult<Member> {
        self.fetch_member(
            self.admin(Method::PATCH, &["admin", "users", member_id], token)?
                .json(patch),
        )
        .await
    }

    async fn admin_delete_user(&self, token: &str, member_id: &str) -> BackendResult<()> {
        self.send(self.admin(Method::DELETE, &["admin", "users", member_id], token)?)
            .await
            .map(drop)
    }

    async fn authenticate_face(&self, template: &str) -> BackendResult<Member> {
        self.fetch_member(
            self.request(Method::POST, &["auth", "face"])?
                .json(&json!({ "template": template })),
        )
        .await
    }

    async fn authenticate_pin(&self, pin: &str) -> BackendResult<Member> {
        self.fetch_member(
            self.request(Method::POST, &["auth", "pin"])?
                .json(&json!({ "pin": pin })),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> RemoteBackend {
        RemoteBackend::new(&RemoteConfig::new(base)).unwrap()
    }

    #[test]
    fn endpoints_extend_the_base_path() {
        let remote = backend("http://hub.local:8080/api/");
        assert_eq!(
            remote.endpoint(&["door", "toggle"]).unwrap().as_str(),
            "http://hub.local:8080/api/door/toggle"
        );
        let bare = backend("http://hub.local");
        assert_eq!(
            bare.endpoint(&["devices", "kitchen.light", "state"])
                .unwrap()
                .as_str(),
            "http://hub.local/devices/kitchen.light/state"
        );
    }

    #[test]
    fn path_segments_are_encoded() {
        let remote = backend("http://hub.local/api");
        let url = remote.endpoint(&["members", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://hub.local/api/members/a%2Fb%20c");
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = RemoteBackend::new(&RemoteConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, BackendError::Config(_)));
        let err = RemoteBackend::new(&RemoteConfig::new("mailto:hub@home")).unwrap_err();
        assert!(matches!(err, BackendError::Config(_)));
    }

    #[test]
    fn server_message_prefers_error_then_message() {
        assert_eq!(
            server_message(&json!({ "success": false, "error": "pin taken" })).as_deref(),
            Some("pin taken")
        );
        assert_eq!(
            server_message(&json!({ "message": "nope" })).as_deref(),
            Some("nope")
        );
        assert_eq!(server_message(&json!({ "success": false })), None);
        assert_eq!(server_message(&json!("  gateway down ")).as_deref(), Some("gateway down"));
    }

    #[test]
    fn wrapped_and_bare_payloads_decode_alike() {
        let wrapped = json!({ "success": true, "user": { "id": "m-1", "name": "Ravi" } });
        let bare = json!({ "id": "m-1", "name": "Ravi" });
        let a: Member = decode(unwrap_field(wrapped, "user")).unwrap();
        let b: Member = decode(unwrap_field(bare, "user")).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let mut config = RemoteConfig::new(format!("http://127.0.0.1:{port}/api"));
        config.timeout_ms = 500;
        let remote = RemoteBackend::new(&config).unwrap();
        let err = remote.get_doors().await.unwrap_err();
        assert!(err.is_unavailable(), "{err:?}");
    }
}
