use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::api::HttpMethod;
use crate::spec::document::SchemaDocument;
use crate::transport::{Transport, UpstreamRequest};

pub const UPDATE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of comparing the local schema with a published copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    pub up_to_date: bool,
    pub local_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fetches the schema at `remote_url` and compares versions.
///
/// Fetch failures are reported in [`UpdateStatus::error`] with
/// `up_to_date = false`; they never abort the caller.
pub fn check_update(
    local: &SchemaDocument,
    remote_url: &str,
    transport: &dyn Transport,
) -> UpdateStatus {
    let request = UpstreamRequest {
        api_id: "schema_update".into(),
        method: HttpMethod::Get,
        url: remote_url.to_string(),
        params: Vec::new(),
        headers: Vec::new(),
        timeout: UPDATE_CHECK_TIMEOUT,
    };
    let local_version = local.version.clone();
    let remote = match transport.execute(&request) {
        Ok(remote) => remote,
        Err(err) => {
            tracing::warn!(url = remote_url, error = %err, "schema update check failed");
            return UpdateStatus {
                up_to_date: false,
                local_version,
                remote_version: None,
                changelog: None,
                error: Some(err.to_string()),
            };
        }
    };

    let remote_version = remote
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("0.0.0")
        .to_string();
    if remote_version == local_version {
        return UpdateStatus {
            up_to_date: true,
            local_version,
            remote_version: Some(remote_version),
            changelog: None,
            error: None,
        };
    }
    let changelog = remote
        .get("meta")
        .and_then(|meta| meta.get("changelog"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    UpdateStatus {
        up_to_date: false,
        local_version,
        remote_version: Some(remote_version),
        changelog: Some(changelog),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use serde_json::json;

    struct Fixed(Result<Value, UpstreamError>);

    impl Transport for Fixed {
        fn execute(&self, _request: &UpstreamRequest) -> Result<Value, UpstreamError> {
            self.0.clone()
        }
    }

    const REMOTE: &str = "https://example.org/schema.json";

    fn local(version: &str) -> SchemaDocument {
        serde_json::from_value(json!({ "version": version })).unwrap()
    }

    #[test]
    fn same_version_is_up_to_date() {
        let remote = Fixed(Ok(json!({ "version": "2.1.0" })));
        let status = check_update(&local("2.1.0"), REMOTE, &remote);
        assert!(status.up_to_date);
        assert_eq!(status.error, None);
    }

    #[test]
    fn newer_remote_reports_changelog() {
        let remote = json!({ "version": "2.2.0", "meta": { "changelog": "Added cohort section" } });
        let status = check_update(&local("2.1.0"), REMOTE, &Fixed(Ok(remote)));
        assert!(!status.up_to_date);
        assert_eq!(status.remote_version.as_deref(), Some("2.2.0"));
        assert_eq!(status.changelog.as_deref(), Some("Added cohort section"));
    }

    #[test]
    fn fetch_failure_is_reported_not_raised() {
        let failure = Err(UpstreamError::Timeout { api: "schema_update".into() });
        let status = check_update(&local("2.1.0"), REMOTE, &Fixed(failure));
        assert!(!status.up_to_date);
        assert_eq!(status.local_version, "2.1.0");
        assert!(status.error.unwrap().contains("timed out"));
    }
}
