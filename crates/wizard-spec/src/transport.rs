use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::error::UpstreamError;
use crate::spec::api::HttpMethod;

/// A fully built upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub api_id: String,
    pub method: HttpMethod,
    pub url: String,
    /// Query parameters for GET, JSON body members for POST.
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl UpstreamRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn json_body(&self) -> Value {
        Value::Object(
            self.params
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect::<Map<_, _>>(),
        )
    }
}

/// Issues upstream calls and decodes their JSON bodies.
///
/// Implementations must report timeouts, connection failures and
/// non-success statuses as [`UpstreamError`], never as an empty body.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError>;
}

/// Blocking HTTP transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(config: &EngineConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError> {
        let api = request.api_id.clone();
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url).query(&request.params),
            HttpMethod::Post => self.client.post(&request.url).json(&request.json_body()),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .timeout(request.timeout)
            .send()
            .map_err(|err| classify(&api, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                api,
                status: status.as_u16(),
            });
        }
        let body = response.text().map_err(|err| classify(&api, err))?;
        serde_json::from_str(&body).map_err(|err| UpstreamError::InvalidBody {
            api,
            message: err.to_string(),
        })
    }
}

fn classify(api: &str, err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout {
            api: api.to_string(),
        }
    } else {
        UpstreamError::Transport {
            api: api.to_string(),
            message: err.to_string(),
        }
    }
}
