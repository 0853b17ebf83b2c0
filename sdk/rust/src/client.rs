use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A typed record value, tagged as on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RecordValue {
    Int(i64),
    Counter(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub value: RecordValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordLookup {
    Found(Record),
    NotFound { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOutcome {
    pub name: String,
    pub action: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetReport {
    /// Highest action needed across the batch, e.g. `restart_required`.
    pub action: String,
    pub entries: Vec<SetOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStatus {
    pub file: String,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub uptime_secs: u64,
    pub files: Vec<FileStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub file: String,
    pub version: u64,
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
}

/// Failure of one API call.
#[derive(Debug)]
pub enum ClientError {
    Transport(reqwest::Error),
    /// Non-success status with the server's `error` label and message.
    Api {
        status: StatusCode,
        error: String,
        message: String,
    },
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport(e) => write!(f, "transport error: {}", e),
            ClientError::Api { status, error, message } => {
                write!(f, "management API returned {} ({}): {}", status, error, message)
            }
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e)
    }
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

pub struct MgmtClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MgmtClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let resp = request.bearer_auth(&self.api_key).send().await?;
        decode(resp).await
    }

    pub async fn status(&self) -> Result<SystemStatus, ClientError> {
        self.send(self.client.get(self.url("/mgmt/status"))).await
    }

    /// Rules of one configuration file, e.g. `"plugin.config"` or `"plugin"`.
    pub async fn rules(&self, file: &str) -> Result<ConfigFile, ClientError> {
        self.send(self.client.get(self.url(&format!("/mgmt/config/{}", file))))
            .await
    }

    /// Replace a whole file; with `expected_version` the write is rejected
    /// (409) if someone else changed it first.
    pub async fn replace_rules(
        &self,
        file: &str,
        rules: &[&str],
        expected_version: Option<u64>,
    ) -> Result<ConfigFile, ClientError> {
        let body = serde_json::json!({ "rules": rules, "expected_version": expected_version });
        self.send(
            self.client
                .put(self.url(&format!("/mgmt/config/{}", file)))
                .json(&body),
        )
        .await
    }

    pub async fn move_rule(
        &self,
        file: &str,
        index: usize,
        direction: MoveDirection,
    ) -> Result<ConfigFile, ClientError> {
        let body = serde_json::json!({ "index": index, "direction": direction });
        self.send(
            self.client
                .post(self.url(&format!("/mgmt/config/{}/move", file)))
                .json(&body),
        )
        .await
    }

    pub async fn get_records(&self, names: &[&str]) -> Result<Vec<RecordLookup>, ClientError> {
        let body = serde_json::json!({ "names": names });
        self.send(self.client.post(self.url("/mgmt/records/get")).json(&body))
            .await
    }

    pub async fn set_records(&self, records: Vec<Record>) -> Result<SetReport, ClientError> {
        let body = serde_json::json!({ "records": records });
        self.send(self.client.post(self.url("/mgmt/records/set")).json(&body))
            .await
    }

    pub async fn match_records(&self, prefix: &str) -> Result<Vec<Record>, ClientError> {
        self.send(
            self.client
                .get(self.url(&format!("/mgmt/records/match/{}", prefix))),
        )
        .await
    }

    /// Returns how many statistics were reset.
    pub async fn reset_stats(&self) -> Result<usize, ClientError> {
        let value: serde_json::Value = self
            .send(self.client.post(self.url("/mgmt/stats/reset")))
            .await?;
        Ok(value["reset"].as_u64().unwrap_or(0) as usize)
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let text = resp.text().await?;
    let (error, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error, body.message),
        Err(_) => ("http".to_string(), text),
    };
    Err(ClientError::Api {
        status,
        error,
        message,
    })
}
