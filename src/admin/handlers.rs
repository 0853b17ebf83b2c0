use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::container::MgmtList;
use crate::context::{parse_rules, render_rules, CfgContext};
use crate::error::MgmtError;
use crate::http::server::AppState;
use crate::records::{Record, RecordLookup, SetReport};
use crate::rules::FileKind;
use crate::session::Session;

/// An admin request failure rendered as a JSON body with a matching status.
#[derive(Debug)]
pub enum ApiError {
    Mgmt(MgmtError),
    /// The blocking task panicked or was cancelled.
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<MgmtError> for ApiError {
    fn from(e: MgmtError) -> Self {
        ApiError::Mgmt(e)
    }
}

fn status_of(e: &MgmtError) -> StatusCode {
    match e {
        MgmtError::NotFound(_) => StatusCode::NOT_FOUND,
        MgmtError::ConcurrentModification { .. } => StatusCode::CONFLICT,
        MgmtError::Index { .. }
        | MgmtError::Parse(_)
        | MgmtError::InvalidValue(_)
        | MgmtError::EmptyList
        | MgmtError::WrongKind { .. } => StatusCode::BAD_REQUEST,
        MgmtError::ReadFailure { .. } | MgmtError::WriteFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Mgmt(e) => (
                status_of(&e),
                ErrorBody {
                    error: e.error_type().to_string(),
                    message: e.to_string(),
                },
            ),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "internal".to_string(),
                    message,
                },
            ),
        };
        if status.is_server_error() {
            tracing::error!(error = %body.message, "Admin request failed");
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run store work off the async runtime.
async fn blocking<T, F>(session: Session, f: F) -> Result<T, ApiError>
where
    F: FnOnce(Session) -> Result<T, MgmtError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(session))
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::Mgmt)
}

fn file_kind(file: &str) -> Result<FileKind, ApiError> {
    file.parse()
        .map_err(|_| ApiError::Mgmt(MgmtError::NotFound(format!("configuration file `{}`", file))))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileStatus {
    pub file: String,
    pub version: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub uptime_secs: u64,
    pub files: Vec<FileStatus>,
}

pub async fn get_status(State(state): State<AppState>) -> ApiResult<SystemStatus> {
    let uptime_secs = state.started_at.elapsed().as_secs();
    let files = blocking(state.session.clone(), |session| {
        FileKind::ALL
            .into_iter()
            .map(|kind| {
                Ok(FileStatus {
                    file: kind.file_name().to_string(),
                    version: session.file_version(kind)?,
                })
            })
            .collect::<Result<Vec<_>, MgmtError>>()
    })
    .await?;

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        uptime_secs,
        files,
    }))
}

/// Rules of one file as canonical lines.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFileResponse {
    pub file: String,
    pub version: u64,
    pub rules: Vec<String>,
}

impl ConfigFileResponse {
    fn from_context(ctx: &CfgContext) -> Self {
        Self {
            file: ctx.kind().file_name().to_string(),
            version: ctx.version().unwrap_or_default(),
            rules: ctx.iter().map(|r| r.serialize()).collect(),
        }
    }
}

pub async fn get_config(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<ConfigFileResponse> {
    let kind = file_kind(&file)?;
    let response = blocking(state.session.clone(), move |session| {
        let mut ctx = session.context(kind);
        ctx.fetch()?;
        Ok(ConfigFileResponse::from_context(&ctx))
    })
    .await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutConfigRequest {
    pub rules: Vec<String>,
    /// Reject the write if the file is no longer at this version.
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Replace a whole file. Every line is validated before anything is written.
pub async fn put_config(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Json(request): Json<PutConfigRequest>,
) -> ApiResult<ConfigFileResponse> {
    let kind = file_kind(&file)?;
    let response = blocking(state.session.clone(), move |session| {
        let rules = parse_rules(&request.rules.join("\n"), kind)?;
        let version = session.write_file(kind, &render_rules(&rules)?, request.expected_version)?;
        Ok(ConfigFileResponse {
            file: kind.file_name().to_string(),
            version,
            rules: rules.iter().map(|r| r.serialize()).collect(),
        })
    })
    .await?;
    Ok(Json(response))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MoveRuleRequest {
    pub index: usize,
    pub direction: MoveDirection,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Move one rule up or down and commit.
pub async fn move_rule(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Json(request): Json<MoveRuleRequest>,
) -> ApiResult<ConfigFileResponse> {
    let kind = file_kind(&file)?;
    let response = blocking(state.session.clone(), move |session| {
        let mut ctx = session.context(kind);
        ctx.fetch()?;
        let actual = ctx.version().unwrap_or_default();
        if let Some(expected) = request.expected_version {
            if expected != actual {
                return Err(MgmtError::ConcurrentModification { kind, expected, actual });
            }
        }
        match request.direction {
            MoveDirection::Up => ctx.move_up(request.index)?,
            MoveDirection::Down => ctx.move_down(request.index)?,
        }
        ctx.commit()?;
        Ok(ConfigFileResponse::from_context(&ctx))
    })
    .await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetRecordsRequest {
    pub names: Vec<String>,
}

pub async fn get_records(
    State(state): State<AppState>,
    Json(request): Json<GetRecordsRequest>,
) -> Json<MgmtList<RecordLookup>> {
    Json(state.session.get_many(&request.names))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetRecordsRequest {
    pub records: Vec<Record>,
}

pub async fn set_records(
    State(state): State<AppState>,
    Json(request): Json<SetRecordsRequest>,
) -> ApiResult<SetReport> {
    let report = blocking(state.session.clone(), move |session| session.set_many(request.records)).await?;
    Ok(Json(report))
}

pub async fn match_records(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> Json<MgmtList<Record>> {
    Json(state.session.get_matching(&prefix))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetStatsResponse {
    pub reset: usize,
}

pub async fn reset_stats(State(state): State<AppState>) -> Json<ResetStatsResponse> {
    Json(ResetStatsResponse {
        reset: state.session.reset_stats(),
    })
}
