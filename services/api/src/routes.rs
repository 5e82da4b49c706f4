use crate::infra::AppState;
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use commitments::error::AppError;
use commitments::workflows::commitments::{
    AccountId, Apprenticeship, ApprenticeshipId, Caller, Commitment, CommitmentId, LastAction,
    PaymentStatus, ProviderId, TrainingType, UserInfo,
};
use commitments::workflows::commitments::{AgreementStatus, AgreementSubmission};
use commitments::workflows::datalock::{DataLockEventId, TriageStatus};
use commitments::workflows::updates::{
    ApprenticeshipDiff, NewApprenticeshipUpdate, UpdateResolution,
};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum CallerRole {
    Employer,
    Provider,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct CallerDto {
    pub(crate) role: CallerRole,
    pub(crate) id: i64,
}

impl CallerDto {
    fn into_caller(self) -> Caller {
        match self.role {
            CallerRole::Employer => Caller::Employer(AccountId(self.id)),
            CallerRole::Provider => Caller::Provider(ProviderId(self.id)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserDto {
    pub(crate) user_id: String,
    pub(crate) display_name: String,
}

impl UserDto {
    fn into_user(self) -> UserInfo {
        UserInfo {
            user_id: self.user_id,
            display_name: self.display_name,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AgreementAction {
    Approve,
    Reject,
    AmendAndReply,
}

impl From<AgreementAction> for LastAction {
    fn from(action: AgreementAction) -> Self {
        match action {
            AgreementAction::Approve => LastAction::Approve,
            AgreementAction::Reject => LastAction::Reject,
            AgreementAction::AmendAndReply => LastAction::AmendAndReply,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AgreementRequest {
    pub(crate) caller: CallerDto,
    pub(crate) user: UserDto,
    pub(crate) action: AgreementAction,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateUpdateRequest {
    pub(crate) caller: CallerDto,
    pub(crate) user: UserDto,
    #[serde(default)]
    pub(crate) uln: Option<String>,
    #[serde(default)]
    pub(crate) employer_ref: Option<String>,
    #[serde(default)]
    pub(crate) provider_ref: Option<String>,
    #[serde(default)]
    pub(crate) first_name: Option<String>,
    #[serde(default)]
    pub(crate) last_name: Option<String>,
    #[serde(default)]
    pub(crate) date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) training_type: Option<TrainingType>,
    #[serde(default)]
    pub(crate) training_code: Option<String>,
    #[serde(default)]
    pub(crate) training_name: Option<String>,
    #[serde(default)]
    pub(crate) cost: Option<Decimal>,
    #[serde(default)]
    pub(crate) start_date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ResolutionDto {
    Approve,
    Reject,
    Undo,
}

impl From<ResolutionDto> for UpdateResolution {
    fn from(resolution: ResolutionDto) -> Self {
        match resolution {
            ResolutionDto::Approve => UpdateResolution::Approve,
            ResolutionDto::Reject => UpdateResolution::Reject,
            ResolutionDto::Undo => UpdateResolution::Undo,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResolveUpdateRequest {
    pub(crate) caller: CallerDto,
    pub(crate) user: UserDto,
    pub(crate) resolution: ResolutionDto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TriageRequest {
    pub(crate) triage_status: TriageStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChangeRequest {
    pub(crate) caller: CallerDto,
    pub(crate) user: UserDto,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) date_of_change: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallerQuery {
    pub(crate) caller_role: CallerRole,
    pub(crate) caller_id: i64,
}

impl CallerQuery {
    fn into_caller(self) -> Caller {
        CallerDto {
            role: self.caller_role,
            id: self.caller_id,
        }
        .into_caller()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteCommitmentRequest {
    pub(crate) caller: CallerDto,
    pub(crate) user: UserDto,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprenticeshipPayload {
    #[serde(default)]
    pub(crate) first_name: String,
    #[serde(default)]
    pub(crate) last_name: String,
    #[serde(default)]
    pub(crate) date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) ni_number: Option<String>,
    #[serde(default)]
    pub(crate) uln: Option<String>,
    pub(crate) training_type: TrainingType,
    #[serde(default)]
    pub(crate) training_code: Option<String>,
    #[serde(default)]
    pub(crate) training_name: Option<String>,
    #[serde(default)]
    pub(crate) cost: Option<Decimal>,
    #[serde(default)]
    pub(crate) start_date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) end_date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) employer_ref: Option<String>,
    #[serde(default)]
    pub(crate) provider_ref: Option<String>,
}

impl ApprenticeshipPayload {
    /// Ownership and status fields are owned by the workflow, not the
    /// payload; they are filled with placeholders the services overwrite.
    fn into_apprenticeship(self, id: ApprenticeshipId, commitment_id: CommitmentId) -> Apprenticeship {
        Apprenticeship {
            id,
            commitment_id,
            employer_account_id: AccountId(0),
            provider_id: ProviderId(0),
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth: self.date_of_birth,
            ni_number: self.ni_number,
            uln: self.uln,
            training_type: self.training_type,
            training_code: self.training_code,
            training_name: self.training_name,
            cost: self.cost,
            start_date: self.start_date,
            end_date: self.end_date,
            employer_ref: self.employer_ref,
            provider_ref: self.provider_ref,
            payment_status: PaymentStatus::PendingApproval,
            agreement_status: AgreementStatus::NotAgreed,
            pending_update_originator: None,
            data_lock_triage_status: None,
            has_had_data_lock_success: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpsertApprenticeshipRequest {
    pub(crate) caller: CallerDto,
    pub(crate) user: UserDto,
    pub(crate) apprenticeship: ApprenticeshipPayload,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/api/v1/employer/:account_id/commitments",
            get(employer_commitments),
        )
        .route(
            "/api/v1/provider/:provider_id/commitments",
            get(provider_commitments),
        )
        .route(
            "/api/v1/commitments/:id",
            get(get_commitment).delete(delete_commitment),
        )
        .route("/api/v1/commitments/:id/agreement", patch(update_agreement))
        .route(
            "/api/v1/commitments/:id/apprenticeships",
            post(create_apprenticeship),
        )
        .route(
            "/api/v1/commitments/:id/apprenticeships/:apprenticeship_id",
            axum::routing::put(update_apprenticeship),
        )
        .route(
            "/api/v1/apprenticeships/:id/updates",
            post(create_update).patch(resolve_update),
        )
        .route(
            "/api/v1/apprenticeships/:id/status",
            patch(change_payment_status),
        )
        .route(
            "/api/v1/apprenticeships/:id/datalocks/:event_id",
            patch(triage_data_lock),
        )
        .route(
            "/api/v1/apprenticeships/:id/datalocks/approve",
            post(approve_data_locks),
        )
        .layer(Extension(state))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn employer_commitments(
    Extension(state): Extension<AppState>,
    Path(account_id): Path<i64>,
) -> Result<Json<Vec<Commitment>>, AppError> {
    let commitments = state
        .agreements
        .commitments_for_employer(AccountId(account_id))
        .await?;
    Ok(Json(commitments))
}

pub(crate) async fn provider_commitments(
    Extension(state): Extension<AppState>,
    Path(provider_id): Path<i64>,
) -> Result<Json<Vec<Commitment>>, AppError> {
    let commitments = state
        .agreements
        .commitments_for_provider(ProviderId(provider_id))
        .await?;
    Ok(Json(commitments))
}

/// Absent commitments surface as a 200 with a null body; only a caller that
/// fails ownership checks sees an error.
pub(crate) async fn get_commitment(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    Query(caller): Query<CallerQuery>,
) -> Result<Json<Option<Commitment>>, AppError> {
    let commitment = state
        .agreements
        .get_commitment(caller.into_caller(), CommitmentId(id))
        .await?;
    Ok(Json(commitment))
}

pub(crate) async fn delete_commitment(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<DeleteCommitmentRequest>,
) -> Result<StatusCode, AppError> {
    state
        .agreements
        .delete_commitment(
            payload.caller.into_caller(),
            payload.user.into_user(),
            CommitmentId(id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn update_agreement(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AgreementRequest>,
) -> Result<StatusCode, AppError> {
    state
        .agreements
        .update_agreement(
            payload.caller.into_caller(),
            payload.user.into_user(),
            CommitmentId(id),
            AgreementSubmission {
                action: payload.action.into(),
                message: payload.message,
            },
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn create_apprenticeship(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpsertApprenticeshipRequest>,
) -> Result<(StatusCode, Json<Apprenticeship>), AppError> {
    let commitment_id = CommitmentId(id);
    let created = state
        .agreements
        .create_apprenticeship(
            payload.caller.into_caller(),
            payload.user.into_user(),
            commitment_id,
            payload
                .apprenticeship
                .into_apprenticeship(ApprenticeshipId(0), commitment_id),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn update_apprenticeship(
    Extension(state): Extension<AppState>,
    Path((id, apprenticeship_id)): Path<(i64, i64)>,
    Json(payload): Json<UpsertApprenticeshipRequest>,
) -> Result<StatusCode, AppError> {
    let commitment_id = CommitmentId(id);
    state
        .agreements
        .update_apprenticeship(
            payload.caller.into_caller(),
            payload.user.into_user(),
            commitment_id,
            payload
                .apprenticeship
                .into_apprenticeship(ApprenticeshipId(apprenticeship_id), commitment_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn create_update(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateUpdateRequest>,
) -> Result<StatusCode, AppError> {
    let caller = payload.caller.into_caller();
    let user = payload.user.into_user();
    let command = NewApprenticeshipUpdate {
        apprenticeship_id: ApprenticeshipId(id),
        uln: payload.uln,
        employer_ref: payload.employer_ref,
        provider_ref: payload.provider_ref,
        diff: ApprenticeshipDiff {
            first_name: payload.first_name,
            last_name: payload.last_name,
            date_of_birth: payload.date_of_birth,
            training_type: payload.training_type,
            training_code: payload.training_code,
            training_name: payload.training_name,
            cost: payload.cost,
            start_date: payload.start_date,
            end_date: payload.end_date,
        },
    };

    state.updates.create(caller, user, command).await?;
    Ok(StatusCode::CREATED)
}

pub(crate) async fn resolve_update(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ResolveUpdateRequest>,
) -> Result<StatusCode, AppError> {
    state
        .updates
        .resolve(
            payload.caller.into_caller(),
            payload.user.into_user(),
            ApprenticeshipId(id),
            payload.resolution.into(),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn change_payment_status(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<StatusChangeRequest>,
) -> Result<StatusCode, AppError> {
    state
        .agreements
        .change_payment_status(
            payload.caller.into_caller(),
            payload.user.into_user(),
            ApprenticeshipId(id),
            payload.payment_status,
            payload.date_of_change,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn triage_data_lock(
    Extension(state): Extension<AppState>,
    Path((id, event_id)): Path<(i64, i64)>,
    Json(payload): Json<TriageRequest>,
) -> Result<StatusCode, AppError> {
    state
        .triage
        .update_triage_status(
            ApprenticeshipId(id),
            DataLockEventId(event_id),
            payload.triage_status,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn approve_data_locks(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.triage.approve_triage(ApprenticeshipId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
