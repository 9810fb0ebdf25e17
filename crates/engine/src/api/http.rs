//! HTTP routes.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tablekeep_domain::{
    CampaignId, CharacterId, DomainError, ExecutionId, ExplorationIntensity, LocationId,
    MappingId, SessionId, ThemeId, TimeOfDay,
};
use tablekeep_shared::{
    ok, ApiEnvelope, BulkRemoveRequest, CreateMappingsRequest, CreatePoolRequest, ErrorCode,
    ExploreLocationRequest, RemoveEntityRequest, SkillCheckRequest, StartExplorationRequest,
    UpdateAvailabilityRequest, UpdateDynamicAvailabilityRequest, UpsertEntityRequest,
    UserInputRequest,
};

use crate::app::App;
use crate::use_cases::{MappingRecordInput, OpsError, RemoveEntityInput, UpsertEntityInput};

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        // Location-entity mappings
        .route("/api/location/{location_id}/entities", get(location_entities))
        .route("/api/mappings", post(create_mappings))
        .route(
            "/api/mappings/{mapping_id}/availability",
            patch(update_availability),
        )
        .route("/api/mappings/{mapping_id}/discover", patch(mark_discovered))
        .route(
            "/api/session/{session_id}/update-dynamic-availability",
            put(update_dynamic_availability),
        )
        .route("/api/location/{location_id}/explore", post(explore_location))
        // Entity pool CRUD
        .route(
            "/api/entity-pool/{session_id}",
            get(get_pool).post(create_pool),
        )
        .route(
            "/api/entity-pool/{session_id}/entity",
            put(upsert_entity).post(upsert_entity).delete(remove_entity),
        )
        .route(
            "/api/entity-pool/{session_id}/entities/bulk",
            delete(bulk_remove),
        )
        .route("/api/entity-pool/{session_id}/lint", get(lint_pool))
        // Exploration action state machine
        .route("/api/exploration/start", post(start_exploration))
        .route("/api/exploration/user-input", post(exploration_user_input))
        .route("/api/exploration/skill-check", post(exploration_skill_check))
        .route("/api/exploration/reap-stale", post(reap_stale))
        // Milestone progress (GM-facing)
        .route(
            "/api/campaign/{campaign_id}/milestones/{milestone_id}/progress",
            get(milestone_progress),
        )
        .route("/api/campaign/{campaign_id}/completion", get(campaign_completion))
        // Player experience
        .route(
            "/api/player-experience/session/{session_id}/masked-progress",
            get(masked_progress),
        )
}

async fn health() -> &'static str {
    "OK"
}

// =============================================================================
// Location-Entity Mappings
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionQuery {
    session_id: Uuid,
}

async fn location_entities(
    State(app): State<Arc<App>>,
    Path(location_id): Path<Uuid>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ApiEnvelope<Vec<crate::use_cases::EntityReference>>>, ApiError> {
    let references = app
        .use_cases
        .mapping
        .available_entities_for_location(
            LocationId::from_uuid(location_id),
            SessionId::from_uuid(query.session_id),
        )
        .await?;
    Ok(Json(ok(references)))
}

async fn create_mappings(
    State(app): State<Arc<App>>,
    Json(request): Json<CreateMappingsRequest>,
) -> Result<Json<ApiEnvelope<Vec<tablekeep_domain::LocationMapping>>>, ApiError> {
    let records = request
        .mappings
        .into_iter()
        .map(|record| MappingRecordInput {
            location_id: LocationId::from_uuid(record.location_id),
            entity_id: record.entity_id,
            entity_type: record.entity_type,
            entity_category: record.entity_category,
            always_available: record.always_available,
            time_restriction: record.time_restriction,
            prerequisite_entities: record.prerequisite_entities,
        })
        .collect();
    let created = app
        .use_cases
        .mapping
        .create_mappings(SessionId::from_uuid(request.session_id), records)
        .await?;
    Ok(Json(ok(created)))
}

async fn update_availability(
    State(app): State<Arc<App>>,
    Path(mapping_id): Path<Uuid>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<ApiEnvelope<tablekeep_domain::LocationMapping>>, ApiError> {
    let mapping = app
        .use_cases
        .mapping
        .update_availability(MappingId::from_uuid(mapping_id), request.is_available)
        .await?;
    Ok(Json(ok(mapping)))
}

async fn mark_discovered(
    State(app): State<Arc<App>>,
    Path(mapping_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<tablekeep_domain::LocationMapping>>, ApiError> {
    let mapping = app
        .use_cases
        .mapping
        .mark_discovered(MappingId::from_uuid(mapping_id))
        .await?;
    Ok(Json(ok(mapping)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DynamicAvailabilityResponse {
    updated: usize,
}

async fn update_dynamic_availability(
    State(app): State<Arc<App>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<UpdateDynamicAvailabilityRequest>,
) -> Result<Json<ApiEnvelope<DynamicAvailabilityResponse>>, ApiError> {
    let time_of_day = parse_field(TimeOfDay::parse(&request.time_of_day), "timeOfDay")?;
    let updated = app
        .use_cases
        .mapping
        .update_dynamic_availability(SessionId::from_uuid(session_id), time_of_day)
        .await?;
    Ok(Json(ok(DynamicAvailabilityResponse { updated })))
}

async fn explore_location(
    State(app): State<Arc<App>>,
    Path(location_id): Path<Uuid>,
    Json(request): Json<ExploreLocationRequest>,
) -> Result<Json<ApiEnvelope<crate::use_cases::ExplorationReport>>, ApiError> {
    let intensity = parse_field(
        ExplorationIntensity::parse(&request.exploration_intensity),
        "explorationIntensity",
    )?;
    let report = app
        .use_cases
        .mapping
        .explore_location(
            LocationId::from_uuid(location_id),
            CharacterId::from_uuid(request.character_id),
            SessionId::from_uuid(request.session_id),
            intensity,
        )
        .await?;
    Ok(Json(ok(report)))
}

// =============================================================================
// Entity Pool
// =============================================================================

async fn get_pool(
    State(app): State<Arc<App>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<tablekeep_domain::EntityPool>>, ApiError> {
    let pool = app
        .use_cases
        .entity_pool
        .get(SessionId::from_uuid(session_id))
        .await?;
    Ok(Json(ok(pool)))
}

async fn create_pool(
    State(app): State<Arc<App>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<CreatePoolRequest>,
) -> Result<Json<ApiEnvelope<tablekeep_domain::EntityPool>>, ApiError> {
    let pool = app
        .use_cases
        .entity_pool
        .create_if_absent(
            SessionId::from_uuid(session_id),
            CampaignId::from_uuid(request.campaign_id),
            ThemeId::from_uuid(request.theme_id),
        )
        .await?;
    Ok(Json(ok(pool)))
}

async fn upsert_entity(
    State(app): State<Arc<App>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<UpsertEntityRequest>,
) -> Result<Json<ApiEnvelope<tablekeep_domain::EntityPool>>, ApiError> {
    let pool = app
        .use_cases
        .entity_pool
        .upsert_entity(SessionId::from_uuid(session_id), to_upsert_input(request))
        .await?;
    Ok(Json(ok(pool)))
}

async fn remove_entity(
    State(app): State<Arc<App>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<RemoveEntityRequest>,
) -> Result<Json<ApiEnvelope<tablekeep_domain::PoolEntity>>, ApiError> {
    let removed = app
        .use_cases
        .entity_pool
        .remove_entity(
            SessionId::from_uuid(session_id),
            RemoveEntityInput {
                entity_type: request.entity_type,
                category: request.category,
                entity_id: request.entity_id,
            },
        )
        .await?;
    Ok(Json(ok(removed)))
}

async fn bulk_remove(
    State(app): State<Arc<App>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<BulkRemoveRequest>,
) -> Result<Json<ApiEnvelope<Vec<tablekeep_domain::PoolEntity>>>, ApiError> {
    let inputs = request
        .entities
        .into_iter()
        .map(|entity| RemoveEntityInput {
            entity_type: entity.entity_type,
            category: entity.category,
            entity_id: entity.entity_id,
        })
        .collect();
    let removed = app
        .use_cases
        .entity_pool
        .bulk_remove(SessionId::from_uuid(session_id), inputs)
        .await?;
    Ok(Json(ok(removed)))
}

async fn lint_pool(
    State(app): State<Arc<App>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<Vec<tablekeep_domain::MilestoneContributionError>>>, ApiError> {
    let pool = app
        .use_cases
        .entity_pool
        .get(SessionId::from_uuid(session_id))
        .await?;
    Ok(Json(ok(pool.milestone_contribution_errors())))
}

// =============================================================================
// Exploration Action State Machine
// =============================================================================

async fn start_exploration(
    State(app): State<Arc<App>>,
    Json(request): Json<StartExplorationRequest>,
) -> Result<Json<ApiEnvelope<tablekeep_domain::ExplorationExecution>>, ApiError> {
    let execution = app
        .use_cases
        .exploration
        .start_action(
            SessionId::from_uuid(request.session_id),
            CharacterId::from_uuid(request.character_id),
            request.target_entity_id,
            request.action_type,
            request.custom_description,
        )
        .await?;
    Ok(Json(ok(execution)))
}

async fn exploration_user_input(
    State(app): State<Arc<App>>,
    Json(request): Json<UserInputRequest>,
) -> Result<Json<ApiEnvelope<crate::use_cases::UserInputAck>>, ApiError> {
    let ack = app
        .use_cases
        .exploration
        .provide_user_input(
            ExecutionId::from_uuid(request.execution_id),
            CharacterId::from_uuid(request.character_id),
            request.user_approach,
        )
        .await?;
    Ok(Json(ok(ack)))
}

async fn exploration_skill_check(
    State(app): State<Arc<App>>,
    Json(request): Json<SkillCheckRequest>,
) -> Result<Json<ApiEnvelope<crate::use_cases::SkillCheckReport>>, ApiError> {
    let report = app
        .use_cases
        .exploration
        .execute_skill_check(
            ExecutionId::from_uuid(request.execution_id),
            CharacterId::from_uuid(request.character_id),
            request.skill_type,
            request.target_number,
            request.modifiers,
        )
        .await?;
    Ok(Json(ok(report)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReapResponse {
    reaped: u32,
}

async fn reap_stale(
    State(app): State<Arc<App>>,
) -> Result<Json<ApiEnvelope<ReapResponse>>, ApiError> {
    let reaped = app.use_cases.exploration.reap_stale().await?;
    Ok(Json(ok(ReapResponse { reaped })))
}

// =============================================================================
// Milestone Progress
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MilestoneProgressResponse {
    milestone_id: String,
    progress: u8,
}

async fn milestone_progress(
    State(app): State<Arc<App>>,
    Path((campaign_id, milestone_id)): Path<(Uuid, String)>,
) -> Result<Json<ApiEnvelope<MilestoneProgressResponse>>, ApiError> {
    let progress = app
        .use_cases
        .progress
        .compute_progress(CampaignId::from_uuid(campaign_id), &milestone_id)
        .await?;
    Ok(Json(ok(MilestoneProgressResponse {
        milestone_id,
        progress,
    })))
}

async fn campaign_completion(
    State(app): State<Arc<App>>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<tablekeep_domain::CampaignCompletion>>, ApiError> {
    let completion = app
        .use_cases
        .progress
        .compute_campaign_completion(CampaignId::from_uuid(campaign_id))
        .await?;
    Ok(Json(ok(completion)))
}

// =============================================================================
// Player Experience
// =============================================================================

async fn masked_progress(
    State(app): State<Arc<App>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<crate::use_cases::MaskedProgressInfo>>, ApiError> {
    let info = app
        .use_cases
        .player_view
        .masked_progress_info(SessionId::from_uuid(session_id))
        .await?;
    Ok(Json(ok(info)))
}

// =============================================================================
// Errors
// =============================================================================

fn to_upsert_input(request: UpsertEntityRequest) -> UpsertEntityInput {
    UpsertEntityInput {
        entity_type: request.entity_type,
        category: request.category,
        id: request.id,
        name: request.name,
        description: request.description,
        milestone_id: request.milestone_id,
        progress_contribution: request.progress_contribution,
        rewards: tablekeep_domain::EntityRewards {
            experience: request.rewards.experience,
            items: request.rewards.items,
            information: request.rewards.information,
        },
        create_pool: request.create_pool.map(|create| {
            (
                CampaignId::from_uuid(create.campaign_id),
                ThemeId::from_uuid(create.theme_id),
            )
        }),
    }
}

/// Parse a wire enum string, naming the field in the validation details.
fn parse_field<T>(result: Result<T, DomainError>, field: &str) -> Result<T, ApiError> {
    result.map_err(|e| {
        let mut details = BTreeMap::new();
        details.insert(field.to_string(), e.to_string());
        ApiError::Validation {
            message: format!("invalid {field}"),
            details,
        }
    })
}

#[derive(Debug)]
pub enum ApiError {
    Validation {
        message: String,
        details: BTreeMap<String, String>,
    },
    NotFound(String),
    InvalidState(String),
    Internal(String),
}

impl From<OpsError> for ApiError {
    fn from(e: OpsError) -> Self {
        match e {
            OpsError::Domain(DomainError::Validation { message, details }) => {
                ApiError::Validation { message, details }
            }
            OpsError::Domain(e @ DomainError::NotFound { .. }) => ApiError::NotFound(e.to_string()),
            OpsError::Domain(DomainError::InvalidPhase(transition)) => {
                ApiError::InvalidState(format!("invalid phase transition: {transition}"))
            }
            OpsError::Domain(e) => ApiError::Validation {
                message: e.to_string(),
                details: BTreeMap::new(),
            },
            OpsError::Repo(e) if e.is_not_found() => ApiError::NotFound(e.to_string()),
            OpsError::Repo(e) if e.is_conflict() => {
                ApiError::InvalidState("the session changed concurrently, retry".to_string())
            }
            OpsError::Repo(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message, details) = match self {
            ApiError::Validation { message, details } => (
                axum::http::StatusCode::BAD_REQUEST,
                ErrorCode::ValidationError,
                message,
                details,
            ),
            ApiError::NotFound(message) => (
                axum::http::StatusCode::NOT_FOUND,
                ErrorCode::NotFound,
                message,
                BTreeMap::new(),
            ),
            ApiError::InvalidState(message) => (
                axum::http::StatusCode::CONFLICT,
                ErrorCode::InvalidState,
                message,
                BTreeMap::new(),
            ),
            ApiError::Internal(message) => {
                // Log the cause; never echo internals to the client
                tracing::error!(error = %message, "Internal error");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::InternalError,
                    "Internal error".to_string(),
                    BTreeMap::new(),
                )
            }
        };
        let envelope: ApiEnvelope<()> =
            ApiEnvelope::error(code, message, details, chrono::Utc::now());
        (status, Json(envelope)).into_response()
    }
}
