use super::*;

const DEFAULT_RESTRICTED_PAGE: usize = 50;

#[derive(Debug, Clone, Copy)]
enum AdminAction {
    Suspend,
    Unsuspend,
    Ban,
    Unban,
}

pub async fn list_restricted_principals_handler(
    State(state): State<AppState>,
    Query(query): Query<RestrictedPrincipalsQuery>,
) -> ApiResult<Json<Vec<PrincipalStatusResponse>>> {
    let principals = state
        .guard_service
        .list_restricted(query.limit.unwrap_or(DEFAULT_RESTRICTED_PAGE))
        .await?
        .into_iter()
        .map(PrincipalStatusResponse::from)
        .collect();

    Ok(Json(principals))
}

pub async fn inspect_principal_handler(
    State(state): State<AppState>,
    Path((kind, key)): Path<(String, String)>,
) -> ApiResult<Json<PrincipalStatusResponse>> {
    let principal = Principal::from_parts(&kind, &key)?;
    let status = state.guard_service.inspect(&principal).await?;

    Ok(Json(PrincipalStatusResponse::from(status)))
}

pub async fn suspend_principal_handler(
    State(state): State<AppState>,
    Path((kind, key)): Path<(String, String)>,
    Json(payload): Json<AdminActionRequest>,
) -> ApiResult<Json<PrincipalStatusResponse>> {
    apply_admin_action(&state, &kind, &key, &payload.actor, AdminAction::Suspend).await
}

pub async fn unsuspend_principal_handler(
    State(state): State<AppState>,
    Path((kind, key)): Path<(String, String)>,
    Json(payload): Json<AdminActionRequest>,
) -> ApiResult<Json<PrincipalStatusResponse>> {
    apply_admin_action(&state, &kind, &key, &payload.actor, AdminAction::Unsuspend).await
}

pub async fn ban_principal_handler(
    State(state): State<AppState>,
    Path((kind, key)): Path<(String, String)>,
    Json(payload): Json<AdminActionRequest>,
) -> ApiResult<Json<PrincipalStatusResponse>> {
    apply_admin_action(&state, &kind, &key, &payload.actor, AdminAction::Ban).await
}

pub async fn unban_principal_handler(
    State(state): State<AppState>,
    Path((kind, key)): Path<(String, String)>,
    Json(payload): Json<AdminActionRequest>,
) -> ApiResult<Json<PrincipalStatusResponse>> {
    apply_admin_action(&state, &kind, &key, &payload.actor, AdminAction::Unban).await
}

async fn apply_admin_action(
    state: &AppState,
    kind: &str,
    key: &str,
    actor: &str,
    action: AdminAction,
) -> ApiResult<Json<PrincipalStatusResponse>> {
    let principal = Principal::from_parts(kind, key)?;
    let service = &state.guard_service;

    let record = match action {
        AdminAction::Suspend => service.suspend(&principal, actor).await?,
        AdminAction::Unsuspend => service.unsuspend(&principal, actor).await?,
        AdminAction::Ban => service.ban(&principal, actor).await?,
        AdminAction::Unban => service.unban(&principal, actor).await?,
    };
    let access = record.access_state(Utc::now(), service.policy());

    Ok(Json(PrincipalStatusResponse::from(PrincipalStatus {
        record,
        state: access,
    })))
}
