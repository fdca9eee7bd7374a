use super::*;

pub async fn check_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<GuardCheckRequest>,
) -> ApiResult<Response> {
    let attempt = login_attempt(&state, peer.ip(), &headers, payload.user_id);
    let decision = state.guard_service.check_fail_closed(&attempt).await?;

    Ok(decision_response(decision))
}

pub async fn outcome_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<GuardOutcomeRequest>,
) -> ApiResult<StatusCode> {
    let attempt = login_attempt(&state, peer.ip(), &headers, payload.user_id);
    state
        .guard_service
        .record_outcome(&attempt, payload.outcome.into())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn login_attempt(
    state: &AppState,
    peer: IpAddr,
    headers: &HeaderMap,
    user_id: Option<Uuid>,
) -> LoginAttempt {
    let client_ip = resolve_client_ip(peer, headers, &state.trusted_proxies);
    LoginAttempt::new(user_id.map(UserId::from_uuid), Some(client_ip))
}

/// Translates a guard decision into the login flow's HTTP response.
fn decision_response(decision: GuardDecision) -> Response {
    let (status, retry_after) = match &decision {
        GuardDecision::Allow => (StatusCode::OK, None),
        GuardDecision::Delay { retry_after, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            Some(retry_after_seconds(retry_after.num_milliseconds())),
        ),
        GuardDecision::Suspended { .. } | GuardDecision::Banned { .. } => {
            (StatusCode::FORBIDDEN, None)
        }
    };

    let mut response = (status, Json(decision)).into_response();
    if let Some(seconds) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    }

    response
}

fn retry_after_seconds(milliseconds: i64) -> i64 {
    ((milliseconds + 999) / 1000).max(1)
}
