use std::sync::Arc;

use ipnet::IpNet;
use warden_application::AccessGuardService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub guard_service: AccessGuardService,
    pub admin_token: Arc<str>,
    pub trusted_proxies: Arc<[IpNet]>,
}
