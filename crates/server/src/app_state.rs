use server_api::ApiContext;

use crate::auth::AuthConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) auth: AuthConfig,
}
