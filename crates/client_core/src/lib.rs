use std::sync::Arc;

use shared::{
    domain::{GroupType, ItemKind},
    protocol::{LoginRequest, LoginResponse},
};
use tracing::info;

pub mod bindings;
pub mod collection;
pub mod confirm;
pub mod controller;
pub mod error;
pub mod forms;
pub mod grid;
pub mod records;
pub mod rpc;
pub mod session;

pub use bindings::{CoinAccountsApi, GroupsApi, StockTradesApi};
pub use collection::{CollectionApi, Entity, MoveDirection, RecordId, RemoteCollection};
pub use confirm::{AutoConfirm, ConfirmGate};
pub use controller::{GroupedListController, GroupedListView, ListEvent};
pub use error::{ClientError, RpcError};
pub use rpc::{Backend, HttpRpcService, RpcService};
pub use session::{AdminUser, AppState};

pub type CoinAccountsController = GroupedListController<CoinAccountsApi>;
pub type StockTradesController = GroupedListController<StockTradesApi>;

/// Entry point tying the transport, the session and the confirm gate together.
#[derive(Clone)]
pub struct LedgerClient {
    backend: Backend,
    gate: Arc<dyn ConfirmGate>,
}

impl LedgerClient {
    pub fn new(
        rpc: Arc<dyn RpcService>,
        session: Arc<AppState>,
        gate: Arc<dyn ConfirmGate>,
    ) -> Self {
        Self {
            backend: Backend::new(rpc, session),
            gate,
        }
    }

    pub fn session(&self) -> &Arc<AppState> {
        self.backend.session()
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<AdminUser, ClientError> {
        let response = self
            .backend
            .rpc()
            .register(&credentials(username, password)?)
            .await?;
        self.store_session(response).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AdminUser, ClientError> {
        let response = self
            .backend
            .rpc()
            .login(&credentials(username, password)?)
            .await?;
        self.store_session(response).await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.session().logout().await?;
        info!("logged out");
        Ok(())
    }

    /// Controller over coin accounts; `group_type` picks coin or EOS groups.
    pub fn coin_accounts(&self, group_type: GroupType) -> Result<CoinAccountsController, ClientError> {
        if group_type.item_kind() != Some(ItemKind::CoinAccount) {
            return Err(ClientError::validation(format!(
                "{group_type} groups do not hold coin accounts"
            )));
        }
        Ok(GroupedListController::new(
            group_type,
            CoinAccountsApi,
            self.backend.clone(),
            self.gate.clone(),
        ))
    }

    pub fn stock_trades(&self) -> StockTradesController {
        GroupedListController::new(
            GroupType::StockTrade,
            StockTradesApi,
            self.backend.clone(),
            self.gate.clone(),
        )
    }

    async fn store_session(&self, response: LoginResponse) -> Result<AdminUser, ClientError> {
        let user = AdminUser {
            uid: response.uid,
            token: response.token,
        };
        self.session().set_login_info(user.clone()).await?;
        info!(uid = user.uid.0, "logged in");
        Ok(user)
    }
}

fn credentials(username: &str, password: &str) -> Result<LoginRequest, ClientError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ClientError::validation("username is required"));
    }
    if password.is_empty() {
        return Err(ClientError::validation("password is required"));
    }
    Ok(LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
