use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use server_api::ApiContext;
use shared::{
    domain::UserId,
    error::{ApiError, ErrorCode},
    protocol::{LoginRequest, LoginResponse, RpcMethod},
};
use storage::Storage;
use tokio::sync::Mutex;

use crate::{
    confirm::ConfirmGate, error::RpcError, rpc::RpcService, session::AppState, LedgerClient,
};

const TOKEN_PREFIX: &str = "loopback-";

/// In-process backend that runs calls straight through `server_api` and
/// records every method it receives.
pub(crate) struct LoopbackRpc {
    ctx: ApiContext,
    calls: Mutex<Vec<RpcMethod>>,
    failing: Mutex<HashSet<RpcMethod>>,
}

impl LoopbackRpc {
    pub(crate) async fn new() -> Arc<Self> {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        Arc::new(Self {
            ctx: ApiContext { storage },
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.ctx.storage
    }

    pub(crate) async fn calls(&self) -> Vec<RpcMethod> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn count(&self, method: RpcMethod) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|m| **m == method)
            .count()
    }

    pub(crate) async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    /// Makes every later call to `method` fail at the transport level.
    pub(crate) async fn fail(&self, method: RpcMethod, failing: bool) {
        let mut set = self.failing.lock().await;
        if failing {
            set.insert(method);
        } else {
            set.remove(&method);
        }
    }
}

pub(crate) fn status_error(method: &str, error: ApiError) -> RpcError {
    let status = match error.code {
        ErrorCode::Unauthorized => 401,
        ErrorCode::Forbidden => 403,
        ErrorCode::NotFound => 404,
        ErrorCode::Validation => 400,
        ErrorCode::Internal => 500,
    };
    RpcError::Status {
        method: method.to_string(),
        status,
        error,
    }
}

#[async_trait]
impl RpcService for LoopbackRpc {
    async fn call(
        &self,
        method: RpcMethod,
        request: Value,
        auth_token: Option<&str>,
    ) -> Result<Value, RpcError> {
        self.calls.lock().await.push(method);
        if self.failing.lock().await.contains(&method) {
            return Err(RpcError::Transport("connection reset".into()));
        }
        let user = auth_token
            .and_then(|token| token.strip_prefix(TOKEN_PREFIX))
            .and_then(|raw| raw.parse().ok())
            .map(UserId)
            .ok_or_else(|| {
                status_error(
                    method.as_str(),
                    ApiError::new(ErrorCode::Unauthorized, "missing token"),
                )
            })?;
        server_api::dispatch(&self.ctx, user, method, request)
            .await
            .map_err(|err| status_error(method.as_str(), err))
    }

    async fn register(&self, request: &LoginRequest) -> Result<LoginResponse, RpcError> {
        let uid = server_api::register(&self.ctx, request)
            .await
            .map_err(|err| status_error("register", err))?;
        Ok(LoginResponse {
            uid,
            token: format!("{TOKEN_PREFIX}{}", uid.0),
        })
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, RpcError> {
        let uid = server_api::authenticate(&self.ctx, request)
            .await
            .map_err(|err| status_error("login", err))?;
        Ok(LoginResponse {
            uid,
            token: format!("{TOKEN_PREFIX}{}", uid.0),
        })
    }
}

/// Confirm gate with a fixed answer that remembers what it was asked.
pub(crate) struct RecordingGate {
    answer: bool,
    prompts: Mutex<Vec<(String, String)>>,
}

impl RecordingGate {
    pub(crate) fn new(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub(crate) async fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl ConfirmGate for RecordingGate {
    async fn confirm(&self, title: &str, message: &str) -> bool {
        self.prompts
            .lock()
            .await
            .push((title.to_string(), message.to_string()));
        self.answer
    }
}

/// A client registered as `alice` against a fresh loopback backend.
pub(crate) async fn logged_in_client(
    gate: Arc<dyn ConfirmGate>,
) -> (LedgerClient, Arc<LoopbackRpc>) {
    let rpc = LoopbackRpc::new().await;
    let client = LedgerClient::new(rpc.clone(), Arc::new(AppState::new()), gate);
    client
        .register("alice", "hunter22")
        .await
        .expect("register");
    (client, rpc)
}
