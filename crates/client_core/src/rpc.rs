use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{LoginRequest, LoginResponse, RpcMethod},
};
use tracing::debug;
use url::Url;

use crate::{error::RpcError, session::AppState};

/// Boundary to the backend. Implementations carry `auth_token` as a bearer
/// credential when present and send the call unauthenticated otherwise.
#[async_trait]
pub trait RpcService: Send + Sync {
    async fn call(
        &self,
        method: RpcMethod,
        request: Value,
        auth_token: Option<&str>,
    ) -> Result<Value, RpcError>;

    async fn register(&self, request: &LoginRequest) -> Result<LoginResponse, RpcError>;

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, RpcError>;
}

pub async fn call_typed<Req, Resp>(
    rpc: &dyn RpcService,
    method: RpcMethod,
    request: &Req,
    auth_token: Option<&str>,
) -> Result<Resp, RpcError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let body = serde_json::to_value(request).map_err(|e| RpcError::Encode {
        method: method.to_string(),
        message: e.to_string(),
    })?;
    let response = rpc.call(method, body, auth_token).await?;
    serde_json::from_value(response).map_err(|e| RpcError::Decode {
        method: method.to_string(),
        message: e.to_string(),
    })
}

/// JSON-over-HTTP transport: `POST {base}/rpc/{method}`.
#[derive(Clone)]
pub struct HttpRpcService {
    http: Client,
    base: Url,
}

impl HttpRpcService {
    pub fn new(server_url: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(server_url.trim())?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        label: &str,
        path: &str,
        body: &B,
        auth_token: Option<&str>,
    ) -> Result<Value, RpcError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| RpcError::Transport(format!("invalid endpoint '{path}': {e}")))?;
        let mut request = self.http.post(url).json(body);
        if let Some(token) = auth_token {
            request = request.header(AUTHORIZATION, format!("bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error = response.json::<ApiError>().await.unwrap_or_else(|_| {
                ApiError::new(
                    ErrorCode::Internal,
                    status
                        .canonical_reason()
                        .unwrap_or("unexpected response")
                        .to_string(),
                )
            });
            debug!(%label, status = status.as_u16(), code = ?error.code, "backend rejected call");
            return Err(RpcError::Status {
                method: label.to_string(),
                status: status.as_u16(),
                error,
            });
        }

        response.json::<Value>().await.map_err(|e| RpcError::Decode {
            method: label.to_string(),
            message: e.to_string(),
        })
    }

    async fn session_call(&self, label: &str, request: &LoginRequest) -> Result<LoginResponse, RpcError> {
        let value = self.post(label, label, request, None).await?;
        serde_json::from_value(value).map_err(|e| RpcError::Decode {
            method: label.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RpcService for HttpRpcService {
    async fn call(
        &self,
        method: RpcMethod,
        request: Value,
        auth_token: Option<&str>,
    ) -> Result<Value, RpcError> {
        self.post(
            method.as_str(),
            &format!("rpc/{}", method.as_str()),
            &request,
            auth_token,
        )
        .await
    }

    async fn register(&self, request: &LoginRequest) -> Result<LoginResponse, RpcError> {
        self.session_call("register", request).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, RpcError> {
        self.session_call("login", request).await
    }
}

/// An [`RpcService`] paired with the session it reads tokens from.
#[derive(Clone)]
pub struct Backend {
    rpc: Arc<dyn RpcService>,
    session: Arc<AppState>,
}

impl Backend {
    pub fn new(rpc: Arc<dyn RpcService>, session: Arc<AppState>) -> Self {
        Self { rpc, session }
    }

    pub fn rpc(&self) -> &Arc<dyn RpcService> {
        &self.rpc
    }

    pub fn session(&self) -> &Arc<AppState> {
        &self.session
    }

    pub async fn call<Req, Resp>(&self, method: RpcMethod, request: &Req) -> Result<Resp, RpcError>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        let token = self.session.auth_token().await;
        call_typed(self.rpc.as_ref(), method, request, token.as_deref()).await
    }
}

#[cfg(test)]
#[path = "tests/rpc_tests.rs"]
mod tests;
