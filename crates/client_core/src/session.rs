use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use shared::domain::UserId;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{error::ClientError, forms::FormSchema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub uid: UserId,
    pub token: String,
}

#[derive(Default)]
struct SessionInner {
    user: Option<AdminUser>,
    popup_form: Option<FormSchema>,
}

/// Process-wide session and UI state, shared by reference between the
/// transport and the presentation layer.
#[derive(Default)]
pub struct AppState {
    inner: RwLock<SessionInner>,
    persist_path: Option<PathBuf>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the logged-in user from `path` if it exists; later login and
    /// logout calls keep the file in sync.
    pub fn with_persistence(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let user = load_user(&path)?;
        if let Some(user) = &user {
            info!(uid = user.uid.0, path = %path.display(), "restored session");
        }
        Ok(Self {
            inner: RwLock::new(SessionInner {
                user,
                popup_form: None,
            }),
            persist_path: Some(path),
        })
    }

    pub async fn set_login_info(&self, user: AdminUser) -> Result<(), ClientError> {
        if let Some(path) = &self.persist_path {
            save_user(path, &user)?;
        }
        self.inner.write().await.user = Some(user);
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.inner.write().await.user = None;
        if let Some(path) = &self.persist_path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(ClientError::Storage(err.to_string())),
            }
        }
        Ok(())
    }

    pub async fn user(&self) -> Option<AdminUser> {
        self.inner.read().await.user.clone()
    }

    pub async fn auth_token(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .user
            .as_ref()
            .map(|user| user.token.clone())
    }

    pub async fn authorization_header(&self) -> Option<String> {
        self.auth_token().await.map(|token| format!("bearer {token}"))
    }

    pub async fn set_popup_form_schema(&self, schema: Option<FormSchema>) {
        self.inner.write().await.popup_form = schema;
    }

    pub async fn popup_form_schema(&self) -> Option<FormSchema> {
        self.inner.read().await.popup_form.clone()
    }
}

fn load_user(path: &Path) -> Result<Option<AdminUser>, ClientError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ClientError::Storage(err.to_string())),
    };
    match serde_json::from_str(&raw) {
        Ok(user) => Ok(Some(user)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "discarding unreadable session file");
            Ok(None)
        }
    }
}

fn save_user(path: &Path, user: &AdminUser) -> Result<(), ClientError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ClientError::Storage(e.to_string()))?;
    }
    let raw = serde_json::to_string_pretty(user).map_err(|e| ClientError::Storage(e.to_string()))?;
    fs::write(path, raw).map_err(|e| ClientError::Storage(e.to_string()))
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
