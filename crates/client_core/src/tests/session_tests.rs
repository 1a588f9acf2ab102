use super::*;
use crate::forms::add_group_form;

fn admin(uid: i64) -> AdminUser {
    AdminUser {
        uid: UserId(uid),
        token: format!("token-{uid}"),
    }
}

#[tokio::test]
async fn login_info_drives_the_auth_header() {
    let state = AppState::new();
    assert_eq!(state.authorization_header().await, None);

    state.set_login_info(admin(7)).await.expect("login");
    assert_eq!(state.user().await, Some(admin(7)));
    assert_eq!(state.auth_token().await.as_deref(), Some("token-7"));
    assert_eq!(
        state.authorization_header().await.as_deref(),
        Some("bearer token-7")
    );

    state.logout().await.expect("logout");
    assert_eq!(state.user().await, None);
    assert_eq!(state.authorization_header().await, None);
}

#[tokio::test]
async fn popup_schema_is_replaced_and_cleared() {
    let state = AppState::new();
    assert!(state.popup_form_schema().await.is_none());

    state.set_popup_form_schema(Some(add_group_form())).await;
    assert_eq!(state.popup_form_schema().await, Some(add_group_form()));

    state.set_popup_form_schema(None).await;
    assert!(state.popup_form_schema().await.is_none());
}

#[tokio::test]
async fn persisted_session_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("session.json");

    let state = AppState::with_persistence(&path).expect("fresh state");
    assert_eq!(state.user().await, None);
    state.set_login_info(admin(3)).await.expect("login");
    assert!(path.exists());

    let restored = AppState::with_persistence(&path).expect("restored state");
    assert_eq!(restored.user().await, Some(admin(3)));

    restored.logout().await.expect("logout");
    assert!(!path.exists());
    restored.logout().await.expect("second logout");
}

#[tokio::test]
async fn unreadable_session_file_is_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");
    std::fs::write(&path, "not json").expect("write");

    let state = AppState::with_persistence(&path).expect("state");
    assert_eq!(state.user().await, None);
}
