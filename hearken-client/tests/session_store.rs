//! Durable session storage and startup restore.

mod support;

use hearken_client::{
    ClientConfig, FeedbackClient, FileSessionStore, Session, SessionState, SessionStore,
};
use std::sync::Arc;
use support::{admin, RecordingNavigator, TOKEN};

#[test]
fn file_store_round_trips_and_clears() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

    assert!(store.load().unwrap().is_none());
    store.save(&Session::new(TOKEN, admin())).unwrap();

    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded.token, TOKEN);
    assert_eq!(loaded.user, admin());

    store.clear().unwrap();
    assert!(store.load().unwrap().is_none());
    // Clearing twice is fine.
    store.clear().unwrap();
}

#[test]
fn corrupt_session_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = FileSessionStore::new(&path);
    assert!(store.load().is_err());
}

#[test]
fn restore_picks_up_previous_session_and_sign_out_removes_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    FileSessionStore::new(&path)
        .save(&Session::new(TOKEN, admin()))
        .unwrap();

    let state = SessionState::restore(Arc::new(FileSessionStore::new(&path))).unwrap();
    assert!(state.is_authenticated());
    assert_eq!(state.credential().token.as_deref(), Some(TOKEN));
    assert_eq!(state.current_user().map(|u| u.id), Some(admin().id));

    state.sign_out().unwrap();
    assert!(!state.is_authenticated());
    assert!(!path.exists());
}

#[tokio::test]
async fn client_from_config_restores_session() {
    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("session.json");
    FileSessionStore::new(&session_path)
        .save(&Session::new(TOKEN, admin()))
        .unwrap();

    let config_path = dir.path().join("hearken.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
api_base_url = "http://127.0.0.1:9"
request_timeout_ms = 500
sign_in_path = "/sign-in"
redirect_delay_ms = 100
session_path = "{}"

[cache]
gc_time_ms = 60000
"#,
            session_path.display().to_string().replace('\\', "\\\\")
        ),
    )
    .unwrap();

    let config = ClientConfig::from_path(&config_path).unwrap();
    let client =
        FeedbackClient::from_config(&config, Arc::new(RecordingNavigator::at("/"))).unwrap();
    assert!(client.session().is_authenticated());
    assert!(client.cache().is_empty());

    client.sign_out().unwrap();
    assert!(!session_path.exists());
}
