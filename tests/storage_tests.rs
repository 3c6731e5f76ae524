//! On-disk persistence and process restarts

use std::sync::Arc;

use chrono::{Duration, Utc};
use device_console_lib::config::Config;
use device_console_lib::routes::{History, LANDING_PATH, LOGIN_PATH};
use device_console_lib::storage::{FileStorage, Lifetime, Storage};
use device_console_lib::tokens::{TokenStore, ACCESS_TOKEN_KEY};
use device_console_lib::Console;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn console_on(dir: &TempDir, server: &MockServer) -> (Console, Arc<History>) {
    let config = Config {
        api_base_url: server.uri(),
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let history = Arc::new(History::new());
    let storage = Arc::new(FileStorage::with_path(dir.path()));
    let console = Console::new(&config, storage, history.clone()).unwrap();
    (console, history)
}

async fn login_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/Token/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "token": "T1", "refreshToken": "R1" })),
        )
        .mount(&server)
        .await;
    server
}

#[test]
fn test_persistent_entries_survive_a_new_instance() {
    let dir = TempDir::new().unwrap();

    let first = FileStorage::with_path(dir.path());
    first.set("kept", "yes", Lifetime::days(30)).unwrap();
    first.set("dropped", "no", Lifetime::Session).unwrap();

    let second = FileStorage::with_path(dir.path());
    assert_eq!(second.get("kept").unwrap().as_deref(), Some("yes"));
    assert!(matches!(second.lifetime("kept").unwrap(), Some(Lifetime::Until(_))));
    assert_eq!(second.get("dropped").unwrap(), None);
}

#[test]
fn test_expired_entries_are_removed_from_disk() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::with_path(dir.path());

    let past = Utc::now() - Duration::minutes(1);
    storage.set("old", "value", Lifetime::Until(past)).unwrap();
    assert!(dir.path().join("old.dat").exists());

    assert_eq!(storage.get("old").unwrap(), None);
    assert!(!dir.path().join("old.dat").exists());
}

#[test]
fn test_session_write_replaces_persistent_entry() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::with_path(dir.path());

    storage.set("token", "disk", Lifetime::days(30)).unwrap();
    storage.set("token", "memory", Lifetime::Session).unwrap();

    assert_eq!(storage.get("token").unwrap().as_deref(), Some("memory"));
    assert!(!dir.path().join("token.dat").exists());

    storage.end_session();
    assert_eq!(storage.get("token").unwrap(), None);
}

#[test]
fn test_remove_clears_both_layers() {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::with_path(dir.path());

    storage.set("a", "1", Lifetime::days(1)).unwrap();
    storage.set("b", "2", Lifetime::Session).unwrap();
    storage.remove("a").unwrap();
    storage.remove("b").unwrap();
    storage.remove("never-written").unwrap();

    assert_eq!(storage.get("a").unwrap(), None);
    assert_eq!(storage.get("b").unwrap(), None);
}

#[test]
fn test_token_store_over_file_storage() {
    let dir = TempDir::new().unwrap();
    let tokens = TokenStore::new(Arc::new(FileStorage::with_path(dir.path())));

    tokens.set_tokens(Some("T1"), Some("R1"), true).unwrap();
    assert!(dir.path().join(format!("{}.dat", ACCESS_TOKEN_KEY)).exists());

    tokens.clear();
    assert!(!tokens.logged_in());
    assert!(!dir.path().join(format!("{}.dat", ACCESS_TOKEN_KEY)).exists());
}

#[tokio::test]
async fn test_remembered_login_survives_restart() {
    let dir = TempDir::new().unwrap();
    let server = login_server().await;

    {
        let (console, _) = console_on(&dir, &server);
        console.session.login("a@b.com", "pw", true).await.unwrap();
    }

    let (console, history) = console_on(&dir, &server);
    assert!(console.session.logged_in());
    assert!(console.preference.get());
    assert_eq!(console.tokens.access_token().as_deref(), Some("T1"));

    assert_eq!(console.router.navigate(LOGIN_PATH), LANDING_PATH);
    assert_eq!(history.current().as_deref(), Some(LANDING_PATH));
}

#[tokio::test]
async fn test_unremembered_login_ends_with_the_process() {
    let dir = TempDir::new().unwrap();
    let server = login_server().await;

    {
        let (console, _) = console_on(&dir, &server);
        console.session.login("a@b.com", "pw", false).await.unwrap();
        assert!(console.session.logged_in());
    }

    let (console, history) = console_on(&dir, &server);
    assert!(!console.session.logged_in());
    assert!(!console.preference.get());

    assert_eq!(console.router.navigate("/"), LOGIN_PATH);
    assert_eq!(history.visits(), vec![LOGIN_PATH]);
}

#[tokio::test]
async fn test_preference_survives_logout_as_false() {
    let dir = TempDir::new().unwrap();
    let server = login_server().await;

    {
        let (console, _) = console_on(&dir, &server);
        console.session.login("a@b.com", "pw", true).await.unwrap();
        console.session.logout();
    }

    let storage = FileStorage::with_path(dir.path());
    assert_eq!(storage.get("auth_remember").unwrap().as_deref(), Some("false"));
    assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
}
