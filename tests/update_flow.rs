//! Packager and updater against a live alarm server and a local update
//! folder served over HTTP.
#![cfg(unix)]

use alarm_button::config::{Config, DEFAULT_CONFIG_FILENAME};
use alarm_button::server::serve;
use alarm_button::server::state::AppState;
use alarm_button::update::manifest::distributable_files;
use alarm_button::update::packager::{self, PackagerOptions};
use alarm_button::update::updater::{self, UpdateOutcome, UpdaterOptions};
use alarm_button::update::{file_checksum, Role, VERSION, VERSION_FILENAME};
use alarm_button::AlarmService;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;

async fn start_alarm_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let state = Arc::new(AppState::new(AlarmService::new(None).await.unwrap()));
    tokio::spawn(serve(listener, state, std::future::pending()));
    addr
}

async fn serve_file(
    State(root): State<PathBuf>,
    UrlPath(name): UrlPath<String>,
) -> Result<Vec<u8>, StatusCode> {
    tokio::fs::read(root.join(name))
        .await
        .map_err(|_| StatusCode::NOT_FOUND)
}

/// Serves `root` under `/alarm/` and returns the folder URL.
async fn start_file_server(root: &Path) -> String {
    let router = Router::new()
        .route("/alarm/:name", get(serve_file))
        .with_state(root.to_path_buf());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await });
    format!("http://{}/alarm/", addr)
}

fn write_release(dir: &Path) {
    for name in distributable_files() {
        if name == DEFAULT_CONFIG_FILENAME {
            continue;
        }
        let script = format!("#!/bin/sh\necho \"{} {}\"\n", name, VERSION);
        std::fs::write(dir.join(&name), script).unwrap();
    }
}

#[tokio::test]
async fn test_package_then_update_client() {
    let server_addr = start_alarm_server().await;
    let release = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();
    write_release(release.path());
    let update_folder = start_file_server(release.path()).await;

    let options = PackagerOptions {
        server_addr: server_addr.clone(),
        update_folder: update_folder.clone(),
        config_path: None,
    };
    let manifest = packager::run(&options, release.path(), std::future::pending())
        .await
        .unwrap();
    assert!(release.path().join(VERSION_FILENAME).exists());

    let config = Config::load(Some(&release.path().join(DEFAULT_CONFIG_FILENAME))).unwrap();
    assert_eq!(config.update_folder.as_deref(), Some(update_folder.as_str()));

    let options = UpdaterOptions {
        role: Role::Client,
        start_executable: false,
    };

    let outcome = updater::run(&config, &options, install.path(), std::future::pending())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            from: None,
            to: VERSION.to_string(),
        }
    );

    for name in Role::Client.files() {
        let installed = install.path().join(&name);
        assert_eq!(
            file_checksum(&installed).unwrap(),
            manifest.checksum(&name).unwrap()
        );
    }
    assert!(!install.path().join(Role::Server.executable()).exists());

    let checker = install.path().join(Role::Client.executable());
    let mode = std::fs::metadata(&checker).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);

    let outcome = updater::run(&config, &options, install.path(), std::future::pending())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::UpToDate {
            version: VERSION.to_string(),
        }
    );

    let button = install.path().join(Role::Client.files()[0].clone());
    std::fs::write(&button, b"tampered").unwrap();

    let outcome = updater::run(&config, &options, install.path(), std::future::pending())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            from: Some(VERSION.to_string()),
            to: VERSION.to_string(),
        }
    );
    assert_eq!(
        file_checksum(&button).unwrap(),
        manifest.checksum(&Role::Client.files()[0]).unwrap()
    );
}

#[tokio::test]
async fn test_update_fails_when_manifest_missing() {
    let server_addr = start_alarm_server().await;
    let empty = tempfile::tempdir().unwrap();
    let install = tempfile::tempdir().unwrap();
    let update_folder = start_file_server(empty.path()).await;

    let mut config = Config::new(server_addr).unwrap();
    config.update_folder = Some(update_folder);

    let options = UpdaterOptions {
        role: Role::Server,
        start_executable: false,
    };
    let result = updater::run(&config, &options, install.path(), std::future::pending()).await;

    assert!(result.is_err());
    assert!(std::fs::read_dir(install.path()).unwrap().next().is_none());
}
