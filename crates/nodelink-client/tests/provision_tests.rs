//! Parameter downloads against a mock file server

use nodelink_client::{ParameterProvisioner, ProvisionError};
use nodelink_config::ParamsSettings;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(tmp: &TempDir, server: &MockServer, files: &[&str]) -> ParamsSettings {
    ParamsSettings {
        dir: Some(tmp.path().join("params")),
        urls: files
            .iter()
            .map(|f| format!("{}/downloads/{f}", server.uri()))
            .collect(),
        required: files.iter().map(|f| f.to_string()).collect(),
        search_dirs: vec![],
    }
}

async fn serve(server: &MockServer, file: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/downloads/{file}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_downloads_queue_in_order() {
    let server = MockServer::start().await;
    serve(&server, "sapling-spend.params", b"spend-bytes").await;
    serve(&server, "sapling-output.params", b"output-bytes").await;

    let tmp = TempDir::new().unwrap();
    let settings = settings(&tmp, &server, &["sapling-spend.params", "sapling-output.params"]);
    let provisioner = ParameterProvisioner::new(reqwest::Client::new(), &settings);
    assert!(provisioner.locate_params().is_none());

    let mut titles = Vec::new();
    let summary = provisioner
        .provision(|progress| titles.push(progress.title()))
        .await
        .unwrap();

    assert_eq!(summary.downloaded, vec!["sapling-spend.params", "sapling-output.params"]);
    assert!(summary.skipped.is_empty());
    let dir = provisioner.destination();
    assert_eq!(fs::read(dir.join("sapling-spend.params")).unwrap(), b"spend-bytes");
    assert_eq!(fs::read(dir.join("sapling-output.params")).unwrap(), b"output-bytes");
    assert!(titles.first().unwrap().contains("+1 more remaining"));
    assert_eq!(provisioner.locate_params().as_deref(), Some(dir));
}

#[tokio::test]
async fn test_existing_files_are_not_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let settings = settings(&tmp, &server, &["sprout-groth16.params"]);
    let dir = settings.params_dir();
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("sprout-groth16.params"), b"cached").unwrap();

    let provisioner = ParameterProvisioner::new(reqwest::Client::new(), &settings);
    for _ in 0..2 {
        let summary = provisioner.provision(|_| {}).await.unwrap();
        assert!(summary.downloaded.is_empty());
        assert_eq!(summary.skipped, vec!["sprout-groth16.params"]);
    }
    assert_eq!(fs::read(dir.join("sprout-groth16.params")).unwrap(), b"cached");
}

#[tokio::test]
async fn test_failed_download_aborts_and_leaves_no_partial() {
    let server = MockServer::start().await;
    serve(&server, "sapling-spend.params", b"spend-bytes").await;
    Mock::given(method("GET"))
        .and(path("/downloads/sapling-output.params"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/downloads/sprout-verifying.key"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let settings = settings(
        &tmp,
        &server,
        &["sapling-spend.params", "sapling-output.params", "sprout-verifying.key"],
    );
    let provisioner = ParameterProvisioner::new(reqwest::Client::new(), &settings);

    let err = provisioner.provision(|_| {}).await.unwrap_err();
    match err {
        ProvisionError::Download { file, .. } => assert_eq!(file, "sapling-output.params"),
        other => panic!("unexpected error: {other}"),
    }

    let dir = provisioner.destination();
    assert!(dir.join("sapling-spend.params").is_file());
    assert!(!dir.join("sapling-output.params").exists());
    assert!(!dir.join("sapling-output.params.part").exists());
    assert_eq!(provisioner.missing(), vec!["sapling-output.params", "sprout-verifying.key"]);
}
