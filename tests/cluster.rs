//! Coordinator and storage nodes running in-process over real HTTP

use minifs::common::{CoordinatorConfig, NodeConfig};
use minifs::coordinator::{FileMetadata, FileSummary, HttpNodeClient, StorageNodeClient};
use minifs::{Coordinator, NodeServer};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

async fn start_coordinator(chunk_size: usize) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let config = CoordinatorConfig {
        chunk_size,
        heartbeat_timeout_secs: 1,
        sweep_interval_secs: 1,
        node_timeout_ms: 2_000,
        ..Default::default()
    };
    let handle = tokio::spawn(async move {
        Coordinator::new(config).serve_on(listener).await.unwrap();
    });
    (url, handle)
}

async fn start_node(coordinator_url: &str, dir: &TempDir) -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = NodeConfig {
        coordinator_url: coordinator_url.to_string(),
        storage_path: dir.path().to_path_buf(),
        heartbeat_interval_ms: 100,
        ..Default::default()
    };
    let handle = tokio::spawn(async move {
        NodeServer::new(config).serve_on(listener).await.unwrap();
    });
    (port, handle)
}

async fn active_nodes(client: &reqwest::Client, url: &str) -> Vec<String> {
    match client.get(format!("{}/nodes", url)).send().await {
        Ok(response) => response.json().await.unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

/// Poll `/nodes` until it has exactly `count` entries
async fn wait_for_nodes(client: &reqwest::Client, url: &str, count: usize) -> Vec<String> {
    for _ in 0..100 {
        let nodes = active_nodes(client, url).await;
        if nodes.len() == count {
            return nodes;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("cluster never reached {} nodes", count);
}

async fn upload(client: &reqwest::Client, url: &str, name: &str, data: &[u8]) -> reqwest::Response {
    let form = Form::new().part("file", Part::bytes(data.to_vec()).file_name(name.to_string()));
    client
        .post(format!("{}/upload", url))
        .multipart(form)
        .send()
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_upload_download_over_http() {
    let (url, coord) = start_coordinator(4).await;
    let dirs = [TempDir::new().unwrap(), TempDir::new().unwrap()];
    let (port_a, node_a) = start_node(&url, &dirs[0]).await;
    let (port_b, node_b) = start_node(&url, &dirs[1]).await;

    let client = reqwest::Client::new();
    let mut nodes = wait_for_nodes(&client, &url, 2).await;
    nodes.sort();
    let mut expected = vec![
        format!("127.0.0.1:{}", port_a),
        format!("127.0.0.1:{}", port_b),
    ];
    expected.sort();
    assert_eq!(nodes, expected);

    let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let response = upload(&client, &url, "blob.bin", &data).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["chunks"], 250);
    assert_eq!(body["failed_chunks"], 0);

    let response = client
        .get(format!("{}/download/blob.bin", url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&response.bytes().await.unwrap()[..], &data[..]);

    let files: Vec<FileSummary> = client
        .get(format!("{}/files", url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].complete);

    // Both nodes report holding chunks of the file
    let node_client = HttpNodeClient::new(Duration::from_secs(2)).unwrap();
    for port in [port_a, port_b] {
        let held = node_client
            .list_files(&format!("127.0.0.1:{}", port))
            .await
            .unwrap();
        assert_eq!(held, vec!["blob.bin"]);
    }

    for handle in [node_a, node_b, coord] {
        handle.abort();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_upload_without_nodes() {
    let (url, coord) = start_coordinator(4).await;
    let client = reqwest::Client::new();
    wait_for_nodes(&client, &url, 0).await;

    let response = upload(&client, &url, "a.txt", b"hello").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = client
        .get(format!("{}/download/a.txt", url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    coord.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dead_node_is_evicted() {
    let (url, coord) = start_coordinator(2).await;
    let dirs = [TempDir::new().unwrap(), TempDir::new().unwrap()];
    let (port_a, node_a) = start_node(&url, &dirs[0]).await;
    let (port_b, node_b) = start_node(&url, &dirs[1]).await;

    let client = reqwest::Client::new();
    wait_for_nodes(&client, &url, 2).await;

    let response = upload(&client, &url, "f.txt", b"aabbccdd").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Stopping the task stops both the chunk API and the heartbeat
    node_b.abort();
    let dead = format!("127.0.0.1:{}", port_b);

    let mut survivors = Vec::new();
    for _ in 0..80 {
        survivors = active_nodes(&client, &url).await;
        if !survivors.contains(&dead) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(survivors, vec![format!("127.0.0.1:{}", port_a)]);

    let meta: FileMetadata = client
        .get(format!("{}/files/f.txt", url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(meta.total_size, 8);
    assert_eq!(meta.chunks.len(), 2);
    assert!(meta.chunks.iter().all(|c| c.node != dead));

    let response = client
        .get(format!("{}/download/f.txt", url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    node_a.abort();
    coord.abort();
}
