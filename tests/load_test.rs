//! Load testing over a real socket.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image_builder_gateway::compose::MemoryComposeBackend;
use image_builder_gateway::http::GatewayServer;
use image_builder_gateway::lifecycle::Shutdown;
use image_builder_gateway::security::identity::IDENTITY_HEADER;

mod common;

#[tokio::test]
async fn test_load_performance() {
    // 1. Start the gateway on an ephemeral port
    let (state, allow_list) = common::state_with(
        &common::test_config(),
        Arc::new(MemoryComposeBackend::new()),
        &[],
        None,
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(GatewayServer::new(state).run(listener, shutdown.wait()));

    // 2. Run load: allow-listed org, other org, unentitled org
    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let start = Instant::now();
    allow_list.replace(common::allow_list(&[("000001", "rhel-10")]));

    let mut tasks = Vec::new();
    for task in 0..concurrency {
        let client = client.clone();
        let (identity, expected) = match task % 3 {
            0 => (common::entitled("000001"), 200),
            1 => (common::entitled("000002"), 403),
            _ => (common::identity("000003", None, Some(false)), 400),
        };
        let url = format!("http://{addr}{}/architectures/rhel-10-nightly", common::V1);
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                let res = client
                    .get(&url)
                    .header(IDENTITY_HEADER, &identity)
                    .send()
                    .await
                    .unwrap();
                assert_eq!(res.status().as_u16(), expected);
                latencies.push(req_start.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests);
    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p95 = all_latencies[(all_latencies.len() as f64 * 0.95) as usize];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P95 Latency:    {:?}", p95);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    // 3. Drain
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_allow_list_swap_under_load() {
    let (state, allow_list) = common::state_with(
        &common::test_config(),
        Arc::new(MemoryComposeBackend::new()),
        &[],
        None,
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(GatewayServer::new(state).run(listener, shutdown.wait()));

    let client = reqwest::Client::new();
    let url = format!("http://{addr}{}/architectures/rhel-10-nightly", common::V1);
    let identity = common::entitled("000001");

    let swapper = {
        let allow_list = Arc::clone(&allow_list);
        tokio::spawn(async move {
            for i in 0..50 {
                let list = if i % 2 == 0 {
                    common::allow_list(&[("000001", "rhel-10")])
                } else {
                    common::allow_list(&[])
                };
                allow_list.replace(list);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    };

    // Every answer reflects one whole allow-list, never a torn state.
    for _ in 0..200 {
        let res = client
            .get(&url)
            .header(IDENTITY_HEADER, &identity)
            .send()
            .await
            .unwrap();
        let status = res.status().as_u16();
        assert!(status == 200 || status == 403, "unexpected status {status}");
    }
    swapper.await.unwrap();

    allow_list.replace(common::allow_list(&[]));
    let res = client
        .get(&url)
        .header(IDENTITY_HEADER, &identity)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 403);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}
