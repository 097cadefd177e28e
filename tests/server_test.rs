//! End-to-end test of the control surface over a real socket.

use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;
use workherd::config::HerdConfig;
use workherd::server::{AppState, HerdBody, serve_with_listener};
use workherd::{Herd, Outcome, WorkItem};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn control_surface_resizes_running_herd() {
    let herd = Herd::new(
        |_: &mut WorkItem<u32>| Outcome::Success,
        HerdConfig::default().herd_size(2),
    );
    herd.start();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(serve_with_listener(AppState::new(herd.clone()), listener));

    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/herd")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: HerdBody = resp.json().await.unwrap();
    assert_eq!(body, HerdBody { num: 2, msg: "success".to_string() });

    let resp = client
        .patch(format!("{base}/herd"))
        .json(&json!({"num": 6}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: HerdBody = resp.json().await.unwrap();
    assert_eq!(body.num, 6);

    let resp = client
        .patch(format!("{base}/herd"))
        .json(&json!({"num": -4}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: HerdBody = resp.json().await.unwrap();
    assert_eq!(body.num, 6);
    assert_eq!(body.msg, "herd size cannot be negative");

    tokio::time::timeout(Duration::from_secs(2), async {
        while herd.live_workers() != 6 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("herd did not converge to 6 workers");

    // Run some work through and read the totals back.
    let producer = herd.clone();
    tokio::spawn(async move {
        for i in 0..10usize {
            producer.submit(WorkItem::new(i, 0)).await.unwrap();
        }
        producer.close_input();
    });
    let results = herd.results();
    while results.recv().await.is_some() {}

    let metrics: serde_json::Value = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics, json!({"success": 10, "failure": 0, "retry": 0}));

    server.abort();
}
