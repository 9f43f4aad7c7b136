//! Candidate discovery through the GraphQL source, then fan-out

use std::sync::Arc;
use std::time::Duration;

use proxyprobe_engine::{
    CandidateSource, GraphSource, ProbeRunner, Prober, RunSummary, ThreadDelegate, Verdict,
    WsConnector,
};

use crate::common::{
    ProxyScript, dead_address, local_settings, mount_graph_page, start_graph_mock, start_proxy,
};

fn runner(page_size: usize) -> ProbeRunner {
    let prober = Prober::new(
        Arc::new(WsConnector::new()),
        Arc::new(ThreadDelegate::new(Some(Duration::from_secs(10)))),
        local_settings(),
    );
    ProbeRunner::new(Arc::new(prober))
        .with_page_size(page_size)
        .with_concurrency(4)
}

#[tokio::test]
async fn graph_listed_proxies_are_probed() {
    let proxy = start_proxy(ProxyScript::default()).await;
    let dead = dead_address().await;
    let server = start_graph_mock().await;
    mount_graph_page(
        &server,
        0,
        2,
        &[proxy.address().to_string(), dead.to_string()],
    )
    .await;

    let source = GraphSource::new(server.uri()).unwrap();
    let run = runner(2).run(&source, 0, 1).await.unwrap();

    assert_eq!(
        run.summary,
        RunSummary {
            probed: 2,
            active: 1,
            inactive: 1
        }
    );
    let active: Vec<_> = run
        .reports
        .iter()
        .filter(|r| r.verdict == Verdict::Active)
        .map(|r| r.address.clone())
        .collect();
    assert_eq!(active, vec![proxy.address()]);
}

#[tokio::test]
async fn pages_follow_offset_and_stop_when_short() {
    let server = start_graph_mock().await;
    let first: Vec<String> = vec!["a.invalid".into(), "b.invalid".into()];
    let second: Vec<String> = vec!["c.invalid".into()];
    mount_graph_page(&server, 10, 2, &first).await;
    mount_graph_page(&server, 12, 2, &second).await;

    let source = GraphSource::new(server.uri()).unwrap();
    let addresses = runner(2).collect(&source, 10, 5).await.unwrap();

    let names: Vec<_> = addresses.iter().map(|a| a.as_str()).collect();
    assert_eq!(names, vec!["b.invalid", "a.invalid", "c.invalid"]);
}

#[tokio::test]
async fn blank_record_in_full_page_keeps_paging() {
    let server = start_graph_mock().await;
    mount_graph_page(&server, 0, 2, &[" ".to_string(), "a.invalid".to_string()]).await;
    mount_graph_page(&server, 2, 2, &["b.invalid".to_string()]).await;

    let source = GraphSource::new(server.uri()).unwrap();
    let addresses = runner(2).collect(&source, 0, 5).await.unwrap();

    let names: Vec<_> = addresses.iter().map(|a| a.as_str()).collect();
    assert_eq!(names, vec!["a.invalid", "b.invalid"]);
}

#[tokio::test]
async fn unreachable_source_is_an_error() {
    let server = start_graph_mock().await;
    let uri = server.uri();
    drop(server);

    let source = GraphSource::new(uri).unwrap();
    assert!(source.page(0, 10).await.is_err());
}
