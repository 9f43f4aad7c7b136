//! Full sessions over real WebSockets against a local proxy

use std::sync::Arc;
use std::time::Duration;

use proxyprobe_engine::{
    CLIENT_HELLO, ProbeError, ProbeSettings, ProbeState, Prober, ThreadDelegate, Verdict,
    WsConnector,
};
use serde_json::json;

use crate::common::{ProxyScript, dead_address, local_settings, network_params, start_proxy};

fn prober(settings: ProbeSettings) -> Prober {
    Prober::new(
        Arc::new(WsConnector::new()),
        Arc::new(ThreadDelegate::new(Some(Duration::from_secs(10)))),
        settings,
    )
}

#[tokio::test]
async fn responsive_proxy_is_active() {
    let proxy = start_proxy(ProxyScript::default()).await;

    let report = prober(local_settings()).probe(&proxy.address()).await;

    assert_eq!(report.verdict, Verdict::Active, "failure: {:?}", report.failure);
    assert_eq!(report.steps.last(), Some(&ProbeState::Active));
    assert_eq!(proxy.methods(), vec!["net_get", "net_tip"]);

    let log = proxy.log();
    let tip = &log.requests[1];
    assert!(tip["id"].as_u64().unwrap() > log.requests[0]["id"].as_u64().unwrap());
    let blocks = tip["params"][0].as_array().unwrap();
    assert!(!blocks.is_empty());
    assert!(blocks.iter().all(|b| b.as_str().unwrap().len() == 66));
    assert_eq!(log.binaries, vec![CLIENT_HELLO.to_vec()]);
}

#[tokio::test]
async fn session_uri_names_tunnel_target() {
    let proxy = start_proxy(ProxyScript::default()).await;

    let report = prober(local_settings()).probe(&proxy.address()).await;

    let uri = proxy.log().uris[0].clone();
    assert_eq!(
        uri,
        format!("/?session={}&hostname=google.com&port=443", report.session)
    );
}

#[tokio::test]
async fn transport_is_closed_after_success() {
    let proxy = start_proxy(ProxyScript::default()).await;

    prober(local_settings()).probe(&proxy.address()).await;
    proxy.wait_for_closes(1).await;

    assert_eq!(proxy.log().closes, 1);
}

#[tokio::test]
async fn excessive_threshold_stops_before_tip() {
    let proxy = start_proxy(ProxyScript {
        params: network_params("0x200000"),
        ..ProxyScript::default()
    })
    .await;

    let report = prober(local_settings()).probe(&proxy.address()).await;
    proxy.wait_for_closes(1).await;

    assert_eq!(report.verdict, Verdict::Inactive);
    assert!(matches!(report.failure, Some(ProbeError::Validation(_))));
    assert_eq!(proxy.methods(), vec!["net_get"]);
    assert!(proxy.log().binaries.is_empty());
    assert_eq!(proxy.log().closes, 1);
}

#[tokio::test]
async fn silent_raw_relay_is_inactive() {
    let proxy = start_proxy(ProxyScript {
        answer_raw: false,
        ..ProxyScript::default()
    })
    .await;

    let report = prober(local_settings()).probe(&proxy.address()).await;

    assert_eq!(report.verdict, Verdict::Inactive);
    assert!(matches!(
        report.failure,
        Some(ProbeError::Timeout {
            step: ProbeState::RawProbing,
            ..
        })
    ));
    assert_eq!(proxy.log().binaries.len(), 1);
}

#[tokio::test]
async fn refused_connection_is_inactive() {
    let address = dead_address().await;

    let report = prober(local_settings()).probe(&address).await;

    assert_eq!(report.verdict, Verdict::Inactive);
    assert!(matches!(
        report.failure,
        Some(ProbeError::Connect(_) | ProbeError::Timeout { step: ProbeState::Connecting, .. })
    ));
    assert_eq!(report.steps, vec![ProbeState::Connecting, ProbeState::Inactive]);
}

#[tokio::test]
async fn tip_rejected_by_proxy_is_inactive() {
    let proxy = start_proxy(ProxyScript {
        tip: json!(null),
        ..ProxyScript::default()
    })
    .await;

    let report = prober(local_settings()).probe(&proxy.address()).await;

    assert!(matches!(
        report.failure,
        Some(ProbeError::Protocol {
            step: ProbeState::SubmittingTip,
            ..
        })
    ));
    assert!(proxy.log().binaries.is_empty());
}
