//! Settings loaded from a config file drive a real session

use std::sync::Arc;
use std::time::Duration;

use proxyprobe_engine::{ProbeConfig, Prober, ThreadDelegate, Verdict, WsConnector};

use crate::common::{ProxyScript, start_proxy};

#[tokio::test]
async fn config_file_settings_reach_the_proxy() {
    let proxy = start_proxy(ProxyScript::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[probe]
scheme = "ws"
hostname = "example.org"
port = 8443
raw_timeout_ms = 500
generate_timeout_ms = 10000
unit_price = 1000
"#,
    )
    .unwrap();

    let config = ProbeConfig::load_from(&path).unwrap().unwrap();
    assert_eq!(config.generate_timeout(), Some(Duration::from_secs(10)));

    let prober = Prober::new(
        Arc::new(WsConnector::new()),
        Arc::new(ThreadDelegate::new(config.generate_timeout())),
        config.probe_settings(),
    );
    let report = prober.probe(&proxy.address()).await;

    assert_eq!(report.verdict, Verdict::Active, "failure: {:?}", report.failure);
    let uri = proxy.log().uris[0].clone();
    assert!(uri.ends_with("&hostname=example.org&port=8443"), "{uri}");
}

#[test]
fn unparsable_config_names_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[runner\nconcurrency = ").unwrap();

    let err = ProbeConfig::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("config.toml"));
}
