//! Result rendering. Results go to stdout, logs never do.

use proxyprobe_engine::{ProbeReport, RunSummary};

/// `active   host` or `inactive host  reason`.
pub fn render_line(report: &ProbeReport) -> String {
    let verdict = report.verdict.label();
    match &report.failure {
        Some(error) => format!("{verdict:<8} {}  {error}", report.address),
        None => format!("{verdict:<8} {}", report.address),
    }
}

pub fn render_json(report: &ProbeReport) -> serde_json::Result<String> {
    serde_json::to_string(report)
}

pub fn render_summary(summary: &RunSummary) -> String {
    format!(
        "{} probed, {} active, {} inactive",
        summary.probed, summary.active, summary.inactive
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxyprobe_engine::{ProbeError, ProbeState, ProxyAddress, SessionId, Verdict};
    use std::time::Duration;

    fn report(failure: Option<ProbeError>) -> ProbeReport {
        let verdict = if failure.is_some() {
            Verdict::Inactive
        } else {
            Verdict::Active
        };
        ProbeReport {
            address: ProxyAddress::new("proxy.example").unwrap(),
            session: SessionId::new("s-1"),
            verdict,
            steps: vec![ProbeState::Connecting],
            failure,
        }
    }

    #[test]
    fn active_line_has_no_reason() {
        assert_eq!(render_line(&report(None)), "active   proxy.example");
    }

    #[test]
    fn inactive_line_carries_reason() {
        let line = render_line(&report(Some(ProbeError::Timeout {
            step: ProbeState::Connecting,
            after: Duration::from_millis(1000),
        })));
        assert_eq!(line, "inactive proxy.example  connecting timed out after 1000ms");
    }

    #[test]
    fn json_line_is_one_object() {
        let line = render_json(&report(None)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["verdict"], "active");
        assert_eq!(value["session"], "s-1");
        assert!(value["failure"].is_null());
        assert!(!line.contains('\n'));
    }

    #[test]
    fn summary_counts() {
        let summary = RunSummary {
            probed: 3,
            active: 1,
            inactive: 2,
        };
        assert_eq!(render_summary(&summary), "3 probed, 1 active, 2 inactive");
    }
}
