//! The probe state machine: one session per candidate address.

use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;
use proxyprobe_pow::{DEFAULT_UNIT_PRICE, SecretGenerator};
use proxyprobe_rpc::{Connector, Frame, RpcChannel, arm_message, wait_open};
use proxyprobe_types::{
    NetworkParams, ProbeState, ProxyAddress, SessionId, Verdict, parse_quantity,
};
use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use tracing::Instrument;
use url::Url;

use crate::error::ProbeError;
use crate::payload::CLIENT_HELLO;
use crate::session::{ProbeSession, TransportGuard};

pub const DEFAULT_SCHEME: &str = "wss";
pub const DEFAULT_TARGET_HOST: &str = "google.com";
pub const DEFAULT_TARGET_PORT: u16 = 443;
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_millis(1000);

/// Source of session identifiers.
pub trait SessionIds: Send + Sync {
    fn next_session(&self) -> SessionId;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidSessionIds;

impl SessionIds for UuidSessionIds {
    fn next_session(&self) -> SessionId {
        SessionId::new(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub scheme: String,
    pub target_host: String,
    pub target_port: u16,
    pub open_timeout: Duration,
    pub rpc_timeout: Duration,
    pub raw_timeout: Duration,
    pub unit_price: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            target_host: DEFAULT_TARGET_HOST.to_string(),
            target_port: DEFAULT_TARGET_PORT,
            open_timeout: DEFAULT_STEP_TIMEOUT,
            rpc_timeout: DEFAULT_STEP_TIMEOUT,
            raw_timeout: DEFAULT_STEP_TIMEOUT,
            unit_price: DEFAULT_UNIT_PRICE,
        }
    }
}

/// Outcome of one session.
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub address: ProxyAddress,
    pub session: SessionId,
    pub verdict: Verdict,
    pub steps: Vec<ProbeState>,
    #[serde(serialize_with = "serialize_failure")]
    pub failure: Option<ProbeError>,
}

impl ProbeReport {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.verdict.is_active()
    }

    /// Last step the session entered before its verdict.
    #[must_use]
    pub fn last_step(&self) -> Option<ProbeState> {
        self.steps
            .iter()
            .rev()
            .copied()
            .find(|step| !step.is_terminal())
    }
}

fn serialize_failure<S: Serializer>(
    failure: &Option<ProbeError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match failure {
        Some(error) => json!({
            "kind": error.kind(),
            "message": error.to_string(),
        })
        .serialize(serializer),
        None => serializer.serialize_none(),
    }
}

/// Drives probe sessions. Holds no per-session state, so one `Prober` can
/// run any number of sessions concurrently.
pub struct Prober {
    connector: Arc<dyn Connector>,
    generator: Arc<dyn SecretGenerator>,
    ids: Arc<dyn SessionIds>,
    settings: ProbeSettings,
}

impl Prober {
    pub fn new(
        connector: Arc<dyn Connector>,
        generator: Arc<dyn SecretGenerator>,
        settings: ProbeSettings,
    ) -> Self {
        Self {
            connector,
            generator,
            ids: Arc::new(UuidSessionIds),
            settings,
        }
    }

    pub fn with_session_ids(mut self, ids: Arc<dyn SessionIds>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// `{scheme}://{address}/?session=..&hostname=..&port=..`
    pub fn session_url(&self, address: &ProxyAddress, session: &SessionId) -> Result<Url, ProbeError> {
        let base = format!("{}://{}/", self.settings.scheme, address);
        let mut url = Url::parse(&base)
            .map_err(|e| ProbeError::Connect(format!("invalid address {address:?}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("session", session.as_str())
            .append_pair("hostname", &self.settings.target_host)
            .append_pair("port", &self.settings.target_port.to_string());
        Ok(url)
    }

    /// Run one session to its verdict. Failures are folded into the report.
    pub async fn probe(&self, address: &ProxyAddress) -> ProbeReport {
        let session = ProbeSession::new(self.ids.next_session(), address.clone());
        let span = tracing::info_span!("probe", session = %session.id(), address = %address);
        self.run(session).instrument(span).await
    }

    async fn run(&self, mut session: ProbeSession) -> ProbeReport {
        let failure = match self.drive(&mut session).await {
            Ok(()) => None,
            Err(error) => {
                let step = session.fail();
                tracing::warn!(step = ?step, error = %error, "probe failed");
                Some(error)
            }
        };

        let verdict = Verdict::from(session.state());
        tracing::info!(%verdict, "probe finished");
        let session_id = session.id().clone();
        let address = session.address().clone();
        ProbeReport {
            address,
            session: session_id,
            verdict,
            steps: session.into_steps(),
            failure,
        }
    }

    async fn drive(&self, session: &mut ProbeSession) -> Result<(), ProbeError> {
        let url = self.session_url(session.address(), session.id())?;
        let transport = TransportGuard::new(self.connector.connect(&url));

        wait_open(&*transport, self.settings.open_timeout)
            .await
            .map_err(ProbeError::from_open)?;
        let channel = RpcChannel::new(transport.shared());

        session.advance(ProbeState::AwaitingParams)?;
        let raw = channel
            .request("net_get", None, self.settings.rpc_timeout)
            .await
            .map_err(|e| ProbeError::from_rpc(ProbeState::AwaitingParams, e))?;
        let params: NetworkParams = serde_json::from_value(raw)
            .map_err(|e| ProbeError::protocol(ProbeState::AwaitingParams, e))?;

        session.advance(ProbeState::Validating)?;
        let threshold = params.checked_threshold()?;
        tracing::debug!(%threshold, chain = %params.chain_id, "params accepted");

        session.advance(ProbeState::GeneratingSecret)?;
        let price = BigUint::from(self.settings.unit_price);
        let secret = self.generator.generate(&params, &price).await?;

        session.advance(ProbeState::SubmittingTip)?;
        let tip = channel
            .request("net_tip", Some(json!([secret.blocks()])), self.settings.rpc_timeout)
            .await
            .map_err(|e| ProbeError::from_rpc(ProbeState::SubmittingTip, e))?;
        let credited = parse_tip(&tip)?;
        tracing::debug!(%credited, blocks = secret.len(), "tip accepted");

        session.advance(ProbeState::RawProbing)?;
        let reply = arm_message(&*transport, self.settings.raw_timeout);
        transport
            .send(Frame::Binary(CLIENT_HELLO.to_vec()))
            .map_err(|e| ProbeError::Transport {
                step: ProbeState::RawProbing,
                reason: e.to_string(),
            })?;
        let frame = reply
            .wait()
            .await
            .map_err(|e| ProbeError::from_settle(ProbeState::RawProbing, e))?;
        tracing::debug!(kind = frame.kind(), len = frame.len(), "raw probe answered");

        session.advance(ProbeState::Active)?;
        Ok(())
    }
}

/// The tip reply is a quantity, as a string or a plain number.
fn parse_tip(value: &Value) -> Result<BigUint, ProbeError> {
    let parsed = match value {
        Value::String(text) => parse_quantity(text).ok(),
        Value::Number(number) => number.as_u64().map(BigUint::from),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ProbeError::protocol(
            ProbeState::SubmittingTip,
            format!("unparsable tip response {value}"),
        )
    })
}
