pub mod protocols;
pub mod response;
pub mod targets;

use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{trace, warn};

use self::{
    protocols::{Minecraft, Pinger, ProbeError},
    response::PingResponse,
    targets::Endpoint,
};

/// Receives scan events. Workers call this concurrently, so implementations
/// have to be thread-safe.
pub trait ScanCallback: Send + Sync {
    /// A server was found on this endpoint. Always followed by
    /// [`ScanCallback::scanned`] for the same endpoint.
    fn discovered(&self, response: &PingResponse, host: &str, port: u16);

    /// Called exactly once for every endpoint, whether or not anything was
    /// found.
    fn scanned(&self, host: &str, port: u16);
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PingMode {
    /// Only do the legacy ping.
    LegacyOnly,
    #[default]
    Standard,
    /// Do a legacy ping if the standard one fails.
    StandardWithLegacyFallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PingStep {
    Standard,
    Legacy,
    Join,
}

impl PingMode {
    /// The steps to try, in order, until one of them succeeds.
    pub fn ladder(self, force_join: bool) -> &'static [PingStep] {
        match (self, force_join) {
            (PingMode::LegacyOnly, _) => &[PingStep::Legacy],
            (PingMode::Standard, false) => &[PingStep::Standard],
            (PingMode::Standard, true) => &[PingStep::Standard, PingStep::Join],
            (PingMode::StandardWithLegacyFallback, false) => {
                &[PingStep::Standard, PingStep::Legacy]
            }
            (PingMode::StandardWithLegacyFallback, true) => {
                &[PingStep::Standard, PingStep::Legacy, PingStep::Join]
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScanPolicy {
    pub mode: PingMode,
    /// Try logging in to servers that don't answer status requests.
    pub force_join: bool,
    /// Sent in the standard status handshake.
    pub protocol_version: i32,
    /// Applies to the connect and to every read separately.
    pub timeout: Duration,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            mode: PingMode::Standard,
            force_join: false,
            protocol_version: 754,
            timeout: Duration::from_millis(1000),
        }
    }
}

/// Run the policy's ladder against one endpoint and return the first
/// successful response.
pub async fn run_ladder<P: Pinger>(
    pinger: &P,
    policy: &ScanPolicy,
    endpoint: &Endpoint,
) -> Result<PingResponse, ProbeError> {
    let mut last_err = None;
    for step in policy.mode.ladder(policy.force_join) {
        let result = match step {
            PingStep::Standard => {
                pinger
                    .standard_status(endpoint, policy.protocol_version, policy.timeout)
                    .await
            }
            PingStep::Legacy => pinger.legacy_status(endpoint, policy.timeout).await,
            PingStep::Join => {
                if pinger.probe_joinable(endpoint, policy.timeout).await {
                    return Ok(PingResponse::unlisted());
                }
                // a failed login probe has no error of its own
                continue;
            }
        };
        match result {
            Ok(response) => return Ok(response),
            Err(err) => last_err = Some(Box::new(err)),
        }
    }
    Err(ProbeError::PolicyExhausted { last: last_err })
}

pub struct Scanner<P> {
    pinger: Arc<P>,
    policy: ScanPolicy,
}

impl Scanner<Minecraft> {
    pub fn minecraft(policy: ScanPolicy) -> Self {
        Self::new(Minecraft, policy)
    }
}

impl<P: Pinger> Scanner<P> {
    pub fn new(pinger: P, policy: ScanPolicy) -> Self {
        Self {
            pinger: Arc::new(pinger),
            policy,
        }
    }

    /// Spawn one worker per chunk on the current tokio runtime and return
    /// without waiting for them.
    ///
    /// Each worker goes through its chunk in order, one endpoint at a time.
    /// Use [`ScanHandle::join`] to find out when everything is done.
    ///
    /// # Panics
    ///
    /// If called outside of a tokio runtime.
    pub fn scan(&self, chunks: Vec<Vec<Endpoint>>, callback: Arc<dyn ScanCallback>) -> ScanHandle {
        let mut workers = JoinSet::new();
        for chunk in chunks {
            let pinger = self.pinger.clone();
            let policy = self.policy.clone();
            let callback = callback.clone();
            workers.spawn(async move {
                run_worker(pinger.as_ref(), &policy, chunk, callback.as_ref()).await
            });
        }
        ScanHandle { workers }
    }
}

async fn run_worker<P: Pinger>(
    pinger: &P,
    policy: &ScanPolicy,
    chunk: Vec<Endpoint>,
    callback: &dyn ScanCallback,
) {
    for endpoint in chunk {
        match run_ladder(pinger, policy, &endpoint).await {
            Ok(response) => callback.discovered(&response, &endpoint.host, endpoint.port),
            Err(err) => trace!("nothing found on {endpoint}: {err}"),
        }
        callback.scanned(&endpoint.host, endpoint.port);
    }
}

/// The workers of a running scan.
pub struct ScanHandle {
    workers: JoinSet<()>,
}

impl ScanHandle {
    /// The number of workers that haven't been joined yet.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every worker to finish. After this returns no more callbacks
    /// will be made.
    pub async fn join(mut self) {
        while let Some(res) = self.workers.join_next().await {
            if let Err(err) = res {
                warn!("scan worker failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::HashSet,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use parking_lot::Mutex;

    use super::{protocols::ProtocolError, *};

    /// Succeeds or fails each step depending on the port, and counts calls.
    #[derive(Default)]
    struct FakePinger {
        standard_ports: HashSet<u16>,
        legacy_ports: HashSet<u16>,
        joinable_ports: HashSet<u16>,
        calls: Mutex<Vec<(PingStep, u16)>>,
    }

    impl Pinger for FakePinger {
        async fn standard_status(
            &self,
            endpoint: &Endpoint,
            protocol_version: i32,
            _timeout: Duration,
        ) -> Result<PingResponse, ProbeError> {
            self.calls.lock().push((PingStep::Standard, endpoint.port));
            if self.standard_ports.contains(&endpoint.port) {
                Ok(PingResponse::standard(
                    "1.16.5".to_string(),
                    protocol_version,
                    1,
                    20,
                    None,
                    Some(754),
                ))
            } else {
                Err(ProtocolError::UnexpectedPacketId(0x42).into())
            }
        }

        async fn legacy_status(
            &self,
            endpoint: &Endpoint,
            _timeout: Duration,
        ) -> Result<PingResponse, ProbeError> {
            self.calls.lock().push((PingStep::Legacy, endpoint.port));
            if self.legacy_ports.contains(&endpoint.port) {
                Ok(PingResponse::legacy(
                    "1.6.4".to_string(),
                    78,
                    2,
                    10,
                    "old".to_string(),
                ))
            } else {
                Err(ProtocolError::MalformedLegacyPayload.into())
            }
        }

        async fn probe_joinable(&self, endpoint: &Endpoint, _timeout: Duration) -> bool {
            self.calls.lock().push((PingStep::Join, endpoint.port));
            self.joinable_ports.contains(&endpoint.port)
        }
    }

    #[derive(Default)]
    struct RecordingCallback {
        events: Mutex<Vec<String>>,
        scanned: AtomicUsize,
    }

    impl ScanCallback for RecordingCallback {
        fn discovered(&self, response: &PingResponse, host: &str, port: u16) {
            let kind = if response.is_unlisted() {
                "unlisted"
            } else if response.is_legacy() {
                "legacy"
            } else {
                "standard"
            };
            self.events
                .lock()
                .push(format!("discovered {kind} {host}:{port}"));
        }

        fn scanned(&self, host: &str, port: u16) {
            self.scanned.fetch_add(1, Ordering::Relaxed);
            self.events.lock().push(format!("scanned {host}:{port}"));
        }
    }

    fn policy(mode: PingMode, force_join: bool) -> ScanPolicy {
        ScanPolicy {
            mode,
            force_join,
            ..Default::default()
        }
    }

    fn ports(ports: &[u16]) -> HashSet<u16> {
        ports.iter().copied().collect()
    }

    #[test]
    fn test_ladders() {
        use PingStep::*;
        assert_eq!(PingMode::LegacyOnly.ladder(false), &[Legacy]);
        assert_eq!(PingMode::LegacyOnly.ladder(true), &[Legacy]);
        assert_eq!(PingMode::Standard.ladder(false), &[Standard]);
        assert_eq!(PingMode::Standard.ladder(true), &[Standard, Join]);
        assert_eq!(
            PingMode::StandardWithLegacyFallback.ladder(false),
            &[Standard, Legacy]
        );
        assert_eq!(
            PingMode::StandardWithLegacyFallback.ladder(true),
            &[Standard, Legacy, Join]
        );
    }

    #[tokio::test]
    async fn test_standard_reports_sent_protocol() {
        let pinger = FakePinger {
            standard_ports: ports(&[10000]),
            ..Default::default()
        };
        let mut policy = policy(PingMode::Standard, false);
        policy.protocol_version = 47;
        let response = run_ladder(&pinger, &policy, &Endpoint::new("a", 10000))
            .await
            .unwrap();
        assert_eq!(response.protocol_version(), 47);
    }

    #[tokio::test]
    async fn test_standard_falls_back_to_join() {
        let pinger = FakePinger {
            joinable_ports: ports(&[10000]),
            ..Default::default()
        };
        let response = run_ladder(
            &pinger,
            &policy(PingMode::Standard, true),
            &Endpoint::new("a", 10000),
        )
        .await
        .unwrap();
        assert!(response.is_unlisted());
        assert_eq!(
            *pinger.calls.lock(),
            vec![(PingStep::Standard, 10000), (PingStep::Join, 10000)]
        );
    }

    #[tokio::test]
    async fn test_standard_without_join_gives_up() {
        let pinger = FakePinger {
            joinable_ports: ports(&[10000]),
            ..Default::default()
        };
        let err = run_ladder(
            &pinger,
            &policy(PingMode::Standard, false),
            &Endpoint::new("a", 10000),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ProbeError::PolicyExhausted { last: Some(ref last) }
                if matches!(**last, ProbeError::Protocol(ProtocolError::UnexpectedPacketId(0x42)))
        ));
        assert_eq!(pinger.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_fallback() {
        let pinger = FakePinger {
            legacy_ports: ports(&[10000]),
            joinable_ports: ports(&[10000]),
            ..Default::default()
        };
        let response = run_ladder(
            &pinger,
            &policy(PingMode::StandardWithLegacyFallback, true),
            &Endpoint::new("a", 10000),
        )
        .await
        .unwrap();
        assert!(response.is_legacy());
        // join is never reached once legacy works
        assert_eq!(
            *pinger.calls.lock(),
            vec![(PingStep::Standard, 10000), (PingStep::Legacy, 10000)]
        );
    }

    #[tokio::test]
    async fn test_exhausted_keeps_last_error() {
        let pinger = FakePinger::default();
        let err = run_ladder(
            &pinger,
            &policy(PingMode::StandardWithLegacyFallback, true),
            &Endpoint::new("a", 10000),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ProbeError::PolicyExhausted { last: Some(ref last) }
                if matches!(**last, ProbeError::Protocol(ProtocolError::MalformedLegacyPayload))
        ));
        assert_eq!(pinger.calls.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_legacy_only_never_joins() {
        let pinger = FakePinger {
            standard_ports: ports(&[10000]),
            joinable_ports: ports(&[10000]),
            ..Default::default()
        };
        let result = run_ladder(
            &pinger,
            &policy(PingMode::LegacyOnly, true),
            &Endpoint::new("a", 10000),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(*pinger.calls.lock(), vec![(PingStep::Legacy, 10000)]);
    }

    #[tokio::test]
    async fn test_scan_unlisted_callbacks() {
        let scanner = Scanner::new(
            FakePinger {
                joinable_ports: ports(&[10000]),
                ..Default::default()
            },
            policy(PingMode::Standard, true),
        );
        let callback = Arc::new(RecordingCallback::default());
        let handle = scanner.scan(vec![vec![Endpoint::new("a", 10000)]], callback.clone());
        assert_eq!(handle.worker_count(), 1);
        handle.join().await;

        assert_eq!(
            *callback.events.lock(),
            vec!["discovered unlisted a:10000", "scanned a:10000"]
        );
    }

    #[tokio::test]
    async fn test_scan_every_endpoint_once() {
        let scanner = Scanner::new(
            FakePinger {
                standard_ports: ports(&[10001, 10005]),
                ..Default::default()
            },
            policy(PingMode::Standard, false),
        );
        let endpoints = (10000..10010)
            .map(|port| Endpoint::new("a", port))
            .collect::<Vec<_>>();
        let chunks = targets::partition(endpoints, 3);
        let callback = Arc::new(RecordingCallback::default());
        let handle = scanner.scan(chunks, callback.clone());
        assert_eq!(handle.worker_count(), 3);
        handle.join().await;

        assert_eq!(callback.scanned.load(Ordering::Relaxed), 10);
        let events = callback.events.lock();
        let discovered = events
            .iter()
            .filter(|e| e.starts_with("discovered"))
            .collect::<Vec<_>>();
        assert_eq!(discovered.len(), 2);
        // discovered always comes right before scanned for the same endpoint
        for (i, event) in events.iter().enumerate() {
            if let Some(endpoint) = event.strip_prefix("discovered standard ") {
                assert_eq!(events[i + 1], format!("scanned {endpoint}"));
            }
        }
    }

    #[tokio::test]
    async fn test_scan_chunk_order() {
        let scanner = Scanner::new(FakePinger::default(), ScanPolicy::default());
        let callback = Arc::new(RecordingCallback::default());
        let chunk = vec![
            Endpoint::new("a", 10002),
            Endpoint::new("a", 10000),
            Endpoint::new("a", 10001),
        ];
        scanner.scan(vec![chunk], callback.clone()).join().await;
        assert_eq!(
            *callback.events.lock(),
            vec!["scanned a:10002", "scanned a:10000", "scanned a:10001"]
        );
    }
}
