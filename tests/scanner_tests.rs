use async_trait::async_trait;
use basic_auth_scan_rs::config::ScanConfig;
use basic_auth_scan_rs::creds::CredentialSet;
use basic_auth_scan_rs::error::TransportError;
use basic_auth_scan_rs::report::ReportSink;
use basic_auth_scan_rs::scanner::{Controller, ControllerState};
use basic_auth_scan_rs::transport::{AuthResponse, ProbeOutcome, Transport};
use basic_auth_scan_rs::types::{CredentialPair, Endpoint, RunStatus, ScanReport};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
enum Host {
    /// 200 on the probe: no auth at all.
    Open,
    /// Connection refused on the probe.
    Down,
    /// 401 on the probe, grants access only to `valid` (if any).
    Protected { valid: Option<(String, String)> },
    /// 401 on the probe, then a 200 page quoting "HTTP 401" for every pair.
    Disguised,
    /// 401 on the probe; the first trial request times out, later ones behave like `Protected`.
    Flaky { valid: (String, String) },
}

#[derive(Default)]
struct MockTransport {
    hosts: HashMap<String, Host>,
    probe_delay: Duration,
    trial_delay: Duration,
    probe_calls: Mutex<Vec<String>>,
    trial_calls: Mutex<Vec<(String, String, String)>>,
}

impl MockTransport {
    fn new() -> Self {
        Self::default()
    }

    fn host(mut self, url: &str, host: Host) -> Self {
        self.hosts.insert(url.to_string(), host);
        self
    }

    fn probe_delay(mut self, d: Duration) -> Self {
        self.probe_delay = d;
        self
    }

    fn trial_delay(mut self, d: Duration) -> Self {
        self.trial_delay = d;
        self
    }

    fn probe_calls(&self) -> Vec<String> {
        self.probe_calls.lock().unwrap().clone()
    }

    fn trial_calls(&self) -> Vec<(String, String, String)> {
        self.trial_calls.lock().unwrap().clone()
    }

    fn trial_calls_for(&self, url: &str) -> Vec<String> {
        self.trial_calls()
            .into_iter()
            .filter(|(u, _, _)| u == url)
            .map(|(_, user, pass)| format!("{user}/{pass}"))
            .collect()
    }
}

fn granted() -> AuthResponse {
    AuthResponse {
        status: 200,
        body: "<html>Welcome to the device console</html>".into(),
    }
}

fn rejected() -> AuthResponse {
    AuthResponse {
        status: 401,
        body: String::new(),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn probe(&self, url: &str, _timeout: Duration) -> ProbeOutcome {
        self.probe_calls.lock().unwrap().push(url.to_string());
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        match self.hosts.get(url) {
            Some(Host::Open) => ProbeOutcome::NotCandidate { status: 200 },
            Some(Host::Down) | None => {
                ProbeOutcome::TransportError(TransportError::Connect("refused".into()))
            }
            Some(_) => ProbeOutcome::Candidate,
        }
    }

    async fn get_with_basic_auth(
        &self,
        url: &str,
        pair: &CredentialPair,
        timeout: Duration,
    ) -> Result<AuthResponse, TransportError> {
        let attempt = {
            let mut calls = self.trial_calls.lock().unwrap();
            calls.push((url.to_string(), pair.username.clone(), pair.password.clone()));
            calls.iter().filter(|(u, _, _)| u == url).count()
        };
        if !self.trial_delay.is_zero() {
            tokio::time::sleep(self.trial_delay).await;
        }
        let matches = |valid: &(String, String)| valid.0 == pair.username && valid.1 == pair.password;
        match self.hosts.get(url) {
            Some(Host::Protected { valid: Some(v) }) if matches(v) => Ok(granted()),
            Some(Host::Protected { .. }) => Ok(rejected()),
            Some(Host::Disguised) => Ok(AuthResponse {
                status: 200,
                body: "<html><body><h1>HTTP 401 Unauthorized</h1></body></html>".into(),
            }),
            Some(Host::Flaky { .. }) if attempt == 1 => Err(TransportError::Timeout(timeout)),
            Some(Host::Flaky { valid }) if matches(valid) => Ok(granted()),
            Some(Host::Flaky { .. }) => Ok(rejected()),
            _ => Err(TransportError::Other("unexpected trial request".into())),
        }
    }
}

fn fast_config(workers: usize) -> ScanConfig {
    ScanConfig {
        workers,
        poll_interval: Duration::from_millis(10),
        ..ScanConfig::default()
    }
}

fn pair(u: &str, p: &str) -> Option<(String, String)> {
    Some((u.to_string(), p.to_string()))
}

fn words(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

async fn run_scan(
    transport: Arc<MockTransport>,
    config: ScanConfig,
    endpoints: Vec<Endpoint>,
    creds: CredentialSet,
) -> ScanReport {
    let mut controller = Controller::new(config, transport).expect("valid config");
    let report = controller
        .run(endpoints, creds, Arc::new(ReportSink::new()), CancellationToken::new())
        .await
        .expect("scan runs");
    assert_eq!(controller.state(), ControllerState::Done);
    report
}

#[tokio::test]
async fn default_credentials_grant_access() {
    let transport = Arc::new(
        MockTransport::new().host("http://10.0.0.1", Host::Protected { valid: pair("admin", "admin") }),
    );
    let report = run_scan(
        transport.clone(),
        fast_config(10),
        vec![Endpoint::new("10.0.0.1", None)],
        CredentialSet::default(),
    )
    .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.entries.len(), 1);
    let e = &report.entries[0];
    assert_eq!(
        (e.endpoint.as_str(), e.username.as_str(), e.password.as_str()),
        ("http://10.0.0.1", "admin", "admin")
    );
    assert_eq!(report.stats.successes, 1);
}

#[tokio::test]
async fn endpoint_without_401_gets_no_trials() {
    let transport = Arc::new(
        MockTransport::new()
            .host("http://10.0.0.2", Host::Open)
            .host("http://10.0.0.4", Host::Down),
    );
    let report = run_scan(
        transport.clone(),
        fast_config(10),
        vec![Endpoint::new("10.0.0.2", None), Endpoint::new("10.0.0.4", None)],
        CredentialSet::default(),
    )
    .await;

    assert!(report.entries.is_empty());
    assert!(transport.trial_calls().is_empty());
    assert_eq!(transport.probe_calls().len(), 2);
    assert_eq!(report.stats.candidates, 0);
}

#[tokio::test]
async fn false_positive_stops_after_first_pair() {
    let transport = Arc::new(MockTransport::new().host("http://10.0.0.3", Host::Disguised));
    let creds = CredentialSet::from_sources(
        "admin",
        "admin",
        Some(words(&["admin", "root", "user"])),
        Some(words(&["admin", "1234", "password"])),
    );
    let report = run_scan(
        transport.clone(),
        fast_config(10),
        vec![Endpoint::new("10.0.0.3", None)],
        creds,
    )
    .await;

    assert!(report.entries.is_empty());
    assert_eq!(transport.trial_calls().len(), 1);
    assert_eq!(report.stats.false_positives, 1);
}

#[tokio::test]
async fn pool_is_clamped_to_endpoint_count() {
    let transport = Arc::new(MockTransport::new());
    let endpoints = vec![
        Endpoint::new("10.0.0.1", None),
        Endpoint::new("10.0.0.2", None),
        Endpoint::new("10.0.0.3", None),
    ];
    let report = run_scan(transport, fast_config(10), endpoints, CredentialSet::default()).await;
    assert_eq!(report.workers_started, 3);
    assert_eq!(report.endpoints_total, 3);
}

#[tokio::test]
async fn empty_target_list_finishes_without_workers() {
    let transport = Arc::new(MockTransport::new());
    let report = run_scan(transport.clone(), fast_config(10), vec![], CredentialSet::default()).await;
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.workers_started, 0);
    assert!(report.entries.is_empty());
    assert!(transport.probe_calls().is_empty());
}

#[tokio::test]
async fn first_matching_pair_in_order_wins() {
    let url = "http://10.0.0.5:8080";
    let transport = Arc::new(MockTransport::new().host(url, Host::Protected { valid: pair("root", "1234") }));
    let creds = CredentialSet::from_sources(
        "x",
        "x",
        Some(words(&["admin", "root", "guest"])),
        Some(words(&["admin", "1234"])),
    );
    let report = run_scan(
        transport.clone(),
        fast_config(4),
        vec![Endpoint::new("10.0.0.5", Some(8080))],
        creds,
    )
    .await;

    assert_eq!(
        transport.trial_calls_for(url),
        vec!["admin/admin", "admin/1234", "root/admin", "root/1234"]
    );
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].username, "root");
    assert_eq!(report.entries[0].password, "1234");
}

#[tokio::test]
async fn transport_error_moves_on_to_next_pair() {
    let url = "http://10.0.0.6";
    let transport = Arc::new(MockTransport::new().host(
        url,
        Host::Flaky {
            valid: ("admin".into(), "admin".into()),
        },
    ));
    let creds = CredentialSet::from_sources("admin", "x", None, Some(words(&["admin", "admin"])));
    let report = run_scan(
        transport.clone(),
        fast_config(1),
        vec![Endpoint::new("10.0.0.6", None)],
        creds,
    )
    .await;

    assert_eq!(transport.trial_calls_for(url).len(), 2);
    assert_eq!(report.entries.len(), 1);
}

#[tokio::test]
async fn every_endpoint_is_dequeued_exactly_once() {
    let mut mock = MockTransport::new().probe_delay(Duration::from_millis(2));
    let mut endpoints = Vec::new();
    for i in 0..40u32 {
        let ep = Endpoint::new(format!("10.1.0.{i}"), None);
        let host = match i % 4 {
            0 => Host::Open,
            1 => Host::Down,
            2 => Host::Disguised,
            _ => Host::Protected { valid: pair("admin", "admin") },
        };
        mock = mock.host(&ep.base_url(), host);
        endpoints.push(ep);
    }
    let transport = Arc::new(mock);
    let report = run_scan(transport.clone(), fast_config(4), endpoints.clone(), CredentialSet::default()).await;

    let mut probed = transport.probe_calls();
    probed.sort();
    let mut expected: Vec<String> = endpoints.iter().map(Endpoint::base_url).collect();
    expected.sort();
    assert_eq!(probed, expected);
    assert_eq!(report.stats.dequeued, 40);
    assert_eq!(report.entries.len(), 10);
    assert_eq!(report.stats.false_positives, 10);
}

#[tokio::test]
async fn rerun_gives_the_same_report() {
    let build = || {
        Arc::new(
            MockTransport::new()
                .host("http://10.2.0.1", Host::Protected { valid: pair("root", "root") })
                .host("http://10.2.0.2", Host::Protected { valid: pair("admin", "1234") })
                .host("http://10.2.0.3", Host::Disguised)
                .host("http://10.2.0.4", Host::Open),
        )
    };
    let endpoints: Vec<Endpoint> = (1..=4).map(|i| Endpoint::new(format!("10.2.0.{i}"), None)).collect();
    let creds = CredentialSet::from_sources(
        "x",
        "x",
        Some(words(&["admin", "root"])),
        Some(words(&["root", "1234"])),
    );

    let first_t = build();
    let second_t = build();
    let first = run_scan(first_t.clone(), fast_config(3), endpoints.clone(), creds.clone()).await;
    let second = run_scan(second_t.clone(), fast_config(3), endpoints.clone(), creds).await;

    let key = |r: &ScanReport| {
        let mut v: Vec<(String, String, String)> = r
            .entries
            .iter()
            .map(|e| (e.endpoint.clone(), e.username.clone(), e.password.clone()))
            .collect();
        v.sort();
        v
    };
    assert_eq!(key(&first), key(&second));
    assert_eq!(key(&first).len(), 2);
    for ep in &endpoints {
        let url = ep.base_url();
        assert_eq!(first_t.trial_calls_for(&url), second_t.trial_calls_for(&url));
    }
}

#[tokio::test]
async fn interrupt_stops_dequeuing_and_marks_report_cancelled() {
    let mut mock = MockTransport::new().probe_delay(Duration::from_millis(50));
    let mut endpoints = Vec::new();
    for i in 0..30u32 {
        let ep = Endpoint::new(format!("10.3.0.{i}"), None);
        mock = mock.host(&ep.base_url(), Host::Open);
        endpoints.push(ep);
    }
    let transport = Arc::new(mock);
    let interrupt = CancellationToken::new();
    let trigger = interrupt.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        trigger.cancel();
    });

    let mut controller = Controller::new(fast_config(2), transport.clone()).unwrap();
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        controller.run(endpoints, CredentialSet::default(), Arc::new(ReportSink::new()), interrupt),
    )
    .await
    .expect("shutdown is prompt")
    .unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    let probed = transport.probe_calls().len();
    assert!(probed < 30, "probed {probed} endpoints after interrupt");
    assert_eq!(report.stats.dequeued as usize, probed);
}

#[tokio::test]
async fn interrupt_cuts_credential_loop_short() {
    let url = "http://10.4.0.1";
    let transport = Arc::new(
        MockTransport::new()
            .host(url, Host::Protected { valid: None })
            .trial_delay(Duration::from_millis(20)),
    );
    let passwords: Vec<String> = (0..100).map(|i| format!("pw{i}")).collect();
    let creds = CredentialSet::from_sources("admin", "x", None, Some(passwords));
    let interrupt = CancellationToken::new();
    let trigger = interrupt.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let mut controller = Controller::new(fast_config(1), transport.clone()).unwrap();
    let report = controller
        .run(
            vec![Endpoint::new("10.4.0.1", None)],
            creds,
            Arc::new(ReportSink::new()),
            interrupt,
        )
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    let tried = transport.trial_calls_for(url).len();
    assert!(tried > 0 && tried < 100, "tried {tried} pairs");
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let cfg = ScanConfig {
        workers: 0,
        ..ScanConfig::default()
    };
    assert!(Controller::new(cfg, Arc::new(MockTransport::new())).is_err());
}
