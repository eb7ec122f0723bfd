//! Scripted in-memory SMTP peers and the verifier tests that use them.

use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;

use super::{Connector, Outcome, Transport, Verifier, VerifierOptions, probe};
use crate::mx::MxRecord;
use crate::mx::tests::StubResolver;

/// One server action. The first step is sent on connect; every complete
/// command line written by the client releases the next one.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    Reply(&'static str),
    Chunks(&'static [&'static str]),
    /// Never answer; reads report a timeout.
    Stall,
}

#[derive(Debug, Default)]
pub(crate) struct StreamStats {
    shutdowns: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

impl StreamStats {
    pub(crate) fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

pub(crate) struct MockStream {
    steps: VecDeque<Step>,
    pending: VecDeque<Vec<u8>>,
    stalled: bool,
    written: Vec<u8>,
    stats: Arc<StreamStats>,
    gauge: Option<Arc<ConnectorStats>>,
}

impl MockStream {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        let mut stream = Self {
            steps: steps.into(),
            pending: VecDeque::new(),
            stalled: false,
            written: Vec::new(),
            stats: Arc::new(StreamStats::default()),
            gauge: None,
        };
        stream.release_next();
        stream
    }

    pub(crate) fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }

    fn release_next(&mut self) {
        match self.steps.pop_front() {
            Some(Step::Reply(text)) => self.pending.push_back(text.as_bytes().to_vec()),
            Some(Step::Chunks(parts)) => self
                .pending
                .extend(parts.iter().map(|part| part.as_bytes().to_vec())),
            Some(Step::Stall) => self.stalled = true,
            None => {}
        }
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(mut chunk) = self.pending.pop_front() {
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                chunk.drain(..n);
                self.pending.push_front(chunk);
            }
            return Ok(n);
        }
        if self.stalled {
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "stalled"));
        }
        Ok(0)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        while let Some(pos) = self.written.windows(2).position(|w| w == b"\r\n") {
            let line: Vec<u8> = self.written.drain(..pos + 2).collect();
            let command = String::from_utf8_lossy(&line[..pos]).into_owned();
            if let Ok(mut commands) = self.stats.commands.lock() {
                commands.push(command);
            }
            self.release_next();
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockStream {
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.stats.shutdowns.fetch_add(1, Ordering::SeqCst);
        if let Some(gauge) = &self.gauge {
            gauge.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct ConnectorStats {
    connects: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    streams: Mutex<Vec<Arc<StreamStats>>>,
}

impl ConnectorStats {
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdowns(&self) -> usize {
        self.streams
            .lock()
            .map(|streams| streams.iter().map(|s| s.shutdowns()).sum())
            .unwrap_or_default()
    }

    pub(crate) fn commands(&self) -> Vec<Vec<String>> {
        self.streams
            .lock()
            .map(|streams| streams.iter().map(|s| s.commands()).collect())
            .unwrap_or_default()
    }
}

/// Hands out a scripted [`MockStream`] per host; unknown hosts refuse the
/// connection.
#[derive(Default)]
pub(crate) struct ScriptedConnector {
    scripts: HashMap<String, Vec<Step>>,
    latency: Duration,
    pub(crate) stats: Arc<ConnectorStats>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn host(mut self, host: &str, steps: Vec<Step>) -> Self {
        self.scripts.insert(host.to_string(), steps);
        self
    }

    pub(crate) fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Connector for ScriptedConnector {
    type Stream = MockStream;

    fn connect(&self, host: &str, _port: u16, _timeout: Duration) -> io::Result<MockStream> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        let Some(steps) = self.scripts.get(host) else {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{host} refused"),
            ));
        };
        let now = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let mut stream = MockStream::new(steps.clone());
        stream.gauge = Some(Arc::clone(&self.stats));
        if let Ok(mut streams) = self.stats.streams.lock() {
            streams.push(stream.stats());
        }
        Ok(stream)
    }
}

const GREETING: Step = Step::Reply("220 mx.test ESMTP\r\n");
const HELO_OK: Step = Step::Reply("250 mx.test\r\n");
const MAIL_OK: Step = Step::Reply("250 2.1.0 Ok\r\n");
const QUIT_OK: Step = Step::Reply("221 2.0.0 Bye\r\n");

fn dialog(rcpt: &'static str) -> Vec<Step> {
    vec![GREETING, HELO_OK, MAIL_OK, Step::Reply(rcpt), QUIT_OK]
}

fn resolver_for(records: Vec<MxRecord>) -> StubResolver {
    StubResolver::new(move |_| Ok(records.clone()))
}

fn verifier(
    options: VerifierOptions,
    resolver: StubResolver,
    connector: &ScriptedConnector,
) -> Verifier<StubResolver, &ScriptedConnector> {
    Verifier::with_parts(options, resolver, connector).expect("default pattern compiles")
}

fn probe_once(steps: Vec<Step>) -> (Outcome, Arc<ConnectorStats>) {
    let connector = ScriptedConnector::new().host("mx.test", steps);
    let v = verifier(
        VerifierOptions::default(),
        resolver_for(Vec::new()),
        &connector,
    );
    let outcome = v.probe("mx.test", "jane@example.com");
    (outcome, Arc::clone(&connector.stats))
}

#[test]
fn rcpt_250_is_affirmative() {
    let (outcome, stats) = probe_once(dialog("250 2.1.5 Ok\r\n"));
    assert_eq!(outcome, Outcome::Affirmative);
    assert_eq!(
        stats.commands()[0],
        vec![
            "HELO verifier.local",
            "MAIL FROM:<verify@verifier.local>",
            "RCPT TO:<jane@example.com>",
            "QUIT",
        ]
    );
    assert_eq!(stats.shutdowns(), 1);
}

#[test]
fn rcpt_550_user_unknown_is_negative() {
    let (outcome, stats) = probe_once(dialog("550 5.1.1 User unknown\r\n"));
    assert_eq!(outcome, Outcome::Negative);
    assert_eq!(stats.commands()[0].last().map(String::as_str), Some("QUIT"));
}

#[test]
fn rcpt_450_is_indeterminate() {
    let (outcome, stats) = probe_once(dialog("450 Temporary failure\r\n"));
    assert_eq!(outcome, Outcome::Indeterminate);
    assert_eq!(stats.commands()[0].last().map(String::as_str), Some("QUIT"));
    assert_eq!(stats.shutdowns(), 1);
}

#[test]
fn multiline_rcpt_rejection_is_matched_on_any_line() {
    let (outcome, _) = probe_once(dialog(
        "550-Requested action not taken\r\n550 5.1.1 mailbox unavailable\r\n",
    ));
    assert_eq!(outcome, Outcome::Negative);
}

#[test]
fn refused_greeting_aborts_before_helo() {
    let (outcome, stats) = probe_once(vec![Step::Reply("554 No SMTP service here\r\n")]);
    assert_eq!(outcome, Outcome::Indeterminate);
    assert!(stats.commands()[0].is_empty());
    assert_eq!(stats.shutdowns(), 1);
}

#[test]
fn refused_mail_from_aborts_before_rcpt() {
    let (outcome, stats) = probe_once(vec![
        GREETING,
        HELO_OK,
        Step::Reply("553 sender rejected\r\n"),
    ]);
    assert_eq!(outcome, Outcome::Indeterminate);
    let commands = &stats.commands()[0];
    assert!(commands.iter().all(|c| !c.starts_with("RCPT")), "{commands:?}");
}

#[test]
fn silent_server_is_indeterminate_and_closed() {
    let (outcome, stats) = probe_once(vec![Step::Stall]);
    assert_eq!(outcome, Outcome::Indeterminate);
    assert_eq!(stats.shutdowns(), 1);
    assert_eq!(stats.in_flight(), 0);
}

#[test]
fn stall_after_rcpt_is_indeterminate_and_closed() {
    let (outcome, stats) = probe_once(vec![GREETING, HELO_OK, MAIL_OK, Step::Stall]);
    assert_eq!(outcome, Outcome::Indeterminate);
    assert_eq!(stats.shutdowns(), 1);
}

#[test]
fn peer_hanging_up_mid_dialog_is_indeterminate() {
    let (outcome, stats) = probe_once(vec![GREETING, HELO_OK]);
    assert_eq!(outcome, Outcome::Indeterminate);
    assert_eq!(stats.shutdowns(), 1);
}

#[test]
fn connection_refused_is_indeterminate() {
    let connector = ScriptedConnector::new();
    let options = VerifierOptions::default();
    let policy = super::MailboxPolicy::new(&options.unknown_mailbox_pattern).expect("pattern");
    let outcome = probe(&connector, "down.test", "jane@example.com", &options, &policy);
    assert_eq!(outcome, Outcome::Indeterminate);
    assert_eq!(connector.stats.connects(), 1);
}

#[test]
fn empty_mail_from_uses_null_reverse_path() {
    let connector = ScriptedConnector::new().host("mx.test", dialog("250 Ok\r\n"));
    let options = VerifierOptions {
        mail_from: String::new(),
        helo_domain: "probe.example.net".to_string(),
        ..VerifierOptions::default()
    };
    let v = verifier(options, resolver_for(Vec::new()), &connector);
    assert_eq!(v.probe("mx.test", "a@example.com"), Outcome::Affirmative);
    let commands = &connector.stats.commands()[0];
    assert_eq!(commands[0], "HELO probe.example.net");
    assert_eq!(commands[1], "MAIL FROM:<>");
}

#[test]
fn no_exchangers_is_negative() {
    let connector = ScriptedConnector::new();
    let v = verifier(
        VerifierOptions::default(),
        resolver_for(Vec::new()),
        &connector,
    );
    assert_eq!(v.verify_one("jane@nomail.test"), Outcome::Negative);
    assert_eq!(connector.stats.connects(), 0);
}

#[test]
fn dns_failure_is_negative() {
    let connector = ScriptedConnector::new();
    let resolver = StubResolver::new(|_| {
        Err(trust_dns_resolver::error::ResolveError::from("timeout"))
    });
    let v = verifier(VerifierOptions::default(), resolver, &connector);
    assert_eq!(v.verify_one("jane@example.com"), Outcome::Negative);
    assert_eq!(connector.stats.connects(), 0);
}

#[test]
fn falls_through_to_next_exchanger_after_greylisting() {
    let connector = ScriptedConnector::new()
        .host("mx1.example.com", dialog("450 4.2.0 Greylisted\r\n"))
        .host("mx2.example.com", dialog("250 2.1.5 Ok\r\n"));
    let resolver = resolver_for(vec![
        MxRecord::new(20, "mx2.example.com"),
        MxRecord::new(10, "mx1.example.com"),
    ]);
    let v = verifier(VerifierOptions::default(), resolver, &connector);
    assert_eq!(v.verify_one("jane@example.com"), Outcome::Affirmative);
    assert_eq!(connector.stats.connects(), 2);
    assert_eq!(connector.stats.shutdowns(), 2);
}

#[test]
fn stops_at_first_decisive_exchanger() {
    let connector = ScriptedConnector::new()
        .host("mx1.example.com", dialog("550 5.1.1 No such user\r\n"))
        .host("mx2.example.com", dialog("250 Ok\r\n"));
    let resolver = resolver_for(vec![
        MxRecord::new(10, "mx1.example.com"),
        MxRecord::new(20, "mx2.example.com"),
    ]);
    let v = verifier(VerifierOptions::default(), resolver, &connector);
    assert_eq!(v.verify_one("jane@example.com"), Outcome::Negative);
    assert_eq!(connector.stats.connects(), 1);
}

#[test]
fn exhausted_exchangers_are_indeterminate() {
    let connector = ScriptedConnector::new()
        .host("mx1.example.com", dialog("451 try later\r\n"))
        .host("mx2.example.com", vec![Step::Stall]);
    let resolver = resolver_for(vec![
        MxRecord::new(10, "mx1.example.com"),
        MxRecord::new(20, "mx2.example.com"),
        MxRecord::new(30, "unreachable.example.com"),
    ]);
    let v = verifier(VerifierOptions::default(), resolver, &connector);
    assert_eq!(v.verify_one("jane@example.com"), Outcome::Indeterminate);
    assert_eq!(connector.stats.connects(), 3);
}

#[test]
fn batch_returns_each_address_once_within_worker_limit() {
    let connector = ScriptedConnector::new()
        .host("mx.example.com", dialog("250 Ok\r\n"))
        .latency(Duration::from_millis(5));
    let resolver = resolver_for(vec![MxRecord::new(10, "mx.example.com")]);
    let options = VerifierOptions {
        workers: 3,
        ..VerifierOptions::default()
    };
    let v = verifier(options, resolver, &connector);

    let addresses: Vec<String> = (0..20).map(|i| format!("user{i}@example.com")).collect();
    let mut results = v.verify_batch(&addresses);
    assert_eq!(results.len(), addresses.len());
    results.sort_by(|a, b| a.address.cmp(&b.address));
    let mut expected = addresses.clone();
    expected.sort();
    let got: Vec<_> = results.iter().map(|r| r.address.clone()).collect();
    assert_eq!(got, expected);
    assert!(results.iter().all(|r| r.outcome == Outcome::Affirmative));

    assert_eq!(connector.stats.connects(), 20);
    assert!(connector.stats.peak() <= 3, "peak {}", connector.stats.peak());
    assert!(connector.stats.peak() >= 1);
    assert_eq!(connector.stats.in_flight(), 0);
}

#[test]
fn batch_is_repeatable() {
    let connector = ScriptedConnector::new()
        .host("mx.good.test", dialog("250 Ok\r\n"))
        .host("mx.bad.test", dialog("550 5.1.1 User unknown\r\n"))
        .host("mx.grey.test", dialog("451 later\r\n"));
    let resolver = StubResolver::new(|domain| {
        Ok(match domain {
            "good.test" => vec![MxRecord::new(10, "mx.good.test")],
            "bad.test" => vec![MxRecord::new(10, "mx.bad.test")],
            "grey.test" => vec![MxRecord::new(10, "mx.grey.test")],
            _ => Vec::new(),
        })
    });
    let v = verifier(VerifierOptions::default(), resolver, &connector);
    let addresses = [
        "a@good.test",
        "b@bad.test",
        "c@grey.test",
        "d@nowhere.test",
        "broken",
    ];

    let run = || {
        let mut results = v.verify_batch(&addresses);
        results.sort_by(|a, b| a.address.cmp(&b.address));
        results
            .into_iter()
            .map(|r| (r.address, r.outcome))
            .collect::<Vec<_>>()
    };
    let first = run();
    assert_eq!(first, run());
    assert_eq!(
        first,
        vec![
            ("a@good.test".to_string(), Outcome::Affirmative),
            ("b@bad.test".to_string(), Outcome::Negative),
            ("broken".to_string(), Outcome::Negative),
            ("c@grey.test".to_string(), Outcome::Indeterminate),
            ("d@nowhere.test".to_string(), Outcome::Negative),
        ]
    );
}

#[test]
fn batch_keeps_duplicates() {
    let connector = ScriptedConnector::new().host("mx.example.com", dialog("250 Ok\r\n"));
    let resolver = resolver_for(vec![MxRecord::new(10, "mx.example.com")]);
    let v = verifier(VerifierOptions::default(), resolver, &connector);
    let results = v.verify_batch(&["x@example.com", "x@example.com"]);
    assert_eq!(results.len(), 2);
}

#[test]
fn empty_batch_spawns_nothing() {
    let connector = ScriptedConnector::new();
    let v = verifier(
        VerifierOptions::default(),
        resolver_for(Vec::new()),
        &connector,
    );
    let none: [&str; 0] = [];
    assert!(v.verify_batch(&none).is_empty());
}

#[test]
fn expired_deadline_skips_probes() {
    let connector = ScriptedConnector::new().host("mx.example.com", dialog("250 Ok\r\n"));
    let resolver = resolver_for(vec![MxRecord::new(10, "mx.example.com")]);
    let options = VerifierOptions {
        batch_deadline_ms: Some(0),
        ..VerifierOptions::default()
    };
    let v = verifier(options, resolver, &connector);
    let results = v.verify_batch(&["a@example.com", "b@example.com"]);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.outcome == Outcome::Indeterminate));
    assert_eq!(connector.stats.connects(), 0);
}

#[test]
fn address_with_injected_command_is_negative_without_connecting() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&lookups);
    let resolver = StubResolver::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(vec![MxRecord::new(10, "mx.example.com")])
    });
    let connector = ScriptedConnector::new().host("mx.example.com", dialog("250 Ok\r\n"));
    let v = verifier(VerifierOptions::default(), resolver, &connector);

    for address in [
        "x>\r\nRCPT TO:<postmaster@example.com",
        "jane@example.com>\r\nDATA",
        "<jane@example.com>",
    ] {
        assert_eq!(v.verify_one(address), Outcome::Negative, "{address:?}");
    }
    assert_eq!(lookups.load(Ordering::SeqCst), 0);
    assert_eq!(connector.stats.connects(), 0);
}

#[test]
fn deadline_stops_the_exchanger_walk() {
    let connector = ScriptedConnector::new()
        .host("mx1.example.com", vec![Step::Stall])
        .host("mx2.example.com", vec![Step::Stall])
        .host("mx3.example.com", dialog("250 Ok\r\n"))
        .latency(Duration::from_millis(150));
    let resolver = resolver_for(vec![
        MxRecord::new(10, "mx1.example.com"),
        MxRecord::new(20, "mx2.example.com"),
        MxRecord::new(30, "mx3.example.com"),
    ]);
    let options = VerifierOptions {
        workers: 1,
        batch_deadline_ms: Some(50),
        ..VerifierOptions::default()
    };
    let v = verifier(options, resolver, &connector);
    let results = v.verify_batch(&["jane@example.com"]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome, Outcome::Indeterminate);
    assert_eq!(connector.stats.connects(), 1);
    assert_eq!(connector.stats.in_flight(), 0);
}

fn malformed_address() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9._-]{0,16}",
        "@[a-z0-9.]{0,12}",
        "[a-z0-9.]{0,12}@",
        "[a-z0-9]{1,6}@[a-z0-9]{1,6}@[a-z0-9.]{0,6}",
    ]
}

proptest! {
    #[test]
    fn malformed_addresses_never_touch_the_network(address in malformed_address()) {
        let lookups = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&lookups);
        let resolver = StubResolver::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![MxRecord::new(10, "mx.example.com")])
        });
        let connector = ScriptedConnector::new().host("mx.example.com", dialog("250 Ok\r\n"));
        let v = verifier(VerifierOptions::default(), resolver, &connector);

        let results = v.verify_batch(&[address.as_str()]);
        prop_assert_eq!(results.len(), 1);
        prop_assert_eq!(results[0].outcome, Outcome::Negative);
        prop_assert_eq!(lookups.load(Ordering::SeqCst), 0);
        prop_assert_eq!(connector.stats.connects(), 0);
    }
}

fn spawn_mock_server(script: Vec<(&'static str, &'static str)>) -> (u16, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let port = listener.local_addr().expect("addr").port();
    let handle = thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = handle_session(&mut stream, script);
        }
    });
    (port, handle)
}

fn handle_session(
    stream: &mut TcpStream,
    script: Vec<(&'static str, &'static str)>,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    stream.write_all(b"220 mock.smtp.test ESMTP\r\n")?;
    for (expected, response) in script {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        assert!(
            line.starts_with(expected),
            "expected command starting with '{expected}', got '{line}'"
        );
        stream.write_all(response.as_bytes())?;
    }
    Ok(())
}

#[test]
#[ignore = "requires loopback TCP binding"]
fn verifies_over_real_tcp() {
    let (port, handle) = spawn_mock_server(vec![
        ("HELO", "250 mock.smtp.test\r\n"),
        ("MAIL FROM:", "250 2.1.0 Ok\r\n"),
        ("RCPT TO:<user@example.com>", "250 2.1.5 Ok\r\n"),
        ("QUIT", "221 2.0.0 Bye\r\n"),
    ]);
    let options = VerifierOptions {
        port,
        ..VerifierOptions::default()
    };
    let resolver = resolver_for(vec![MxRecord::new(10, "127.0.0.1")]);
    let v = Verifier::with_parts(options, resolver, super::TcpConnector).expect("verifier");
    assert_eq!(v.verify_one("user@example.com"), Outcome::Affirmative);
    handle.join().expect("server thread");
}
