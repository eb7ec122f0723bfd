use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::mx::{LookupMx, SystemResolver, resolve_exchangers};

use super::error::VerifierError;
use super::options::VerifierOptions;
use super::policy::MailboxPolicy;
use super::probe::probe;
use super::transport::{Connector, TcpConnector};
use super::types::{Outcome, VerificationResult};

/// Verifies mailboxes by resolving each domain's exchangers and probing them
/// in preference order.
pub struct Verifier<R = SystemResolver, C = TcpConnector> {
    options: VerifierOptions,
    policy: MailboxPolicy,
    resolver: R,
    connector: C,
}

impl Verifier {
    /// A verifier backed by the system resolver and plain TCP.
    pub fn new(options: VerifierOptions) -> Result<Self, VerifierError> {
        Self::with_parts(options, SystemResolver::from_system_conf(), TcpConnector)
    }
}

impl<R, C> Verifier<R, C>
where
    R: LookupMx,
    C: Connector,
{
    pub fn with_parts(
        options: VerifierOptions,
        resolver: R,
        connector: C,
    ) -> Result<Self, VerifierError> {
        let policy = MailboxPolicy::new(&options.unknown_mailbox_pattern)?;
        Ok(Self {
            options,
            policy,
            resolver,
            connector,
        })
    }

    pub fn options(&self) -> &VerifierOptions {
        &self.options
    }

    pub fn policy(&self) -> &MailboxPolicy {
        &self.policy
    }

    /// Probe a single exchanger for `address`.
    pub fn probe(&self, host: &str, address: &str) -> Outcome {
        probe(&self.connector, host, address, &self.options, &self.policy)
    }

    /// Classify one address. Malformed addresses and mailless domains are
    /// negative without touching the network; otherwise exchangers are tried
    /// most-preferred first until one gives a decisive answer.
    pub fn verify_one(&self, address: &str) -> Outcome {
        self.verify_until(address, None)
    }

    /// [`verify_one`](Self::verify_one), but no further exchanger is tried
    /// once `deadline` has passed.
    fn verify_until(&self, address: &str, deadline: Option<Instant>) -> Outcome {
        let Some((_, domain)) = split_address(address) else {
            debug!(address, "malformed address");
            return Outcome::Negative;
        };

        let exchangers = resolve_exchangers(&self.resolver, domain);
        if exchangers.is_empty() {
            debug!(address, domain, "no mail exchanger");
            return Outcome::Negative;
        }

        let address = address.trim();
        for record in &exchangers {
            if deadline.is_some_and(|at| Instant::now() >= at) {
                debug!(
                    address,
                    exchange = %record.exchange,
                    "batch deadline passed, skipping exchanger"
                );
                break;
            }
            let outcome = self.probe(&record.exchange, address);
            if outcome.is_decisive() {
                return outcome;
            }
        }
        Outcome::Indeterminate
    }

    /// Verify every address on a pool of `options.workers` threads.
    ///
    /// Each input yields exactly one result, in completion order rather than
    /// input order. Duplicates are verified once per occurrence. Addresses
    /// still unclaimed when the batch deadline passes are reported
    /// indeterminate without being probed.
    pub fn verify_batch<S>(&self, addresses: &[S]) -> Vec<VerificationResult>
    where
        S: AsRef<str> + Sync,
        R: Sync,
        C: Sync,
    {
        if addresses.is_empty() {
            return Vec::new();
        }
        let workers = self.options.worker_count().min(addresses.len());
        let deadline = self.options.batch_deadline().map(|limit| Instant::now() + limit);
        let started = Instant::now();
        info!(addresses = addresses.len(), workers, "verification batch started");

        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                scope.spawn(move || {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(address) = addresses.get(index) else {
                            break;
                        };
                        let address = address.as_ref();
                        let outcome = if deadline.is_some_and(|at| Instant::now() >= at) {
                            debug!(address, "batch deadline passed, skipping probe");
                            Outcome::Indeterminate
                        } else {
                            self.verify_until(address, deadline)
                        };
                        if tx.send(VerificationResult::new(address, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(tx);

        let results: Vec<VerificationResult> = rx.into_iter().collect();
        info!(
            results = results.len(),
            affirmative = count(&results, Outcome::Affirmative),
            negative = count(&results, Outcome::Negative),
            indeterminate = count(&results, Outcome::Indeterminate),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "verification batch finished"
        );
        results
    }
}

/// Verify `addresses` with default options, the system resolver and plain
/// TCP. Never fails; see [`Verifier::verify_batch`].
pub fn verify_batch<S>(addresses: &[S]) -> Vec<VerificationResult>
where
    S: AsRef<str> + Sync,
{
    match Verifier::new(VerifierOptions::default()) {
        Ok(verifier) => verifier.verify_batch(addresses),
        Err(err) => {
            error!(error = %err, "verifier unavailable");
            addresses
                .iter()
                .map(|address| VerificationResult::new(address.as_ref(), Outcome::Indeterminate))
                .collect()
        }
    }
}

/// `local@domain` with exactly one `@` and both sides non-empty. Anything
/// that could break out of `RCPT TO:<...>` (whitespace, control characters,
/// angle brackets) makes the address malformed.
pub fn split_address(address: &str) -> Option<(&str, &str)> {
    let address = address.trim();
    if address
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || c == '<' || c == '>')
    {
        return None;
    }
    let (local, domain) = address.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some((local, domain))
}

fn count(results: &[VerificationResult], outcome: Outcome) -> usize {
    results.iter().filter(|r| r.outcome == outcome).count()
}
