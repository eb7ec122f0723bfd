use std::collections::HashSet;

use tracing::{debug, error, warn};
use trust_dns_resolver::{
    Resolver,
    error::{ResolveError, ResolveErrorKind},
};

use super::{Error, MxRecord, MxStatus};

/// Source of MX records. Implemented for the blocking `trust-dns` resolver;
/// tests plug in stubs.
pub trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError>;
}

impl<T: LookupMx + ?Sized> LookupMx for &T {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        (**self).lookup_mx(domain)
    }
}

impl LookupMx for Resolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        let lookup = match Resolver::mx_lookup(self, domain) {
            Ok(lookup) => lookup,
            Err(err) if matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };
        Ok(lookup
            .iter()
            .map(|mx| MxRecord::new(mx.preference(), normalize_exchange(&mx.exchange().to_utf8())))
            .collect())
    }
}

/// The system resolver, or nothing when `/etc/resolv.conf` (or the platform
/// equivalent) could not be read. A missing resolver answers every lookup
/// with an error, which [`resolve_exchangers`] turns into an empty list.
pub struct SystemResolver {
    inner: Option<Resolver>,
}

impl SystemResolver {
    pub fn from_system_conf() -> Self {
        match Resolver::from_system_conf() {
            Ok(resolver) => Self {
                inner: Some(resolver),
            },
            Err(err) => {
                error!(error = %err, "system resolver unavailable, every MX lookup will fail");
                Self { inner: None }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.inner.is_some()
    }
}

impl LookupMx for SystemResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        match &self.inner {
            Some(resolver) => resolver.lookup_mx(domain),
            None => Err(ResolveError::from("system resolver unavailable")),
        }
    }
}

/// Lookup MX records for `domain` using the system resolver.
///
/// The domain is normalized via IDNA before querying DNS. Records come back
/// ordered by ascending preference.
pub fn check_mx(domain: &str) -> Result<MxStatus, Error> {
    let ascii = normalize_domain(domain)?;
    let resolver = Resolver::from_system_conf()?;
    resolve_with(&resolver, &ascii)
}

/// Exchangers for `domain`, most preferred first. Never fails: a bad domain
/// or a DNS error yields an empty list (logged at `warn`).
pub fn resolve_exchangers<R: LookupMx + ?Sized>(resolver: &R, domain: &str) -> Vec<MxRecord> {
    let ascii = match normalize_domain(domain) {
        Ok(ascii) => ascii,
        Err(err) => {
            warn!(domain, error = %err, "cannot normalise domain for MX lookup");
            return Vec::new();
        }
    };
    match resolve_with(resolver, &ascii) {
        Ok(status) => {
            debug!(domain = %ascii, count = status.records().len(), "resolved exchangers");
            status.into_records()
        }
        Err(err) => {
            warn!(domain = %ascii, error = %err, "MX lookup failed, treating domain as mailless");
            Vec::new()
        }
    }
}

pub(crate) fn resolve_with<R: LookupMx + ?Sized>(
    resolver: &R,
    ascii_domain: &str,
) -> Result<MxStatus, Error> {
    let mut records = resolver
        .lookup_mx(ascii_domain)
        .map_err(Error::lookup(ascii_domain))?;

    // stable: equal preferences keep resolver order
    records.sort_by_key(|record| record.preference);
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert((record.preference, record.exchange.clone())));

    Ok(MxStatus::from_records(records))
}

pub fn normalize_domain(domain: &str) -> Result<String, Error> {
    let trimmed = domain.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(Error::EmptyDomain);
    }
    idna::domain_to_ascii(trimmed).map_err(Error::idna(trimmed))
}

pub(crate) fn normalize_exchange(exchange: &str) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}
