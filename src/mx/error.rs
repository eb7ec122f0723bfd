use std::io;

use thiserror::Error;
use trust_dns_resolver::error::ResolveError;

/// Failures of the strict [`check_mx`](super::check_mx) lookup. The lenient
/// path used during verification logs these and carries on.
#[derive(Debug, Error)]
pub enum MxError {
    #[error("no domain to look up")]
    EmptyDomain,
    #[error("'{domain}' is not a valid internationalised domain")]
    IdnaConversion {
        domain: String,
        #[source]
        source: idna::Errors,
    },
    #[error("system resolver unavailable: {source}")]
    ResolverInit {
        #[source]
        source: io::Error,
    },
    #[error("MX lookup for {domain} failed: {source}")]
    Lookup {
        domain: String,
        #[source]
        source: ResolveError,
    },
}

impl MxError {
    pub(crate) fn idna(domain: &str) -> impl FnOnce(idna::Errors) -> Self + '_ {
        move |source| Self::IdnaConversion {
            domain: domain.to_string(),
            source,
        }
    }

    pub(crate) fn lookup(domain: &str) -> impl FnOnce(ResolveError) -> Self + '_ {
        move |source| Self::Lookup {
            domain: domain.to_string(),
            source,
        }
    }
}

impl From<io::Error> for MxError {
    fn from(source: io::Error) -> Self {
        Self::ResolverInit { source }
    }
}
