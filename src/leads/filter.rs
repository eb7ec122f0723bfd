use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use super::status::VerificationStatus;
use super::types::{Lead, parse_timestamp};

/// Lead list criteria as carried in a campaign view's query string
/// (`q=acme&f_email_not_empty=1&verified_from=2024-05-01`). All criteria
/// combine with AND; unset ones match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadFilter {
    /// Case-insensitive search over names, company, emails, title, industry.
    pub q: Option<String>,
    /// One of the [`VerificationStatus`] names; anything else is ignored.
    pub verification: Option<String>,
    pub f_full_name: Option<String>,
    pub f_title: Option<String>,
    pub f_company_name: Option<String>,
    pub f_email: Option<String>,
    pub f_company_website_like: Option<String>,
    pub f_email_like: Option<String>,
    #[serde(deserialize_with = "flag")]
    pub f_company_website_empty: bool,
    #[serde(deserialize_with = "flag")]
    pub f_company_website_not_empty: bool,
    #[serde(deserialize_with = "flag")]
    pub f_email_empty: bool,
    #[serde(deserialize_with = "flag")]
    pub f_email_not_empty: bool,
    pub enriched_from: Option<String>,
    pub enriched_to: Option<String>,
    pub verified_from: Option<String>,
    pub verified_to: Option<String>,
}

impl LeadFilter {
    /// Parse a URL query string. Unknown keys and empty values are ignored.
    pub fn from_query(query: &str) -> Self {
        let mut filter = Self::default();
        let query = query.trim().trim_start_matches('?');
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let text = (!value.is_empty()).then(|| value.to_string());
            match key.as_ref() {
                "q" => filter.q = text,
                "verification" => filter.verification = text,
                "f_full_name" => filter.f_full_name = text,
                "f_title" => filter.f_title = text,
                "f_company_name" => filter.f_company_name = text,
                "f_email" => filter.f_email = text,
                "f_company_website_like" => filter.f_company_website_like = text,
                "f_email_like" => filter.f_email_like = text,
                "f_company_website_empty" => filter.f_company_website_empty = truthy(&value),
                "f_company_website_not_empty" => {
                    filter.f_company_website_not_empty = truthy(&value)
                }
                "f_email_empty" => filter.f_email_empty = truthy(&value),
                "f_email_not_empty" => filter.f_email_not_empty = truthy(&value),
                "enriched_from" => filter.enriched_from = text,
                "enriched_to" => filter.enriched_to = text,
                "verified_from" => filter.verified_from = text,
                "verified_to" => filter.verified_to = text,
                other => debug!(key = other, "ignoring unknown filter key"),
            }
        }
        for (key, value) in [
            ("enriched_from", &filter.enriched_from),
            ("enriched_to", &filter.enriched_to),
            ("verified_from", &filter.verified_from),
            ("verified_to", &filter.verified_to),
        ] {
            if let Some(value) = value.as_deref().filter(|v| parse_timestamp(v).is_none()) {
                warn!(key, value, "ignoring unparseable date filter");
            }
        }
        filter
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        self.matches_search(lead)
            && self.matches_status(lead)
            && contains(&lead.full_name, &self.f_full_name)
            && contains(&lead.title, &self.f_title)
            && contains(&lead.company_name, &self.f_company_name)
            && contains(&lead.email, &self.f_email)
            && contains(&lead.company_website, &self.f_company_website_like)
            && contains(&lead.email, &self.f_email_like)
            && presence(
                &lead.company_website,
                self.f_company_website_empty,
                self.f_company_website_not_empty,
            )
            && presence(&lead.email, self.f_email_empty, self.f_email_not_empty)
            && in_range(&lead.enriched_at, &self.enriched_from, &self.enriched_to)
            && in_range(
                &lead.verification_checked_at,
                &self.verified_from,
                &self.verified_to,
            )
    }

    fn matches_search(&self, lead: &Lead) -> bool {
        let Some(needle) = self
            .q
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty())
        else {
            return true;
        };
        [
            &lead.first_name,
            &lead.last_name,
            &lead.full_name,
            &lead.company_name,
            &lead.email,
            &lead.personal_email,
            &lead.title,
            &lead.industry,
        ]
        .into_iter()
        .flatten()
        .any(|value| value.to_lowercase().contains(&needle))
    }

    fn matches_status(&self, lead: &Lead) -> bool {
        let wanted = self.verification.as_deref().and_then(|name| {
            VerificationStatus::ALL
                .into_iter()
                .find(|status| status.as_str() == name)
        });
        wanted.is_none_or(|status| lead.verification_status == status)
    }
}

fn truthy(value: &str) -> bool {
    value == "1" || value == "true"
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Text(text) => truthy(&text),
    })
}

fn contains(value: &Option<String>, needle: &Option<String>) -> bool {
    let Some(needle) = needle.as_deref() else {
        return true;
    };
    value
        .as_deref()
        .is_some_and(|value| value.to_lowercase().contains(&needle.to_lowercase()))
}

/// Setting both toggles cancels them out.
fn presence(value: &Option<String>, want_empty: bool, want_present: bool) -> bool {
    let is_empty = value.as_deref().is_none_or(str::is_empty);
    match (want_empty, want_present) {
        (true, false) => is_empty,
        (false, true) => !is_empty,
        _ => true,
    }
}

/// `from` is inclusive. `to` names a day and includes all of it, so the
/// bound is exclusive at the following day. Unparseable bounds are ignored.
fn in_range(at: &Option<DateTime<Utc>>, from: &Option<String>, to: &Option<String>) -> bool {
    let from = from.as_deref().and_then(parse_timestamp);
    let until = to
        .as_deref()
        .and_then(parse_timestamp)
        .and_then(|to| to.checked_add_days(Days::new(1)));
    if from.is_none() && until.is_none() {
        return true;
    }
    let Some(at) = at else {
        return false;
    };
    from.is_none_or(|from| *at >= from) && until.is_none_or(|until| *at < until)
}
