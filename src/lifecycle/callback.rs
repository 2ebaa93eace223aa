use std::collections::BTreeMap;

use serde::Serialize;

/// Query keys that identify what got connected, in display order.
const DETAIL_KEYS: [&str; 6] = ["domain", "team", "org", "workspace", "account", "tenant"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackOutcome {
    Connected {
        details: BTreeMap<String, String>,
    },
    Failed {
        error: String,
        description: Option<String>,
    },
}

impl CallbackOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallbackOutcome::Connected { .. })
    }

    /// Human-readable failure text, when the provider sent one.
    pub fn message(&self) -> Option<String> {
        match self {
            CallbackOutcome::Connected { .. } => None,
            CallbackOutcome::Failed { description, .. } => description.clone(),
        }
    }

    /// The most specific identifier of what was connected (domain, team, org...).
    pub fn subject(&self) -> Option<&str> {
        let CallbackOutcome::Connected { details } = self else {
            return None;
        };
        DETAIL_KEYS
            .iter()
            .find_map(|k| details.get(*k))
            .map(String::as_str)
    }
}

/// Reads the OAuth result out of `url` and strips the query.
///
/// The query is removed whenever it carried callback parameters, so the same
/// URL cannot be consumed twice.
pub fn take_callback(url: &mut reqwest::Url) -> Option<CallbackOutcome> {
    let params: BTreeMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let outcome = if let Some(error) = params.get("error").filter(|e| !e.is_empty()) {
        CallbackOutcome::Failed {
            error: error.clone(),
            description: params
                .get("error_description")
                .or_else(|| params.get("message"))
                .filter(|d| !d.trim().is_empty())
                .cloned(),
        }
    } else if params
        .get("success")
        .is_some_and(|s| matches!(s.as_str(), "true" | "1"))
    {
        let details = params
            .into_iter()
            .filter(|(k, _)| k != "success" && k != "state" && k != "code")
            .collect();
        CallbackOutcome::Connected { details }
    } else {
        return None;
    };

    url.set_query(None);
    Some(outcome)
}
