//! Label sets attached to every observation.

use axum::http::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;

pub const LABEL_VENDOR: &str = "vendor";
pub const LABEL_ENDPOINT: &str = "endpoint";
pub const LABEL_METHOD: &str = "method";
pub const LABEL_CODE: &str = "code";

/// Immutable mapping of label name to label value.
///
/// Backed by an ordered map, so two sets with the same pairs compare and
/// hash equal no matter in which order they were built. That is what makes
/// repeated requests land on the same series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<&'static str, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base labels for an inbound request.
    pub fn server(method: &str, endpoint: impl Into<String>) -> Self {
        Self::from([
            (LABEL_METHOD, method.to_owned()),
            (LABEL_ENDPOINT, endpoint.into()),
        ])
    }

    /// Base labels for an outbound vendor call.
    pub fn client(vendor: &str, endpoint: impl Into<String>, method: &str) -> Self {
        Self::from([
            (LABEL_VENDOR, vendor.to_owned()),
            (LABEL_ENDPOINT, endpoint.into()),
            (LABEL_METHOD, method.to_owned()),
        ])
    }

    /// Return a copy of `self` with `key` added or overridden.
    ///
    /// `self` is left untouched: a base set is shared between the success
    /// and duration observations of the same request.
    pub fn compose(&self, key: &'static str, value: impl Into<String>) -> Self {
        let mut labels = self.0.clone();
        labels.insert(key, value.into());
        Self(labels)
    }

    /// Shorthand for composing the numeric `code` label.
    pub fn with_code(&self, status: StatusCode) -> Self {
        self.compose(LABEL_CODE, status.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Label names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    /// Label values ordered by label name, the order instruments declare
    /// their label names in.
    pub fn values(&self) -> Vec<&str> {
        self.0.values().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&'static str, String); N]> for LabelSet {
    fn from(pairs: [(&'static str, String); N]) -> Self {
        Self(BTreeMap::from(pairs))
    }
}

impl FromIterator<(&'static str, String)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (&'static str, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
