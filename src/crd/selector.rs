//! # Label Selectors
//!
//! Kubernetes-style label selectors carried in the Grafana spec and passed on
//! to the dashboard controller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label selector with the same shape as `metav1.LabelSelector`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// A single set-based requirement
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    pub key: String,
    /// One of In, NotIn, Exists, DoesNotExist
    pub operator: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl LabelSelector {
    /// Render the selector in the string form accepted by `ListParams::labels`
    ///
    /// Unknown operators are skipped rather than rendered into an invalid selector.
    #[must_use]
    pub fn to_selector_string(&self) -> String {
        let labels = self.match_labels.iter().map(|(k, v)| format!("{k}={v}"));
        let expressions = self
            .match_expressions
            .iter()
            .filter_map(LabelSelectorRequirement::render);
        labels.chain(expressions).collect::<Vec<_>>().join(",")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }
}

impl LabelSelectorRequirement {
    fn render(&self) -> Option<String> {
        match self.operator.as_str() {
            "In" => Some(format!("{} in ({})", self.key, self.values.join(","))),
            "NotIn" => Some(format!("{} notin ({})", self.key, self.values.join(","))),
            "Exists" => Some(self.key.clone()),
            "DoesNotExist" => Some(format!("!{}", self.key)),
            _ => None,
        }
    }
}

/// Render several selectors; each one is an alternative, separated by `;`
#[must_use]
pub fn render_selectors(selectors: &[LabelSelector]) -> String {
    selectors
        .iter()
        .filter(|s| !s.is_empty())
        .map(LabelSelector::to_selector_string)
        .collect::<Vec<_>>()
        .join(";")
}
