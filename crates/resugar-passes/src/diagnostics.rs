// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Structured diagnostics emitted by recognizers.
//!
//! A diagnostic reports a malformed-input condition: the upstream tree
//! violated an invariant the recognizer assumed (a capture-holder field
//! with no declaring-type record, a fixpoint that failed to converge).
//! Diagnostics never terminate the pipeline; the offending construct is
//! simply left in its lower-level form.

use serde::{Deserialize, Serialize};

use resugar_tree::NodeId;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The rewrite was skipped; output is valid but less idiomatic.
    Warning,
    /// The input tree is inconsistent; the subtree was left untouched.
    Error,
}

/// One structured diagnostic record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Name of the recognizer (or `"driver"`) that reported this.
    pub recognizer: String,
    pub message: String,
    /// The node the report is about, when one is identifiable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
}

impl Diagnostic {
    pub fn warning(recognizer: &str, message: impl Into<String>, node: Option<NodeId>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            recognizer: recognizer.to_string(),
            message: message.into(),
            node,
        }
    }

    pub fn error(recognizer: &str, message: impl Into<String>, node: Option<NodeId>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            recognizer: recognizer.to_string(),
            message: message.into(),
            node,
        }
    }
}
