//! Field extraction from request contexts
//!
//! [`ContextAdapter`] walks a fixed, ordered list of context shapes and turns
//! the first recognised one into a [`FieldSet`]:
//!
//! 1. router-style keyed store ([`RequestValues`]): non-empty `request_id`
//!    becomes `x-request-id`
//! 2. plain HTTP request: no identifier
//! 3. per-request user values ([`UserValues`]): a string-typed `request_id`
//!    becomes `x-request-id`
//!
//! Every recognised shape also receives the environment `service` field.
//! Unrecognised or absent contexts produce an empty set.
//!
//! [`RequestValues`]: super::context::RequestValues
//! [`UserValues`]: super::context::UserValues

use super::context::{user_value_str, LoggingContext};
use super::env::EnvironmentEnricher;
use super::field_set::FieldSet;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

/// Field key carrying the request identifier
pub const KEY_X_REQUEST_ID: &str = "x-request-id";

/// Key looked up in the context stores
pub const REQUEST_ID_LOOKUP: &str = "request_id";

/// How many shapes may contribute to one extraction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Stop after the first shape the context matches
    #[default]
    FirstMatch,

    /// Keyed-store and HTTP shapes fall through to later shapes; the
    /// user-value shape ends the pass. A context exposing several
    /// capabilities can collect more than one `service` field.
    Legacy,
}

type Rule = fn(&ContextAdapter, &dyn LoggingContext, &mut FieldSet) -> Option<ControlFlow<()>>;

/// Shapes in priority order. A rule returns `None` when the context does not
/// have its capability.
const RULES: [Rule; 3] = [
    ContextAdapter::from_request_values,
    ContextAdapter::from_http_request,
    ContextAdapter::from_user_values,
];

/// Extracts structured fields from an opaque [`LoggingContext`]
#[derive(Debug, Clone)]
pub struct ContextAdapter {
    enricher: EnvironmentEnricher,
    policy: MatchPolicy,
}

impl ContextAdapter {
    pub fn new(enricher: EnvironmentEnricher, policy: MatchPolicy) -> Self {
        Self { enricher, policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn enricher(&self) -> &EnvironmentEnricher {
        &self.enricher
    }

    /// Extract fields from `ctx`; never fails
    pub fn extract(&self, ctx: Option<&dyn LoggingContext>) -> FieldSet {
        let mut fields = FieldSet::new();
        let Some(ctx) = ctx else {
            return fields;
        };

        for rule in RULES {
            let Some(flow) = rule(self, ctx, &mut fields) else {
                continue;
            };
            if flow.is_break() || self.policy == MatchPolicy::FirstMatch {
                break;
            }
        }

        fields
    }

    fn from_request_values(
        &self,
        ctx: &dyn LoggingContext,
        fields: &mut FieldSet,
    ) -> Option<ControlFlow<()>> {
        let values = ctx.request_values()?;
        if let Some(id) = values.get_string(REQUEST_ID_LOOKUP).filter(|id| !id.is_empty()) {
            fields.push(KEY_X_REQUEST_ID, id);
        }
        self.enricher.enrich_in_place(fields);
        Some(ControlFlow::Continue(()))
    }

    fn from_http_request(
        &self,
        ctx: &dyn LoggingContext,
        fields: &mut FieldSet,
    ) -> Option<ControlFlow<()>> {
        if !ctx.is_http_request() {
            return None;
        }
        self.enricher.enrich_in_place(fields);
        Some(ControlFlow::Continue(()))
    }

    fn from_user_values(
        &self,
        ctx: &dyn LoggingContext,
        fields: &mut FieldSet,
    ) -> Option<ControlFlow<()>> {
        let values = ctx.user_values()?;
        if let Some(id) = values.user_value(REQUEST_ID_LOOKUP).and_then(user_value_str) {
            fields.push(KEY_X_REQUEST_ID, id);
        }
        self.enricher.enrich_in_place(fields);
        Some(ControlFlow::Break(()))
    }
}
