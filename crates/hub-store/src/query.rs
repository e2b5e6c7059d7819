// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compilation of blinded `has`/`equals` queries.
//!
//! A query names the blinded index (the `hmac.id` that produced the tokens)
//! and either `equals` clauses or a `has` name list. Compilation validates
//! the shape and produces a [`QueryPlan`] — pure data the store evaluates
//! against documents. The raw backend representation is never exposed to
//! callers.

use hub_core::Document;
use hub_error::{HubError, HubResult};
use serde::Deserialize;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

/// The query object accepted on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct Query {
    /// The `hmac.id` of the blinded index to search.
    pub index: String,

    /// Disjunction of conjunctive clauses. Each clause must be fully
    /// satisfied by one indexed entry; the clauses are OR-ed. Values must
    /// be strings.
    #[serde(default)]
    pub equals: Option<Vec<BTreeMap<String, serde_json::Value>>>,

    /// Attribute names that must all be present within the index.
    #[serde(default)]
    pub has: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum PlanMode {
    /// OR across clauses; each clause is an AND of `(name, value)` pairs
    /// that one entry must satisfy element-wise.
    Equals(Vec<Vec<(String, String)>>),
    /// All names must appear among the index's entries.
    Has(Vec<String>),
}

/// A compiled blinded query, ready for evaluation against documents of one
/// hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    index: String,
    mode: PlanMode,
}

impl QueryPlan {
    /// Compile a wire query into a plan.
    ///
    /// Rules:
    /// 1. the predicate is always rooted at `indexed.hmac.id == index`;
    /// 2. `equals` values must be strings (`DataError` otherwise);
    /// 3. `has` must name at least one attribute;
    /// 4. when both are present, `equals` wins;
    /// 5. a query with neither is an unsupported shape.
    pub fn compile(query: &Query) -> HubResult<QueryPlan> {
        if query.index.is_empty() {
            return Err(HubError::data("query.index must not be empty"));
        }

        if let Some(equals) = &query.equals {
            let mut clauses = Vec::with_capacity(equals.len());
            for clause in equals {
                let mut pairs = Vec::with_capacity(clause.len());
                for (name, value) in clause {
                    let value = value.as_str().ok_or_else(|| {
                        HubError::data("equals values must be strings")
                            .with_context("attribute", name.as_str())
                    })?;
                    pairs.push((name.clone(), value.to_owned()));
                }
                clauses.push(pairs);
            }
            return Ok(QueryPlan {
                index: query.index.clone(),
                mode: PlanMode::Equals(clauses),
            });
        }

        if let Some(has) = &query.has {
            if has.is_empty() {
                return Err(HubError::data("has must name at least one attribute"));
            }
            return Ok(QueryPlan {
                index: query.index.clone(),
                mode: PlanMode::Has(has.clone()),
            });
        }

        Err(HubError::not_supported(
            "query must specify either equals or has",
        ))
    }

    /// Evaluate the plan against one document.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(entries) = &doc.indexed else {
            return false;
        };
        let in_index = entries.iter().filter(|e| e.hmac.id == self.index);

        match &self.mode {
            PlanMode::Equals(clauses) => {
                // One entry must satisfy every pair of some clause.
                in_index.into_iter().any(|entry| {
                    clauses.iter().any(|pairs| {
                        pairs.iter().all(|(name, value)| {
                            entry
                                .attributes
                                .iter()
                                .any(|a| &a.name == name && &a.value == value)
                        })
                    })
                })
            }
            PlanMode::Has(names) => {
                // Names may be satisfied across entries of the same index.
                names.iter().all(|name| {
                    in_index
                        .clone()
                        .any(|entry| entry.attributes.iter().any(|a| &a.name == name))
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
