//! Pagination reassembly.
//!
//! A head entry's payload carries a continuation token `T`; the fragment
//! fetched with `T` lives under an identifier whose query carries `T`.
//! Merging appends the fragment's records to the head, moves the fragment's
//! own token (or its absence) onto the head, and deletes the fragment.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;

use super::entry::Entry;
use super::key::PaginationShape;
use crate::Error;

/// Outcome of one merge pass over a site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// `(head, fragment)` pairs folded together, in merge order.
    pub merged: Vec<(String, String)>,
    /// `(head, fragment)` pairs left alone because a payload had no record collection.
    pub malformed: Vec<(String, String)>,
}

impl MergeReport {
    /// Whether the pass changed the store.
    pub fn changed(&self) -> bool {
        !self.merged.is_empty()
    }
}

/// Fold every fragment into its head.
///
/// Heads are visited in identifier order; after each merge the head is
/// checked again with its new token so a fully fetched chain collapses in
/// one pass. A head takes the fragment whose identifier, minus the token
/// parameter, is the head's own identifier. Failing that it takes the first
/// fragment carrying its token whose own head is not in the store, so pages
/// of another resource that happen to share a token are never taken.
pub fn merge_fragments(entries: &mut HashMap<String, Entry>, shape: &PaginationShape) -> MergeReport {
    let mut report = MergeReport::default();

    let stored_heads: HashSet<String> = entries
        .keys()
        .filter(|id| !shape.is_fragment(id))
        .map(|id| shape.head_identifier(id))
        .collect();

    let mut by_token: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
    for id in entries.keys() {
        if let Some(token) = shape.fragment_token(id) {
            let head = shape.head_identifier(id);
            let orphan = !stored_heads.contains(&head);
            by_token.entry(token).or_default().push(Candidate { id: id.clone(), head, orphan });
        }
    }
    for candidates in by_token.values_mut() {
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
    }

    let mut heads: Vec<String> = entries
        .iter()
        .filter(|(id, entry)| !shape.is_fragment(id) && shape.payload_token(&entry.payload).is_some())
        .map(|(id, _)| id.clone())
        .collect();
    heads.sort();

    for head_id in heads {
        let head_key = shape.head_identifier(&head_id);

        while let Some(token) = entries.get(&head_id).and_then(|head| shape.payload_token(&head.payload)) {
            let Some(fragment_id) = by_token.get(&token).and_then(|candidates| pick(candidates, &head_key)) else {
                break;
            };

            let head_ok = entries.get(&head_id).is_some_and(|e| shape.has_records(&e.payload));
            let fragment_ok = entries.get(&fragment_id).is_some_and(|e| shape.has_records(&e.payload));
            if !head_ok || !fragment_ok {
                let err = malformed(if head_ok { &fragment_id } else { &head_id }, shape);
                tracing::warn!(head = %head_id, fragment = %fragment_id, error = %err, "skipping merge");
                report.malformed.push((head_id.clone(), fragment_id));
                break;
            }

            if let Some(candidates) = by_token.get_mut(&token) {
                candidates.retain(|c| c.id != fragment_id);
            }
            let Some(fragment) = entries.remove(&fragment_id) else {
                break;
            };
            if let Some(head) = entries.get_mut(&head_id) {
                fold(head, fragment, shape);
            }

            tracing::info!(head = %head_id, fragment = %fragment_id, "merged pagination fragment");
            report.merged.push((head_id.clone(), fragment_id));
        }
    }

    report
}

fn malformed(id: &str, shape: &PaginationShape) -> Error {
    Error::MalformedPayload(format!("{id} has no `{}` array", shape.records_field))
}

/// A fragment waiting for its head.
struct Candidate {
    id: String,
    /// Fragment identifier with the token parameter removed.
    head: String,
    /// No stored entry has `head` as its identifier.
    orphan: bool,
}

/// Fragment for a head keyed `head_key`, from fragments sharing its token.
fn pick(candidates: &[Candidate], head_key: &str) -> Option<String> {
    let own = candidates.iter().find(|c| c.head == head_key);
    let chosen = own.or_else(|| candidates.iter().find(|c| c.orphan))?;

    let rivals = candidates.iter().filter(|c| c.head == chosen.head && c.id != chosen.id).count();
    if rivals > 0 {
        tracing::warn!(head = head_key, kept = %chosen.id, rivals, "several fragments claim one continuation token");
    }
    Some(chosen.id.clone())
}

/// Append `fragment`'s records to `head` and adopt its continuation token.
///
/// Both payloads must already be known to hold a record collection.
fn fold(head: &mut Entry, fragment: Entry, shape: &PaginationShape) {
    let Value::Object(mut fragment_payload) = fragment.payload else {
        return;
    };
    let Some(head_payload) = head.payload.as_object_mut() else {
        return;
    };

    if let (Some(Value::Array(head_records)), Some(Value::Array(fragment_records))) =
        (head_payload.get_mut(&shape.records_field), fragment_payload.remove(&shape.records_field))
    {
        head_records.extend(fragment_records);
    }

    match fragment_payload.remove(&shape.token_field) {
        Some(token) => {
            head_payload.insert(shape.token_field.clone(), token);
        }
        None => {
            head_payload.remove(&shape.token_field);
        }
    }

    head.last_updated = head.last_updated.max(fragment.last_updated);
}
