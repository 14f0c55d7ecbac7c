//! PaC → other association rules.
//!
//! Each commit that changed both PaC and other files is one transaction: the
//! set of its PaC-side extensions plus the set of its other-side extensions.
//! Rules pair one PaC-side extension with one other-side extension, never
//! the reverse and never two of the same side.

use std::collections::HashMap;

use serde::Serialize;

use crate::stats::CoChange;

/// A mined rule `antecedent → consequent`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationRule {
    /// PaC-side extension.
    pub antecedent: String,
    /// Other-side extension.
    pub consequent: String,
    /// `count / transactions`.
    pub support: f64,
    /// `count / antecedent_count`.
    pub confidence: f64,
    /// `confidence / (consequent_count / transactions)`.
    pub lift: f64,
    /// Transactions containing both sides.
    pub count: usize,
    pub antecedent_count: usize,
    pub consequent_count: usize,
}

struct PairCount<'a> {
    pac: &'a str,
    other: &'a str,
    count: usize,
}

/// Mine rules whose count reaches `floor(min_support * transactions)` and
/// whose confidence reaches `min_confidence`.
///
/// Only records with both a PaC-side and an other-side extension are
/// transactions. Rules come out by confidence then support, both
/// descending; ties keep the order in which the pair was first seen.
///
/// # Examples
///
/// ```
/// use pacminer_cochange::rules::mine_association_rules;
/// use pacminer_cochange::stats::CoChange;
///
/// let record = |other: &str| CoChange {
///     repository: "acme/policies".into(),
///     commit_id: "c".into(),
///     pac_extensions: vec![".rego".into()],
///     other_extensions: vec![other.into()],
///     num_pac_files: 1,
///     num_other_files: 1,
/// };
/// let cochanges = vec![record(".yaml"), record(".yaml"), record(".go")];
/// let rules = mine_association_rules(&cochanges, 0.1, 0.5);
/// assert_eq!(rules.len(), 1);
/// assert_eq!(rules[0].consequent, ".yaml");
/// ```
pub fn mine_association_rules(
    cochanges: &[CoChange],
    min_support: f64,
    min_confidence: f64,
) -> Vec<AssociationRule> {
    let transactions: Vec<&CoChange> = cochanges
        .iter()
        .filter(|c| !c.pac_extensions.is_empty() && !c.other_extensions.is_empty())
        .collect();
    if transactions.is_empty() {
        return Vec::new();
    }

    let total = transactions.len();
    let min_support_count = (min_support * total as f64).floor() as usize;

    let mut pac_counts: HashMap<&str, usize> = HashMap::new();
    let mut other_counts: HashMap<&str, usize> = HashMap::new();
    let mut pair_index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut pairs: Vec<PairCount> = Vec::new();

    for transaction in &transactions {
        for pac in &transaction.pac_extensions {
            *pac_counts.entry(pac).or_default() += 1;
        }
        for other in &transaction.other_extensions {
            *other_counts.entry(other).or_default() += 1;
        }
        for pac in &transaction.pac_extensions {
            for other in &transaction.other_extensions {
                let idx = *pair_index
                    .entry((pac.as_str(), other.as_str()))
                    .or_insert_with(|| {
                        pairs.push(PairCount {
                            pac,
                            other,
                            count: 0,
                        });
                        pairs.len() - 1
                    });
                pairs[idx].count += 1;
            }
        }
    }

    let mut rules = Vec::new();
    for pair in &pairs {
        if pair.count < min_support_count {
            continue;
        }
        let antecedent_count = pac_counts.get(pair.pac).copied().unwrap_or(0);
        let consequent_count = other_counts.get(pair.other).copied().unwrap_or(0);
        if antecedent_count == 0 {
            continue;
        }

        let support = pair.count as f64 / total as f64;
        let confidence = pair.count as f64 / antecedent_count as f64;
        if confidence < min_confidence {
            continue;
        }
        let consequent_support = consequent_count as f64 / total as f64;
        let lift = if consequent_support > 0.0 {
            confidence / consequent_support
        } else {
            0.0
        };

        rules.push(AssociationRule {
            antecedent: pair.pac.to_string(),
            consequent: pair.other.to_string(),
            support,
            confidence,
            lift,
            count: pair.count,
            antecedent_count,
            consequent_count,
        });
    }

    rules.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(b.support.total_cmp(&a.support))
    });

    tracing::debug!(
        transactions = total,
        pairs = pairs.len(),
        rules = rules.len(),
        "mined association rules"
    );
    rules
}
