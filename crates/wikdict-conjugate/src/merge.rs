//! Collapse every group of records sharing a surface form into one record.
//!
//! For each group:
//! 1. Drop candidates whose infinitive is not a known verb. A group left
//!    empty is unresolved and disappears from the output.
//! 2. If a survivor is exactly a past participle (`participle;past`), emit
//!    the first such survivor untouched.
//! 3. Otherwise pick the most complete survivor as the base (ties go to the
//!    one seen last) and replace its tenses with the descriptor merged from
//!    all survivors.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};
use wikdict_types::{Mood, VerbReference};

use crate::ConjugationRecord;

/// Tense string of a past participle form.
pub const PARTICIPLE_PAST: &str = "participle;past";

/// Counters for one merge run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MergeStats {
    pub input_records: usize,
    pub keys: usize,
    pub emitted: usize,
    pub unresolved_keys: usize,
    pub unresolved_records: usize,
    pub participle_passthrough: usize,
}

/// Merged records in ascending group-key order.
#[derive(Clone, Debug, Default)]
pub struct Merged {
    pub records: Vec<ConjugationRecord>,
    pub stats: MergeStats,
}

/// Result of merging one group.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GroupOutcome {
    /// No candidate cites a known verb.
    Unresolved,
    /// A past participle, emitted as is.
    Passthrough(ConjugationRecord),
    /// Base candidate carrying the merged descriptor.
    Merged(ConjugationRecord),
}

/// Group `records` by [`ConjugationRecord::group_key`] and merge each group.
pub fn merge<R>(records: Vec<ConjugationRecord>, reference: &R) -> Merged
where
    R: VerbReference + ?Sized,
{
    let mut stats = MergeStats {
        input_records: records.len(),
        ..MergeStats::default()
    };

    let mut groups: BTreeMap<String, Vec<ConjugationRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.group_key()).or_default().push(record);
    }
    stats.keys = groups.len();

    let mut out = Vec::with_capacity(groups.len());
    for (key, candidates) in groups {
        let size = candidates.len();
        match merge_group(candidates, reference) {
            GroupOutcome::Unresolved => {
                debug!("dropping {key:?}: no candidate cites a known verb");
                stats.unresolved_keys += 1;
                stats.unresolved_records += size;
            }
            GroupOutcome::Passthrough(record) => {
                stats.participle_passthrough += 1;
                out.push(record);
            }
            GroupOutcome::Merged(record) => out.push(record),
        }
    }
    stats.emitted = out.len();

    info!(
        "merged {} records into {} forms ({} unresolved, {} past participles)",
        stats.input_records, stats.emitted, stats.unresolved_keys, stats.participle_passthrough
    );
    Merged { records: out, stats }
}

/// Merge the candidates of a single group, given in input order.
pub fn merge_group<R>(candidates: Vec<ConjugationRecord>, reference: &R) -> GroupOutcome
where
    R: VerbReference + ?Sized,
{
    let mut valid: Vec<ConjugationRecord> = candidates
        .into_iter()
        .filter(|c| reference.is_known_verb(&c.infinitive.trim().to_lowercase()))
        .collect();
    // Only an empty survivor list has no base.
    let Some(base) = select_base(&valid) else {
        return GroupOutcome::Unresolved;
    };

    if let Some(idx) = valid.iter().position(|c| c.tenses == PARTICIPLE_PAST) {
        return GroupOutcome::Passthrough(valid.swap_remove(idx));
    }

    let descriptor = merge_tenses(valid.iter().map(|c| c.tenses.as_str()));
    let mut base = valid.swap_remove(base);
    base.tenses = descriptor;
    GroupOutcome::Merged(base)
}

/// One point for each non-blank field among form, infinitive, tenses, ipa.
pub fn completeness(record: &ConjugationRecord) -> u8 {
    [
        &record.conjugated_form,
        &record.infinitive,
        &record.tenses,
        &record.ipa,
    ]
    .iter()
    .filter(|field| !field.trim().is_empty())
    .count() as u8
}

/// Index of the most complete candidate. Equal scores resolve to the later
/// candidate.
pub fn select_base(candidates: &[ConjugationRecord]) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let score = completeness(candidate);
        if best.is_none_or(|(_, top)| score >= top) {
            best = Some((idx, score));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Build a mood descriptor from flat `;`-joined tag strings.
///
/// A mood tag opens a bucket; the non-mood tags after it are joined with
/// spaces into one tense (`past;anterior` → `past anterior`) that lands in
/// that bucket when the next mood starts or the string ends. Tags before the
/// first mood are dropped. Buckets are unioned across all inputs and emitted
/// in canonical mood order with sorted, unique tenses, so the result does
/// not depend on input order.
pub fn merge_tenses<'a, I>(tense_strings: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut buckets: BTreeMap<Mood, BTreeSet<String>> = BTreeMap::new();

    for tenses in tense_strings {
        let mut mood: Option<Mood> = None;
        let mut pending: Vec<&str> = Vec::new();
        for tag in tenses.split(';').map(str::trim).filter(|t| !t.is_empty()) {
            match Mood::from_tag(tag) {
                Some(next) => {
                    flush(&mut buckets, mood, &mut pending);
                    buckets.entry(next).or_default();
                    mood = Some(next);
                }
                None => pending.push(tag),
            }
        }
        flush(&mut buckets, mood, &mut pending);
    }

    let mut parts: Vec<&str> = Vec::new();
    for (mood, tenses) in &buckets {
        parts.push(mood.as_str());
        parts.extend(tenses.iter().map(String::as_str));
    }
    parts.join(";")
}

fn flush(buckets: &mut BTreeMap<Mood, BTreeSet<String>>, mood: Option<Mood>, pending: &mut Vec<&str>) {
    if let Some(mood) = mood
        && !pending.is_empty()
    {
        buckets.entry(mood).or_default().insert(pending.join(" "));
    }
    pending.clear();
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn rec(form: &str, infinitive: &str, tenses: &str, ipa: &str) -> ConjugationRecord {
        ConjugationRecord {
            conjugated_form: form.into(),
            infinitive: infinitive.into(),
            tenses: tenses.into(),
            ipa: ipa.into(),
            full_form: form.into(),
        }
    }

    fn verbs(list: &[&str]) -> HashSet<String> {
        list.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn merges_moods_in_canonical_order_with_sorted_tenses() {
        let descriptor = merge_tenses(["indicative;present", "indicative;past;historic"]);
        assert_eq!(descriptor, "indicative;past historic;present");

        let descriptor = merge_tenses([
            "imperative;present;second-person",
            "subjunctive;imperfect",
            "indicative;present",
            "subjunctive;imperfect",
        ]);
        assert_eq!(
            descriptor,
            "indicative;present;subjunctive;imperfect;imperative;present second-person"
        );
    }

    #[test]
    fn splits_composite_tag_runs_at_each_mood() {
        let descriptor = merge_tenses(["indicative;past;anterior;Subjunctive;pluperfect"]);
        assert_eq!(descriptor, "indicative;past anterior;subjunctive;pluperfect");
    }

    #[test]
    fn drops_tenses_before_first_mood_but_keeps_bare_moods() {
        assert_eq!(merge_tenses(["present;singular;gerund"]), "gerund");
        assert_eq!(merge_tenses(["", " ; "]), "");
    }

    #[test]
    fn merge_is_order_independent() {
        let inputs = [
            "indicative;present",
            "conditional;present",
            "indicative;imperfect",
            "indicative;present",
        ];
        let forward = merge_tenses(inputs);
        let backward = merge_tenses(inputs.iter().rev().copied());
        assert_eq!(forward, backward);
    }

    #[test]
    fn unknown_infinitives_drop_the_key() {
        let outcome = merge_group(
            vec![rec("lis", "lyre", "indicative;present", "li")],
            &verbs(&["lire"]),
        );
        assert_eq!(outcome, GroupOutcome::Unresolved);
    }

    #[test]
    fn unknown_participle_is_unresolved_not_passed_through() {
        let outcome = merge_group(
            vec![
                rec("lu", "lyre", PARTICIPLE_PAST, "ly"),
                rec("lu", "luire", "indicative;present", "ly"),
            ],
            &verbs(&["lire"]),
        );
        assert_eq!(outcome, GroupOutcome::Unresolved);
        assert_eq!(select_base(&[]), None);
        assert_eq!(merge_group(Vec::new(), &verbs(&["lire"])), GroupOutcome::Unresolved);
    }

    #[test]
    fn reference_check_is_case_insensitive() {
        let outcome = merge_group(
            vec![rec("lis", " Lire ", "indicative;present", "li")],
            &verbs(&["lire"]),
        );
        assert!(matches!(outcome, GroupOutcome::Merged(_)));
    }

    #[test]
    fn past_participle_bypasses_merge() {
        let outcome = merge_group(
            vec![
                rec("lu", "lire", "indicative;present", "ly"),
                rec("lu", "lire", PARTICIPLE_PAST, ""),
                rec("lu", "lire", PARTICIPLE_PAST, "ly"),
            ],
            &verbs(&["lire"]),
        );
        assert_eq!(
            outcome,
            GroupOutcome::Passthrough(rec("lu", "lire", PARTICIPLE_PAST, ""))
        );
    }

    #[test]
    fn invalid_participle_does_not_short_circuit() {
        let outcome = merge_group(
            vec![
                rec("lu", "luire", PARTICIPLE_PAST, "ly"),
                rec("lu", "lire", "indicative;present", "ly"),
            ],
            &verbs(&["lire"]),
        );
        let GroupOutcome::Merged(record) = outcome else {
            panic!("expected merge, got {outcome:?}");
        };
        assert_eq!(record.tenses, "indicative;present");
    }

    #[test]
    fn base_is_most_complete_candidate() {
        let outcome = merge_group(
            vec![
                rec("lis", "lire", "indicative;present", "li"),
                rec("lis", "lire", "imperative;present", ""),
            ],
            &verbs(&["lire"]),
        );
        let GroupOutcome::Merged(record) = outcome else {
            panic!("expected merge");
        };
        assert_eq!(record.ipa, "li");
        assert_eq!(record.tenses, "indicative;present;imperative;present");
    }

    #[test]
    fn score_ties_resolve_to_last_seen() {
        let candidates = vec![
            rec("lis", "lire", "indicative;present", "li"),
            rec("Lis", "lire", "imperative;present", "lis"),
        ];
        assert_eq!(select_base(&candidates), Some(1));
        assert_eq!(select_base(&candidates[..1]), Some(0));
        assert_eq!(select_base(&[]), None);

        let GroupOutcome::Merged(record) = merge_group(candidates, &verbs(&["lire"])) else {
            panic!("expected merge");
        };
        assert_eq!(record.conjugated_form, "Lis");
        assert_eq!(record.ipa, "lis");
    }

    #[test]
    fn completeness_counts_non_blank_fields() {
        assert_eq!(completeness(&rec("lis", "lire", "indicative", "li")), 4);
        assert_eq!(completeness(&rec("lis", " ", "", "li")), 2);
    }

    #[test]
    fn merge_groups_case_insensitively_and_reports() {
        let records = vec![
            rec("lit", "lire", "indicative;present", "li"),
            rec("lis", "lire", "indicative;present", "li"),
            rec("Lis", "lire", "imperative;present", "li"),
            rec("xyz", "nope", "indicative;present", ""),
            rec("lu", "lire", PARTICIPLE_PAST, "ly"),
        ];
        let merged = merge(records, &verbs(&["lire"]));
        let forms: Vec<&str> = merged
            .records
            .iter()
            .map(|r| r.conjugated_form.as_str())
            .collect();
        assert_eq!(forms, vec!["Lis", "lit", "lu"]);
        assert_eq!(
            merged.records[0].tenses,
            "indicative;present;imperative;present"
        );
        assert_eq!(
            merged.stats,
            MergeStats {
                input_records: 5,
                keys: 4,
                emitted: 3,
                unresolved_keys: 1,
                unresolved_records: 1,
                participle_passthrough: 1,
            }
        );
    }

    #[test]
    fn closures_work_as_reference() {
        let merged = merge(
            vec![rec("lis", "lire", "indicative;present", "li")],
            &|inf: &str| inf == "lire",
        );
        assert_eq!(merged.records.len(), 1);
    }
}
