//! Partitioning of sponsors into donation tiers.

use indexmap::IndexMap;

use crate::model::{Record, Tier};

/// Assigns each record to the highest tier whose minimum it meets.
///
/// Tier ranges are half-open, `[tier.min_amount, previous.min_amount)`, with
/// the first tier unbounded above. `tiers` must already be sorted by
/// descending `min_amount` (see `Config::validate`). Every tier gets an
/// entry, possibly empty; records below the last tier are left out. Record
/// order is preserved within a tier.
pub fn classify(records: &[Record], tiers: &[Tier]) -> IndexMap<String, Vec<Record>> {
    let mut groups = IndexMap::with_capacity(tiers.len());
    let mut upper = f64::INFINITY;
    for tier in tiers {
        let members: Vec<Record> = records
            .iter()
            .filter(|r| r.weight >= tier.min_amount && r.weight < upper)
            .cloned()
            .collect();
        tracing::debug!(tier = %tier.id, count = members.len(), "classified tier");
        groups.insert(tier.id.clone(), members);
        upper = tier.min_amount;
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tier(id: &str, min_amount: f64) -> Tier {
        Tier {
            id: id.to_string(),
            name: id.to_uppercase(),
            min_amount,
            size: 32,
            crop: false,
        }
    }

    fn record(name: &str, weight: f64) -> Record {
        Record {
            name: name.to_string(),
            logo: String::new(),
            link: String::new(),
            weight,
        }
    }

    fn weights(groups: &IndexMap<String, Vec<Record>>, id: &str) -> Vec<f64> {
        groups[id].iter().map(|r| r.weight).collect()
    }

    #[test]
    fn assigns_highest_matching_tier() {
        let tiers = [tier("t0", 1000.0), tier("t1", 100.0), tier("t2", 0.0)];
        let records = [record("a", 1500.0), record("b", 500.0), record("c", 50.0)];
        let groups = classify(&records, &tiers);

        assert_eq!(groups.keys().collect::<Vec<_>>(), ["t0", "t1", "t2"]);
        assert_eq!(weights(&groups, "t0"), [1500.0]);
        assert_eq!(weights(&groups, "t1"), [500.0]);
        assert_eq!(weights(&groups, "t2"), [50.0]);
    }

    #[test]
    fn boundaries_belong_to_the_lower_bound_tier() {
        let tiers = [tier("gold", 100.0), tier("silver", 10.0)];
        let records = [record("x", 100.0), record("y", 99.99), record("z", 10.0), record("w", 9.0)];
        let groups = classify(&records, &tiers);

        assert_eq!(weights(&groups, "gold"), [100.0]);
        assert_eq!(weights(&groups, "silver"), [99.99, 10.0]);
        let total: usize = groups.values().map(Vec::len).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn empty_tiers_are_kept_empty() {
        let tiers = [tier("top", 1000.0), tier("rest", 1.0)];
        let groups = classify(&[record("a", 5.0), record("b", 2.0)], &tiers);
        assert!(groups["top"].is_empty());
        let names: Vec<_> = groups["rest"].iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn each_record_lands_in_at_most_one_tier() {
        let tiers = [tier("a", 500.0), tier("b", 50.0), tier("c", 5.0)];
        let records: Vec<_> = (0..200).map(|i| record(&i.to_string(), f64::from(i * 7))).collect();
        let groups = classify(&records, &tiers);

        let mut seen: Vec<&str> = groups.values().flatten().map(|r| r.name.as_str()).collect();
        let assigned = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), assigned);
        let eligible = records.iter().filter(|r| r.weight >= 5.0).count();
        assert_eq!(assigned, eligible);
    }
}
