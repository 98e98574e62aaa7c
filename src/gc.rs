//! Classification of garbage collector names into generations.

/// Collectors that only collect the young generation.
const YOUNG_GENERATION_COLLECTORS: &[&str] =
    &["Copy", "PS Scavenge", "ParNew", "G1 Young Generation"];

/// Collectors that collect the old (tenured) generation.
const OLD_GENERATION_COLLECTORS: &[&str] = &[
    "MarkSweepCompact",
    "PS MarkSweep",
    "ConcurrentMarkSweep",
    "G1 Old Generation",
];

/// Result of classifying a collector set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub young: Vec<String>,
    pub old: Vec<String>,
    /// True iff every input name landed in `young` or `old`.
    pub is_detailed: bool,
}

/// Splits collector names into young and old generations, preserving input order.
///
/// A single unrecognized name disables detailed accounting for the whole set.
pub fn classify<'a, I>(names: I) -> Classification
where
    I: IntoIterator<Item = &'a str>,
{
    let mut young = Vec::new();
    let mut old = Vec::new();
    let mut total = 0usize;

    for name in names {
        total += 1;
        if YOUNG_GENERATION_COLLECTORS.contains(&name) {
            young.push(name.to_string());
        } else if OLD_GENERATION_COLLECTORS.contains(&name) {
            old.push(name.to_string());
        }
    }

    let is_detailed = young.len() + old.len() == total;
    Classification {
        young,
        old,
        is_detailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_g1_pair_is_detailed() {
        let result = classify(["G1 Young Generation", "G1 Old Generation"]);
        assert!(result.is_detailed);
        assert_eq!(result.young, vec!["G1 Young Generation"]);
        assert_eq!(result.old, vec!["G1 Old Generation"]);
    }

    #[test]
    fn test_unknown_collector_disables_detail() {
        let result = classify(["G1 Young Generation", "SomeCustomGC"]);
        assert!(!result.is_detailed);
        assert_eq!(result.young, vec!["G1 Young Generation"]);
        assert!(result.old.is_empty());
    }

    #[test]
    fn test_every_known_pair_covers_the_set() {
        let pairs = [
            ("Copy", "MarkSweepCompact"),
            ("PS Scavenge", "PS MarkSweep"),
            ("ParNew", "ConcurrentMarkSweep"),
            ("G1 Young Generation", "G1 Old Generation"),
        ];
        for (young, old) in pairs {
            let result = classify([young, old]);
            assert!(result.is_detailed, "{young}/{old} should be detailed");
            assert_eq!(result.young.len() + result.old.len(), 2);
        }
    }

    #[test]
    fn test_order_is_preserved() {
        let result = classify(["ParNew", "PS MarkSweep", "Copy"]);
        assert_eq!(result.young, vec!["ParNew", "Copy"]);
        assert_eq!(result.old, vec!["PS MarkSweep"]);
    }

    #[test]
    fn test_empty_set_is_trivially_detailed() {
        let result = classify(std::iter::empty());
        assert!(result.is_detailed);
        assert!(result.young.is_empty() && result.old.is_empty());
    }

    #[test]
    fn test_names_are_case_sensitive() {
        assert!(!classify(["g1 young generation"]).is_detailed);
    }
}
