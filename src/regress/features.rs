//! Feature resolution: map conceptual predictors onto whatever counter
//! columns the input CSV actually carries.
//!
//! Perf spells the same event differently across kernels and PMU drivers, so
//! each conceptual feature has a prioritized candidate list; the first match
//! wins. A feature with no matching column is kept as an all-zero column so
//! coefficient positions stay stable, and its source is tagged `Defaulted`
//! so reporting can tell real zeros from substituted ones.

/// One conceptual predictor and its acceptable column spellings, in
/// priority order.
pub struct FeatureSpec {
    pub name: &'static str,
    pub candidates: &'static [&'static str],
}

/// Conceptual features of the CPI model, in coefficient order.
pub const FEATURES: &[FeatureSpec] = &[
    FeatureSpec {
        name: "L1_I_misses",
        candidates: &[
            "L1-icache-load-misses",
            "l1-icache-load-misses",
            "icache.misses",
            "L1-icache-load-misses_OR_cpu/L1-icache-load-misses/",
        ],
    },
    FeatureSpec {
        name: "L1_D_misses",
        candidates: &[
            "l1_data_cache_fills_all",
            "l1_data_cache_fills_all_OR_cpu/l1_data_cache_fills_all/",
            // ls_dc_accesses counts accesses, not misses; kept as a fallback.
            "ls_dc_accesses",
        ],
    },
    FeatureSpec {
        name: "L2_misses",
        candidates: &[
            "l2_cache_req_stat.ic_dc_miss_in_l2",
            "l2_cache_req_stat.ic_dc_miss_in_l2_OR_cpu/l2_cache_req_stat.ic_dc_miss_in_l2/",
            "l2_dcache_load_misses",
            "l2-dcache-load-misses",
        ],
    },
    FeatureSpec {
        name: "L3_misses",
        // Demand fills from memory proxy L3/DRAM traffic.
        candidates: &[
            "ls_dmnd_fills_from_sys.mem_io_local",
            "ls_dmnd_fills_from_sys.int_cache",
            "LLC-load-misses",
            "llc-load-misses",
        ],
    },
    FeatureSpec {
        name: "D_TLB_misses",
        candidates: &[
            "l1_dtlb_misses",
            "l1_dtlb_misses_OR_cpu/l1_dtlb_misses/",
            "ls_l1_d_tlb_miss.all",
        ],
    },
    FeatureSpec {
        name: "Branch_mispred",
        candidates: &[
            "branch-misses",
            "branch_misses",
            "branch-misses_OR_cpu/branch-misses/",
        ],
    },
    FeatureSpec {
        name: "FLOPs",
        candidates: &[
            "fp_ret_sse_avx_ops.all",
            "fp_arith_inst_retired.scalar_double",
            "fp",
        ],
    },
];

/// Where a feature's values came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureSource {
    /// Matched an input column; holds the column's name and position.
    Column { name: String, index: usize },
    /// No candidate matched; the feature is an all-zero column.
    Defaulted,
}

/// A conceptual feature resolved against a concrete header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFeature {
    pub name: &'static str,
    pub source: FeatureSource,
}

impl ResolvedFeature {
    pub fn is_defaulted(&self) -> bool {
        self.source == FeatureSource::Defaulted
    }
}

/// Resolve every conceptual feature against the input columns.
pub fn resolve_features(columns: &[String]) -> Vec<ResolvedFeature> {
    FEATURES
        .iter()
        .map(|spec| ResolvedFeature {
            name: spec.name,
            source: find_column(columns, spec.candidates),
        })
        .collect()
}

/// First candidate that matches a column wins; exact match first, then a
/// case- and punctuation-insensitive comparison.
fn find_column(columns: &[String], candidates: &[&str]) -> FeatureSource {
    for cand in candidates {
        if let Some(index) = columns.iter().position(|c| c == cand) {
            return FeatureSource::Column {
                name: columns[index].clone(),
                index,
            };
        }
        let folded = fold(cand);
        if let Some(index) = columns.iter().position(|c| fold(c) == folded) {
            return FeatureSource::Column {
                name: columns[index].clone(),
                index,
            };
        }
    }
    FeatureSource::Defaulted
}

/// Lowercased, alphanumeric-only form used for fuzzy column matching.
fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_candidate_wins() {
        let columns = cols(&["ls_dc_accesses", "l1_data_cache_fills_all"]);
        let resolved = resolve_features(&columns);
        let l1d = resolved.iter().find(|f| f.name == "L1_D_misses").unwrap();
        assert_eq!(
            l1d.source,
            FeatureSource::Column {
                name: "l1_data_cache_fills_all".to_string(),
                index: 1,
            }
        );
    }

    #[test]
    fn fuzzy_match_ignores_case_and_punctuation() {
        let columns = cols(&["Branch_Misses"]);
        let resolved = resolve_features(&columns);
        let br = resolved.iter().find(|f| f.name == "Branch_mispred").unwrap();
        assert_eq!(
            br.source,
            FeatureSource::Column {
                name: "Branch_Misses".to_string(),
                index: 0,
            }
        );
    }

    #[test]
    fn unmatched_features_are_tagged_defaulted() {
        let resolved = resolve_features(&cols(&["cycles", "instructions"]));
        assert_eq!(resolved.len(), FEATURES.len());
        assert!(resolved.iter().all(|f| f.is_defaulted()));
    }

    #[test]
    fn resolution_preserves_feature_order() {
        let resolved = resolve_features(&cols(&[]));
        let names: Vec<&str> = resolved.iter().map(|f| f.name).collect();
        let expected: Vec<&str> = FEATURES.iter().map(|f| f.name).collect();
        assert_eq!(names, expected);
    }
}
