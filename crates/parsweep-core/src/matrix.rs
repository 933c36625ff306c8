//! Expand a sweep into its ordered list of work items

use crate::config::SweepConfig;
use crate::types::{Strategy, Variant, WorkItem};

/// Enumerate every (test case, variant) pair of `config`.
///
/// Order: targets in declaration order, then cases, then layouts. Within one
/// (target, case, layout) the sequential baseline comes first, followed by one
/// parallel item per non-zero degree and strategy. A degree of `0` names the
/// baseline and adds nothing.
pub fn build_matrix(config: &SweepConfig) -> Vec<WorkItem> {
    let mut items = Vec::new();
    let baseline_strategy = if config.in_place { Strategy::InPlace } else { Strategy::None };

    for target in &config.targets {
        for (case_index, case) in config.cases.iter().enumerate() {
            for layout in target.layout_axis() {
                let push = |items: &mut Vec<WorkItem>, variant: Variant| {
                    items.push(WorkItem { case_index, case: case.clone(), variant });
                };

                let baseline = Variant {
                    strategy: baseline_strategy.clone(),
                    ..Variant::baseline(&target.name, layout.clone())
                };
                push(&mut items, baseline);

                for &degree in case.degrees.iter().filter(|&&d| d > 0) {
                    if config.in_place {
                        push(
                            &mut items,
                            Variant::parallel(
                                &target.name,
                                degree,
                                Strategy::InPlace,
                                layout.clone(),
                            ),
                        );
                        continue;
                    }
                    for strategy in config.strategies_for(case) {
                        push(
                            &mut items,
                            Variant::parallel(
                                &target.name,
                                degree,
                                Strategy::Named(strategy.clone()),
                                layout.clone(),
                            ),
                        );
                    }
                }
            }
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SweepCatalog, TargetSpec};
    use crate::oracle::ValidationPolicy;
    use crate::types::{Mode, ProblemShape, TestCase};
    use std::path::PathBuf;

    fn sweep(cases: Vec<TestCase>, strategies: &[&str], in_place: bool) -> SweepConfig {
        SweepConfig {
            name: "t".into(),
            title: "T".into(),
            runs: 1,
            strategies: strategies.iter().map(ToString::to_string).collect(),
            in_place,
            validation: ValidationPolicy::PerRunBaseline,
            degree_header: "Threads".into(),
            report_path: None,
            data_dir: PathBuf::from("data"),
            scratch_dir: PathBuf::from(".parsweep"),
            inputs: Default::default(),
            targets: vec![TargetSpec::flags("cpp", "C++", &["./conv"])],
            cases,
        }
    }

    fn grid(degrees: &[u32]) -> TestCase {
        TestCase::new(ProblemShape::Grid { rows: 10, cols: 10, kernel: 3 }, degrees)
    }

    #[test]
    fn baseline_plus_degree_strategy_cross_product() {
        let items = build_matrix(&sweep(vec![grid(&[1, 2, 4])], &["A", "B"], false));
        assert_eq!(items.len(), 7);
        assert!(items[0].variant.is_baseline());
        assert_eq!(items[0].variant.strategy, Strategy::None);

        let pairs: Vec<(u32, String)> = items[1..]
            .iter()
            .map(|i| (i.variant.degree.unwrap(), i.variant.strategy.to_string()))
            .collect();
        let expected: Vec<(u32, String)> =
            [(1, "A"), (1, "B"), (2, "A"), (2, "B"), (4, "A"), (4, "B")]
                .iter()
                .map(|&(d, s)| (d, s.to_string()))
                .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn empty_degrees_yield_only_baseline() {
        let items = build_matrix(&sweep(vec![grid(&[])], &["A"], false));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].variant.mode, Mode::Sequential);
    }

    #[test]
    fn in_place_zero_degree_is_the_baseline() {
        let items = build_matrix(&sweep(vec![grid(&[0, 2])], &[], true));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].variant.mode, Mode::Sequential);
        assert_eq!(items[0].variant.strategy, Strategy::InPlace);
        assert_eq!(items[1].variant.degree, Some(2));
        assert_eq!(items[1].variant.strategy, Strategy::InPlace);
    }

    #[test]
    fn layouts_multiply_items_per_target() {
        let catalog = SweepCatalog::builtin();
        let config = catalog.get("layouts").unwrap();
        let items = build_matrix(config);

        let cpp_first_case: Vec<_> = items
            .iter()
            .filter(|i| i.variant.target == "cpp" && i.case_index == 0)
            .collect();
        // (baseline + 1 degree x 3 strategies) per layout
        assert_eq!(cpp_first_case.len(), 8);
        assert_eq!(cpp_first_case[0].variant.layout.as_deref(), Some("static"));
        assert_eq!(cpp_first_case[4].variant.layout.as_deref(), Some("vector"));
        assert!(cpp_first_case[4].variant.is_baseline());
    }

    #[test]
    fn targets_iterate_outermost() {
        let catalog = SweepCatalog::builtin();
        let items = build_matrix(catalog.get("lab1").unwrap());
        let first_java = items.iter().position(|i| i.variant.target == "java").unwrap();
        assert!(items[..first_java].iter().all(|i| i.variant.target == "cpp"));
        assert!(items[first_java..].iter().all(|i| i.variant.target == "java"));
        // 4 + 16 + 13 + 13 per target
        assert_eq!(first_java, 46);
    }
}
