use parsweep_core::{suppress_repeated_keys, AggregateResult, Speedup};
use proptest::prelude::*;

fn key_rows() -> impl Strategy<Value = Vec<Vec<String>>> {
    let cell = prop::sample::select(vec!["10x10", "1000x1000", "3", "5", "seq", "par"]);
    prop::collection::vec(prop::collection::vec(cell.prop_map(String::from), 3), 0..12)
}

proptest! {
    #[test]
    fn first_row_is_never_blanked(rows in key_rows()) {
        let out = suppress_repeated_keys(&rows);
        if let (Some(first), Some(rendered)) = (rows.first(), out.first()) {
            prop_assert_eq!(first, rendered);
        }
    }

    #[test]
    fn blanks_form_a_prefix_of_unchanged_cells(rows in key_rows()) {
        let out = suppress_repeated_keys(&rows);
        prop_assert_eq!(out.len(), rows.len());
        for i in 1..rows.len() {
            let unchanged = rows[i].iter().zip(&rows[i - 1]).take_while(|(a, b)| a == b).count();
            for (j, cell) in out[i].iter().enumerate() {
                if j < unchanged {
                    prop_assert!(cell.is_empty());
                } else {
                    prop_assert_eq!(cell, &rows[i][j]);
                }
            }
        }
    }

    #[test]
    fn baseline_speedup_is_exactly_one(
        mean in 0.0f64..1e9,
        other in proptest::option::of(1.0f64..1e9),
    ) {
        let own = AggregateResult { mean, successes: 1, attempts: 1 };
        let base = other.map(|m| AggregateResult { mean: m, successes: 1, attempts: 1 });
        let speedup = Speedup::compute(base.as_ref(), &own, true);
        prop_assert_eq!(speedup.value(), Some(1.0));
    }

    #[test]
    fn missing_baseline_is_never_numeric(mean in 0.0f64..1e9) {
        let own = AggregateResult { mean, successes: 1, attempts: 1 };
        prop_assert_eq!(Speedup::compute(None, &own, false).value(), None);
    }
}

#[test]
fn documented_three_row_example() {
    let rows: Vec<Vec<String>> =
        [["10x10", "3", "seq"], ["10x10", "3", "par"], ["10x10", "5", "seq"]]
            .iter()
            .map(|r| r.iter().map(ToString::to_string).collect())
            .collect();
    let out = suppress_repeated_keys(&rows);
    assert_eq!(out[1], ["", "", "par"]);
    assert_eq!(out[2], ["", "5", "seq"]);
}
