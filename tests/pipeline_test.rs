mod common;

use common::{numbered, people};
use reclimit::{
    count, filter, update, CoercionPolicy, Condition, Engine, Operator, RowCap, Table, UpdateRule,
};

fn cap(n: usize) -> RowCap {
    RowCap::new(n).unwrap()
}

#[test]
fn test_filter_numeric_condition_skips_unparseable_rows() {
    let table = people();
    let result = filter(
        &table,
        &[Condition::new("age", Operator::GreaterThan, "26")],
        RowCap::UNLIMITED,
    );
    assert_eq!(result.header(), ["name", "age"]);
    assert_eq!(result.to_string_rows(), vec![vec!["Alice", "30"]]);
}

#[test]
fn test_update_rewrites_matching_cell_only() {
    let table = people();
    let result = update(
        &table,
        &[UpdateRule::new("age", Operator::LessThan, "28", "YOUNG")],
        RowCap::UNLIMITED,
    );
    assert_eq!(
        result.to_string_rows(),
        vec![
            vec!["Alice", "30"],
            vec!["Bob", "YOUNG"],
            vec!["Cara", "abc"],
        ]
    );
    // input is untouched
    assert_eq!(table.to_string_rows()[1], vec!["Bob", "25"]);
}

#[test]
fn test_update_rules_see_earlier_writes() {
    let table = Table::from_strings(["id", "x"], [["a", "5"]]).unwrap();
    let forward = [
        UpdateRule::new("x", Operator::Equals, "5", "10"),
        UpdateRule::new("x", Operator::Equals, "10", "DONE"),
    ];
    let result = update(&table, &forward, RowCap::UNLIMITED);
    assert_eq!(result.to_string_rows(), vec![vec!["a", "DONE"]]);

    let reversed = [
        UpdateRule::new("x", Operator::Equals, "10", "DONE"),
        UpdateRule::new("x", Operator::Equals, "5", "10"),
    ];
    let result = update(&table, &reversed, RowCap::UNLIMITED);
    assert_eq!(result.to_string_rows(), vec![vec!["a", "10"]]);
}

#[test]
fn test_cap_keeps_first_rows_in_order() {
    let table = numbered(10);
    let result = filter(&table, &[], cap(3));
    assert_eq!(
        result.to_string_rows(),
        vec![vec!["r0", "0"], vec!["r1", "10"], vec!["r2", "20"]]
    );
}

#[test]
fn test_cap_is_min_of_admitted_and_limit() {
    let table = numbered(10);
    let conditions = [Condition::new("value", Operator::GreaterOrEqual, "50")];
    for n in 1..=8 {
        let admitted = count(&table, &conditions, RowCap::UNLIMITED);
        assert_eq!(admitted, 5);
        assert_eq!(filter(&table, &conditions, cap(n)).num_rows(), n.min(admitted));
        assert_eq!(count(&table, &conditions, cap(n)), n.min(admitted));
    }
}

#[test]
fn test_filter_is_idempotent() {
    let table = people();
    let conditions = [
        Condition::new("age", Operator::LessOrEqual, "30"),
        Condition::new("name", Operator::NotContains, "x"),
    ];
    let once = filter(&table, &conditions, RowCap::UNLIMITED);
    let twice = filter(&once, &conditions, RowCap::UNLIMITED);
    assert_eq!(once, twice);
}

#[test]
fn test_adding_conditions_never_grows_result() {
    let table = numbered(20);
    let mut conditions = Vec::new();
    let mut previous = filter(&table, &conditions, RowCap::UNLIMITED).num_rows();
    for condition in [
        Condition::new("value", Operator::GreaterThan, "20"),
        Condition::new("value", Operator::LessThan, "150"),
        Condition::new("id", Operator::Contains, "1"),
    ] {
        conditions.push(condition);
        let next = filter(&table, &conditions, RowCap::UNLIMITED).num_rows();
        assert!(next <= previous);
        previous = next;
    }
    // r3..r14 survive the numeric bounds, of which r10..r14 contain a "1"
    assert_eq!(previous, 5);
}

#[test]
fn test_filter_output_is_ordered_subsequence() {
    let table = numbered(12);
    let result = filter(
        &table,
        &[Condition::new("value", Operator::Contains, "0")],
        RowCap::UNLIMITED,
    );
    let mut source = table.rows().iter();
    for row in result.rows() {
        assert!(source.any(|r| r == row));
    }
}

#[test]
fn test_operator_table() {
    let table = Table::from_strings(
        ["v"],
        [["10"], ["20"], ["abc"], [""], ["Apple pie"]],
    )
    .unwrap();
    let run = |op: Operator, literal: &str| -> Vec<String> {
        filter(&table, &[Condition::new("v", op, literal)], RowCap::UNLIMITED)
            .to_string_rows()
            .into_iter()
            .map(|mut r| r.remove(0))
            .collect()
    };

    assert_eq!(run(Operator::Equals, "10"), vec!["10"]);
    assert_eq!(run(Operator::GreaterThan, "10"), vec!["20"]);
    assert_eq!(run(Operator::LessThan, "20"), vec!["10"]);
    assert_eq!(run(Operator::GreaterOrEqual, "10"), vec!["10", "20"]);
    assert_eq!(run(Operator::LessOrEqual, "20"), vec!["10", "20"]);
    assert_eq!(run(Operator::Contains, "PIE"), vec!["Apple pie"]);
    assert_eq!(
        run(Operator::NotContains, "pie"),
        vec!["10", "20", "abc", ""]
    );
}

#[test]
fn test_inert_conditions_admit_everything() {
    let table = people();
    let conditions = [
        Condition::new("age", Operator::NoOp, "30"),
        Condition::new("name", Operator::Equals, ""),
    ];
    assert_eq!(count(&table, &conditions, RowCap::UNLIMITED), 3);
}

#[test]
fn test_unknown_column_admits_nothing() {
    let table = people();
    let conditions = [Condition::new("height", Operator::NoOp, "")];
    let result = filter(&table, &conditions, RowCap::UNLIMITED);
    assert!(result.is_empty());
    assert_eq!(result.header(), table.header());
}

#[test]
fn test_update_skips_unknown_column() {
    let table = people();
    let rules = [
        UpdateRule::new("height", Operator::Equals, "1", "2"),
        UpdateRule::new("name", Operator::Equals, "Bob", "Robert"),
    ];
    let result = update(&table, &rules, RowCap::UNLIMITED);
    assert_eq!(result.to_string_rows()[1], vec!["Robert", "25"]);
}

#[test]
fn test_update_truncates_after_rules() {
    let table = numbered(5);
    let rules = [UpdateRule::new("value", Operator::GreaterThan, "25", "big")];
    let result = update(&table, &rules, cap(4));
    assert_eq!(
        result.to_string_rows(),
        vec![
            vec!["r0", "0"],
            vec!["r1", "10"],
            vec!["r2", "20"],
            vec!["r3", "big"],
        ]
    );
}

#[test]
fn test_column_policy_bypasses_condition_on_dirty_column() {
    let table = people();
    let engine = Engine::new(CoercionPolicy::ColumnScoped);
    let conditions = [Condition::new("age", Operator::GreaterThan, "26")];

    // "abc" in the column disables the comparison, so every row passes
    assert_eq!(engine.count(&table, &conditions, RowCap::UNLIMITED), 3);

    let clean = Table::from_strings(["age"], [["30"], ["25"], [""]]).unwrap();
    assert_eq!(
        engine
            .filter(&clean, &conditions, RowCap::UNLIMITED)
            .to_string_rows(),
        vec![vec!["30"]]
    );
}

#[test]
fn test_column_policy_skips_update_rule_on_dirty_column() {
    let table = people();
    let engine = Engine::new(CoercionPolicy::ColumnScoped);
    let rules = [UpdateRule::new("age", Operator::LessThan, "28", "YOUNG")];
    let result = engine.update(&table, &rules, RowCap::UNLIMITED);
    assert_eq!(result, table);
}

#[test]
fn test_non_numeric_literal_rejects_all_rows() {
    let table = numbered(4);
    let conditions = [Condition::new("value", Operator::GreaterThan, "ten")];
    assert_eq!(count(&table, &conditions, RowCap::UNLIMITED), 0);
}

#[test]
fn test_row_cap_parse() {
    assert!(RowCap::parse("").unwrap().is_unlimited());
    assert!(RowCap::parse("   ").unwrap().is_unlimited());
    assert_eq!(RowCap::parse(" 7 ").unwrap().limit(), Some(7));
    assert!(RowCap::parse("0").is_err());
    assert!(RowCap::parse("-3").is_err());
    assert!(RowCap::parse("2.5").is_err());
    assert!(RowCap::parse("many").is_err());
}

#[test]
fn test_same_text_and_number_compare_consistently() {
    use reclimit::evaluate;
    let cell = reclimit::Cell::Text("10".into());
    assert!(evaluate(&cell, Operator::Equals, "10"));
    assert!(!evaluate(&cell, Operator::GreaterThan, "10"));
    assert!(evaluate(&cell, Operator::GreaterOrEqual, "10"));
    let number = reclimit::Cell::Number(10.0);
    assert!(evaluate(&number, Operator::Equals, "10"));
    assert!(evaluate(&number, Operator::LessOrEqual, "10.0"));
}

#[test]
fn test_row_policy_contains_coercion_failures() {
    let table = Table::from_strings(
        ["name", "age"],
        [["a", "40"], ["b", "n/a"], ["c", ""], ["d", "35"]],
    )
    .unwrap();
    let result = filter(
        &table,
        &[Condition::new("age", Operator::GreaterThan, "30")],
        RowCap::UNLIMITED,
    );
    assert_eq!(
        result.to_string_rows(),
        vec![vec!["a", "40"], vec!["d", "35"]]
    );
}

#[test]
fn test_column_policy_checks_whole_input_column() {
    let table = Table::from_strings(["name", "age"], [["a", "40"], ["b", "n/a"]]).unwrap();
    let engine = Engine::new(CoercionPolicy::ColumnScoped);
    let conditions = [
        Condition::new("name", Operator::Equals, "a"),
        Condition::new("age", Operator::GreaterThan, "50"),
    ];
    // "n/a" is already excluded by the first condition, yet it still disables the second
    assert_eq!(
        engine
            .filter(&table, &conditions, RowCap::UNLIMITED)
            .to_string_rows(),
        vec![vec!["a", "40"]]
    );
    assert_eq!(count(&table, &conditions, RowCap::UNLIMITED), 0);
}
