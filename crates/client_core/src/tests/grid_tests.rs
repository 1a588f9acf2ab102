use super::*;

fn inputs(start: f64, end: f64, pct: f64, asset: f64) -> GridInputs {
    GridInputs {
        start_price: start,
        end_price: end,
        grid_percent: pct,
        start_asset: asset,
    }
}

#[test]
fn long_plan_buys_down_to_end_price() {
    let plan = plan(GridSide::Long, &inputs(100.0, 80.0, 10.0, 300.0)).expect("plan");
    let prices: Vec<f64> = plan.levels.iter().map(|l| l.price).collect();
    assert_eq!(prices.len(), 3);
    assert!((prices[1] - 90.0).abs() < 1e-9);
    assert!((prices[2] - 81.0).abs() < 1e-9);

    for level in &plan.levels {
        assert!((level.currency - 100.0).abs() < 1e-9);
        assert!((level.quantity * level.price - 100.0).abs() < 1e-9);
    }
    assert!((plan.total_currency - 300.0).abs() < 1e-9);
    let avg = plan.average_price().expect("average");
    assert!(avg < 100.0 && avg > 81.0);
}

#[test]
fn short_plan_sells_up_to_end_price() {
    let plan = plan(GridSide::Short, &inputs(10.0, 12.0, 10.0, 4.0)).expect("plan");
    assert_eq!(plan.levels.len(), 2);
    assert_eq!(plan.levels[1].index, 1);
    assert!((plan.levels[1].price - 11.0).abs() < 1e-9);
    assert!((plan.total_quantity - 4.0).abs() < 1e-9);
    assert!((plan.total_currency - 42.0).abs() < 1e-9);
}

#[test]
fn end_price_equal_to_a_level_is_included() {
    // 100 * 1.1 * 1.1 lands just above 121 in binary floating point
    let short = plan(GridSide::Short, &inputs(100.0, 121.0, 10.0, 3.0)).expect("plan");
    assert_eq!(short.levels.len(), 3);
    assert!((short.levels[2].price - 121.0).abs() < 1e-9);

    let long = plan(GridSide::Long, &inputs(100.0, 81.0, 10.0, 300.0)).expect("plan");
    assert_eq!(long.levels.len(), 3);
    assert!((long.levels[2].price - 81.0).abs() < 1e-9);
}

#[test]
fn level_just_past_end_price_is_excluded() {
    let short = plan(GridSide::Short, &inputs(100.0, 120.99, 10.0, 3.0)).expect("plan");
    assert_eq!(short.levels.len(), 2);

    let long = plan(GridSide::Long, &inputs(100.0, 81.01, 10.0, 300.0)).expect("plan");
    assert_eq!(long.levels.len(), 2);
}

#[test]
fn range_must_match_side() {
    assert_eq!(
        plan(GridSide::Long, &inputs(80.0, 100.0, 1.0, 10.0)),
        Err(GridPlanError::InvalidRange {
            side: GridSide::Long,
            expected: "above",
        })
    );
    assert_eq!(
        plan(GridSide::Short, &inputs(100.0, 100.0, 1.0, 10.0)),
        Err(GridPlanError::InvalidRange {
            side: GridSide::Short,
            expected: "below",
        })
    );
}

#[test]
fn percent_is_bounded() {
    assert_eq!(
        plan(GridSide::Long, &inputs(100.0, 80.0, 0.05, 10.0)),
        Err(GridPlanError::PercentOutOfRange(0.05))
    );
    assert_eq!(
        plan(GridSide::Long, &inputs(100.0, 80.0, 25.0, 10.0)),
        Err(GridPlanError::PercentOutOfRange(25.0))
    );
    plan(GridSide::Long, &inputs(100.0, 80.0, MAX_GRID_PERCENT, 10.0)).expect("upper bound");
}

#[test]
fn oversized_plans_are_refused() {
    let err = plan(GridSide::Short, &inputs(1.0, 1e12, MIN_GRID_PERCENT, 10.0))
        .expect_err("should fail");
    assert_eq!(err, GridPlanError::TooManyLevels);
}

#[test]
fn parse_reports_the_offending_field() {
    assert_eq!(
        GridInputs::parse("100", "eighty", "1", "10"),
        Err(GridPlanError::NotNumeric("end price"))
    );
    assert_eq!(
        GridInputs::parse("100", "80", "1", "-5"),
        Err(GridPlanError::NotPositive("start asset"))
    );
    let parsed = GridInputs::parse(" 100 ", "80", "2.5", "1000").expect("parse");
    assert_eq!(parsed, inputs(100.0, 80.0, 2.5, 1000.0));
}
