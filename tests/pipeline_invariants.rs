//! 端到端场景与流水线性质测试

use chrono::{DateTime, Duration, TimeZone, Utc};
use moses_pipeline::strategy::portfolio::MVO_TAG;
use moses_pipeline::strategy::{
    AllocationMethod, ExecutionPlanner, InstitutionalRiskModel, MeanVarianceConstructor,
};
use moses_pipeline::{
    AlgorithmContext, AlgorithmFramework, ExecutionModel, Holding, Insight, InsightCollection,
    InsightDirection, MarketSnapshot, OrderAction, PipelineConfig, PortfolioState, PortfolioTarget,
    RiskManagementModel, Scorecard,
};
use proptest::prelude::*;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap()
}

fn scenario_context() -> AlgorithmContext {
    AlgorithmContext::new(
        t0(),
        vec!["AAPL".to_string(), "TSLA".to_string(), "NVDA".to_string()],
        PortfolioState::new(100_000.0).with_position("AAPL", Holding::long(100.0)),
        MarketSnapshot::default()
            .with_price("AAPL", 150.0)
            .with_price("TSLA", 200.0)
            .with_price("NVDA", 500.0)
            .with_scorecard("AAPL", Scorecard::default().with_metric("altman_z", 3.5))
            .with_scorecard("TSLA", Scorecard::default().with_metric("altman_z", 1.2))
            .with_scorecard("NVDA", Scorecard::default().with_metric("altman_z", 4.0)),
    )
}

fn scenario_insights() -> Vec<Insight> {
    vec![
        Insight::price(
            "AAPL",
            t0(),
            Duration::days(1),
            InsightDirection::Up,
            0.05,
            0.8,
            "BuffettModel",
        )
        .unwrap(),
        Insight::price(
            "TSLA",
            t0(),
            Duration::days(1),
            InsightDirection::Up,
            0.03,
            0.6,
            "MomentumModel",
        )
        .unwrap(),
        Insight::price(
            "NVDA",
            t0(),
            Duration::days(1),
            InsightDirection::Down,
            -0.02,
            0.7,
            "BurryModel",
        )
        .unwrap(),
    ]
}

#[test]
fn end_to_end_scenario() {
    let framework = AlgorithmFramework::from_config(&PipelineConfig::default());
    let mut context = scenario_context();

    let result = framework.run_cycle(&mut context, &scenario_insights()).unwrap();

    assert_eq!(result.insights_generated, 3);
    let symbols: Vec<_> = result.targets.iter().map(|t| t.symbol()).collect();
    assert_eq!(symbols, vec!["AAPL", "NVDA", "TSLA"]);
    assert!(result.targets.iter().all(|t| t.tag() == Some(MVO_TAG)));

    let exposure: f64 = result
        .targets
        .iter()
        .map(|t| t.quantity() * context.price(t.symbol()).unwrap() / context.equity())
        .sum();
    assert!((exposure - 1.0).abs() < 1e-6);

    let adjusted = |symbol: &str| {
        result
            .adjusted_targets
            .iter()
            .find(|t| t.symbol() == symbol)
            .map(|t| t.quantity())
            .unwrap()
    };
    assert_eq!(adjusted("TSLA"), 0.0);
    for target in &result.adjusted_targets {
        let notional = (target.quantity() * context.price(target.symbol()).unwrap()).abs();
        assert!(notional <= 20_000.0 + 1e-6, "{} notional {}", target.symbol(), notional);
    }

    assert!(result.orders.iter().all(|o| o.quantity >= 0.0));

    // 等权组合恰好落在默认 0.02 回报下限上，求解后 AAPL 与 NVDA 均被集中度上限截断
    let aapl_target = adjusted("AAPL");
    assert_eq!(aapl_target, 133.0);
    assert_eq!(adjusted("NVDA"), 40.0);

    let aapl_order = result.orders.iter().find(|o| o.ticker == "AAPL").unwrap();
    assert_eq!(aapl_order.action, OrderAction::Buy);
    assert_eq!(aapl_order.quantity, (aapl_target - 100.0).abs());
    assert_eq!(aapl_order.quantity, 33.0);
}

#[test]
fn scenario_construction_solves_at_default_return_floor() {
    let constructor = MeanVarianceConstructor::new(PipelineConfig::default().construction);
    let context = scenario_context();

    let outcome = constructor.construct(&scenario_insights(), &context);

    assert_eq!(outcome.method, AllocationMethod::MeanVariance);
    assert!((outcome.implied_exposure(&context) - 1.0).abs() < 1e-6);
    assert!(outcome.expected_returns.dot(&outcome.weights) >= 0.02 - 1e-9);
    assert!(outcome.weights.iter().all(|w| (-1.0 - 1e-9..=1.0 + 1e-9).contains(w)));
}

#[test]
fn end_to_end_is_deterministic() {
    let config = PipelineConfig::default();
    let first = AlgorithmFramework::from_config(&config)
        .run_cycle(&mut scenario_context(), &scenario_insights())
        .unwrap();
    let second = AlgorithmFramework::from_config(&config)
        .run_cycle(&mut scenario_context(), &scenario_insights())
        .unwrap();

    assert_eq!(first.targets, second.targets);
    assert_eq!(first.orders, second.orders);
}

#[test]
fn expiry_boundary_is_exact() {
    let period = Duration::hours(6);
    let insight =
        Insight::price("AAPL", t0(), period, InsightDirection::Up, 0.01, 0.5, "M").unwrap();
    let mut collection = InsightCollection::new();
    collection.add(&[insight]);

    let just_before = t0() + period - Duration::nanoseconds(1);
    assert_eq!(collection.get_active_insights(just_before).len(), 1);
    assert!(collection.get_active_insights(t0() + period).is_empty());
}

fn insight_batch() -> impl Strategy<Value = Vec<Insight>> {
    prop::collection::vec((0usize..3, 0usize..2, -0.1f64..0.1), 1..24).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (symbol, model, magnitude))| {
                Insight::price(
                    ["AAPL", "TSLA", "NVDA"][symbol],
                    t0() + Duration::minutes(i as i64),
                    Duration::days(1),
                    InsightDirection::Flat,
                    magnitude,
                    0.5,
                    ["M1", "M2"][model],
                )
                .unwrap()
            })
            .collect()
    })
}

fn summary(collection: &InsightCollection) -> Vec<(String, String, DateTime<Utc>, f64)> {
    collection
        .get_active_insights(t0() + Duration::hours(2))
        .into_iter()
        .map(|i| {
            (
                i.symbol().to_string(),
                i.source_model().to_string(),
                i.generated_time(),
                i.magnitude(),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn replacement_is_independent_of_batch_order(
        (original, shuffled) in insight_batch()
            .prop_flat_map(|batch| (Just(batch.clone()), Just(batch).prop_shuffle()))
    ) {
        let mut forward = InsightCollection::new();
        forward.add(&original);
        let mut permuted = InsightCollection::new();
        for insight in &shuffled {
            permuted.add(std::iter::once(insight));
        }

        prop_assert_eq!(summary(&forward), summary(&permuted));
        prop_assert!(forward.len() <= 6);
    }

    #[test]
    fn concentration_cap_holds(
        equity in 1_000.0f64..10_000_000.0,
        price in 1.0f64..1_000.0,
        quantity in -1_000_000.0f64..1_000_000.0,
    ) {
        let context = AlgorithmContext::new(
            t0(),
            vec!["AAPL".to_string()],
            PortfolioState::new(equity),
            MarketSnapshot::default().with_price("AAPL", price),
        );
        let adjusted = InstitutionalRiskModel::default()
            .adjust_targets(&[PortfolioTarget::new("AAPL", quantity)], &context)
            .unwrap();

        prop_assert_eq!(adjusted.len(), 1);
        let q = adjusted[0].quantity();
        prop_assert!((q * price).abs() <= 0.20 * equity * (1.0 + 1e-12));
        prop_assert!(q.abs() <= quantity.abs());
        prop_assert!(q * quantity >= 0.0);
    }

    #[test]
    fn distressed_targets_are_vetoed(z in 0.001f64..1.799, quantity in -100.0f64..100.0) {
        let context = AlgorithmContext::new(
            t0(),
            vec!["TSLA".to_string()],
            PortfolioState::new(100_000.0),
            MarketSnapshot::default()
                .with_price("TSLA", 200.0)
                .with_scorecard("TSLA", Scorecard::default().with_metric("altman_z", z)),
        );
        let adjusted = InstitutionalRiskModel::default()
            .adjust_targets(&[PortfolioTarget::new("TSLA", quantity)], &context)
            .unwrap();

        prop_assert_eq!(adjusted[0].quantity(), 0.0);
    }

    #[test]
    fn holding_targets_produce_no_orders(held in -1_000.0f64..1_000.0, price in 1.0f64..1_000.0) {
        let holding = if held >= 0.0 { Holding::long(held) } else { Holding::short(-held) };
        let context = AlgorithmContext::new(
            t0(),
            vec!["AAPL".to_string()],
            PortfolioState::new(100_000.0).with_position("AAPL", holding),
            MarketSnapshot::default().with_price("AAPL", price),
        );
        let orders = ExecutionPlanner::default()
            .execute(&[PortfolioTarget::new("AAPL", held)], &context)
            .unwrap();

        prop_assert!(orders.is_empty());
    }
}
