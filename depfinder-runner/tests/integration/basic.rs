// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, ensure};
use depfinder_metadata::{DependencyRecord, TestOutcome};
use depfinder_runner::{
    config::DepfinderConfig,
    pool::{PoolConfig, WorkerPool},
    store::DependencyStore,
};
use fixture_data::{
    models::{FixtureSuite, Rule},
    scenarios::{self, Scenario},
};
use indoc::indoc;
use maplit::btreeset;
use pretty_assertions::assert_eq;
use test_case::test_case;

const CONFIG: &str = indoc! {r#"
    [profile.batch]
    workers = 2
    scratch-files = ["state.db"]
    max-passes = 6
"#};

#[test_case(scenarios::missing_setup(); "missing setup")]
#[test_case(scenarios::polluted_state(); "polluted state")]
#[test_case(scenarios::two_polluters(); "two polluters")]
#[test_case(scenarios::paired_setup(); "paired setup")]
#[test_case(scenarios::setup_and_polluter(); "setup and polluter")]
fn scenario_is_explained(scenario: Scenario) -> Result<()> {
    test_init();

    let workspace = Utf8TempDir::new()?;
    let config_path = workspace.path().join(DepfinderConfig::CONFIG_PATH);
    fs_err::create_dir_all(config_path.parent().expect("config path has a parent"))?;
    fs_err::write(&config_path, CONFIG)?;

    let config = DepfinderConfig::from_sources(workspace.path(), None)?;
    let profile = config.profile("batch")?;
    assert_eq!(profile.workers(), 2);
    assert_eq!(profile.max_passes(), Some(6));
    assert!(profile.scratch_dir().starts_with(workspace.path()));

    let oracle = SuiteOracle::new(&scenario.suite);
    let pool = WorkerPool::new(profile.pool_config(), &oracle);
    let (original, new) = pool.prepare_orders(scenario.original.clone(), scenario.new.clone())?;

    let store = DependencyStore::new();
    let report = pool.run(scenario.original.clone(), &original, &new, &store)?;
    ensure!(
        report.is_success(),
        "every target is explained: {:?}",
        report.unexplained
    );
    assert_eq!(report.order_dependent_count(), 1);

    let explanation = report
        .explained
        .iter()
        .find(|explanation| explanation.target == scenario.target)
        .expect("target was searched");
    assert!(explanation.order_dependent);

    // Honoring the records restores the intended outcome in the new order.
    let records = store.records_for(scenario.target.as_str());
    ensure!(!records.is_empty(), "records were stored for the target");
    let prefix = new
        .tests_before(scenario.target.as_str())
        .expect("target is in the new order");
    let mut order = prefix.to_vec();
    order.push(scenario.target.clone());
    for record in &records {
        order = record.fix_order(&order);
    }
    assert_eq!(
        scenario.suite.outcome_in(&order, scenario.target.as_str()),
        original.outcome(scenario.target.as_str()),
    );

    // The text form of every record parses back.
    let text = report.records_text();
    let parsed = text
        .split("\n\n")
        .map(|block| block.parse::<DependencyRecord>())
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(parsed, report.records);

    Ok(())
}

#[test]
fn many_targets_share_one_store() -> Result<()> {
    test_init();

    let suite = FixtureSuite::new(["a", "b", "c", "d"])
        .with_rule(Rule::requires_before("d", ["a"]))
        .with_rule(Rule::broken_by("b", ["d"]))
        .with_rule(Rule::broken_by("c", ["d"]));
    let oracle = SuiteOracle::new(&suite);

    let scratch = Utf8TempDir::new()?;
    let mut config = PoolConfig::new(3, scratch.path());
    config.scratch_files = vec!["state".into()];
    let pool = WorkerPool::new(config, &oracle);
    let (original, new) =
        pool.prepare_orders(names(&["a", "b", "c", "d"]), names(&["d", "c", "b", "a"]))?;
    assert_eq!(new.outcome("d"), Some(TestOutcome::Failure));
    assert_eq!(new.outcome("c"), Some(TestOutcome::Failure));
    assert_eq!(new.outcome("b"), Some(TestOutcome::Failure));

    let store = DependencyStore::new();
    let report = pool.run(names(&["a", "b", "c", "d"]), &original, &new, &store)?;
    ensure!(report.is_success(), "unexplained: {:?}", report.unexplained);
    assert_eq!(report.order_dependent_count(), 3);

    assert_eq!(store.known_dependencies("d"), btreeset! { "a".into() });
    assert_eq!(store.known_dependencies("b"), btreeset! { "d".into() });
    assert_eq!(store.known_dependencies("c"), btreeset! { "d".into() });
    assert_eq!(
        store.dependents_after("d"),
        btreeset! { "b".into(), "c".into() }
    );

    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    assert_eq!(json["explained"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["records"].as_array().map(Vec::len), Some(3));

    Ok(())
}
