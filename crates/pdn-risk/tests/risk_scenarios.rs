use pdn_core::{
    Amperes, Category, EdgeRecord, EdgeTable, FeederId, FeederRoots, Kilovolts, Kilowatts,
    NetworkSnapshot, NodeId, NodeRecord, NodeTable, TieLines,
};
use pdn_risk::{overload::unabsorbed_injection, RiskConfig, RiskEngine, TotalRiskRule};

fn n(id: u32) -> NodeId {
    NodeId::new(id)
}

/// Capacity in kW of a line with impedance magnitude `z` at 10 kV, cos φ = 0.9.
fn expected_capacity(z: f64) -> f64 {
    1e4 * 1e4 / z * 0.9 * 1e-3
}

/// N1 - N2 - N3 on CB1; CB2 and CB3 anchored at isolated nodes 4 and 5.
fn chain(demand_3: f64, length_12: f64) -> NetworkSnapshot {
    let mut nodes = NodeTable::new();
    nodes.insert(n(1), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb1));
    nodes.insert(n(2), NodeRecord::new(Category::Office, 120.0, FeederId::Cb1));
    nodes.insert(n(3), NodeRecord::new(Category::Commercial, demand_3, FeederId::Cb1));
    nodes.insert(n(4), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb2));
    nodes.insert(n(5), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb3));
    let mut edges = EdgeTable::new();
    edges.insert(n(1), n(2), EdgeRecord::line(length_12, 60.0, 80.0));
    edges.insert(n(2), n(3), EdgeRecord::line(0.5, 30.0, 40.0));
    NetworkSnapshot::new(nodes, edges, FeederRoots::new(n(1), n(4), n(5)))
}

/// Two feeders joined by a tie line, plus a node reachable only over a tie.
fn meshed() -> NetworkSnapshot {
    let mut nodes = NodeTable::new();
    nodes.insert(n(1), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb1));
    nodes.insert(n(2), NodeRecord::new(Category::Residential, 200.0, FeederId::Cb1));
    nodes.insert(n(3), NodeRecord::new(Category::Government, 150.0, FeederId::Cb1));
    nodes.insert(n(10), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb2));
    nodes.insert(n(11), NodeRecord::new(Category::Commercial, 90.0, FeederId::Cb2));
    nodes.insert(n(20), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb3));
    nodes.insert(n(21), NodeRecord::new(Category::Office, 60.0, FeederId::Cb3));
    let mut edges = EdgeTable::new();
    edges.insert(n(1), n(2), EdgeRecord::line(1.0, 60.0, 80.0));
    edges.insert(n(2), n(3), EdgeRecord::line(1.0, 120.0, 160.0));
    edges.insert(n(1), n(3), EdgeRecord::line(2.0, 150.0, 200.0));
    edges.insert(n(10), n(11), EdgeRecord::line(1.0, 60.0, 80.0));
    edges.insert(n(20), n(21), EdgeRecord::line(0.4, 30.0, 40.0));
    edges.insert(n(3), n(11), EdgeRecord::line(1.5, 60.0, 80.0).as_tie("S11-1"));
    edges.insert(n(2), n(30), EdgeRecord::line(0.7, 60.0, 80.0).as_tie("S30-2"));
    nodes.insert(n(30), NodeRecord::new(Category::Residential, 80.0, FeederId::Cb1));
    NetworkSnapshot::new(nodes, edges, FeederRoots::new(n(1), n(10), n(20)))
}

#[test]
fn chain_capacity_and_transfer() {
    let engine = RiskEngine::new(chain(300.0, 1.0), RiskConfig::default()).unwrap();
    let c12 = engine.capacity(n(1), n(2)).value();
    let c23 = engine.capacity(n(3), n(2)).value();
    assert!((c12 - expected_capacity(100.0)).abs() < 1e-6);
    assert!((c23 - expected_capacity(50.0)).abs() < 1e-6);

    let transfer = engine.max_transfer(FeederId::Cb1, n(3), TieLines::Excluded);
    assert!((transfer.value() - c12.min(c23)).abs() < 1e-6);
}

#[test]
fn capacity_is_capped_and_non_negative() {
    let mut config = RiskConfig::default();
    config.electrical.feeder_rating_kw = Some(500.0);
    let engine = RiskEngine::new(chain(300.0, 1.0), config).unwrap();
    assert_eq!(engine.capacity(n(1), n(2)).value(), 500.0);
    assert_eq!(engine.capacity(n(1), n(3)).value(), 0.0);
}

#[test]
fn dg_endpoint_raises_capacity() {
    let mut snapshot = chain(300.0, 1.0);
    if let Some(record) = snapshot.nodes.get_mut(&n(2)) {
        record.has_dg = true;
    }
    let engine = RiskEngine::new(snapshot, RiskConfig::default()).unwrap();
    let expected = expected_capacity(100.0) + 300.0;
    assert!((engine.capacity(n(1), n(2)).value() - expected).abs() < 1e-6);
}

#[test]
fn same_feeder_and_sink_transfers_nothing() {
    let engine = RiskEngine::new(meshed(), RiskConfig::default()).unwrap();
    for feeder in FeederId::ALL {
        let root = engine.topology().feeder_root(feeder);
        assert_eq!(engine.max_transfer(feeder, root, TieLines::Allowed).value(), 0.0);
    }
}

#[test]
fn tie_only_node_needs_closed_ties() {
    let engine = RiskEngine::new(meshed(), RiskConfig::default()).unwrap();
    let open = engine.max_transfer(FeederId::Cb1, n(30), TieLines::Excluded);
    let closed = engine.max_transfer(FeederId::Cb1, n(30), TieLines::Allowed);
    assert_eq!(open.value(), 0.0);
    assert!(closed.value() >= 0.0);
    assert!((closed.value() - expected_capacity(100.0)).abs() < 1e-6);

    let cross = engine.max_transfer(FeederId::Cb2, n(3), TieLines::Excluded);
    assert_eq!(cross.value(), 0.0);
    assert!(engine.max_transfer(FeederId::Cb2, n(3), TieLines::Allowed).value() > 0.0);
}

#[test]
fn transfer_respects_cut_bound() {
    let engine = RiskEngine::new(meshed(), RiskConfig::default()).unwrap();
    let topology = engine.topology();
    for sink in topology.node_ids() {
        let incident: f64 = topology
            .neighbors(sink)
            .into_iter()
            .map(|j| engine.capacity(sink, j).value())
            .sum();
        for feeder in FeederId::ALL {
            let transfer = engine.max_transfer(feeder, sink, TieLines::Allowed).value();
            assert!(
                transfer <= incident + 1e-6,
                "transfer {transfer} into {sink} exceeds incident capacity {incident}"
            );
        }
    }
}

#[test]
fn meshed_flow_uses_parallel_paths() {
    let engine = RiskEngine::new(meshed(), RiskConfig::default()).unwrap();
    let flow = engine.max_flow(n(1), n(3), TieLines::Excluded);
    // Direct (1, 3) plus the path through 2 limited by (2, 3)
    let expected = expected_capacity(250.0) + expected_capacity(200.0);
    assert!((flow.value.value() - expected).abs() < 1e-6);
    assert_eq!(flow.augmenting_paths, 2);
}

#[test]
fn reference_node_risk_is_five() {
    let mut nodes = NodeTable::new();
    nodes.insert(n(1), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb1));
    nodes.insert(n(2), NodeRecord::new(Category::Commercial, 500.0, FeederId::Cb1));
    nodes.insert(n(3), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb2));
    nodes.insert(n(4), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb3));
    let mut edges = EdgeTable::new();
    edges.insert(n(1), n(2), EdgeRecord::line(1.0, 180.0, 240.0));
    let snapshot = NetworkSnapshot::new(nodes, edges, FeederRoots::new(n(1), n(3), n(4)));
    let engine = RiskEngine::new(snapshot, RiskConfig::default()).unwrap();

    let risk = engine.node_load_loss(n(2)).unwrap().unwrap();
    assert!((risk.restoration_kw - 300.0).abs() < 1e-6);
    assert!((risk.load_loss_kw - 200.0).abs() < 1e-6);
    assert!((risk.risk - 5.0).abs() < 1e-6);

    let report = engine.comprehensive_risk_analysis().unwrap();
    assert!((report.load_loss_risk - 5.0).abs() < 1e-6);
    assert!((report.load_loss_consequence - 500.0).abs() < 1e-6);
}

#[test]
fn failure_probability_grows_with_length() {
    let short = RiskEngine::new(chain(300.0, 1.0), RiskConfig::default()).unwrap();
    let long = RiskEngine::new(chain(300.0, 4.0), RiskConfig::default()).unwrap();
    let p_short = short.line_failure_probability(n(1), n(2)).unwrap();
    let p_long = long.line_failure_probability(n(1), n(2)).unwrap();
    assert!(p_long > p_short);
    assert!(
        long.network_failure_probability().unwrap() > short.network_failure_probability().unwrap()
    );
}

#[test]
fn load_loss_risk_grows_with_demand() {
    let mut previous = 0.0;
    for demand in [0.0, 500.0, 900.0, 1_500.0, 3_000.0] {
        let engine = RiskEngine::new(chain(demand, 1.0), RiskConfig::default()).unwrap();
        let risk = engine.network_load_loss_risk().unwrap();
        assert!(risk >= previous, "risk fell from {previous} to {risk} at {demand} kW");
        previous = risk;
    }
    assert!(previous > 0.0);
}

#[test]
fn demand_on_feeder_root_is_unrestorable_from_own_feeder() {
    let mut engine = RiskEngine::new(chain(300.0, 1.0), RiskConfig::default()).unwrap();
    engine
        .overlay_mut()
        .set_demand(n(1), Kilowatts(100.0))
        .unwrap();
    let root = engine.node_load_loss(n(1)).unwrap().unwrap();
    assert_eq!(root.restoration_kw, 0.0);
    assert_eq!(root.load_loss_kw, 100.0);
    assert!((root.risk - 100.0 * 1.0 * 0.01).abs() < 1e-12);
}

#[test]
fn surplus_neighbors_absorb_nothing() {
    let mut engine = RiskEngine::new(chain(300.0, 1.0), RiskConfig::default()).unwrap();
    engine
        .overlay_mut()
        .set_dg_output(n(2), Kilowatts(400.0))
        .unwrap();
    // 280 kW surplus fits into the 300 kW demand at node 3
    assert_eq!(unabsorbed_injection(&engine, n(2)).value(), 0.0);

    // Node 3 now exports 700 kW itself; its headroom is zero, not negative
    engine
        .overlay_mut()
        .set_dg_output(n(3), Kilowatts(1_000.0))
        .unwrap();
    assert!((unabsorbed_injection(&engine, n(2)).value() - 280.0).abs() < 1e-9);
    assert_eq!(unabsorbed_injection(&engine, n(1)).value(), 0.0);
    assert_eq!(unabsorbed_injection(&engine, n(99)).value(), 0.0);
}

fn overload_case(dg_kw: f64) -> RiskEngine {
    let mut nodes = NodeTable::new();
    nodes.insert(n(1), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb1));
    nodes.insert(
        n(2),
        NodeRecord::new(Category::Residential, 0.0, FeederId::Cb1).with_dg(Some(dg_kw)),
    );
    nodes.insert(n(3), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb2));
    nodes.insert(n(4), NodeRecord::new(Category::Residential, 0.0, FeederId::Cb3));
    let mut edges = EdgeTable::new();
    edges.insert(n(1), n(2), EdgeRecord::line(1.0, 0.3, 0.4));
    let snapshot = NetworkSnapshot::new(nodes, edges, FeederRoots::new(n(1), n(3), n(4)));
    RiskEngine::new(snapshot, RiskConfig::default()).unwrap()
}

#[test]
fn overload_boundary_at_threshold_current() {
    // Power that produces exactly 1.1 · 220 A at 10 kV, cos φ = 0.9
    let boundary = Amperes(242.0).active_power(Kilovolts(10.0), 0.9).value();

    let below = overload_case(boundary * (1.0 - 1e-6));
    let line = below.line_overload(n(1), n(2)).unwrap().unwrap();
    assert!(!line.overloaded);
    assert_eq!(line.consequence, 0.0);

    let above = overload_case(boundary * (1.0 + 1e-6));
    let line = above.line_overload(n(1), n(2)).unwrap().unwrap();
    assert!(line.overloaded);
    assert!(line.consequence > 0.0);

    let summary = above.overload_summary().unwrap();
    assert_eq!(summary.probability, 1.0);
    assert!((summary.consequence - line.consequence).abs() < 1e-12);
}

#[test]
fn total_risk_follows_configured_rule() {
    let expected_sum = overload_case(8_000.0).comprehensive_risk_analysis().unwrap();
    assert_eq!(expected_sum.total_risk_rule, TotalRiskRule::ExpectedSum);
    let expected = expected_sum.load_loss_risk
        + expected_sum.overload_probability * expected_sum.overload_consequence;
    assert!((expected_sum.total_risk - expected).abs() < 1e-9);

    let mut config = RiskConfig::default();
    config.strategy.total_risk = TotalRiskRule::ConsequenceSum;
    let mut nodes = chain(600.0, 2.0);
    if let Some(record) = nodes.nodes.get_mut(&n(2)) {
        record.has_dg = true;
    }
    let report = RiskEngine::new(nodes, config)
        .unwrap()
        .comprehensive_risk_analysis()
        .unwrap();
    let expected = report.failure_probability * report.load_loss_consequence
        + report.overload_probability * report.overload_consequence;
    assert!((report.total_risk - expected).abs() < 1e-9);
}

#[test]
fn analysis_is_deterministic() {
    let engine = RiskEngine::new(meshed(), RiskConfig::default()).unwrap();
    let first = engine.comprehensive_risk_analysis().unwrap();
    let second = engine.comprehensive_risk_analysis().unwrap();
    assert_eq!(first, second);

    let rebuilt = RiskEngine::new(meshed(), RiskConfig::default()).unwrap();
    assert_eq!(first, rebuilt.comprehensive_risk_analysis().unwrap());
}

#[test]
fn report_covers_every_line_and_demand_node() {
    let engine = RiskEngine::new(meshed(), RiskConfig::default()).unwrap();
    let report = engine.comprehensive_risk_analysis().unwrap();
    assert_eq!(report.lines.len(), engine.topology().edge_count());
    assert_eq!(report.nodes.len(), 5);
    assert!(report.nodes.iter().all(|node| node.demand_kw > 0.0));
    assert!(report.total_risk >= 0.0);

    let top = report.riskiest_nodes(2);
    assert!(top.len() <= 2);
    if top.len() == 2 {
        assert!(top[0].risk >= top[1].risk);
    }

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"total_risk\""));
}

#[test]
fn cloned_engine_mutation_stays_local() {
    let engine = RiskEngine::new(meshed(), RiskConfig::default()).unwrap();
    let mut scenario = engine.clone();
    scenario
        .overlay_mut()
        .set_demand(n(11), Kilowatts(5_000.0))
        .unwrap();
    assert_eq!(engine.overlay().demand(n(11)).value(), 90.0);
    assert!(
        scenario.network_load_loss_risk().unwrap() > engine.network_load_loss_risk().unwrap()
    );
}
