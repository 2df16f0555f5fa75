//! End-to-end tests over the public analysis API.
//!
//! Small hand-checked fault trees: cut sets, probabilities, importance,
//! warnings, and truncation.

use fta_rs::analysis::{Analysis, FaultTreeAnalysis, Literal, Settings};
use fta_rs::model::{Arg, CcfGroup, Connective, Formula, Model};

use test_log::test;

fn run(model: Model, settings: Settings) -> Analysis {
    FaultTreeAnalysis::new(model, settings).unwrap().analyze().unwrap()
}

fn cut_sets_by_name(analysis: &Analysis) -> Vec<Vec<String>> {
    let mut sets: Vec<Vec<String>> = analysis
        .cut_sets
        .iter()
        .map(|cs| cs.iter().map(|l| l.event.clone()).collect())
        .collect();
    sets.sort();
    sets
}

// ─── Qualitative analysis ──────────────────────────────────────────────────────

#[test]
fn two_event_and() {
    let mut model = Model::new("top");
    model.add_basic_event("a", 0.1).unwrap();
    model.add_basic_event("b", 0.2).unwrap();
    model
        .add_gate(
            "top",
            Formula::new(Connective::And).arg(Arg::basic("a")).arg(Arg::basic("b")),
        )
        .unwrap();

    let analysis = run(model, Settings::default().probability_analysis(true));
    assert_eq!(cut_sets_by_name(&analysis), vec![vec!["a".to_string(), "b".to_string()]]);
    assert_eq!(analysis.max_order, 2);
    assert!((analysis.probability.unwrap() - 0.02).abs() < 1e-12);
    assert!((analysis.sum_mcs_probability.unwrap() - 0.02).abs() < 1e-12);
    assert!(analysis.warnings.is_empty());
}

#[test]
fn shared_event_three_event_tree() {
    // top = (a & b) | (a & c), uniform p = 0.1.
    let mut model = Model::new("top");
    for id in ["a", "b", "c"] {
        model.add_basic_event(id, 0.1).unwrap();
    }
    model
        .add_gate("g1", Formula::new(Connective::And).arg(Arg::basic("a")).arg(Arg::basic("b")))
        .unwrap();
    model
        .add_gate("g2", Formula::new(Connective::And).arg(Arg::basic("a")).arg(Arg::basic("c")))
        .unwrap();
    model
        .add_gate("top", Formula::new(Connective::Or).arg(Arg::gate("g1")).arg(Arg::gate("g2")))
        .unwrap();

    let analysis = run(model, Settings::default().probability_analysis(true));
    assert_eq!(
        cut_sets_by_name(&analysis),
        vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["a".to_string(), "c".to_string()],
        ]
    );
    // Rare-event approximation: 0.01 + 0.01.
    assert!((analysis.sum_mcs_probability.unwrap() - 0.02).abs() < 1e-12);
    // Exact: 0.1 * (1 - 0.9 * 0.9) = 0.019.
    assert!((analysis.probability.unwrap() - 0.019).abs() < 1e-12);
}

#[test]
fn voting_gate_cut_sets() {
    // top = @(2, [a, b, c]): all pairs.
    let mut model = Model::new("top");
    for id in ["a", "b", "c"] {
        model.add_basic_event(id, 0.1).unwrap();
    }
    model
        .add_gate(
            "top",
            Formula::atleast(2).arg(Arg::basic("a")).arg(Arg::basic("b")).arg(Arg::basic("c")),
        )
        .unwrap();

    let analysis = run(model, Settings::default());
    assert_eq!(
        cut_sets_by_name(&analysis),
        vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["a".to_string(), "c".to_string()],
            vec!["b".to_string(), "c".to_string()],
        ]
    );
}

#[test]
fn nested_modules() {
    // top = a & (b | (c & d)); the OR sub-tree is a module.
    let mut model = Model::new("top");
    for id in ["a", "b", "c", "d"] {
        model.add_basic_event(id, 0.1).unwrap();
    }
    model
        .add_gate("cd", Formula::new(Connective::And).arg(Arg::basic("c")).arg(Arg::basic("d")))
        .unwrap();
    model
        .add_gate("m", Formula::new(Connective::Or).arg(Arg::basic("b")).arg(Arg::gate("cd")))
        .unwrap();
    model
        .add_gate("top", Formula::new(Connective::And).arg(Arg::basic("a")).arg(Arg::gate("m")))
        .unwrap();

    let analysis = run(model, Settings::default().probability_analysis(true));
    assert_eq!(
        cut_sets_by_name(&analysis),
        vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["a".to_string(), "c".to_string(), "d".to_string()],
        ]
    );
    // Exact: 0.1 * (1 - 0.9 * (1 - 0.01)) = 0.1 * 0.109 = 0.0109.
    assert!((analysis.probability.unwrap() - 0.0109).abs() < 1e-12);
}

#[test]
fn mcs_are_an_antichain() {
    // A tree with overlapping paths: no cut set may contain another.
    let mut model = Model::new("top");
    for id in ["a", "b", "c", "d"] {
        model.add_basic_event(id, 0.1).unwrap();
    }
    model
        .add_gate("g1", Formula::new(Connective::And).arg(Arg::basic("a")).arg(Arg::basic("b")))
        .unwrap();
    model
        .add_gate(
            "g2",
            Formula::new(Connective::And)
                .arg(Arg::basic("a"))
                .arg(Arg::basic("b"))
                .arg(Arg::basic("c")),
        )
        .unwrap();
    model
        .add_gate(
            "top",
            Formula::new(Connective::Or)
                .arg(Arg::gate("g1"))
                .arg(Arg::gate("g2"))
                .arg(Arg::basic("d")),
        )
        .unwrap();

    let analysis = run(model, Settings::default());
    let sets = cut_sets_by_name(&analysis);
    assert_eq!(
        sets,
        vec![vec!["a".to_string(), "b".to_string()], vec!["d".to_string()]]
    );
    for x in &sets {
        for y in &sets {
            if x != y {
                assert!(!x.iter().all(|e| y.contains(e)), "{:?} subsumes {:?}", x, y);
            }
        }
    }
}

// ─── Constant top events ───────────────────────────────────────────────────────

#[test]
fn top_event_null_warning() {
    // top = a & house(off): guaranteed success.
    let mut model = Model::new("top");
    model.add_basic_event("a", 0.1).unwrap();
    model.add_house_event("off", false).unwrap();
    model
        .add_gate(
            "top",
            Formula::new(Connective::And).arg(Arg::basic("a")).arg(Arg::house("off")),
        )
        .unwrap();

    let analysis = run(model, Settings::default().probability_analysis(true));
    assert!(analysis.cut_sets.is_empty());
    assert_eq!(analysis.warnings, vec!["The top event is NULL. Success is guaranteed.".to_string()]);
    assert_eq!(analysis.probability, Some(0.0));
}

#[test]
fn top_event_unity_warning() {
    // top = a | house(on): guaranteed failure, one empty cut set.
    let mut model = Model::new("top");
    model.add_basic_event("a", 0.1).unwrap();
    model.add_house_event("on", true).unwrap();
    model
        .add_gate(
            "top",
            Formula::new(Connective::Or).arg(Arg::basic("a")).arg(Arg::house("on")),
        )
        .unwrap();

    let analysis = run(model, Settings::default().probability_analysis(true));
    assert_eq!(analysis.cut_sets, vec![Vec::<Literal>::new()]);
    assert_eq!(analysis.warnings, vec!["The top event is UNITY. Failure is guaranteed.".to_string()]);
    assert_eq!(analysis.probability, Some(1.0));
}

// ─── Non-coherent inputs ───────────────────────────────────────────────────────

#[test]
fn negation_projects_to_positive_literals() {
    // top = a & !b: the failure combination needs only {a}.
    let mut model = Model::new("top");
    model.add_basic_event("a", 0.1).unwrap();
    model.add_basic_event("b", 0.2).unwrap();
    model
        .add_gate(
            "top",
            Formula::new(Connective::And).arg(Arg::basic("a")).arg(Arg::not_basic("b")),
        )
        .unwrap();

    let analysis = run(model, Settings::default());
    assert_eq!(cut_sets_by_name(&analysis), vec![vec!["a".to_string()]]);
}

#[test]
fn xor_tree() {
    let mut model = Model::new("top");
    model.add_basic_event("a", 0.1).unwrap();
    model.add_basic_event("b", 0.2).unwrap();
    model
        .add_gate(
            "top",
            Formula::new(Connective::Xor).arg(Arg::basic("a")).arg(Arg::basic("b")),
        )
        .unwrap();

    let analysis = run(model, Settings::default().probability_analysis(true));
    // Projected to positive literals, each single failure is a cut set.
    assert_eq!(
        cut_sets_by_name(&analysis),
        vec![vec!["a".to_string()], vec!["b".to_string()]]
    );
    // Exact XOR probability: 0.1*0.8 + 0.9*0.2 = 0.26.
    assert!((analysis.probability.unwrap() - 0.26).abs() < 1e-12);
}

// ─── Truncation ────────────────────────────────────────────────────────────────

#[test]
fn limit_order_truncates() {
    // top = d | (a & b & c)
    let mut model = Model::new("top");
    for id in ["a", "b", "c", "d"] {
        model.add_basic_event(id, 0.1).unwrap();
    }
    model
        .add_gate(
            "triple",
            Formula::new(Connective::And)
                .arg(Arg::basic("a"))
                .arg(Arg::basic("b"))
                .arg(Arg::basic("c")),
        )
        .unwrap();
    model
        .add_gate(
            "top",
            Formula::new(Connective::Or).arg(Arg::basic("d")).arg(Arg::gate("triple")),
        )
        .unwrap();

    let analysis = run(model, Settings::default().limit_order(2).unwrap());
    assert_eq!(cut_sets_by_name(&analysis), vec![vec!["d".to_string()]]);
    assert_eq!(analysis.max_order, 1);
}

#[test]
fn cut_off_truncates() {
    // p(a & b & c) = 1e-6 falls below a 1e-4 cut-off; {d} survives.
    let mut model = Model::new("top");
    for id in ["a", "b", "c"] {
        model.add_basic_event(id, 0.01).unwrap();
    }
    model.add_basic_event("d", 0.1).unwrap();
    model
        .add_gate(
            "triple",
            Formula::new(Connective::And)
                .arg(Arg::basic("a"))
                .arg(Arg::basic("b"))
                .arg(Arg::basic("c")),
        )
        .unwrap();
    model
        .add_gate(
            "top",
            Formula::new(Connective::Or).arg(Arg::basic("d")).arg(Arg::gate("triple")),
        )
        .unwrap();

    let analysis = run(model, Settings::default().cut_off(1e-4).unwrap());
    assert_eq!(cut_sets_by_name(&analysis), vec![vec!["d".to_string()]]);
}

// ─── Quantification ────────────────────────────────────────────────────────────

#[test]
fn importance_two_event_and() {
    let mut model = Model::new("top");
    model.add_basic_event("a", 0.1).unwrap();
    model.add_basic_event("b", 0.2).unwrap();
    model
        .add_gate(
            "top",
            Formula::new(Connective::And).arg(Arg::basic("a")).arg(Arg::basic("b")),
        )
        .unwrap();

    let analysis = run(model, Settings::default().importance_analysis(true));
    let a = &analysis.importance["a"];
    assert_eq!(a.occurrences, 1);
    assert!((a.birnbaum - 0.2).abs() < 1e-12);
    assert!((a.criticality - 1.0).abs() < 1e-12);
    assert!((a.fussell_vesely - 1.0).abs() < 1e-12);
    assert!((a.raw - 10.0).abs() < 1e-12);
    assert!(a.rrw.is_infinite());

    let b = &analysis.importance["b"];
    assert!((b.birnbaum - 0.1).abs() < 1e-12);
    assert!((b.raw - 5.0).abs() < 1e-12);
}

#[test]
fn importance_with_redundancy() {
    // top = a & (b | c): b is less critical than a.
    let mut model = Model::new("top");
    model.add_basic_event("a", 0.1).unwrap();
    model.add_basic_event("b", 0.2).unwrap();
    model.add_basic_event("c", 0.3).unwrap();
    model
        .add_gate("m", Formula::new(Connective::Or).arg(Arg::basic("b")).arg(Arg::basic("c")))
        .unwrap();
    model
        .add_gate("top", Formula::new(Connective::And).arg(Arg::basic("a")).arg(Arg::gate("m")))
        .unwrap();

    let analysis = run(model, Settings::default().importance_analysis(true));
    let p_top = analysis.probability.unwrap();
    // P = 0.1 * (1 - 0.8 * 0.7) = 0.044.
    assert!((p_top - 0.044).abs() < 1e-12);

    let a = &analysis.importance["a"];
    let b = &analysis.importance["b"];
    // Birnbaum of a: P(top | p_a = 1) - P(top | p_a = 0) = 0.44.
    assert!((a.birnbaum - 0.44).abs() < 1e-12);
    // Birnbaum of b: 0.1 * (1 - 0.7) - 0.1 * ... = p_a * (1 - p_c) * 1
    assert!((b.birnbaum - 0.1 * 0.7).abs() < 1e-12);
    assert!(a.fussell_vesely > b.fussell_vesely);
}

// ─── CCF analysis ──────────────────────────────────────────────────────────────

#[test]
fn ccf_beta_factor_expansion() {
    // Two redundant pumps in a CCF group: the common-cause event becomes
    // a first-order cut set.
    let mut model = Model::new("top");
    model.add_basic_event("pump1", 0.1).unwrap();
    model.add_basic_event("pump2", 0.1).unwrap();
    model
        .add_gate(
            "top",
            Formula::new(Connective::And).arg(Arg::basic("pump1")).arg(Arg::basic("pump2")),
        )
        .unwrap();
    model.add_ccf_group(CcfGroup {
        id: "pumps".to_string(),
        members: vec!["pump1".to_string(), "pump2".to_string()],
        beta: 0.1,
    });

    let analysis = run(
        model,
        Settings::default().ccf_analysis(true).probability_analysis(true),
    );
    let sets = cut_sets_by_name(&analysis);
    assert!(sets.contains(&vec!["CCF[pumps]".to_string()]));
    assert!(sets.contains(&vec!["pump1".to_string(), "pump2".to_string()]));

    // Exact: P(OR(p1, c) & OR(p2, c)) with p = 0.09, c = 0.01.
    let p = 0.09f64;
    let c = 0.01f64;
    let expected = c + (1.0 - c) * p * p;
    assert!((analysis.probability.unwrap() - expected).abs() < 1e-12);
}

// ─── Larger composite tree ─────────────────────────────────────────────────────

#[test]
fn composite_tree_with_all_connectives() {
    let mut model = Model::new("top");
    for id in ["a", "b", "c", "d", "e"] {
        model.add_basic_event(id, 0.1).unwrap();
    }
    model.add_house_event("enabled", true).unwrap();
    model
        .add_gate(
            "vote",
            Formula::atleast(2).arg(Arg::basic("a")).arg(Arg::basic("b")).arg(Arg::basic("c")),
        )
        .unwrap();
    model
        .add_gate(
            "guard",
            Formula::new(Connective::Nand).arg(Arg::basic("d")).arg(Arg::basic("e")),
        )
        .unwrap();
    model
        .add_gate(
            "top",
            Formula::new(Connective::And)
                .arg(Arg::gate("vote"))
                .arg(Arg::not_gate("guard"))
                .arg(Arg::house("enabled")),
        )
        .unwrap();

    // top = @(2, [a,b,c]) & d & e
    let analysis = run(model, Settings::default().probability_analysis(true));
    let sets = cut_sets_by_name(&analysis);
    assert_eq!(sets.len(), 3);
    for set in &sets {
        assert!(set.contains(&"d".to_string()) && set.contains(&"e".to_string()));
        assert_eq!(set.len(), 4);
    }
    // P = P(@(2,3) with p=.1) * .01 = (3*.01*.9 + .001) * .01 = 0.028 * 0.01.
    assert!((analysis.probability.unwrap() - 0.00028).abs() < 1e-12);

    // The probability of the top event stays in [0, 1].
    let p = analysis.probability.unwrap();
    assert!((0.0..=1.0).contains(&p));
}
