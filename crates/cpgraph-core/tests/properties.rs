use std::collections::BTreeSet;

use proptest::prelude::*;

use cpgraph_core::filter::{
    DuplicateParentFilter, FilterMode, FilterPlan, GraphFilter, ModuleTypeFilter,
    ReachabilityFilter, UnusedDataFilter,
};
use cpgraph_core::graph::{BuildOptions, DataTypeFilter, PipelineGraph, build, explain_ids};
use cpgraph_core::model::{DataRef, ModuleRecord, RefKind};
use cpgraph_core::normalize::DataKind;

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

const NAMES: [&str; 6] = ["DNA", "Actin", "Mask", "Nuclei", "Cells", "Area"];
const TYPES: [&str; 4] = ["Load", "Threshold", "Identify", "Measure"];

fn arb_ref() -> impl Strategy<Value = DataRef> {
    (
        prop::sample::select(RefKind::ALL.to_vec()),
        prop::sample::select(NAMES.to_vec()),
    )
        .prop_map(|(kind, name)| DataRef::new(kind, name))
}

fn arb_records() -> impl Strategy<Value = Vec<ModuleRecord>> {
    prop::collection::vec(
        (
            prop::sample::select(TYPES.to_vec()),
            any::<bool>(),
            prop::collection::vec(arb_ref(), 0..3),
            prop::collection::vec(arb_ref(), 0..3),
        ),
        0..12,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .zip(1u32..)
            .map(|((type_name, enabled, inputs, outputs), ordinal)| ModuleRecord {
                ordinal,
                type_name: type_name.to_string(),
                enabled,
                inputs,
                outputs,
            })
            .collect()
    })
}

fn arb_data_type_filter() -> impl Strategy<Value = DataTypeFilter> {
    prop::sample::select(vec![
        DataTypeFilter::All,
        DataTypeFilter::ImagesOnly,
        DataTypeFilter::ObjectsOnly,
        DataTypeFilter::NoLists,
    ])
}

fn filters() -> Vec<Box<dyn GraphFilter>> {
    vec![
        Box::new(ModuleTypeFilter::new(["Threshold"])),
        Box::new(ReachabilityFilter::new(["DNA", "Nuclei"])),
        Box::new(DuplicateParentFilter),
        Box::new(UnusedDataFilter::new(DataKind::ALL)),
    ]
}

fn node_keys(graph: &PipelineGraph) -> BTreeSet<String> {
    graph.nodes().map(|n| n.key().to_string()).collect()
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn build_is_deterministic(records in arb_records(), dtf in arb_data_type_filter()) {
        let options = BuildOptions { data_type_filter: dtf, ..BuildOptions::default() };
        let a = build(&records, options).expect("build");
        let b = build(&records, options).expect("build");
        prop_assert_eq!(a.canonical_listing(), b.canonical_listing());
        prop_assert_eq!(a.content_hash(), b.content_hash());
        a.check_invariants().expect("consistent");
    }

    #[test]
    fn record_order_does_not_matter(records in arb_records(), seed in any::<u64>()) {
        let mut shuffled = records.clone();
        // deterministic rotation + reversal keeps the test reproducible
        if !shuffled.is_empty() {
            let n = usize::try_from(seed).unwrap_or(0) % shuffled.len();
            shuffled.rotate_left(n);
        }
        if seed % 2 == 0 {
            shuffled.reverse();
        }
        let a = build(&records, BuildOptions::default()).expect("build");
        let b = build(&shuffled, BuildOptions::default()).expect("build");
        prop_assert_eq!(node_keys(&a), node_keys(&b));
        let ea: Vec<_> = a.edges().map(|(k, _)| k.clone()).collect();
        let eb: Vec<_> = b.edges().map(|(k, _)| k.clone()).collect();
        prop_assert_eq!(ea, eb);
        prop_assert_eq!(explain_ids(&a), explain_ids(&b));
    }

    #[test]
    fn identical_records_merge(record in arb_records().prop_filter("one record", |r| !r.is_empty()), ordinal in 100u32..200) {
        let mut first = record[0].clone();
        first.enabled = true;
        let mut twin = first.clone();
        twin.ordinal = ordinal;
        let single = build(std::slice::from_ref(&first), BuildOptions::default()).expect("build");
        let both = build(&[first.clone(), twin], BuildOptions::default()).expect("build");
        prop_assert_eq!(node_keys(&single), node_keys(&both));
        prop_assert_eq!(single.edge_count(), both.edge_count());
        for module in both.module_nodes() {
            prop_assert!(module.ordinals.contains(&first.ordinal));
            prop_assert!(module.ordinals.contains(&ordinal));
        }
    }

    #[test]
    fn unused_data_is_idempotent(records in arb_records()) {
        let graph = build(&records, BuildOptions::default()).expect("build");
        let filter = UnusedDataFilter::new(DataKind::ALL);
        let once = filter.apply(&graph, FilterMode::Delete).expect("filter");
        let twice = filter.apply(&once.graph, FilterMode::Delete).expect("filter");
        prop_assert_eq!(twice.affected_count, 0);
        prop_assert_eq!(twice.graph, once.graph);
    }

    #[test]
    fn highlight_and_delete_affect_the_same_elements(records in arb_records()) {
        let graph = build(&records, BuildOptions::default()).expect("build");
        for filter in filters() {
            let deleted = filter.apply(&graph, FilterMode::Delete).expect("filter");
            let tagged = filter.apply(&graph, FilterMode::Highlight).expect("filter");
            prop_assert_eq!(&deleted.affected, &tagged.affected);
            prop_assert_eq!(deleted.affected_count, tagged.affected_count);
            prop_assert_eq!(tagged.graph.node_count(), graph.node_count());
            prop_assert_eq!(tagged.graph.edge_count(), graph.edge_count());
            deleted.graph.check_invariants().expect("consistent");
        }
    }

    #[test]
    fn filters_never_mutate_their_input(records in arb_records()) {
        let graph = build(&records, BuildOptions::default()).expect("build");
        let before = graph.content_hash();
        let plan = FilterPlan::default()
            .with_excluded_types(["Measure"])
            .with_roots(["DNA"])
            .with_unused_kinds(DataKind::ALL);
        plan.run(&graph, FilterMode::Delete).expect("run");
        plan.run(&graph, FilterMode::Highlight).expect("run");
        prop_assert_eq!(graph.content_hash(), before);
    }

    #[test]
    fn at_most_one_producer_after_resolution(records in arb_records()) {
        let graph = build(&records, BuildOptions::default()).expect("build");
        let out = DuplicateParentFilter.apply(&graph, FilterMode::Delete).expect("filter");
        for data in out.graph.data_nodes() {
            prop_assert!(out.graph.incoming(&data.key).count() <= 1, "{}", data.key);
        }
    }
}
