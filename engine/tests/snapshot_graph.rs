// Snapshot tests for the graph and report displays.
//
// Inline snapshots keep the rendered shapes under review: owner/port
// listings with inferred depths, and per-connection report lines.

use bpe::blueprint::{build_blueprint, BlueprintDef};
use bpe::graph::BlueprintGraph;
use bpe::port::Direction;
use bpe::types::ValueType;

#[test]
fn graph_display_lists_owners_ports_and_depths() {
    let mut g = BlueprintGraph::new("demo");

    let gen = g.add_operator("gen", true);
    g.create_port(gen, "out", &ValueType::stream(ValueType::Number), Direction::Out);
    g.initialize_owner(gen).unwrap();

    let sum = g.add_operator("sum", false);
    let sum_in = g.create_port(sum, "in", &ValueType::stream(ValueType::Number), Direction::In);
    g.create_port(sum, "out", &ValueType::Number, Direction::Out);
    g.initialize_owner(sum).unwrap();

    let gen_out = g.root_port(gen, Direction::Out, None).unwrap();
    g.connect(gen_out, sum_in).unwrap();

    insta::assert_snapshot!(g.to_string(), @r"
    blueprint 'demo' (3 owners, 5 ports, 9 streams)
      o0 boundary
      o1 operator 'gen' (stream source)
        p0 out 'out': stream<number> @ depth 1
      o2 operator 'sum'
        p2 in 'in': stream<number> @ depth 1
        p4 out 'out': number @ depth 1
    ");
}

#[test]
fn connection_reports_render_outcomes() {
    let def: BlueprintDef = serde_json::from_str(
        r#"{
        "name": "demo",
        "operators": {
            "gen": {"out": {"type": "stream", "stream": {"type": "number"}},
                    "streamSource": true},
            "sink": {"in": {"type": "string"}},
            "sum": {"in": {"type": "stream", "stream": {"type": "number"}}}
        },
        "connections": {"gen)": ["sum(", "sink("]}
    }"#,
    )
    .unwrap();

    let outcome = build_blueprint(&def).unwrap();
    let rendered = outcome
        .reports
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("\n");

    insta::assert_snapshot!(rendered, @r"
    ok   gen) -> sum(
    fail gen) -> sink(: type stream does not satisfy string
    ");
}
