use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    Check,
    Graph,
    Events,
}

#[derive(Parser, Debug)]
#[command(
    name = "bpe",
    version,
    about = "Blueprint Propagation Engine — validates blueprint definitions and reports port compatibility"
)]
struct Cli {
    /// Input blueprint definition (JSON)
    source: PathBuf,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Check)]
    emit: EmitStage,

    /// Print build phases and counts
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        eprintln!("bpe: source = {}", cli.source.display());
        eprintln!("bpe: emit   = {:?}", cli.emit);
    }

    // ── Read and parse definition ──
    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("bpe: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };

    let def: bpe::blueprint::BlueprintDef = match serde_json::from_str(&source) {
        Ok(def) => def,
        Err(e) => {
            eprintln!("bpe: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };

    if cli.verbose {
        eprintln!(
            "bpe: blueprint '{}' with {} operators, {} connection groups",
            def.name,
            def.operators.len(),
            def.connections.len()
        );
    }

    // ── Build graph and apply connections ──
    let mut outcome = match bpe::blueprint::build_blueprint(&def) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("bpe: error: {}", e);
            std::process::exit(2);
        }
    };

    let rejected = outcome.reports.iter().filter(|r| !r.accepted()).count();

    match cli.emit {
        EmitStage::Check => {
            println!("blueprint '{}' fingerprint {}", def.name, outcome.fingerprint);
            for report in &outcome.reports {
                println!("{}", report);
            }
            println!(
                "{} connections, {} rejected",
                outcome.reports.len(),
                rejected
            );
        }
        EmitStage::Graph => {
            print!("{}", outcome.graph);
        }
        EmitStage::Events => {
            for event in outcome.graph.drain_events() {
                println!("{}", event);
            }
        }
    }

    if rejected > 0 {
        std::process::exit(1);
    }
}
