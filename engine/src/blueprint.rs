// blueprint.rs — Blueprint definition files
//
// Minimal persistence glue at the engine boundary: a serde shape for a
// blueprint definition (boundary ports, operators with typed ports,
// delegates, generic assignments, and a connection map), plus the batch
// build that instantiates the graph and attempts every connection,
// reporting each outcome.
//
// Preconditions: the definition parsed from JSON.
// Postconditions: the returned graph contains every declared owner and
//   port; reports cover every requested connection in definition order.
// Failure modes: malformed type definitions and duplicate declarations
//   are hard `BlueprintError`s; unresolvable or rejected connections are
//   per-connection report entries, never hard failures.
// Side effects: none beyond the returned graph.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Deserialize;

use crate::graph::{BlueprintGraph, GraphError};
use crate::port::Direction;
use crate::typedef::{definition_fingerprint, TypeDef, TypeDefError};
use crate::types::ValueType;

// ── Definition shape ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct BlueprintDef {
    pub name: String,
    /// Boundary in-port type (data entering the blueprint).
    #[serde(default, rename = "in")]
    pub in_def: Option<TypeDef>,
    /// Boundary out-port type (data leaving the blueprint).
    #[serde(default, rename = "out")]
    pub out_def: Option<TypeDef>,
    #[serde(default)]
    pub operators: BTreeMap<String, OperatorDef>,
    /// Source reference → destination references.
    #[serde(default)]
    pub connections: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperatorDef {
    #[serde(default, rename = "in")]
    pub in_def: Option<TypeDef>,
    #[serde(default, rename = "out")]
    pub out_def: Option<TypeDef>,
    #[serde(default, rename = "streamSource")]
    pub stream_source: bool,
    /// Generic identifier → concrete type, applied to every port of the
    /// operator and its delegates at instantiation.
    #[serde(default)]
    pub generics: BTreeMap<String, TypeDef>,
    #[serde(default)]
    pub delegates: BTreeMap<String, DelegateDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelegateDef {
    #[serde(default, rename = "in")]
    pub in_def: Option<TypeDef>,
    #[serde(default, rename = "out")]
    pub out_def: Option<TypeDef>,
}

// ── Errors and reports ──────────────────────────────────────────────────────

#[derive(Debug)]
pub enum BlueprintError {
    TypeDef {
        context: String,
        source: TypeDefError,
    },
    Graph {
        context: String,
        source: GraphError,
    },
}

impl fmt::Display for BlueprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlueprintError::TypeDef { context, source } => {
                write!(f, "{}: {}", context, source)
            }
            BlueprintError::Graph { context, source } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for BlueprintError {}

/// Outcome of one requested connection.
#[derive(Debug, Clone)]
pub struct ConnectionReport {
    pub source: String,
    pub target: String,
    /// `None` for an established edge, the rejection reason otherwise.
    pub denial: Option<String>,
}

impl ConnectionReport {
    pub fn accepted(&self) -> bool {
        self.denial.is_none()
    }
}

impl fmt::Display for ConnectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.denial {
            None => write!(f, "ok   {} -> {}", self.source, self.target),
            Some(reason) => write!(f, "fail {} -> {}: {}", self.source, self.target, reason),
        }
    }
}

/// A built blueprint: the graph, per-connection reports, and the type
/// definition fingerprint for change detection.
pub struct BlueprintOutcome {
    pub graph: BlueprintGraph,
    pub reports: Vec<ConnectionReport>,
    pub fingerprint: String,
}

// ── Build ───────────────────────────────────────────────────────────────────

/// Instantiate a definition: owners and port trees first, then every
/// requested connection in definition order.
pub fn build_blueprint(def: &BlueprintDef) -> Result<BlueprintOutcome, BlueprintError> {
    let mut graph = BlueprintGraph::new(def.name.clone());

    // Boundary ports.
    let boundary = graph.boundary();
    if let Some(in_def) = &def.in_def {
        let ty = convert(in_def, "boundary in", &HashMap::new())?;
        graph.create_port(boundary, "in", &ty, Direction::In);
    }
    if let Some(out_def) = &def.out_def {
        let ty = convert(out_def, "boundary out", &HashMap::new())?;
        graph.create_port(boundary, "out", &ty, Direction::Out);
    }
    initialize(&mut graph, boundary, "boundary")?;

    // Operators and their delegates.
    for (name, op_def) in &def.operators {
        let assignment = generic_assignment(name, &op_def.generics)?;
        let owner = graph.add_operator(name.clone(), op_def.stream_source);
        if let Some(in_def) = &op_def.in_def {
            let ty = convert(in_def, &format!("{}.in", name), &assignment)?;
            graph.create_port(owner, "in", &ty, Direction::In);
        }
        if let Some(out_def) = &op_def.out_def {
            let ty = convert(out_def, &format!("{}.out", name), &assignment)?;
            graph.create_port(owner, "out", &ty, Direction::Out);
        }
        initialize(&mut graph, owner, name)?;

        for (delegate_name, delegate_def) in &op_def.delegates {
            let context = format!("{}.{}", name, delegate_name);
            let delegate = graph.add_delegate(delegate_name.clone(), owner);
            if let Some(in_def) = &delegate_def.in_def {
                let ty = convert(in_def, &format!("{}.in", context), &assignment)?;
                graph.create_port(delegate, "in", &ty, Direction::In);
            }
            if let Some(out_def) = &delegate_def.out_def {
                let ty = convert(out_def, &format!("{}.out", context), &assignment)?;
                graph.create_port(delegate, "out", &ty, Direction::Out);
            }
            initialize(&mut graph, delegate, &context)?;
        }
    }

    // Connections, in definition order.
    let mut reports = Vec::new();
    for (source_ref, target_refs) in &def.connections {
        for target_ref in target_refs {
            let denial = attempt_connection(&mut graph, source_ref, target_ref);
            reports.push(ConnectionReport {
                source: source_ref.clone(),
                target: target_ref.clone(),
                denial,
            });
        }
    }

    let entries = fingerprint_entries(def);
    let fingerprint = definition_fingerprint(entries.iter().map(|(name, d)| (name.as_str(), *d)));

    Ok(BlueprintOutcome {
        graph,
        reports,
        fingerprint,
    })
}

fn attempt_connection(
    graph: &mut BlueprintGraph,
    source_ref: &str,
    target_ref: &str,
) -> Option<String> {
    let source = match graph.resolve_port_reference(source_ref) {
        Ok(port) => port,
        Err(e) => return Some(e.to_string()),
    };
    let target = match graph.resolve_port_reference(target_ref) {
        Ok(port) => port,
        Err(e) => return Some(e.to_string()),
    };
    match graph.connect(source, target) {
        Ok(()) => None,
        Err(denial) => Some(denial.to_string()),
    }
}

fn convert(
    def: &TypeDef,
    context: &str,
    assignment: &HashMap<String, ValueType>,
) -> Result<ValueType, BlueprintError> {
    let ty = def.to_value_type().map_err(|source| BlueprintError::TypeDef {
        context: context.to_string(),
        source,
    })?;
    if assignment.is_empty() {
        Ok(ty)
    } else {
        Ok(ty.specify_generics(assignment))
    }
}

fn generic_assignment(
    operator: &str,
    generics: &BTreeMap<String, TypeDef>,
) -> Result<HashMap<String, ValueType>, BlueprintError> {
    let mut assignment = HashMap::new();
    for (identifier, def) in generics {
        let ty = convert(def, &format!("{}.generics.{}", operator, identifier), &HashMap::new())?;
        assignment.insert(identifier.clone(), ty);
    }
    Ok(assignment)
}

fn initialize(
    graph: &mut BlueprintGraph,
    owner: crate::owner::OwnerId,
    context: &str,
) -> Result<(), BlueprintError> {
    graph
        .initialize_owner(owner)
        .map_err(|source| BlueprintError::Graph {
            context: context.to_string(),
            source,
        })
}

/// Named type-definition entries in a stable order, for fingerprinting.
fn fingerprint_entries(def: &BlueprintDef) -> Vec<(String, &TypeDef)> {
    let mut entries: Vec<(String, &TypeDef)> = Vec::new();
    if let Some(in_def) = &def.in_def {
        entries.push(("in".to_string(), in_def));
    }
    if let Some(out_def) = &def.out_def {
        entries.push(("out".to_string(), out_def));
    }
    for (name, op_def) in &def.operators {
        if let Some(in_def) = &op_def.in_def {
            entries.push((format!("{}.in", name), in_def));
        }
        if let Some(out_def) = &op_def.out_def {
            entries.push((format!("{}.out", name), out_def));
        }
        for (identifier, generic_def) in &op_def.generics {
            entries.push((format!("{}.generics.{}", name, identifier), generic_def));
        }
        for (delegate_name, delegate_def) in &op_def.delegates {
            if let Some(in_def) = &delegate_def.in_def {
                entries.push((format!("{}.{}.in", name, delegate_name), in_def));
            }
            if let Some(out_def) = &delegate_def.out_def {
                entries.push((format!("{}.{}.out", name, delegate_name), out_def));
            }
        }
    }
    entries
}

// ── Tests ───────────────────────────────────────────────────────────────────
