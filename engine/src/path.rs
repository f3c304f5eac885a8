// path.rs — Port reference strings
//
// The persistence layer addresses ports with compact reference strings:
//
//   [blueprint '#'] [operator ['.' delegate]] ['@' service] ('(' | ')') path
//
// `(` selects the in-direction tree, `)` the out-direction tree. The
// path descends from the tree root: `name` or `.name` enters a map
// entry, `~` enters the stream sub-port. Examples: `sum(a`, `gen)out`,
// `op(items~value`, `main#op.handler)result`, `op@ctl(cmd`.
//
// Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: a resolved reference names an existing port.
// Failure modes: every malformed or unresolvable reference produces a
//   `PathError`; nothing panics on user input.
// Side effects: none.

use std::fmt;

use logos::Logos;

use crate::graph::BlueprintGraph;
use crate::port::{Direction, PortId};

// ── Tokens ──────────────────────────────────────────────────────────────────

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t]+")]
enum Token {
    #[token("#")]
    Hash,
    #[token("@")]
    At,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(".")]
    Dot,
    #[token("~")]
    Tilde,
    /// Identifier: `[a-zA-Z_][a-zA-Z0-9_]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    UnrecognizedCharacter { offset: usize },
    UnexpectedToken { found: String },
    MissingDirection,
    WrongBlueprint { given: String },
    UnknownOperator { name: String },
    UnknownDelegate { operator: String, name: String },
    NoPortTree { direction: Direction, service: Option<String> },
    UnknownEntry { name: String },
    NoStreamSub,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::UnrecognizedCharacter { offset } => {
                write!(f, "unrecognized character at offset {}", offset)
            }
            PathError::UnexpectedToken { found } => {
                write!(f, "unexpected '{}' in port reference", found)
            }
            PathError::MissingDirection => {
                write!(f, "port reference needs a '(' or ')' direction separator")
            }
            PathError::WrongBlueprint { given } => {
                write!(f, "reference qualifies blueprint '{}', not this one", given)
            }
            PathError::UnknownOperator { name } => write!(f, "unknown operator '{}'", name),
            PathError::UnknownDelegate { operator, name } => {
                write!(f, "operator '{}' has no delegate '{}'", operator, name)
            }
            PathError::NoPortTree { direction, service } => match service {
                Some(service) => write!(
                    f,
                    "owner has no {}-direction port tree for service '{}'",
                    direction, service
                ),
                None => write!(f, "owner has no {}-direction port tree", direction),
            },
            PathError::UnknownEntry { name } => write!(f, "no map entry '{}'", name),
            PathError::NoStreamSub => write!(f, "'~' descent on a non-stream port"),
        }
    }
}

impl std::error::Error for PathError {}

// ── Lexing ──────────────────────────────────────────────────────────────────

fn lex(reference: &str) -> Result<Vec<(Token, String)>, PathError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(reference);
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.slice().to_string())),
            Err(()) => {
                return Err(PathError::UnrecognizedCharacter {
                    offset: lexer.span().start,
                })
            }
        }
    }
    Ok(tokens)
}

// ── Resolution ──────────────────────────────────────────────────────────────

impl BlueprintGraph {
    /// Resolve a port reference string against this graph.
    pub fn resolve_port_reference(&self, reference: &str) -> Result<PortId, PathError> {
        let tokens = lex(reference)?;
        let mut cursor = 0;

        // Optional blueprint qualifier.
        if matches!(tokens.get(1), Some((Token::Hash, _))) {
            match tokens.first() {
                Some((Token::Ident, qualifier)) => {
                    if qualifier != self.name() {
                        return Err(PathError::WrongBlueprint {
                            given: qualifier.clone(),
                        });
                    }
                    cursor = 2;
                }
                _ => {
                    return Err(PathError::UnexpectedToken {
                        found: "#".to_string(),
                    })
                }
            }
        }

        // Optional operator, optionally followed by `.delegate`.
        let mut owner = self.boundary();
        if let Some((Token::Ident, name)) = tokens.get(cursor) {
            let operator = self
                .find_operator(name)
                .ok_or_else(|| PathError::UnknownOperator { name: name.clone() })?;
            owner = operator;
            cursor += 1;
            if matches!(tokens.get(cursor), Some((Token::Dot, _))) {
                match tokens.get(cursor + 1) {
                    Some((Token::Ident, delegate_name)) => {
                        owner = self.find_delegate(operator, delegate_name).ok_or_else(|| {
                            PathError::UnknownDelegate {
                                operator: name.clone(),
                                name: delegate_name.clone(),
                            }
                        })?;
                        cursor += 2;
                    }
                    _ => {
                        return Err(PathError::UnexpectedToken {
                            found: ".".to_string(),
                        })
                    }
                }
            }
        }

        // Optional service selector.
        let mut service: Option<String> = None;
        if matches!(tokens.get(cursor), Some((Token::At, _))) {
            match tokens.get(cursor + 1) {
                Some((Token::Ident, name)) => {
                    service = Some(name.clone());
                    cursor += 2;
                }
                _ => {
                    return Err(PathError::UnexpectedToken {
                        found: "@".to_string(),
                    })
                }
            }
        }

        // Direction separator.
        let direction = match tokens.get(cursor) {
            Some((Token::LParen, _)) => Direction::In,
            Some((Token::RParen, _)) => Direction::Out,
            Some((_, text)) => {
                return Err(PathError::UnexpectedToken { found: text.clone() })
            }
            None => return Err(PathError::MissingDirection),
        };
        cursor += 1;

        let mut port = self
            .root_port(owner, direction, service.as_deref())
            .ok_or(PathError::NoPortTree { direction, service })?;

        // Port path: map descents by name, stream descents by `~`.
        let mut expect_separator = false;
        while cursor < tokens.len() {
            match &tokens[cursor] {
                (Token::Tilde, _) => {
                    port = self
                        .port(port)
                        .stream_child()
                        .ok_or(PathError::NoStreamSub)?;
                    cursor += 1;
                    expect_separator = false;
                }
                (Token::Dot, _) if expect_separator => {
                    cursor += 1;
                    expect_separator = false;
                }
                (Token::Ident, name) if !expect_separator => {
                    port = self
                        .port(port)
                        .map_child(name)
                        .ok_or_else(|| PathError::UnknownEntry { name: name.clone() })?;
                    cursor += 1;
                    expect_separator = true;
                }
                (_, text) => {
                    return Err(PathError::UnexpectedToken { found: text.clone() })
                }
            }
        }
        Ok(port)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
