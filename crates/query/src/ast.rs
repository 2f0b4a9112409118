//! Abstract syntax tree for the traversal query language (spec §4.7).
//!
//! `query ::= source step* expansion?`

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub source: Source,
    pub steps: Vec<Step>,
    pub expansion: Option<Expansion>,
}

/// `source ::= identifier ':' (number | string)`
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub label: String,
    pub key: SourceKey,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceKey {
    Number(f64),
    String(String),
}

/// `step ::= '.' predicate | '<-' predicate | '.' predicate '*' '[' 'depth' bound ']' | filter`
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Forward(String),
    Reverse(String),
    Recurse { predicate: String, max_depth: u32 },
    Filter(Condition),
}

/// `condition ::= comparison (('AND' | 'OR') comparison)* | '(' condition ')'`
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison(Comparison),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

/// `comparison ::= field op literal`
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub op: CompOp,
    pub literal: Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

/// `expansion ::= '{' field (',' field)* '}'`
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub fields: Vec<Field>,
}

/// `field ::= identifier ('{' field (',' field)* '}')?`
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub nested: Option<Expansion>,
}
