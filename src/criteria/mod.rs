//! Search DSL: criteria, operators, ordering and the selector that drives list/get queries.

mod query;
mod selector;

pub use query::parse_query_pairs;
pub use selector::{select_columns, Selector};

use crate::error::AppError;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Filter operator. The canonical spelling is `$`-prefixed; bare and sign aliases are accepted on input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Op {
    #[default]
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Nil,
    NotNil,
    Like,
    ILike,
    In,
    NotIn,
}

impl Op {
    pub const ALL: [Op; 12] = [
        Op::Eq,
        Op::Neq,
        Op::Gt,
        Op::Gte,
        Op::Lt,
        Op::Lte,
        Op::Nil,
        Op::NotNil,
        Op::Like,
        Op::ILike,
        Op::In,
        Op::NotIn,
    ];

    pub fn parse(s: &str) -> Result<Op, AppError> {
        Ok(match s.trim() {
            "$eq" | "eq" | "=" => Op::Eq,
            "$neq" | "neq" | "<>" | "!=" => Op::Neq,
            "$gt" | "gt" | ">" => Op::Gt,
            "$gte" | "gte" | ">=" => Op::Gte,
            "$lt" | "lt" | "<" => Op::Lt,
            "$lte" | "lte" | "<=" => Op::Lte,
            "$nil" | "nil" => Op::Nil,
            "$nnil" | "nnil" => Op::NotNil,
            "$like" | "like" => Op::Like,
            "$ilike" | "ilike" => Op::ILike,
            "$in" | "in" => Op::In,
            "$nin" | "nin" | "$notin" | "notin" => Op::NotIn,
            other => return Err(AppError::BadRequest(format!("unsupported operator '{}'", other))),
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "$eq",
            Op::Neq => "$neq",
            Op::Gt => "$gt",
            Op::Gte => "$gte",
            Op::Lt => "$lt",
            Op::Lte => "$lte",
            Op::Nil => "$nil",
            Op::NotNil => "$nnil",
            Op::Like => "$like",
            Op::ILike => "$ilike",
            Op::In => "$in",
            Op::NotIn => "$nin",
        }
    }

    /// Operators that read `vlist` instead of `v`.
    pub fn takes_list(&self) -> bool {
        matches!(self, Op::In | Op::NotIn)
    }
}

impl FromStr for Op {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Op::parse(s)
    }
}

impl TryFrom<String> for Op {
    type Error = AppError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Op::parse(&s)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Op {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One filter predicate: column `k`, operator `o`, scalar `v` or list `vlist`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub k: String,
    #[serde(default)]
    pub o: Op,
    #[serde(default)]
    pub v: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vlist: Vec<Value>,
}

impl Criterion {
    pub fn new(k: impl Into<String>, o: Op, v: impl Into<Value>) -> Self {
        Criterion {
            k: k.into(),
            o,
            v: v.into(),
            vlist: Vec::new(),
        }
    }

    pub fn eq(k: impl Into<String>, v: impl Into<Value>) -> Self {
        Criterion::new(k, Op::Eq, v)
    }

    pub fn list(k: impl Into<String>, o: Op, vlist: Vec<Value>) -> Self {
        Criterion {
            k: k.into(),
            o,
            v: Value::Null,
            vlist,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDir {
    #[default]
    Asc,
    Desc,
}

impl OrderDir {
    /// `asc`/`desc` in any case; everything else is ascending.
    pub fn parse_or_default(s: &str) -> OrderDir {
        if s.trim().eq_ignore_ascii_case("desc") {
            OrderDir::Desc
        } else {
            OrderDir::Asc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDir::Asc => "ASC",
            OrderDir::Desc => "DESC",
        }
    }
}
