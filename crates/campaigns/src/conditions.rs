//! Trigger condition trees. Server-supplied condition JSON is parsed once at
//! campaign load into a closed node type; anything the parser does not
//! recognize becomes an always-false sentinel so one bad campaign definition
//! can never abort evaluation of the rest.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionNode {
    /// No conditions: matches any payload.
    Empty,
    Leaf {
        key: String,
        value: Value,
        op: LeafOp,
    },
    Group {
        op: GroupOp,
        args: Vec<ConditionNode>,
    },
    /// Unrecognized tree shape or operator: matches nothing.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafOp {
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOp {
    And,
    Or,
}

impl ConditionNode {
    /// Parse raw condition JSON from a campaign trigger. Absent or `{}`
    /// conditions are trivially satisfied; a group without an operator, an
    /// unknown operator, or any other malformed shape parses to `Invalid`.
    pub fn parse(raw: &Value) -> ConditionNode {
        match raw {
            Value::Null => ConditionNode::Empty,
            Value::Object(obj) if obj.is_empty() => ConditionNode::Empty,
            Value::Object(obj) => Self::parse_object(obj),
            _ => ConditionNode::Invalid,
        }
    }

    fn parse_object(obj: &Map<String, Value>) -> ConditionNode {
        match obj.get("op").and_then(Value::as_str) {
            Some("eq") => {
                let key = obj.get("key").and_then(Value::as_str);
                let value = obj.get("value");
                match (key, value) {
                    (Some(key), Some(value)) => ConditionNode::Leaf {
                        key: key.to_string(),
                        value: value.clone(),
                        op: LeafOp::Eq,
                    },
                    _ => ConditionNode::Invalid,
                }
            }
            Some(op @ ("and" | "or")) => {
                let group_op = if op == "and" { GroupOp::And } else { GroupOp::Or };
                match obj.get("args").and_then(Value::as_array) {
                    Some(args) => ConditionNode::Group {
                        op: group_op,
                        args: args.iter().map(ConditionNode::parse).collect(),
                    },
                    None => ConditionNode::Invalid,
                }
            }
            _ => ConditionNode::Invalid,
        }
    }

    /// Evaluate this node against an event payload. Pure; never fails.
    pub fn matches(&self, payload: Option<&EventPayload>) -> bool {
        match self {
            ConditionNode::Empty => true,
            ConditionNode::Invalid => false,
            ConditionNode::Leaf {
                key,
                value,
                op: LeafOp::Eq,
            } => payload
                .and_then(|p| p.get(key))
                .is_some_and(|actual| actual == value),
            ConditionNode::Group {
                op: GroupOp::And,
                args,
            } => args.iter().all(|arg| arg.matches(payload)),
            ConditionNode::Group {
                op: GroupOp::Or,
                args,
            } => args.iter().any(|arg| arg.matches(payload)),
        }
    }
}
