use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

use super::{ContextFrame, FailureKind, RecordedFailure};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FailureNode {
    pub frame: Option<ContextFrame>,
    pub failures: Vec<RecordedFailure>,
    pub children: Vec<FailureNode>,
}

impl FailureNode {
    pub fn child_mut(&mut self, frame: ContextFrame) -> &mut FailureNode {
        let position = match self
            .children
            .iter()
            .position(|child| child.frame.as_ref() == Some(&frame))
        {
            Some(position) => position,
            None => {
                self.children.push(FailureNode {
                    frame: Some(frame),
                    ..Default::default()
                });
                self.children.len() - 1
            }
        };
        &mut self.children[position]
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || self.children.iter().any(FailureNode::has_failures)
    }

    /// Drops every branch that carries no failure.
    pub fn prune(mut self) -> Option<FailureNode> {
        self.children = self
            .children
            .into_iter()
            .filter_map(FailureNode::prune)
            .collect();
        if self.failures.is_empty() && self.children.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    pub fn flatten(&self) -> Vec<Failure> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.collect(&mut stack, &mut out);
        out
    }

    fn collect(&self, stack: &mut Vec<ContextFrame>, out: &mut Vec<Failure>) {
        if let Some(frame) = &self.frame {
            stack.push(frame.clone());
        }
        for failure in &self.failures {
            out.push(Failure {
                context: stack.clone(),
                kind: failure.kind.clone(),
                message: failure.message.clone(),
            });
        }
        for child in &self.children {
            child.collect(stack, out);
        }
        if self.frame.is_some() {
            stack.pop();
        }
    }

    fn merge(&mut self, other: FailureNode) {
        self.failures.extend(other.failures);
        for child in other.children {
            if let Some(frame) = child.frame.clone() {
                self.child_mut(frame).merge(child);
            }
        }
    }

    fn find(&self, frames: &[ContextFrame]) -> Option<&FailureNode> {
        match frames.split_first() {
            None => Some(self),
            Some((first, rest)) => self
                .children
                .iter()
                .find(|child| child.frame.as_ref() == Some(first))
                .and_then(|child| child.find(rest)),
        }
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "    ".repeat(depth);
        for failure in &self.failures {
            writeln!(f, "{indent}- {}", failure.message)?;
        }
        for child in &self.children {
            if let Some(frame) = &child.frame {
                writeln!(f, "{indent}{frame}:")?;
            }
            child.write_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl Serialize for FailureNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let has_failures = !self.failures.is_empty();
        let mut map =
            serializer.serialize_map(Some(self.children.len() + usize::from(has_failures)))?;
        if has_failures {
            let messages: Vec<&str> = self.failures.iter().map(|f| f.message.as_str()).collect();
            map.serialize_entry("failures", &messages)?;
        }
        for child in &self.children {
            if let Some(frame) = &child.frame {
                map.serialize_entry(&frame.to_string(), child)?;
            }
        }
        map.end()
    }
}

/// A single failure with the full context it was recorded under.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub context: Vec<ContextFrame>,
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn index(&self) -> Option<&str> {
        self.context.iter().find_map(|frame| match frame {
            ContextFrame::Index(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Dotted path of every non-index frame, e.g. `myField.format`.
    pub fn path(&self) -> String {
        self.context
            .iter()
            .filter(|frame| !matches!(frame, ContextFrame::Index(_)))
            .map(ContextFrame::name)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frames: Vec<String> = self.context.iter().map(ToString::to_string).collect();
        write!(f, "{}: {}", frames.join(", "), self.message)
    }
}

/// Structured outcome of a failed operation, mirroring the failure context tree.
///
/// Serializes to nested JSON objects keyed by frame label (`"index 'books'"`,
/// `"field 'title'"`, ...) with a `"failures"` array wherever messages were recorded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureReport {
    root: FailureNode,
}

impl FailureReport {
    pub(crate) fn from_root(root: FailureNode) -> Self {
        Self { root }
    }

    pub fn is_empty(&self) -> bool {
        !self.root.has_failures()
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.root.flatten()
    }

    /// Messages recorded exactly at the given context.
    pub fn failures_at(&self, frames: &[ContextFrame]) -> Vec<&str> {
        self.root
            .find(frames)
            .map(|node| node.failures.iter().map(|f| f.message.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn indexes(&self) -> Vec<&str> {
        self.root
            .children
            .iter()
            .filter_map(|child| match &child.frame {
                Some(ContextFrame::Index(name)) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn merge(&mut self, other: FailureReport) {
        self.root.merge(other.root);
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.root).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for FailureReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Schema validation failed. See below for details.")?;
        self.root.write_tree(f, 0)
    }
}
