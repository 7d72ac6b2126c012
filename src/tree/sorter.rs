use std::cmp::Ordering;
use std::fmt;

use crate::tree::node::{Node, NodeKind};

/// A single sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Keep the container's own child order.
    Manual,
    /// Alphabetical (case-insensitive).
    Name,
    /// Groups, then folders, then leaves.
    Kind,
    /// Creation order.
    Created,
    /// Number of direct children.
    ChildCount,
    /// Open containers before closed ones.
    OpenFirst,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::Manual,
        SortKey::Name,
        SortKey::Kind,
        SortKey::Created,
        SortKey::ChildCount,
        SortKey::OpenFirst,
    ];

    /// Parse a key from its config spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(SortKey::Manual),
            "name" => Some(SortKey::Name),
            "kind" => Some(SortKey::Kind),
            "created" | "id" => Some(SortKey::Created),
            "children" | "child_count" => Some(SortKey::ChildCount),
            "open" | "open_first" => Some(SortKey::OpenFirst),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Manual => "manual",
            SortKey::Name => "name",
            SortKey::Kind => "kind",
            SortKey::Created => "created",
            SortKey::ChildCount => "children",
            SortKey::OpenFirst => "open",
        }
    }

    /// Display label for the status line.
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Manual => "Manual",
            SortKey::Name => "Name",
            SortKey::Kind => "Kind",
            SortKey::Created => "Created",
            SortKey::ChildCount => "Children",
            SortKey::OpenFirst => "Open first",
        }
    }

    /// Cycle to the next key.
    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|k| k == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    fn compare<T>(&self, a: &Node<T>, b: &Node<T>) -> Ordering {
        match self {
            SortKey::Manual => Ordering::Equal,
            SortKey::Name => compare_names(&a.name, &b.name),
            SortKey::Kind => kind_rank(a.kind()).cmp(&kind_rank(b.kind())),
            SortKey::Created => a.id.cmp(&b.id),
            SortKey::ChildCount => a.children().len().cmp(&b.children().len()),
            SortKey::OpenFirst => b.is_open().cmp(&a.is_open()),
        }
    }
}

fn kind_rank(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Group => 0,
        NodeKind::Folder => 1,
        NodeKind::Leaf => 2,
    }
}

/// Ordinal, case-insensitive name comparison.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// One step of a comparator chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortStep {
    pub key: SortKey,
    pub descending: bool,
}

impl SortStep {
    pub fn asc(key: SortKey) -> Self {
        Self {
            key,
            descending: false,
        }
    }

    pub fn desc(key: SortKey) -> Self {
        Self {
            key,
            descending: true,
        }
    }
}

/// Multi-key comparator chain governing a container's child order.
///
/// Nodes are ordered by the first step, ties broken by the next one. An empty
/// chain sorts by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sorter {
    steps: Vec<SortStep>,
}

impl Sorter {
    pub fn new(steps: Vec<SortStep>) -> Self {
        Self { steps }
    }

    pub fn by(key: SortKey) -> Self {
        Self::new(vec![SortStep::asc(key)])
    }

    /// Append a tie-breaking step.
    pub fn then(mut self, step: SortStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[SortStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Parse a comma-separated chain such as `"kind,-created"`.
    ///
    /// A leading `-` makes the step descending. Unknown keys are skipped.
    pub fn parse(s: &str) -> Self {
        let steps = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .filter_map(|part| {
                let part = part.trim();
                let (descending, key) = match part.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, part),
                };
                SortKey::parse(key).map(|key| SortStep { key, descending })
            })
            .collect();
        Self { steps }
    }

    pub fn compare<T>(&self, a: &Node<T>, b: &Node<T>) -> Ordering {
        if self.steps.is_empty() {
            return compare_names(&a.name, &b.name);
        }
        let mut cmp = Ordering::Equal;
        for step in &self.steps {
            cmp = cmp.then_with(|| {
                let ord = step.key.compare(a, b);
                if step.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
            if cmp != Ordering::Equal {
                break;
            }
        }
        cmp
    }

    /// Stable sort of `items` by this chain.
    pub fn sort<T>(&self, items: &mut [&Node<T>]) {
        items.sort_by(|a, b| self.compare(a, b));
    }
}

impl fmt::Display for Sorter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .steps
            .iter()
            .map(|s| {
                if s.descending {
                    format!("-{}", s.key.as_str())
                } else {
                    s.key.as_str().to_string()
                }
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::{Container, NodeBody, NodeId};

    fn leaf(id: u64, name: &str) -> Node<()> {
        Node::new(NodeId(id), name.to_string(), None, NodeBody::Leaf(()))
    }

    fn group(id: u64, name: &str, children: usize) -> Node<()> {
        let container = Container {
            children: (0..children as u64).map(|i| NodeId(1000 + i)).collect(),
            ..Default::default()
        };
        Node::new(NodeId(id), name.to_string(), None, NodeBody::Group(container))
    }

    fn names<T>(nodes: &[&Node<T>]) -> Vec<String> {
        nodes.iter().map(|n| n.name.clone()).collect()
    }

    #[test]
    fn empty_chain_sorts_by_name_case_insensitive() {
        let (a, b, c) = (leaf(1, "beta"), leaf(2, "Alpha"), leaf(3, "gamma"));
        let mut items = vec![&a, &b, &c];
        Sorter::default().sort(&mut items);
        assert_eq!(names(&items), vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn chain_breaks_ties_with_later_steps() {
        let a = group(1, "b", 0);
        let b = leaf(2, "a");
        let c = group(3, "a", 0);
        let mut items = vec![&a, &b, &c];
        Sorter::by(SortKey::Kind)
            .then(SortStep::asc(SortKey::Name))
            .sort(&mut items);
        assert_eq!(names(&items), vec!["a", "b", "a"]);
        assert_eq!(items[2].id, NodeId(2));
    }

    #[test]
    fn manual_key_is_stable() {
        let (a, b, c) = (leaf(5, "z"), leaf(1, "y"), leaf(3, "x"));
        let mut items = vec![&a, &b, &c];
        Sorter::by(SortKey::Manual).sort(&mut items);
        assert_eq!(names(&items), vec!["z", "y", "x"]);
    }

    #[test]
    fn equal_keys_preserve_source_order() {
        let (a, b, c) = (group(1, "one", 2), group(2, "two", 1), group(3, "three", 2));
        let mut items = vec![&a, &b, &c];
        Sorter::by(SortKey::ChildCount).sort(&mut items);
        assert_eq!(names(&items), vec!["two", "one", "three"]);
    }

    #[test]
    fn descending_step_reverses() {
        let (a, b, c) = (leaf(1, "a"), leaf(2, "b"), leaf(3, "c"));
        let mut items = vec![&a, &b, &c];
        Sorter::new(vec![SortStep::desc(SortKey::Created)]).sort(&mut items);
        assert_eq!(names(&items), vec!["c", "b", "a"]);
    }

    #[test]
    fn parse_and_display_round_trip() {
        let sorter = Sorter::parse("kind, -created,bogus");
        assert_eq!(
            sorter.steps(),
            &[SortStep::asc(SortKey::Kind), SortStep::desc(SortKey::Created)]
        );
        assert_eq!(sorter.to_string(), "kind,-created");
        assert!(Sorter::parse("").is_empty());
    }

    #[test]
    fn cycle_keys() {
        let mut key = SortKey::Manual;
        for _ in 0..SortKey::ALL.len() {
            key = key.next();
        }
        assert_eq!(key, SortKey::Manual);
        assert_eq!(SortKey::Name.next(), SortKey::Kind);
    }
}
