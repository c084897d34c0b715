//! # Recursion Support
//!
//! Dependency analysis between predicates and stratification of a rule set.
//!
//! A predicate `a` *derives* `b` when some rule for `a` mentions `b` in its
//! body, directly or through other rules:
//! ```datalog
//! tc(X, Y) :- edge(X, Z), tc(Z, Y).   // tc derives edge and tc
//! ```
//!
//! Predicates that derive each other are *mutually recursive* and are
//! evaluated together as one stratum. Strata are ordered so that every
//! stratum only depends on itself and on earlier strata.
//!
//! Stratified negation requires a negated atom to name a predicate of a
//! strictly earlier stratum; a negated atom inside its own recursive cycle
//! is rejected.

use crate::ast::RuleSet;
use crate::error::{EvalError, EvalResult};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Type of dependency between predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyType {
    /// Head depends on the predicate through a positive atom
    Positive,
    /// Head depends on the predicate through a negated atom; the predicate
    /// must live in a strictly earlier stratum
    Negative,
}

/// Direct head -> body dependencies of a rule set
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Map from head predicate to the body predicates its rules mention
    pub edges: BTreeMap<String, Vec<(String, DependencyType)>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: &RuleSet) -> Self {
        let mut graph = DependencyGraph::new();
        for rule in rules.iter() {
            for atom in &rule.body {
                let dep_type = if atom.negated {
                    DependencyType::Negative
                } else {
                    DependencyType::Positive
                };
                graph.add_edge(&rule.head.name, &atom.name, dep_type);
            }
        }
        graph
    }

    pub fn add_edge(&mut self, from: &str, to: &str, dep_type: DependencyType) {
        let deps = self.edges.entry(from.to_string()).or_default();
        if !deps.iter().any(|(name, t)| name == to && *t == dep_type) {
            deps.push((to.to_string(), dep_type));
        }
    }

    /// Direct dependencies of `relation`, of either type
    pub fn dependencies(&self, relation: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(relation)
            .into_iter()
            .flatten()
            .map(|(name, _)| name.as_str())
    }

    /// Direct dependencies through negated atoms
    pub fn negative_deps(&self, relation: &str) -> Vec<&str> {
        self.edges
            .get(relation)
            .map(|deps| {
                deps.iter()
                    .filter(|(_, t)| *t == DependencyType::Negative)
                    .map(|(r, _)| r.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every predicate reachable from `relation` through one or more edges.
    ///
    /// `relation` itself is included only if it lies on a cycle.
    pub fn reachable(&self, relation: &str) -> BTreeSet<String> {
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut stack: Vec<&str> = self.dependencies(relation).collect();
        while let Some(next) = stack.pop() {
            if visited.insert(next.to_string()) {
                stack.extend(self.dependencies(next));
            }
        }
        visited
    }
}

/// Whether the rules for `a` reach `b` through body atoms, transitively
pub fn derives(rules: &RuleSet, a: &str, b: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack = vec![a];
    while let Some(current) = stack.pop() {
        for rule in rules.rules_for(current) {
            for atom in &rule.body {
                if atom.name == b {
                    return true;
                }
                if visited.insert(atom.name.as_str()) {
                    stack.push(atom.name.as_str());
                }
            }
        }
    }
    false
}

/// `a == b`, or `a` and `b` derive each other
pub fn mutual_rec(rules: &RuleSet, a: &str, b: &str) -> bool {
    a == b || (derives(rules, a, b) && derives(rules, b, a))
}

/// Partition the rule set's head names into strata.
///
/// Each stratum is a maximal group of mutually recursive head names, sorted.
/// Strata are in dependency order: no stratum depends on a later one. Ties
/// between independent strata are broken by name, so the result is
/// deterministic.
pub fn strata(rules: &RuleSet) -> Vec<Vec<String>> {
    let graph = DependencyGraph::from_rules(rules);
    let heads: Vec<&str> = rules.names().collect();
    let reach: HashMap<&str, BTreeSet<String>> =
        heads.iter().map(|h| (*h, graph.reachable(h))).collect();
    let depends = |a: &str, b: &str| reach.get(a).is_some_and(|r| r.contains(b));

    // Group into mutual-recursion classes; heads are visited in sorted order,
    // so each class is sorted and keyed by its smallest member.
    let mut class_of: HashMap<&str, usize> = HashMap::new();
    let mut classes: Vec<Vec<String>> = Vec::new();
    for head in &heads {
        if class_of.contains_key(head) {
            continue;
        }
        let id = classes.len();
        let mut members = Vec::new();
        for other in &heads {
            if other == head || (depends(*head, *other) && depends(*other, *head)) {
                class_of.insert(*other, id);
                members.push((*other).to_string());
            }
        }
        classes.push(members);
    }

    // Kahn's algorithm over the class graph
    let mut indegree = vec![0usize; classes.len()];
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); classes.len()];
    for head in &heads {
        let to = class_of[head];
        for dep in graph.dependencies(head) {
            if let Some(&from) = class_of.get(dep) {
                if from != to && dependents[from].insert(to) {
                    indegree[to] += 1;
                }
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..classes.len()).filter(|c| indegree[*c] == 0).collect();
    let mut order = Vec::with_capacity(classes.len());
    while let Some(class) = ready.pop_first() {
        order.push(class);
        for &next in &dependents[class] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    order.into_iter().map(|c| classes[c].clone()).collect()
}

/// Reject negated atoms that name a predicate of the rule's own stratum
pub fn check_stratified_negation(rules: &RuleSet, strata: &[Vec<String>]) -> EvalResult<()> {
    let graph = DependencyGraph::from_rules(rules);
    for stratum in strata {
        for head in stratum {
            let Some(predicate) = graph
                .negative_deps(head)
                .into_iter()
                .find(|dep| stratum.iter().any(|name| name.as_str() == *dep))
            else {
                continue;
            };
            let rule = rules
                .rules_for(head)
                .iter()
                .find(|rule| rule.negated_atoms().any(|atom| atom.name == predicate));
            return Err(EvalError::UnstratifiableNegation {
                rule: rule.map(ToString::to_string).unwrap_or_default(),
                predicate: predicate.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::RuleBuilder;

    fn tc_rules() -> RuleSet {
        vec![
            RuleBuilder::new("tc")
                .head_vars(["X", "Y"])
                .body_atom("edge", ["X", "Y"])
                .build(),
            RuleBuilder::new("tc")
                .head_vars(["X", "Y"])
                .body_atom("edge", ["X", "Z"])
                .body_atom("tc", ["Z", "Y"])
                .build(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_derives_is_transitive() {
        let mut rules = tc_rules();
        // reach(X) :- tc(1, X).
        rules.insert(
            RuleBuilder::new("reach")
                .head_vars(["X"])
                .body(crate::ast::builders::atom("tc").val(1u64).var("X").build())
                .build(),
        );

        assert!(derives(&rules, "tc", "edge"));
        assert!(derives(&rules, "tc", "tc"));
        assert!(derives(&rules, "reach", "edge"));
        assert!(!derives(&rules, "tc", "reach"));
        assert!(!derives(&rules, "edge", "tc"));
    }

    #[test]
    fn test_derives_terminates_on_cycles() {
        let rules: RuleSet = vec![
            RuleBuilder::new("a").head_vars(["X"]).body_atom("b", ["X"]).build(),
            RuleBuilder::new("b").head_vars(["X"]).body_atom("a", ["X"]).build(),
        ]
        .into_iter()
        .collect();
        assert!(!derives(&rules, "a", "missing"));
        assert!(mutual_rec(&rules, "a", "b"));
    }

    #[test]
    fn test_mutual_rec() {
        let rules: RuleSet = vec![
            RuleBuilder::new("even").head_vars(["X"]).body_atom("odd", ["X"]).build(),
            RuleBuilder::new("odd").head_vars(["X"]).body_atom("even", ["X"]).build(),
            RuleBuilder::new("top").head_vars(["X"]).body_atom("even", ["X"]).build(),
        ]
        .into_iter()
        .collect();

        assert!(mutual_rec(&rules, "even", "odd"));
        assert!(mutual_rec(&rules, "top", "top"));
        assert!(!mutual_rec(&rules, "top", "even"));
    }

    #[test]
    fn test_strata_dependency_order() {
        // c depends on b, b depends on a; names chosen against alphabetical order
        let rules: RuleSet = vec![
            RuleBuilder::new("a").head_vars(["X"]).body_atom("c", ["X"]).build(),
            RuleBuilder::new("c").head_vars(["X"]).body_atom("z", ["X"]).build(),
            RuleBuilder::new("z").head_vars(["X"]).body_atom("e", ["X"]).build(),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            strata(&rules),
            vec![vec!["z".to_string()], vec!["c".to_string()], vec!["a".to_string()]]
        );
    }

    #[test]
    fn test_strata_groups_mutual_recursion() {
        let rules: RuleSet = vec![
            RuleBuilder::new("even").head_vars(["X"]).body_atom("odd", ["X"]).build(),
            RuleBuilder::new("odd").head_vars(["X"]).body_atom("even", ["X"]).build(),
            RuleBuilder::new("odd").head_vars(["X"]).body_atom("seed", ["X"]).build(),
            RuleBuilder::new("seed").head_vars(["X"]).body_atom("n", ["X"]).build(),
            RuleBuilder::new("out").head_vars(["X"]).body_atom("even", ["X"]).build(),
        ]
        .into_iter()
        .collect();

        let strata = strata(&rules);
        assert_eq!(
            strata,
            vec![
                vec!["seed".to_string()],
                vec!["even".to_string(), "odd".to_string()],
                vec!["out".to_string()],
            ]
        );
    }

    #[test]
    fn test_stratified_negation_accepted() {
        // unreachable(X) :- node(X), !reach(X).
        let mut rules = tc_rules();
        rules.insert(
            RuleBuilder::new("unreachable")
                .head_vars(["X"])
                .body_atom("node", ["X"])
                .negated_atom("tc", ["X", "X"])
                .build(),
        );
        let strata = strata(&rules);
        assert!(check_stratified_negation(&rules, &strata).is_ok());
    }

    #[test]
    fn test_negation_through_recursion_rejected() {
        // p(X) :- n(X), !q(X).  q(X) :- p(X).
        let rules: RuleSet = vec![
            RuleBuilder::new("p")
                .head_vars(["X"])
                .body_atom("n", ["X"])
                .negated_atom("q", ["X"])
                .build(),
            RuleBuilder::new("q").head_vars(["X"]).body_atom("p", ["X"]).build(),
        ]
        .into_iter()
        .collect();

        let strata = strata(&rules);
        assert!(matches!(
            check_stratified_negation(&rules, &strata),
            Err(EvalError::UnstratifiableNegation { rule, predicate })
                if predicate == "q" && rule == "p(X) :- n(X), !q(X)"
        ));
    }

    #[test]
    fn test_dependency_graph_edges() {
        let mut rules = tc_rules();
        rules.insert(
            RuleBuilder::new("lonely")
                .head_vars(["X"])
                .body_atom("node", ["X"])
                .negated_atom("tc", ["X", "X"])
                .build(),
        );
        let graph = DependencyGraph::from_rules(&rules);
        assert_eq!(graph.negative_deps("lonely"), vec!["tc"]);
        assert!(graph.negative_deps("tc").is_empty());

        let reach = graph.reachable("lonely");
        assert!(reach.contains("edge"));
        assert!(!reach.contains("lonely"));
        assert!(graph.reachable("tc").contains("tc"));
    }
}
