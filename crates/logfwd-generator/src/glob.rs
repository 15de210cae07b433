//! # Container path globs
//!
//! Container logs live under `/var/log/pods/<namespace>_<pod>_<uid>/<container>/`.
//! Namespace and container selections are turned into path globs over
//! that layout. The rules are fixed for compatibility with existing
//! collector configurations.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use logfwd_api::NamespaceContainer;

/// Glob matching every container log
pub const EVERYTHING: &str = "/var/log/pods/*/*/*.log";

static CONSECUTIVE_WILDCARDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*+").expect("wildcard pattern is valid"));

/// Replace every run of `*` with a single `*`
pub fn collapse_wildcards(entry: &str) -> String {
    CONSECUTIVE_WILDCARDS.replace_all(entry, "*").into_owned()
}

/// Directory fragment matching the pod directories of a namespace
pub fn normalize_namespace(ns: &str) -> String {
    if ns == "*" {
        return ns.to_string();
    }
    format!("{}_*", collapse_wildcards(ns))
}

/// Builder collecting namespace, container and extension selections
#[derive(Debug, Clone, Default)]
pub struct ContainerPathGlobBuilder {
    namespaces: BTreeSet<String>,
    containers: BTreeSet<String>,
    combined: BTreeSet<String>,
    paths: Vec<String>,
}

impl ContainerPathGlobBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace and container pairs; an empty side matches anything
    pub fn add_combined<'a, I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = &'a NamespaceContainer>,
    {
        for entry in entries {
            let ns = if entry.namespace.is_empty() { "*" } else { &entry.namespace };
            let container = if entry.container.is_empty() { "*" } else { &entry.container };
            self.combined.insert(format!(
                "{}/{}",
                normalize_namespace(ns),
                collapse_wildcards(container)
            ));
        }
        self
    }

    pub fn add_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ns in namespaces {
            let ns = ns.as_ref();
            if !ns.is_empty() {
                self.namespaces.insert(normalize_namespace(ns));
            }
        }
        self
    }

    pub fn add_containers<I, S>(mut self, containers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for c in containers {
            let c = c.as_ref();
            if !c.is_empty() {
                self.containers.insert(collapse_wildcards(c));
            }
        }
        self
    }

    /// Log files with the given extensions in any container directory
    pub fn add_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            self.paths
                .push(format!("/var/log/pods/*/*/*.{}", collapse_wildcards(ext.as_ref())));
        }
        self
    }

    /// Paths relative to the pod log root
    pub fn add_other<I, S>(mut self, other: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in other {
            self.paths
                .push(format!("/var/log/pods/{}", collapse_wildcards(path.as_ref())));
        }
        self
    }

    /// Sorted globs. Namespaces listed in `exclude_from_containers` are
    /// not crossed with the container selection. A selection matching
    /// everything yields no globs at all.
    pub fn build<S: AsRef<str>>(&self, exclude_from_containers: &[S]) -> Vec<String> {
        let uncombined: BTreeSet<String> = exclude_from_containers
            .iter()
            .map(|ns| normalize_namespace(ns.as_ref()))
            .collect();

        let mut unique: BTreeSet<String> = self.paths.iter().cloned().collect();
        for nc in &self.combined {
            unique.insert(format!("/var/log/pods/{}/*.log", nc));
        }

        match (self.namespaces.is_empty(), self.containers.is_empty()) {
            (false, true) => {
                for ns in &self.namespaces {
                    unique.insert(format!("/var/log/pods/{}/*/*.log", ns));
                }
            }
            (true, false) => {
                for c in &self.containers {
                    unique.insert(format!("/var/log/pods/*/{}/*.log", c));
                }
            }
            (false, false) => {
                for c in &self.containers {
                    for ns in &self.namespaces {
                        let container = if uncombined.contains(ns) { "*" } else { c.as_str() };
                        unique.insert(format!("/var/log/pods/{}/{}/*.log", ns, container));
                    }
                }
            }
            (true, true) => {}
        }

        if unique.len() == 1 && unique.contains(EVERYTHING) {
            return Vec::new();
        }
        unique.into_iter().collect()
    }
}

/// Include globs for an application input's include list
pub fn include_globs(includes: &[NamespaceContainer]) -> Vec<String> {
    ContainerPathGlobBuilder::new()
        .add_combined(includes)
        .build::<&str>(&[])
}

/// Collector, store and console pods never feed back into a pipeline
pub fn collector_excludes(namespace: &str) -> Vec<String> {
    ContainerPathGlobBuilder::new()
        .add_other([
            format!("{}_collector-*/*/*.log", namespace),
            format!("{}_elasticsearch-*/*/*.log", namespace),
            format!("{}_kibana-*/*/*.log", namespace),
            format!("{}_*/loki*/*.log", namespace),
        ])
        .add_extensions(["gz", "tmp"])
        .build::<&str>(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_collapse_wildcards() {
        assert_eq!(collapse_wildcards("a**b***c"), "a*b*c");
        assert_eq!(collapse_wildcards("***"), "*");
        assert_eq!(collapse_wildcards("plain"), "plain");
    }

    #[test]
    fn test_namespace_and_container() {
        let globs = ContainerPathGlobBuilder::new()
            .add_namespaces(["foo"])
            .add_containers(["bar"])
            .build::<&str>(&[]);
        assert_eq!(globs, vec!["/var/log/pods/foo_*/bar/*.log"]);
    }

    #[test]
    fn test_nothing_selected() {
        assert!(ContainerPathGlobBuilder::new().build::<&str>(&[]).is_empty());
    }

    #[test]
    fn test_everything_collapses_to_empty() {
        let globs = ContainerPathGlobBuilder::new()
            .add_namespaces(["*"])
            .add_containers(["*"])
            .build::<&str>(&[]);
        assert!(globs.is_empty());
    }

    #[test]
    fn test_combined_includes_are_sorted() {
        let includes = vec![
            NamespaceContainer::new("b", "c"),
            NamespaceContainer::namespace("a"),
        ];
        assert_eq!(
            include_globs(&includes),
            vec!["/var/log/pods/a_*/*/*.log", "/var/log/pods/b_*/c/*.log"]
        );
    }

    #[test]
    fn test_wildcard_namespaces_collapse() {
        let globs = ContainerPathGlobBuilder::new()
            .add_namespaces(["openshift-**", "kube"])
            .build::<&str>(&[]);
        assert_eq!(
            globs,
            vec!["/var/log/pods/kube_*/*/*.log", "/var/log/pods/openshift-*_*/*/*.log"]
        );
    }

    #[test]
    fn test_excluded_namespaces_are_not_crossed_with_containers() {
        let globs = ContainerPathGlobBuilder::new()
            .add_namespaces(["app", "openshift-*"])
            .add_containers(["web"])
            .build(&["openshift-*"]);
        assert_eq!(
            globs,
            vec!["/var/log/pods/app_*/web/*.log", "/var/log/pods/openshift-*_*/*/*.log"]
        );
    }

    #[test]
    fn test_extensions_and_other_paths() {
        let globs = ContainerPathGlobBuilder::new()
            .add_extensions(["gz", "tmp"])
            .add_other(["openshift-logging_collector-*/*/*.log"])
            .build::<&str>(&[]);
        assert_eq!(
            globs,
            vec![
                "/var/log/pods/*/*/*.gz",
                "/var/log/pods/*/*/*.tmp",
                "/var/log/pods/openshift-logging_collector-*/*/*.log",
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_collapse_leaves_no_double_wildcard(s in "[a*]{0,12}") {
            let collapsed = collapse_wildcards(&s);
            prop_assert!(!collapsed.contains("**"));
            prop_assert_eq!(collapse_wildcards(&collapsed), collapsed.clone());
            prop_assert_eq!(collapsed.replace('*', ""), s.replace('*', ""));
        }

        #[test]
        fn prop_globs_are_sorted_and_unique(
            namespaces in prop::collection::vec("[a-c*]{1,3}", 0..4),
            containers in prop::collection::vec("[x-z*]{1,3}", 0..4),
        ) {
            let globs = ContainerPathGlobBuilder::new()
                .add_namespaces(&namespaces)
                .add_containers(&containers)
                .build::<&str>(&[]);
            let mut sorted = globs.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(&globs, &sorted);
            prop_assert!(!globs.iter().any(|g| g.contains("**")));
        }
    }
}
