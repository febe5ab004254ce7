//! Get-or-create navigation over manifest trees
//!
//! Manifest templates are deserialized into typed structs whose optional
//! fields start out as `None`. Building a concrete manifest means walking a
//! clone of the template and materializing every node on the path. The
//! accessors here make that walk declarative:
//! - `FieldSpec` navigates a single optional field, installing a default
//!   value when the field is absent
//! - `ListChain` navigates a name-keyed list, appending a freshly named
//!   entry when the name is not present yet
//!
//! All operations are synchronous and mutate only the tree they are handed;
//! the configured template itself is never touched.

use std::collections::HashMap;

/// Accessor descriptor for an optional field of `T`.
///
/// `slot` exposes the field as a mutable `Option`; `factory` constructs the
/// value installed when the field is empty.
pub struct FieldSpec<T, Y> {
    factory: fn() -> Y,
    slot: fn(&mut T) -> &mut Option<Y>,
}

impl<T, Y> FieldSpec<T, Y> {
    pub const fn new(factory: fn() -> Y, slot: fn(&mut T) -> &mut Option<Y>) -> Self {
        Self { factory, slot }
    }

    /// Return the field value, installing `factory()` first if absent.
    ///
    /// Repeated calls on the same tree yield the same value; the factory
    /// runs at most once per tree.
    pub fn get_or_set<'a>(&self, object: &'a mut T) -> &'a mut Y {
        (self.slot)(object).get_or_insert_with(self.factory)
    }
}

/// Accessor descriptor for entries of a name-keyed list.
pub struct NamedItemSpec<T> {
    factory: fn() -> T,
    name: fn(&T) -> &str,
    set_name: fn(&mut T, String),
}

impl<T> NamedItemSpec<T> {
    pub const fn new(
        factory: fn() -> T,
        name: fn(&T) -> &str,
        set_name: fn(&mut T, String),
    ) -> Self {
        Self {
            factory,
            name,
            set_name,
        }
    }
}

/// A name-indexed view over a mutable list.
///
/// The index is built once at construction and kept consistent with the
/// appends performed through `entry`, so repeated lookups never rescan the
/// list and never create duplicate entries for one name.
pub struct ListChain<'a, T> {
    list: &'a mut Vec<T>,
    spec: &'a NamedItemSpec<T>,
    index: HashMap<String, usize>,
}

impl<'a, T> ListChain<'a, T> {
    pub fn new(list: &'a mut Vec<T>, spec: &'a NamedItemSpec<T>) -> Self {
        let index = list
            .iter()
            .enumerate()
            .map(|(position, item)| ((spec.name)(item).to_string(), position))
            .collect();

        Self { list, spec, index }
    }

    /// Return the entry with the given name, creating it if necessary.
    ///
    /// A created entry is named via the spec, appended at the end of the
    /// list, and indexed for subsequent lookups.
    pub fn entry(&mut self, name: &str) -> &mut T {
        let position = match self.index.get(name) {
            Some(&position) => position,
            None => {
                let mut item = (self.spec.factory)();
                (self.spec.set_name)(&mut item, name.to_string());
                self.list.push(item);

                let position = self.list.len() - 1;
                self.index.insert(name.to_string(), position);
                position
            }
        };

        &mut self.list[position]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Container {
        name: String,
        env: Option<Vec<EnvVar>>,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct EnvVar {
        name: String,
        value: Option<String>,
    }

    #[derive(Debug, Default)]
    struct PodSpec {
        containers: Option<Vec<Container>>,
    }

    const CONTAINERS: FieldSpec<PodSpec, Vec<Container>> =
        FieldSpec::new(Vec::new, |spec| &mut spec.containers);

    const CONTAINER_ENV: FieldSpec<Container, Vec<EnvVar>> =
        FieldSpec::new(Vec::new, |container| &mut container.env);

    const CONTAINER_NAME: NamedItemSpec<Container> = NamedItemSpec::new(
        Container::default,
        |container| &container.name,
        |container, name| container.name = name,
    );

    const ENV_VAR_NAME: NamedItemSpec<EnvVar> = NamedItemSpec::new(
        EnvVar::default,
        |var| &var.name,
        |var, name| var.name = name,
    );

    #[test]
    fn field_spec_installs_missing_value() {
        let mut spec = PodSpec::default();

        let containers = CONTAINERS.get_or_set(&mut spec);
        assert!(containers.is_empty());
        assert!(spec.containers.is_some());
    }

    #[test]
    fn field_spec_keeps_existing_value() {
        let mut spec = PodSpec {
            containers: Some(vec![Container {
                name: "app".to_string(),
                env: None,
            }]),
        };

        let containers = CONTAINERS.get_or_set(&mut spec);
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "app");
    }

    #[test]
    fn entry_finds_existing_item() {
        let mut list = vec![
            Container {
                name: "puller".to_string(),
                env: None,
            },
            Container {
                name: "builder".to_string(),
                env: None,
            },
        ];
        let mut chain = ListChain::new(&mut list, &CONTAINER_NAME);

        chain.entry("builder").env = Some(Vec::new());

        assert_eq!(list.len(), 2);
        assert!(list[1].env.is_some());
        assert!(list[0].env.is_none());
    }

    #[test]
    fn entry_appends_and_names_new_item() {
        let mut list = vec![Container {
            name: "puller".to_string(),
            env: None,
        }];
        let mut chain = ListChain::new(&mut list, &CONTAINER_NAME);

        chain.entry("sidecar");

        assert_eq!(list.len(), 2);
        assert_eq!(list[1].name, "sidecar");
    }

    #[test]
    fn entry_is_idempotent_within_one_chain() {
        let mut list: Vec<EnvVar> = Vec::new();
        let mut chain = ListChain::new(&mut list, &ENV_VAR_NAME);

        chain.entry("SOURCES").value = Some("first".to_string());
        chain.entry("SOURCES").value = Some("second".to_string());

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].value.as_deref(), Some("second"));
    }

    #[test]
    fn entry_preserves_list_order() {
        let mut list: Vec<EnvVar> = Vec::new();
        let mut chain = ListChain::new(&mut list, &ENV_VAR_NAME);

        chain.entry("A");
        chain.entry("B");
        chain.entry("A");
        chain.entry("C");

        let names: Vec<&str> = list.iter().map(|var| var.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn nested_chain_navigation() {
        let mut spec = PodSpec::default();

        let containers = CONTAINERS.get_or_set(&mut spec);
        let mut chain = ListChain::new(containers, &CONTAINER_NAME);
        let container = chain.entry("service");
        let env = CONTAINER_ENV.get_or_set(container);
        let mut env_chain = ListChain::new(env, &ENV_VAR_NAME);
        env_chain.entry("PORT").value = Some("8080".to_string());

        let containers = spec.containers.unwrap();
        assert_eq!(containers[0].name, "service");
        assert_eq!(
            containers[0].env.as_ref().unwrap()[0],
            EnvVar {
                name: "PORT".to_string(),
                value: Some("8080".to_string()),
            }
        );
    }
}
