//! Ordered step storage with stable indices.

use std::collections::BTreeMap;

use crate::{ScenaristError, ScenaristResult, StepBody, StepDefinition, StepKind};

/// Owns a scenario's step sequence during a run.
///
/// Indices are contiguous, assigned at registration and stable across
/// dynamic appends; names resolve to the index first registered under them.
#[derive(Debug, Default)]
pub struct StepStore {
    steps: Vec<StepDefinition>,
    by_name: BTreeMap<String, usize>,
}

impl StepStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step and hand back its index.
    ///
    /// Names must be unique, with one carve-out: a `SectionEnd` may reuse
    /// the name its `SectionBegin` declared as `end`, in which case the
    /// name keeps resolving to the earlier entry.
    pub fn register(&mut self, step: StepDefinition) -> ScenaristResult<usize> {
        if let Some(&existing) = self.by_name.get(&step.name) {
            let companion = step.kind == StepKind::SectionEnd
                && matches!(
                    &self.steps[existing].kind,
                    StepKind::SectionBegin { end } if *end == step.name
                );
            if !companion {
                return Err(ScenaristError::Definition(format!(
                    "duplicate step {:?}",
                    step.name
                )));
            }
        } else {
            self.by_name.insert(step.name.clone(), self.steps.len());
        }
        self.steps.push(step);
        Ok(self.steps.len() - 1)
    }

    /// Resolve a jump target. A missing name is a definition error, never a
    /// silent no-op.
    pub fn resolve(&self, name: &str) -> ScenaristResult<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ScenaristError::Definition(format!("no step named {name:?}")))
    }

    /// `None` past the end signals scenario completion.
    pub fn step_at(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    pub fn step_at_mut(&mut self, index: usize) -> Option<&mut StepDefinition> {
        self.steps.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepDefinition> {
        self.steps.iter()
    }

    /// Take a step body out so it can run while the store stays borrowable.
    pub fn take_body(&mut self, index: usize) -> Option<StepBody> {
        self.steps.get_mut(index).and_then(|s| s.body.take())
    }

    pub fn put_body(&mut self, index: usize, body: StepBody) {
        if let Some(step) = self.steps.get_mut(index) {
            step.body = Some(body);
        }
    }

    /// Index of the `SectionEnd` matching the `SectionBegin` at `begin`.
    pub fn section_end_index(&self, begin: usize) -> ScenaristResult<usize> {
        let end_name = match self.steps.get(begin).map(|s| &s.kind) {
            Some(StepKind::SectionBegin { end }) => end.clone(),
            _ => {
                return Err(ScenaristError::Definition(format!(
                    "step #{begin} is not a section begin"
                )))
            }
        };
        self.steps[begin + 1..]
            .iter()
            .position(|s| s.kind == StepKind::SectionEnd && s.name == end_name)
            .map(|offset| begin + 1 + offset)
            .ok_or_else(|| {
                ScenaristError::Definition(format!("no section end named {end_name:?}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_step(name: &str) -> StepDefinition {
        StepDefinition::body(name, name, Box::new(|_ctx| Ok(())))
    }

    fn marker(name: &str, kind: StepKind) -> StepDefinition {
        StepDefinition {
            name: name.to_string(),
            description: String::new(),
            kind,
            known_issues: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn indices_are_contiguous_and_stable() {
        let mut store = StepStore::new();
        assert_eq!(store.register(body_step("010")).unwrap(), 0);
        assert_eq!(store.register(body_step("020")).unwrap(), 1);
        assert_eq!(store.resolve("010").unwrap(), 0);
        // A later append must not move earlier indices.
        assert_eq!(store.register(body_step("030")).unwrap(), 2);
        assert_eq!(store.resolve("020").unwrap(), 1);
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut store = StepStore::new();
        store.register(body_step("010")).unwrap();
        let err = store.register(body_step("010")).unwrap_err();
        assert!(err.to_string().contains("duplicate step"));
    }

    #[test]
    fn unknown_target_is_an_error() {
        let store = StepStore::new();
        assert!(store.resolve("missing").is_err());
    }

    #[test]
    fn section_end_lookup() {
        let mut store = StepStore::new();
        store
            .register(marker(
                "opt-begin",
                StepKind::SectionBegin {
                    end: "opt-end".to_string(),
                },
            ))
            .unwrap();
        store.register(body_step("010")).unwrap();
        store.register(marker("opt-end", StepKind::SectionEnd)).unwrap();
        assert_eq!(store.section_end_index(0).unwrap(), 2);
    }

    #[test]
    fn body_take_and_put() {
        let mut store = StepStore::new();
        store.register(body_step("010")).unwrap();
        let body = store.take_body(0).unwrap();
        assert!(store.take_body(0).is_none());
        store.put_body(0, body);
        assert!(store.take_body(0).is_some());
    }
}
