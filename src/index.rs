use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;

use crate::model::ClassModel;

/// Descriptor-keyed view over built class models, nested classes included.
pub(crate) struct ClassIndex<'a> {
    classes: BTreeMap<&'a str, &'a ClassModel>,
}

impl<'a> ClassIndex<'a> {
    pub(crate) fn build(classes: &'a [ClassModel]) -> Result<Self> {
        let mut class_map: BTreeMap<&'a str, Vec<&'a ClassModel>> = BTreeMap::new();
        for class in classes.iter().flat_map(ClassModel::flatten) {
            class_map
                .entry(class.descriptor.as_str())
                .or_default()
                .push(class);
        }

        let duplicates: Vec<String> = class_map
            .iter()
            .filter(|(_, models)| models.len() > 1)
            .map(|(descriptor, models)| format!("{descriptor} ({} times)", models.len()))
            .collect();
        if !duplicates.is_empty() {
            anyhow::bail!("duplicate classes found: {}", duplicates.join(", "));
        }

        let classes = class_map
            .into_iter()
            .filter_map(|(descriptor, models)| {
                models.into_iter().next().map(|model| (descriptor, model))
            })
            .collect();
        Ok(Self { classes })
    }

    pub(crate) fn get(&self, descriptor: &str) -> Option<&'a ClassModel> {
        self.classes.get(descriptor).copied()
    }

    /// Direct subclasses of `super_descriptor`, ordered by descriptor.
    pub(crate) fn subclasses_of(&self, super_descriptor: &str) -> Vec<&'a ClassModel> {
        self.classes
            .values()
            .filter(|class| {
                class
                    .super_class
                    .as_ref()
                    .is_some_and(|detail| detail.full == super_descriptor)
            })
            .copied()
            .collect()
    }

    /// Drop classes enclosed, at any depth, by another class of `classes`; they are
    /// already reachable through that class's `inner_classes`.
    pub(crate) fn without_nested(&self, classes: Vec<&'a ClassModel>) -> Vec<&'a ClassModel> {
        let selected: BTreeSet<&'a str> = classes
            .iter()
            .copied()
            .map(|class: &'a ClassModel| class.descriptor.as_str())
            .collect();
        classes
            .into_iter()
            .filter(|class| {
                let mut outer = class.outer_class.as_deref();
                while let Some(descriptor) = outer {
                    if selected.contains(descriptor) {
                        return false;
                    }
                    outer = self
                        .get(descriptor)
                        .and_then(|model| model.outer_class.as_deref());
                }
                true
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.classes.len()
    }
}
