// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Field-selective comparison between an observed object and its desired state.

/// Compares only the fields an adapter declares, copying desired values onto
/// the observed object as it goes. Fields the adapter does not name are left
/// exactly as the API server returned them.
#[derive(Debug)]
pub struct Drift<K> {
    existing: K,
    desired: K,
    changed: Vec<&'static str>,
    immutable: Vec<&'static str>,
}

impl<K> Drift<K> {
    pub fn new(existing: K, desired: K) -> Self {
        Self {
            existing,
            desired,
            changed: Vec::new(),
            immutable: Vec::new(),
        }
    }

    /// Compare one field reached through `lens`; on difference, overwrite the
    /// observed value with the desired one.
    pub fn field<T, F>(&mut self, name: &'static str, lens: F) -> &mut Self
    where
        T: PartialEq + Clone,
        F: Fn(&mut K) -> &mut T,
    {
        self.field_with(name, lens, |_| {})
    }

    /// Like [`Drift::field`], running `on_change` against the observed object
    /// after the field was corrected.
    pub fn field_with<T, F, C>(&mut self, name: &'static str, lens: F, on_change: C) -> &mut Self
    where
        T: PartialEq + Clone,
        F: Fn(&mut K) -> &mut T,
        C: FnOnce(&mut K),
    {
        let want = lens(&mut self.desired).clone();
        let have = lens(&mut self.existing);
        if *have != want {
            *have = want;
            self.changed.push(name);
            on_change(&mut self.existing);
        }
        self
    }

    /// Compare a field the API server refuses to change in place. A
    /// difference means the object has to be deleted and created again.
    pub fn immutable<T, F>(&mut self, name: &'static str, lens: F) -> &mut Self
    where
        T: PartialEq + Clone,
        F: Fn(&mut K) -> &mut T,
    {
        let want = lens(&mut self.desired).clone();
        if *lens(&mut self.existing) != want {
            self.immutable.push(name);
        }
        self
    }

    /// Mutable access to both sides, observed first. Used to carry
    /// server-assigned values over into the desired object before comparing.
    pub fn sides_mut(&mut self) -> (&mut K, &mut K) {
        (&mut self.existing, &mut self.desired)
    }

    pub fn changed(&self) -> &[&'static str] {
        &self.changed
    }

    pub fn immutable_changed(&self) -> &[&'static str] {
        &self.immutable
    }

    pub fn requires_replace(&self) -> bool {
        !self.immutable.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.changed.is_empty() && self.immutable.is_empty()
    }

    /// The observed object with every differing field corrected.
    pub fn into_existing(self) -> K {
        self.existing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Thing {
        image: Option<String>,
        replicas: Option<i32>,
        selector: String,
        annotations: Vec<String>,
    }

    fn thing(image: &str, replicas: i32) -> Thing {
        Thing {
            image: Some(image.to_string()),
            replicas: Some(replicas),
            selector: "app=demo".to_string(),
            annotations: Vec::new(),
        }
    }

    #[test]
    fn test_identical_objects_are_clean() {
        let mut drift = Drift::new(thing("a", 1), thing("a", 1));
        drift
            .field("image", |t| &mut t.image)
            .field("replicas", |t| &mut t.replicas);

        assert!(drift.is_clean());
        assert_eq!(drift.into_existing(), thing("a", 1));
    }

    #[test]
    fn test_only_declared_fields_are_corrected() {
        let mut existing = thing("a", 1);
        existing.annotations.push("kept".to_string());
        let mut drift = Drift::new(existing, thing("b", 3));
        drift.field("image", |t| &mut t.image);

        assert_eq!(drift.changed(), &["image"]);
        let updated = drift.into_existing();
        assert_eq!(updated.image.as_deref(), Some("b"));
        assert_eq!(updated.replicas, Some(1));
        assert_eq!(updated.annotations, vec!["kept".to_string()]);
    }

    #[test]
    fn test_on_change_runs_only_for_changed_field() {
        let mut drift = Drift::new(thing("a", 1), thing("b", 1));
        drift
            .field_with("image", |t| &mut t.image, |t| t.annotations.push("image".into()))
            .field_with(
                "replicas",
                |t| &mut t.replicas,
                |t| t.annotations.push("replicas".into()),
            );

        assert_eq!(drift.into_existing().annotations, vec!["image".to_string()]);
    }

    #[test]
    fn test_immutable_difference_requires_replace() {
        let mut desired = thing("a", 1);
        desired.selector = "app=other".to_string();
        let mut drift = Drift::new(thing("a", 1), desired);
        drift.immutable("selector", |t| &mut t.selector);

        assert!(drift.requires_replace());
        assert!(!drift.is_clean());
        assert_eq!(drift.immutable_changed(), &["selector"]);
        // immutable fields are never copied over
        assert_eq!(drift.into_existing().selector, "app=demo");
    }
}
