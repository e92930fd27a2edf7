// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Layers: ordered, named recipe search-path roots that may be managed
//! (fetched through an SCM capability and cached by `bob-workspace`) or
//! unmanaged (already present on disk). Spec.md §3 Layer, §4.4.

use std::path::PathBuf;

use crate::config::LayerRef;

#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub managed: bool,
    pub scm_kind: Option<String>,
    pub scm_url: Option<String>,
    /// Populated once the layer has been materialized on disk, either by
    /// `bob-workspace` (managed) or from the project's own directory tree
    /// (unmanaged). `None` before materialization.
    pub root: Option<PathBuf>,
}

impl Layer {
    pub fn from_config(config_ref: &LayerRef) -> Self {
        Self {
            name: config_ref.name.clone(),
            managed: config_ref.managed,
            scm_kind: config_ref.scm_kind.clone(),
            scm_url: config_ref.scm_url.clone(),
            root: None,
        }
    }

    pub fn materialized(mut self, root: PathBuf) -> Self {
        self.root = Some(root);
        self
    }
}

/// An ordered stack of layers, earliest-declared first; later layers'
/// recipes shadow earlier ones of the same name when searching for a
/// recipe file (spec.md §4.1's layered search path).
#[derive(Debug, Clone, Default)]
pub struct LayerStack(Vec<Layer>);

impl LayerStack {
    pub fn push(&mut self, layer: Layer) {
        self.0.push(layer);
    }

    pub fn layers(&self) -> &[Layer] {
        &self.0
    }

    /// Search from the last (most recently declared, highest-precedence)
    /// layer backward for `relative_path`, returning the first hit.
    pub fn resolve(&self, relative_path: &str) -> Option<PathBuf> {
        self.0.iter().rev().find_map(|layer| {
            let root = layer.root.as_ref()?;
            let candidate = root.join(relative_path);
            candidate.exists().then_some(candidate)
        })
    }
}

#[cfg(test)]
mod layer_test {
    use super::*;

    #[test]
    fn later_layer_shadows_earlier_layer() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        std::fs::write(dir_a.path().join("widget.yaml"), "inherit: []\n").unwrap();
        std::fs::write(dir_b.path().join("widget.yaml"), "inherit: []\n").unwrap();

        let mut stack = LayerStack::default();
        stack.push(Layer {
            name: "base".to_string(),
            managed: false,
            scm_kind: None,
            scm_url: None,
            root: Some(dir_a.path().to_path_buf()),
        });
        stack.push(Layer {
            name: "overlay".to_string(),
            managed: false,
            scm_kind: None,
            scm_url: None,
            root: Some(dir_b.path().to_path_buf()),
        });

        let resolved = stack.resolve("widget.yaml").unwrap();
        assert_eq!(resolved, dir_b.path().join("widget.yaml"));
    }

    #[test]
    fn missing_file_resolves_to_none() {
        let stack = LayerStack::default();
        assert!(stack.resolve("missing.yaml").is_none());
    }
}
