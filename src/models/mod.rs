//! Built-in model configurations.
//!
//! One table per synchronized model, grouped by business area. Models only
//! referenced through lenient rules (countries, states) are not synced.

mod account;
mod common;
mod delivery;
mod partner;
mod product;
mod sale;

pub use product::{IMAGE_OWNERS, PUBLIC_CATEGORY};

use crate::sync::Registry;

/// Registry with every shipped model.
#[must_use]
pub fn builtin() -> Registry {
    let mut registry = Registry::new();
    for config in account::models()
        .into_iter()
        .chain(common::models())
        .chain(delivery::models())
        .chain(partner::models())
        .chain(product::models())
        .chain(sale::models())
    {
        registry.register(config);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::registry::{Dependency, ExportHook, ImportHook};
    use crate::sync::DEFAULT_PRIORITY;

    fn referenced(registry: &Registry) -> Vec<(&'static str, &'static str)> {
        let mut refs = Vec::new();
        for config in registry.iter() {
            let mut dependencies = Vec::new();
            if let Some(spec) = &config.import {
                dependencies.extend(spec.dependencies.iter());
                for hook in &spec.hooks {
                    match hook {
                        ImportHook::ImportChildren { model, .. }
                        | ImportHook::DeferChildren { model, .. }
                        | ImportHook::Link { model, .. }
                        | ImportHook::LinkOrDefer { model, .. } => refs.push((config.name, *model)),
                        ImportHook::Mirror(_) | ImportHook::StateTransitions { .. } => {}
                    }
                }
            }
            if let Some(spec) = &config.export {
                dependencies.extend(spec.dependencies.iter());
                for hook in &spec.hooks {
                    if let ExportHook::ExportChildren { model, .. } = hook {
                        refs.push((config.name, *model));
                    }
                }
            }
            for dependency in dependencies {
                match dependency {
                    Dependency::Many2One { model, .. } | Dependency::X2Many { model, .. } => {
                        refs.push((config.name, *model));
                    }
                    Dependency::Polymorphic { allowed, .. } => {
                        refs.extend(allowed.iter().map(|m| (config.name, *m)));
                    }
                }
            }
        }
        refs
    }

    #[test]
    fn test_every_reference_is_registered() {
        let registry = builtin();
        for (owner, model) in referenced(&registry) {
            assert!(registry.get(model).is_ok(), "{owner} references unregistered {model}");
        }
    }

    #[test]
    fn test_priorities() {
        let registry = builtin();
        assert_eq!(registry.priority_of("product.category"), 5);
        assert_eq!(registry.priority_of("product.attribute"), 5);
        assert_eq!(registry.priority_of("product.attribute.value"), 10);
        assert_eq!(registry.priority_of("product.template"), 15);
        assert_eq!(registry.priority_of("base_multi_image.image"), 15);
        assert_eq!(registry.priority_of("sale.order"), DEFAULT_PRIORITY);
    }

    #[test]
    fn test_export_children_are_exportable() {
        let registry = builtin();
        let order = registry.get("sale.order").unwrap();
        assert!(order.export_spec().is_ok());
        assert!(registry.get("sale.order.line").unwrap().export_spec().is_ok());
        assert!(registry.get("product.category").unwrap().export_spec().is_err());
    }
}
