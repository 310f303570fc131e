//! Structural validation of multipart models
//!
//! The reference graph over one multipart's own submodels must be acyclic.
//! References that resolve outside the multipart (library parts, external
//! models) are not followed: they cannot point back into it.

use crate::error::{Error, Result};
use crate::model::{Link, Model, ModelMultipart};
use crate::utils::normalize_name;
use std::collections::HashSet;

/// Submodel indices referenced by a model
///
/// Unresolved references whose filename names a submodel count too, so the
/// check also works before [`ModelMultipart::link_submodels`] runs.
fn submodel_edges(mm: &ModelMultipart, model: &Model) -> Vec<usize> {
    model
        .references()
        .filter_map(|r| match r.link {
            Link::Submodel(i) => Some(i),
            Link::Unresolved => mm.find_submodel_index(&normalize_name(&r.filename)),
            _ => None,
        })
        .collect()
}

/// Depth-first search for a cycle through `index`
///
/// `done` holds models already proven cycle-free; `path` is the current chain.
fn detect_circular_references(
    mm: &ModelMultipart,
    index: usize,
    done: &mut HashSet<usize>,
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    if let Some(start) = path.iter().position(|&i| i == index) {
        let mut cycle = path[start..].to_vec();
        cycle.push(index);
        return Some(cycle);
    }
    if done.contains(&index) {
        return None;
    }
    let model = mm.model(index)?;

    path.push(index);
    for next in submodel_edges(mm, model) {
        if let Some(cycle) = detect_circular_references(mm, next, done, path) {
            return Some(cycle);
        }
    }
    path.pop();
    done.insert(index);
    None
}

fn display_name(mm: &ModelMultipart, index: usize) -> String {
    match mm.submodel_name(index) {
        Some(name) => name.to_string(),
        None => {
            let main = mm.main();
            if main.name.is_empty() {
                "<main>".to_string()
            } else {
                main.name.clone()
            }
        }
    }
}

/// Find a reference cycle starting from the main model or any submodel
///
/// Returns the names along the cycle, first name repeated at the end.
pub fn find_cycle(mm: &ModelMultipart) -> Option<Vec<String>> {
    let mut done = HashSet::new();
    let mut path = Vec::new();
    (0..mm.models().len()).find_map(|start| {
        path.clear();
        detect_circular_references(mm, start, &mut done, &mut path)
            .map(|cycle| cycle.into_iter().map(|i| display_name(mm, i)).collect())
    })
}

/// Fail on a reference cycle
///
/// # Errors
///
/// Returns [`Error::CyclicReference`] naming `operation` and the cycle.
pub fn validate_multipart(mm: &ModelMultipart, operation: &'static str) -> Result<()> {
    match find_cycle(mm) {
        Some(cycle) => Err(Error::cyclic_reference(operation, &cycle)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::model::Reference;

    fn model_referencing(name: &str, targets: &[&str]) -> Model {
        let mut m = Model::with_name(name);
        for t in targets {
            m.insert_element(Reference::new(Color::MAIN, *t).into());
        }
        m
    }

    #[test]
    fn test_acyclic_diamond() {
        let mut mm = ModelMultipart::new(model_referencing("main.ldr", &["a.ldr", "b.ldr"]));
        mm.insert_submodel(model_referencing("a.ldr", &["c.ldr"]), "a.ldr");
        mm.insert_submodel(model_referencing("b.ldr", &["c.ldr"]), "b.ldr");
        mm.insert_submodel(model_referencing("c.ldr", &["3001.dat"]), "c.ldr");
        assert!(!mm.cyclic_reference_test());
        assert!(validate_multipart(&mm, "test").is_ok());
    }

    #[test]
    fn test_two_model_cycle_detected_before_linking() {
        let mut mm = ModelMultipart::new(model_referencing("main.ldr", &["a.ldr"]));
        mm.insert_submodel(model_referencing("a.ldr", &["b.ldr"]), "a.ldr");
        mm.insert_submodel(model_referencing("b.ldr", &["A.LDR"]), "b.ldr");
        let cycle = find_cycle(&mm).unwrap();
        assert_eq!(cycle, vec!["a.ldr", "b.ldr", "a.ldr"]);
    }

    #[test]
    fn test_completing_a_cycle_flips_result() {
        let mut mm = ModelMultipart::new(model_referencing("main.ldr", &["a.ldr"]));
        mm.insert_submodel(model_referencing("a.ldr", &["b.ldr"]), "a.ldr");
        mm.insert_submodel(model_referencing("b.ldr", &[]), "b.ldr");
        mm.link_submodels();
        assert!(!mm.cyclic_reference_test());

        mm.find_submodel_mut("b.ldr")
            .unwrap()
            .insert_element(Reference::new(Color::MAIN, "a.ldr").into());
        assert!(mm.cyclic_reference_test());
        let err = validate_multipart(&mm, "load_from_stream").unwrap_err();
        assert!(err.to_string().contains("load_from_stream"));
        assert!(err.to_string().contains("a.ldr → b.ldr → a.ldr"));
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut mm = ModelMultipart::new(Model::with_name("main.ldr"));
        mm.insert_submodel(model_referencing("loop.ldr", &["loop.ldr"]), "loop.ldr");
        assert_eq!(find_cycle(&mm).unwrap(), vec!["loop.ldr", "loop.ldr"]);
    }
}
