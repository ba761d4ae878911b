//! Route Registry: merges raw declarations into one canonical table.
//!
//! Declarations are folded in source order. For a path seen twice the method
//! maps are merged key-by-key, later sources overwriting earlier ones for the
//! same method; every replacement is a recorded diagnostic, never an error.
//! An empty final table is fatal.

use crate::config::{MethodConfig, RouteDeclaration};
use crate::error::Error;
use std::collections::HashMap;
use tracing::warn;

/// One merged route: a path template plus at most one config per method.
#[derive(Debug, Clone)]
pub struct MergedRoute {
    pub path: String,
    /// First-seen method order is preserved; overrides replace in place.
    pub methods: Vec<MethodConfig>,
}

impl MergedRoute {
    pub fn method(&self, method: &str) -> Option<&MethodConfig> {
        self.methods.iter().find(|m| m.method == method)
    }
}

/// The canonical path -> methods table, read-only after merge.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    pub routes: Vec<MergedRoute>,
    /// Override and ambiguity diagnostics recorded during the merge.
    pub diagnostics: Vec<String>,
}

/// Merge declarations in source order, last writer wins per (path, method).
pub fn merge(declarations: Vec<RouteDeclaration>) -> Result<RouteTable, Error> {
    let mut routes: Vec<MergedRoute> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut diagnostics = Vec::new();

    for declaration in declarations {
        if declaration.methods.is_empty() {
            let note = format!("declaration for {} contributes no methods", declaration.path);
            warn!("{note}");
            diagnostics.push(note);
            continue;
        }
        match index.get(&declaration.path).copied() {
            Some(pos) => {
                let existing = &mut routes[pos];
                for method in declaration.methods {
                    if let Some(slot) = existing
                        .methods
                        .iter_mut()
                        .find(|m| m.method == method.method)
                    {
                        let note = format!(
                            "method {} for path {} overridden by a later declaration",
                            method.method, declaration.path
                        );
                        warn!("{note}");
                        diagnostics.push(note);
                        *slot = method;
                    } else {
                        existing.methods.push(method);
                    }
                }
            }
            None => {
                index.insert(declaration.path.clone(), routes.len());
                routes.push(MergedRoute {
                    path: declaration.path,
                    methods: declaration.methods,
                });
            }
        }
    }

    if routes.is_empty() {
        return Err(Error::Config(
            "no valid route declarations survived the merge".to_string(),
        ));
    }

    diagnostics.extend(ambiguity_diagnostics(&routes));

    Ok(RouteTable { routes, diagnostics })
}

/// Flag declared path pairs that can both match one concrete request.
/// Resolution stays registry iteration order; the overlap is only reported.
fn ambiguity_diagnostics(routes: &[MergedRoute]) -> Vec<String> {
    let mut notes = Vec::new();
    for (i, a) in routes.iter().enumerate() {
        for b in routes.iter().skip(i + 1) {
            if paths_overlap(&a.path, &b.path) {
                let note = format!(
                    "paths {} and {} are structurally ambiguous; {} wins by declaration order",
                    a.path, b.path, a.path
                );
                warn!("{note}");
                notes.push(note);
            }
        }
    }
    notes
}

fn is_param_segment(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

fn paths_overlap(a: &str, b: &str) -> bool {
    if a == b {
        return false;
    }
    let a_segments: Vec<&str> = a.trim_matches('/').split('/').collect();
    let b_segments: Vec<&str> = b.trim_matches('/').split('/').collect();
    if a_segments.len() != b_segments.len() {
        return false;
    }
    a_segments
        .iter()
        .zip(&b_segments)
        .all(|(x, y)| x == y || is_param_segment(x) || is_param_segment(y))
}
