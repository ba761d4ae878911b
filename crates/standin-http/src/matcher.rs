//! Route Matcher: resolves a request path+method against the merged table.
//!
//! Both the declared path and the request path are split on `/`. Segment
//! counts must match exactly; a declared `{param}` segment matches any single
//! request segment, everything else requires equality. The first structurally
//! matching declared path wins.

use crate::config::MethodConfig;
use crate::error::Error;
use crate::registry::RouteTable;
use std::collections::HashMap;

/// A successful match: the method config plus extracted path parameters.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub config: &'a MethodConfig,
    pub path_params: HashMap<String, String>,
}

/// Find the method config for a concrete request path and method.
pub fn match_route<'a>(
    table: &'a RouteTable,
    path: &str,
    method: &str,
) -> Result<RouteMatch<'a>, Error> {
    for route in &table.routes {
        if let Some(path_params) = match_segments(&route.path, path) {
            return match route.method(method) {
                Some(config) => Ok(RouteMatch {
                    config,
                    path_params,
                }),
                None => Err(Error::MethodNotAllowed {
                    path: path.to_string(),
                    method: method.to_string(),
                }),
            };
        }
    }
    Err(Error::NotFound(path.to_string()))
}

/// Compare a declared path against a request path segment by segment,
/// returning extracted `{param}` values on match.
fn match_segments(declared: &str, requested: &str) -> Option<HashMap<String, String>> {
    let declared_segments: Vec<&str> = declared.trim_matches('/').split('/').collect();
    let requested_segments: Vec<&str> = requested.trim_matches('/').split('/').collect();

    if declared_segments.len() != requested_segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (declared_seg, requested_seg) in declared_segments.iter().zip(&requested_segments) {
        if declared_seg.starts_with('{') && declared_seg.ends_with('}') {
            let name = &declared_seg[1..declared_seg.len() - 1];
            params.insert(name.to_string(), (*requested_seg).to_string());
        } else if declared_seg != requested_seg {
            return None;
        }
    }
    Some(params)
}
