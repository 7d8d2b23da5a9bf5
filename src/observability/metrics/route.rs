//! Route label resolution
//!
//! Turns the routing outcome of a request into a bounded-cardinality label.
//! Raw paths such as `/users/482` are never used when a route template is
//! known; instead the template is recovered and any literal mount prefix the
//! template does not describe is spliced back in front of it:
//!
//! | Request path | Matched template | Label |
//! |--------------|------------------|-------|
//! | `/users/482` | `users/{id}` | `/users/{id}` |
//! | `/api/v2/users/482` | `users/{id}` | `/api/v2/users/{id}` |
//! | `/files/a/b` | `/files/{*path}` | `/files/{*path}` |
//! | `/shop/eu/orders/7` | `/shop/{region}`, then `orders/{id}` | `/shop/{region}/orders/{id}` |
//! | `/Users/482` | (none) | `/users/482` |

use axum::extract::MatchedPath;
use axum::http::Uri;
use parking_lot::Mutex;
use std::sync::Arc;

/// A template-bearing route matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatcher {
    template: String,
    segment_count: usize,
    anchor: Anchor,
}

/// How a template lines up with the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// Covers the whole path from `/`.
    Root,
    /// Covers the last `segment_count` segments.
    Tail,
    /// Ends in a `{*rest}` capture; its fixed head is located in the path.
    CatchAll,
}

impl TemplateMatcher {
    /// Create a matcher whose extent is derived from the template text.
    ///
    /// - A template starting with `/` is rooted: it already describes the
    ///   whole path and no prefix is ever spliced in front of it.
    /// - A template ending in a catch-all segment (`files/{*path}`) takes the
    ///   rest of the path, however many segments that is.
    /// - Anything else covers as many trailing URI segments as it has
    ///   `/`-delimited pieces, so `users/{id}` covers 2.
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let segment_count = template.split('/').count();
        let anchor = if template.starts_with('/') {
            Anchor::Root
        } else if template.rsplit('/').next().is_some_and(is_catch_all) {
            Anchor::CatchAll
        } else {
            Anchor::Tail
        };
        Self {
            template,
            segment_count,
            anchor,
        }
    }

    /// Create a rooted matcher, e.g. from axum's [`MatchedPath`], which
    /// always describes the full request path.
    pub fn rooted(template: impl Into<String>) -> Self {
        Self {
            anchor: Anchor::Root,
            ..Self::new(template)
        }
    }

    /// Create a matcher covering exactly `segment_count` trailing URI
    /// segments.
    ///
    /// Segments are counted the way request paths are split: the leading
    /// `/` is a segment of its own and every other segment keeps its
    /// trailing `/`, so `/api/users/482` has 4 (`/`, `api/`, `users/`,
    /// `482`). A count of 2 on that path keeps `/api/` as the prefix; a
    /// count of 1 would keep `/api/users/` and duplicate the literal part of
    /// a `users/{id}` template. Pass the number of pieces of the template
    /// text, which is what [`TemplateMatcher::new`] derives.
    pub fn with_segment_count(template: impl Into<String>, segment_count: usize) -> Self {
        Self {
            template: template.into(),
            segment_count,
            anchor: Anchor::Tail,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub fn is_rooted(&self) -> bool {
        self.anchor == Anchor::Root
    }
}

/// One layer of the routing chain that dispatched a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatcher {
    /// Router that matched a reusable template
    Template(TemplateMatcher),
    /// Dispatch layer without template text (fallbacks, nested services,
    /// secondary dispatchers mounted behind the real route match)
    Opaque,
}

impl RouteMatcher {
    /// Shorthand for a template matcher with a derived segment count.
    pub fn template(template: impl Into<String>) -> Self {
        Self::Template(TemplateMatcher::new(template))
    }

    fn as_template(&self) -> Option<&TemplateMatcher> {
        match self {
            Self::Template(t) => Some(t),
            Self::Opaque => None,
        }
    }
}

/// Routing outcome of a single request.
///
/// Matchers are ordered outer to inner, i.e. in the order the routing layers
/// were traversed. An empty context means the request was never routed.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    matchers: Vec<RouteMatcher>,
}

impl DispatchContext {
    pub fn new(matchers: Vec<RouteMatcher>) -> Self {
        Self { matchers }
    }

    /// Build a context from what axum and the route trail saw.
    ///
    /// The matched path, when present, is the outermost matcher; trail
    /// entries follow in the order they were recorded.
    pub fn from_request_parts(
        matched_path: Option<&MatchedPath>,
        trail: Option<&RouteTrail>,
    ) -> Self {
        let mut matchers = Vec::new();
        if let Some(matched) = matched_path {
            matchers.push(RouteMatcher::Template(TemplateMatcher::rooted(matched.as_str())));
        }
        if let Some(trail) = trail {
            matchers.extend(trail.snapshot());
        }
        Self { matchers }
    }

    pub fn matchers(&self) -> &[RouteMatcher] {
        &self.matchers
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

/// Request-scoped record of the matchers traversed during dispatch.
///
/// The metrics middleware inserts a fresh trail into the request extensions
/// before the request is routed; router layers append to it on the way in,
/// and the middleware reads it back once the response is ready.
#[derive(Debug, Clone, Default)]
pub struct RouteTrail {
    matchers: Arc<Mutex<Vec<RouteMatcher>>>,
}

impl RouteTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, matcher: RouteMatcher) {
        self.matchers.lock().push(matcher);
    }

    pub fn snapshot(&self) -> Vec<RouteMatcher> {
        self.matchers.lock().clone()
    }
}

/// Resolves dispatch contexts into metric labels.
///
/// Holds only immutable configuration; every call is independent.
#[derive(Debug, Clone, Default)]
pub struct RouteLabelResolver {
    base_path: Option<String>,
}

impl RouteLabelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude a service mount point from reconstructed labels.
    ///
    /// With base path `/svc`, the template `users/{id}` on `/svc/api/users/7`
    /// resolves to `/api/users/{id}` instead of `/svc/api/users/{id}`. The
    /// raw-path fallback is left untouched. Empty or `/` means no base path.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        let base: String = base_path.into();
        let base = base.trim_end_matches('/');
        self.base_path = if base.is_empty() {
            None
        } else if base.starts_with('/') {
            Some(base.to_string())
        } else {
            Some(format!("/{base}"))
        };
        self
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    /// Resolve the label for a request.
    ///
    /// `uri` is the raw request URI; only its path takes part. Never fails:
    /// anything that prevents template reconstruction degrades to the
    /// lower-cased raw path.
    pub fn resolve(&self, context: Option<&DispatchContext>, uri: &Uri) -> String {
        let Some(matchers) = context.map(DispatchContext::matchers) else {
            return fallback_label(uri.path());
        };
        let template = matchers
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, m)| m.as_template().map(|t| (i, t)));

        match template {
            Some((index, matcher)) => {
                // The nearest enclosing rooted template names the mount prefix.
                let outer = matchers[..index]
                    .iter()
                    .rev()
                    .filter_map(RouteMatcher::as_template)
                    .find(|t| t.is_rooted())
                    .map(|t| self.strip_base_path(t.template()));
                let label = splice_template(self.strip_base_path(uri.path()), matcher, outer);
                if label.is_empty() {
                    fallback_label(uri.path())
                } else {
                    label
                }
            }
            None => fallback_label(uri.path()),
        }
    }

    fn strip_base_path<'a>(&self, path: &'a str) -> &'a str {
        let Some(base) = self.base_path.as_deref() else {
            return path;
        };
        match path.strip_prefix(base) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    }
}

/// Resolve a label with the default resolver (no base path).
pub fn resolve_route_label(context: Option<&DispatchContext>, uri: &Uri) -> String {
    RouteLabelResolver::default().resolve(context, uri)
}

fn fallback_label(path: &str) -> String {
    if path.is_empty() {
        String::from("/")
    } else {
        path.to_lowercase()
    }
}

fn splice_template(path: &str, matcher: &TemplateMatcher, outer: Option<&str>) -> String {
    let segments = uri_segments(path);
    let template = matcher.template();

    // A template claiming more segments than the path has is a routing
    // anomaly; the template alone is still a bounded label.
    let difference = match matcher.anchor {
        Anchor::Root => 0,
        Anchor::Tail => segments.len().saturating_sub(matcher.segment_count()),
        Anchor::CatchAll => catch_all_offset(&segments, template),
    };
    if difference == 0 {
        return template.to_string();
    }

    let prefix = &segments[..difference];
    let outer = outer
        .map(uri_segments)
        .filter(|outer| head_matches(fixed_head(outer), prefix));

    let prefix_len: usize = prefix.iter().map(|s| s.len()).sum();
    let outer_len: usize = outer.as_ref().map_or(0, |o| o.iter().map(|s| s.len()).sum());
    let mut label = String::with_capacity(prefix_len + outer_len + template.len());
    for (i, segment) in prefix.iter().enumerate() {
        let named = outer
            .as_ref()
            .and_then(|o| fixed_head(o).get(i))
            .map(|t| t.trim_end_matches('/'));
        match named {
            Some(name) => {
                label.push_str(name);
                if segment.ends_with('/') {
                    label.push('/');
                }
            }
            None => label.push_str(segment),
        }
    }
    label.push_str(template);
    label
}

/// Index of the first URI segment a catch-all template starts at.
///
/// The fixed head (everything before `{*rest}`) is matched leftmost-first.
/// No head, or no match, means no prefix.
fn catch_all_offset(segments: &[&str], template: &str) -> usize {
    let template_segments = uri_segments(template);
    let head = fixed_head(&template_segments);
    if head.is_empty() || head.len() > segments.len() {
        return 0;
    }
    (0..=segments.len() - head.len())
        .find(|&start| head_matches(head, &segments[start..]))
        .unwrap_or(0)
}

/// Template segments before a trailing catch-all.
fn fixed_head<'a, 'b>(segments: &'a [&'b str]) -> &'a [&'b str] {
    match segments.split_last() {
        Some((last, head)) if is_catch_all(last) => head,
        _ => segments,
    }
}

/// Whether template segments match the start of `segments`, pairwise.
fn head_matches(template: &[&str], segments: &[&str]) -> bool {
    template
        .iter()
        .zip(segments)
        .all(|(t, s)| segment_matches(t, s))
}

fn segment_matches(template: &str, segment: &str) -> bool {
    let template = template.trim_end_matches('/');
    let segment = segment.trim_end_matches('/');
    if template.starts_with('{') && template.ends_with('}') {
        !segment.is_empty()
    } else {
        template == segment
    }
}

fn is_catch_all(segment: &str) -> bool {
    segment.trim_end_matches('/').starts_with("{*")
}

/// Split a path into URI segments.
///
/// Each segment keeps its trailing `/`, so `/api/v2/users/482` becomes
/// `["/", "api/", "v2/", "users/", "482"]`.
fn uri_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (i, byte) in path.bytes().enumerate() {
        if byte == b'/' {
            segments.push(&path[start..=i]);
            start = i + 1;
        }
    }
    if start < path.len() {
        segments.push(&path[start..]);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(matchers: Vec<RouteMatcher>, uri: &str) -> String {
        let ctx = DispatchContext::new(matchers);
        resolve_route_label(Some(&ctx), &uri.parse().unwrap())
    }

    #[test]
    fn test_uri_segments() {
        assert_eq!(
            uri_segments("/api/v2/users/482"),
            vec!["/", "api/", "v2/", "users/", "482"]
        );
        assert_eq!(uri_segments("/users/"), vec!["/", "users/"]);
        assert_eq!(uri_segments("/"), vec!["/"]);
        assert!(uri_segments("").is_empty());
    }

    #[test]
    fn test_template_segment_count() {
        assert_eq!(TemplateMatcher::new("users/{id}").segment_count(), 2);
        assert_eq!(TemplateMatcher::new("/users/{id}").segment_count(), 3);
        assert_eq!(
            TemplateMatcher::with_segment_count("users/{id}", 7).segment_count(),
            7
        );
    }

    #[test]
    fn test_no_route_falls_back_to_lowercased_path() {
        assert_eq!(resolve(vec![], "/Users/482"), "/users/482");
    }

    #[test]
    fn test_absent_context() {
        let uri: Uri = "/Users/482".parse().unwrap();
        assert_eq!(resolve_route_label(None, &uri), "/users/482");
    }

    #[test]
    fn test_all_opaque_falls_back() {
        assert_eq!(
            resolve(
                vec![RouteMatcher::Opaque, RouteMatcher::Opaque],
                "/Static/App.JS?v=3"
            ),
            "/static/app.js"
        );
    }

    #[test]
    fn test_template_without_prefix() {
        assert_eq!(
            resolve(vec![RouteMatcher::template("users/{id}")], "/users/482"),
            "/users/{id}"
        );
    }

    #[test]
    fn test_template_with_mount_prefix() {
        assert_eq!(
            resolve(
                vec![RouteMatcher::template("users/{id}")],
                "https://h/api/v2/users/482"
            ),
            "/api/v2/users/{id}"
        );
    }

    #[test]
    fn test_long_mount_prefix() {
        assert_eq!(
            resolve(
                vec![RouteMatcher::template("orders/{id}")],
                "/a/b/c/d/e/orders/9"
            ),
            "/a/b/c/d/e/orders/{id}"
        );
    }

    #[test]
    fn test_full_template_is_used_verbatim() {
        assert_eq!(
            resolve(vec![RouteMatcher::template("/users/{id}")], "/users/482"),
            "/users/{id}"
        );
    }

    #[test]
    fn test_opaque_after_template_is_skipped() {
        assert_eq!(
            resolve(
                vec![RouteMatcher::template("users/{id}"), RouteMatcher::Opaque],
                "/users/482"
            ),
            "/users/{id}"
        );
    }

    #[test]
    fn test_innermost_template_wins() {
        assert_eq!(
            resolve(
                vec![
                    RouteMatcher::template("/api/{*rest}"),
                    RouteMatcher::template("users/{id}"),
                    RouteMatcher::Opaque,
                ],
                "/api/users/5"
            ),
            "/api/users/{id}"
        );
    }

    #[test]
    fn test_segment_count_larger_than_path() {
        let matcher = TemplateMatcher::with_segment_count("users/{id}/posts/{post}", 12);
        assert_eq!(
            resolve(vec![RouteMatcher::Template(matcher)], "/users/1"),
            "users/{id}/posts/{post}"
        );
    }

    #[test]
    fn test_template_case_is_preserved() {
        assert_eq!(
            resolve(vec![RouteMatcher::template("Users/{Id}")], "/API/Users/1"),
            "/API/Users/{Id}"
        );
    }

    #[test]
    fn test_empty_template_falls_back() {
        assert_eq!(resolve(vec![RouteMatcher::template("")], "/"), "/");
    }

    #[test]
    fn test_base_path_is_stripped() {
        let resolver = RouteLabelResolver::new().with_base_path("/svc/");
        assert_eq!(resolver.base_path(), Some("/svc"));

        let ctx = DispatchContext::new(vec![RouteMatcher::template("users/{id}")]);
        let uri = "/svc/api/users/7".parse().unwrap();
        assert_eq!(resolver.resolve(Some(&ctx), &uri), "/api/users/{id}");
    }

    #[test]
    fn test_base_path_requires_segment_boundary() {
        let resolver = RouteLabelResolver::new().with_base_path("svc");
        let ctx = DispatchContext::new(vec![RouteMatcher::template("users/{id}")]);
        let uri = "/svcx/users/7".parse().unwrap();
        assert_eq!(resolver.resolve(Some(&ctx), &uri), "/svcx/users/{id}");
    }

    #[test]
    fn test_base_path_does_not_touch_fallback() {
        let resolver = RouteLabelResolver::new().with_base_path("/svc");
        let uri = "/svc/Missing".parse().unwrap();
        assert_eq!(resolver.resolve(None, &uri), "/svc/missing");
    }

    #[test]
    fn test_root_base_path_is_ignored() {
        assert_eq!(RouteLabelResolver::new().with_base_path("/").base_path(), None);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let ctx = DispatchContext::new(vec![
            RouteMatcher::template("users/{id}"),
            RouteMatcher::Opaque,
        ]);
        let uri: Uri = "/api/users/482".parse().unwrap();
        let first = resolve_route_label(Some(&ctx), &uri);
        let second = resolve_route_label(Some(&ctx), &uri);
        assert_eq!(first, second);
        assert_eq!(ctx.matchers().len(), 2);
    }

    #[test]
    fn test_labels_are_never_empty() {
        let uris = ["/", "/a", "/A/b/", "/x?y=z"];
        let chains = [
            vec![],
            vec![RouteMatcher::Opaque],
            vec![RouteMatcher::template("")],
            vec![RouteMatcher::Template(TemplateMatcher::with_segment_count("t", 0))],
        ];
        for uri in uris {
            for chain in &chains {
                let label = resolve(chain.clone(), uri);
                assert!(!label.is_empty(), "{uri} {chain:?}");
            }
        }
    }

    #[test]
    fn test_context_from_trail() {
        let trail = RouteTrail::new();
        trail.push(RouteMatcher::template("users/{id}"));
        trail.push(RouteMatcher::Opaque);

        let ctx = DispatchContext::from_request_parts(None, Some(&trail));
        assert_eq!(ctx.matchers().len(), 2);

        let uri = "/v1/users/3".parse().unwrap();
        assert_eq!(resolve_route_label(Some(&ctx), &uri), "/v1/users/{id}");
    }

    #[test]
    fn test_template_anchors() {
        assert!(TemplateMatcher::new("/users/{id}").is_rooted());
        assert!(!TemplateMatcher::new("users/{id}").is_rooted());
        assert!(TemplateMatcher::rooted("users/{id}").is_rooted());
        assert!(!TemplateMatcher::with_segment_count("/users/{id}", 3).is_rooted());
    }

    #[test]
    fn test_rooted_template_never_gets_a_prefix() {
        let matched = RouteMatcher::Template(TemplateMatcher::rooted("/files/{*path}"));
        for uri in ["/files/a", "/files/a/b/c", "/files/alice/b/c/d"] {
            assert_eq!(resolve(vec![matched.clone()], uri), "/files/{*path}");
        }
    }

    #[test]
    fn test_relative_catch_all_takes_rest_of_path() {
        for uri in ["/static/files/a", "/static/files/x/y/z"] {
            assert_eq!(
                resolve(vec![RouteMatcher::template("files/{*path}")], uri),
                "/static/files/{*path}"
            );
        }
    }

    #[test]
    fn test_catch_all_head_not_in_path() {
        assert_eq!(
            resolve(vec![RouteMatcher::template("files/{*path}")], "/other/a"),
            "files/{*path}"
        );
    }

    #[test]
    fn test_outer_template_names_mount_prefix() {
        let chain = vec![
            RouteMatcher::template("/shop/{region}"),
            RouteMatcher::template("orders/{id}"),
        ];
        for uri in ["/shop/eu/orders/1", "/shop/us/orders/2", "/shop/tenant-9137/orders/3"] {
            assert_eq!(resolve(chain.clone(), uri), "/shop/{region}/orders/{id}");
        }
    }

    #[test]
    fn test_outer_nest_template_with_tail_capture() {
        let chain = vec![
            RouteMatcher::Template(TemplateMatcher::rooted("/shop/{region}/{*tail}")),
            RouteMatcher::Opaque,
            RouteMatcher::template("orders/{id}"),
        ];
        assert_eq!(
            resolve(chain, "/shop/eu/orders/1"),
            "/shop/{region}/orders/{id}"
        );
    }

    #[test]
    fn test_outer_template_that_does_not_match_is_ignored() {
        let chain = vec![
            RouteMatcher::template("/shop/{region}"),
            RouteMatcher::template("orders/{id}"),
        ];
        assert_eq!(resolve(chain, "/api/v2/orders/1"), "/api/v2/orders/{id}");
    }

    #[test]
    fn test_outer_template_shorter_than_prefix() {
        let chain = vec![
            RouteMatcher::template("/{tenant}"),
            RouteMatcher::template("users/{id}"),
        ];
        assert_eq!(resolve(chain, "/acme/api/users/4"), "/{tenant}/api/users/{id}");
    }

    #[test]
    fn test_explicit_segment_count_convention() {
        // `/users/482` splits into `/`, `users/`, `482`.
        let matcher = TemplateMatcher::with_segment_count("users/{id}", 2);
        assert_eq!(
            resolve(vec![RouteMatcher::Template(matcher)], "/users/482"),
            "/users/{id}"
        );
        let matcher = TemplateMatcher::with_segment_count("users/{id}", 1);
        assert_eq!(
            resolve(vec![RouteMatcher::Template(matcher)], "/users/482"),
            "/users/users/{id}"
        );
    }

    #[test]
    fn test_base_path_applies_to_outer_template() {
        let resolver = RouteLabelResolver::new().with_base_path("/svc");
        let ctx = DispatchContext::new(vec![
            RouteMatcher::template("/svc/shop/{region}"),
            RouteMatcher::template("orders/{id}"),
        ]);
        let uri = "/svc/shop/eu/orders/1".parse().unwrap();
        assert_eq!(
            resolver.resolve(Some(&ctx), &uri),
            "/shop/{region}/orders/{id}"
        );
    }

    #[test]
    fn test_empty_context() {
        assert!(DispatchContext::default().is_empty());
    }
}
