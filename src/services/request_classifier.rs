use axum::http::Method;
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;

/// Decides which requests target primary item images and need gating
///
/// A request is gated iff it is a `GET` whose path starts with
/// `/<prefix>/Items/<id>/Images/Primary`, compared case-insensitively.
/// The pattern is only anchored at the start, so indexed variants such as
/// `/emby/Items/42/Images/Primary/0` are gated as well.
///
/// Paths are matched in the form the backend reads them: percent-decoded,
/// with backslashes as separators and repeated slashes collapsed. Dot
/// segments are not resolved here; see [`has_dot_segments`].
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    pattern: Regex,
}

impl RequestClassifier {
    /// Build a classifier for the given route prefix (e.g. `emby`)
    pub fn new(route_prefix: &str) -> Result<Self, regex::Error> {
        let prefix = route_prefix.trim_matches('/');
        let pattern = RegexBuilder::new(&format!(
            r"^/{}/Items/[^/]+/Images/Primary",
            regex::escape(prefix)
        ))
        .case_insensitive(true)
        .build()?;

        Ok(Self { pattern })
    }

    /// Returns true if the request must pass the authorization gate
    pub fn requires_gating(&self, method: &Method, path: &str) -> bool {
        *method == Method::GET && self.pattern.is_match(&backend_view(path))
    }

    /// The compiled pattern, for diagnostics
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Returns true if any segment of `path` is `.` or `..`, literally or
/// percent-encoded
///
/// The forwarder's URL handling resolves such segments, so the path the
/// backend serves would differ from the one classified. These requests are
/// refused outright.
pub fn has_dot_segments(path: &str) -> bool {
    backend_segments(path).any(|segment| segment == "." || segment == "..")
}

fn decode(path: &str) -> Cow<'_, str> {
    match urlencoding::decode_binary(path.as_bytes()) {
        Cow::Borrowed(_) => Cow::Borrowed(path),
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn backend_segments(path: &str) -> impl Iterator<Item = String> + '_ {
    // Decode per raw segment first so an encoded slash cannot hide a dot segment
    path.split(['/', '\\'])
        .flat_map(|raw| {
            decode(raw)
                .split(['/', '\\'])
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
}

/// `path` decoded and re-joined with single slashes
fn backend_view(path: &str) -> String {
    let mut view = String::with_capacity(path.len());
    for segment in backend_segments(path).filter(|segment| !segment.is_empty()) {
        view.push('/');
        view.push_str(&segment);
    }
    if view.is_empty() {
        view.push('/');
    }
    view
}
