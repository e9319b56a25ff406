//! User-supplied filters and how their outcomes are applied.

use crate::error::FilterError;
use crate::fault;
use http::request::Parts;
use http::HeaderMap;
use std::sync::Arc;

/// Decides whether a whole request is traced. `Ok(true)` skips it.
pub type RequestFilter = Arc<dyn Fn(&Parts) -> Result<bool, FilterError> + Send + Sync>;

/// Decides whether one side's body is traced, given that side's headers.
/// `Ok(true)` skips the body.
pub type BodyFilter = Arc<dyn Fn(&HeaderMap) -> Result<bool, FilterError> + Send + Sync>;

/// Outcome of the request filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RequestDecision {
    /// Write nothing for this request.
    Suppress,
    /// Trace the request, optionally preceded by a soft-error line.
    Trace(Option<String>),
}

/// Outcome of the body filter for one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BodyDecision {
    pub(crate) print: bool,
    pub(crate) note: Option<String>,
}

impl BodyDecision {
    fn print() -> Self {
        Self {
            print: true,
            note: None,
        }
    }
}

/// Which side of the exchange a body belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Request,
    Response,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Request => "request",
            Side::Response => "response",
        }
    }
}

pub(crate) fn apply_request_filter(filter: Option<&RequestFilter>, parts: &Parts) -> RequestDecision {
    let Some(filter) = filter else {
        return RequestDecision::Trace(None);
    };

    let prefix = format!("cannot filter request: {} {}", parts.method, parts.uri.path());
    match fault::isolate(|| filter(parts)) {
        Ok(Ok(false)) => RequestDecision::Trace(None),
        Ok(Ok(true)) => RequestDecision::Suppress,
        Ok(Err(err)) if err.skips() => RequestDecision::Suppress,
        Ok(Err(err)) => RequestDecision::Trace(Some(format!("{prefix}: {err}"))),
        Err(panic) => RequestDecision::Trace(Some(format!("{prefix}: panic: {panic}"))),
    }
}

pub(crate) fn apply_body_filter(
    filter: Option<&BodyFilter>,
    side: Side,
    headers: &HeaderMap,
) -> BodyDecision {
    let Some(filter) = filter else {
        return BodyDecision::print();
    };

    match fault::isolate(|| filter(headers)) {
        Ok(Ok(false)) => BodyDecision::print(),
        Ok(Ok(true)) => BodyDecision {
            print: false,
            note: None,
        },
        Ok(Err(err)) => BodyDecision {
            print: !err.skips(),
            note: Some(format!("error on {} body filter: {err}", side.as_str())),
        },
        Err(panic) => BodyDecision {
            print: true,
            note: Some(format!("panic while filtering body: {panic}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn request_filter(
        f: impl Fn(&Parts) -> Result<bool, FilterError> + Send + Sync + 'static,
    ) -> RequestFilter {
        Arc::new(f)
    }

    fn body_filter(
        f: impl Fn(&HeaderMap) -> Result<bool, FilterError> + Send + Sync + 'static,
    ) -> BodyFilter {
        Arc::new(f)
    }

    fn parts() -> Parts {
        Request::get("/x?y=1").body(()).unwrap().into_parts().0
    }

    #[test]
    fn no_filter_traces() {
        assert_eq!(apply_request_filter(None, &parts()), RequestDecision::Trace(None));
        assert_eq!(
            apply_body_filter(None, Side::Request, &HeaderMap::new()),
            BodyDecision::print()
        );
    }

    #[test]
    fn request_filter_outcomes() {
        let skip = request_filter(|_| Ok(true));
        assert_eq!(apply_request_filter(Some(&skip), &parts()), RequestDecision::Suppress);

        let keep = request_filter(|parts| Ok(parts.uri.path() != "/x"));
        assert_eq!(apply_request_filter(Some(&keep), &parts()), RequestDecision::Trace(None));

        let failing = request_filter(|_| Err(FilterError::new("nope")));
        assert_eq!(
            apply_request_filter(Some(&failing), &parts()),
            RequestDecision::Trace(Some("cannot filter request: GET /x: nope".into()))
        );
    }

    #[test]
    fn skip_wins_over_error() {
        let filter = request_filter(|_| Err(FilterError::new("nope").skipping()));
        assert_eq!(apply_request_filter(Some(&filter), &parts()), RequestDecision::Suppress);
    }

    #[test]
    fn request_filter_panic_becomes_note() {
        let filter = request_filter(|_| panic!("evil panic"));
        assert_eq!(
            apply_request_filter(Some(&filter), &parts()),
            RequestDecision::Trace(Some("cannot filter request: GET /x: panic: evil panic".into()))
        );
    }

    #[test]
    fn body_filter_outcomes() {
        let headers = HeaderMap::new();

        let skip = body_filter(|_| Ok(true));
        let decision = apply_body_filter(Some(&skip), Side::Response, &headers);
        assert!(!decision.print);
        assert_eq!(decision.note, None);

        let failing = body_filter(|_| Err(FilterError::new("incomplete implementation")));
        let decision = apply_body_filter(Some(&failing), Side::Request, &headers);
        assert!(decision.print);
        assert_eq!(
            decision.note.as_deref(),
            Some("error on request body filter: incomplete implementation")
        );

        let failing_skip = body_filter(|_| Err(FilterError::new("incomplete implementation").skipping()));
        let decision = apply_body_filter(Some(&failing_skip), Side::Response, &headers);
        assert!(!decision.print);
        assert_eq!(
            decision.note.as_deref(),
            Some("error on response body filter: incomplete implementation")
        );
    }

    #[test]
    fn body_filter_panic_fails_open() {
        let filter = body_filter(|_| panic!("evil panic"));
        let decision = apply_body_filter(Some(&filter), Side::Response, &HeaderMap::new());
        assert!(decision.print);
        assert_eq!(decision.note.as_deref(), Some("panic while filtering body: evil panic"));
    }
}
