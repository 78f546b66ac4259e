//! URL classification
//!
//! A [`Router`] holds an ordered, immutable list of [`RouteRule`]s built once
//! per run. Several predicates can be true for the same URL (a company profile
//! is also a `/praca/` listing), so the first matching rule wins and the order
//! of the list is part of its meaning.

mod rules;

pub use rules::site_rules;

use crate::extract::Page;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Handler a classified URL is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteLabel {
    JobListing,
    JobDetail,
    JobRelatedList,
    Partners,
}

impl RouteLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobListing => "JOB_LISTING",
            Self::JobDetail => "JOB_DETAIL",
            Self::JobRelatedList => "JOB_RELATED_LIST",
            Self::Partners => "PARTNERS",
        }
    }
}

impl fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replaces normal dispatch for a matched rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// Enqueue this URL at the front of the queue instead of handling the page
    Redirect(Url),
    /// Log the page as unsupported and skip it
    Unsupported(String),
}

type UrlPredicate = Box<dyn Fn(&Url) -> bool + Send + Sync>;
type DocumentPredicate = Box<dyn Fn(&Url, &Page) -> bool + Send + Sync>;

/// Condition a rule checks
pub enum RoutePredicate {
    /// Looks at the URL only
    Url(UrlPredicate),
    /// Also peeks at the fetched page; never matches before the page is fetched
    Document(DocumentPredicate),
}

impl RoutePredicate {
    pub fn url<F>(f: F) -> Self
    where
        F: Fn(&Url) -> bool + Send + Sync + 'static,
    {
        Self::Url(Box::new(f))
    }

    pub fn document<F>(f: F) -> Self
    where
        F: Fn(&Url, &Page) -> bool + Send + Sync + 'static,
    {
        Self::Document(Box::new(f))
    }

    fn matches(&self, url: &Url, page: Option<&Page>) -> bool {
        match self {
            Self::Url(f) => f(url),
            Self::Document(f) => page.map(|p| f(url, p)).unwrap_or(false),
        }
    }
}

impl fmt::Debug for RoutePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(_) => f.write_str("RoutePredicate::Url"),
            Self::Document(_) => f.write_str("RoutePredicate::Document"),
        }
    }
}

#[derive(Debug)]
pub struct RouteRule {
    name: String,
    predicate: RoutePredicate,
    label: Option<RouteLabel>,
    action: Option<RouteAction>,
}

impl RouteRule {
    /// Rule dispatching matched URLs to a handler
    pub fn handle(name: &str, predicate: RoutePredicate, label: RouteLabel) -> Self {
        Self {
            name: name.to_string(),
            predicate,
            label: Some(label),
            action: None,
        }
    }

    /// Rule running `action` in place of any handler
    pub fn overriding(name: &str, predicate: RoutePredicate, action: RouteAction) -> Self {
        Self {
            name: name.to_string(),
            predicate,
            label: None,
            action: Some(action),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> Option<RouteLabel> {
        self.label
    }

    pub fn action(&self) -> Option<&RouteAction> {
        self.action.as_ref()
    }

    fn dispatch(&self) -> Dispatch {
        match (&self.action, self.label) {
            (Some(action), _) => Dispatch::Override(action.clone()),
            (None, Some(label)) => Dispatch::Handle(label),
            (None, None) => Dispatch::Unmatched,
        }
    }
}

/// What to do with a classified URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Handle(RouteLabel),
    Override(RouteAction),
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Name of the winning rule
    pub rule: Option<String>,
    pub dispatch: Dispatch,
}

/// Ordered, read-only rule list shared by every task of a run
#[derive(Debug, Clone)]
pub struct Router {
    rules: Arc<[RouteRule]>,
}

impl Router {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Classifies a URL, optionally with its fetched page
    ///
    /// # Arguments
    ///
    /// * `url` - URL to classify
    /// * `page` - The fetched page, when available; document predicates fail without it
    ///
    /// # Returns
    ///
    /// The first matching rule's outcome, or [`Dispatch::Unmatched`]
    pub fn classify(&self, url: &Url, page: Option<&Page>) -> Classification {
        for rule in self.rules.iter() {
            if rule.predicate.matches(url, page) {
                tracing::debug!("{} matched rule '{}'", url, rule.name);
                return Classification {
                    rule: Some(rule.name.clone()),
                    dispatch: rule.dispatch(),
                };
            }
        }

        tracing::error!("No route matched URL, dropping it: {}", url);
        Classification {
            rule: None,
            dispatch: Dispatch::Unmatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn contains(fragment: &'static str) -> RoutePredicate {
        RoutePredicate::url(move |u| u.as_str().contains(fragment))
    }

    #[test]
    fn test_first_match_wins() {
        let router = Router::new(vec![
            RouteRule::handle("detail", contains("/O"), RouteLabel::JobDetail),
            RouteRule::handle("listing", contains("/praca/"), RouteLabel::JobListing),
        ]);

        let detail = router.classify(&url("https://www.profesia.sk/praca/acme/O123"), None);
        assert_eq!(detail.rule.as_deref(), Some("detail"));
        assert_eq!(detail.dispatch, Dispatch::Handle(RouteLabel::JobDetail));

        let listing = router.classify(&url("https://www.profesia.sk/praca/it/"), None);
        assert_eq!(listing.dispatch, Dispatch::Handle(RouteLabel::JobListing));
    }

    #[test]
    fn test_unmatched() {
        let router = Router::new(vec![RouteRule::handle(
            "listing",
            contains("/praca/"),
            RouteLabel::JobListing,
        )]);
        let result = router.classify(&url("https://www.profesia.sk/kontakt"), None);
        assert_eq!(result.rule, None);
        assert_eq!(result.dispatch, Dispatch::Unmatched);
    }

    #[test]
    fn test_document_predicate_needs_page() {
        let router = Router::new(vec![
            RouteRule::overriding(
                "custom",
                RoutePredicate::document(|_, page| page.body.contains("custom")),
                RouteAction::Unsupported("custom layout".to_string()),
            ),
            RouteRule::handle("listing", contains("/praca/"), RouteLabel::JobListing),
        ]);
        let u = url("https://www.profesia.sk/praca/acme/C12");

        let without = router.classify(&u, None);
        assert_eq!(without.dispatch, Dispatch::Handle(RouteLabel::JobListing));

        let page = Page::new(u.clone(), "<body class=custom></body>".to_string());
        let with = router.classify(&u, Some(&page));
        assert_eq!(
            with.dispatch,
            Dispatch::Override(RouteAction::Unsupported("custom layout".to_string()))
        );
    }

    #[test]
    fn test_reordering_disjoint_rules_keeps_classification() {
        let build = |reversed: bool| {
            let mut rules = vec![
                RouteRule::handle("partners", contains("/partneri"), RouteLabel::Partners),
                RouteRule::handle("lists", contains("/zoznam-"), RouteLabel::JobRelatedList),
            ];
            if reversed {
                rules.reverse();
            }
            Router::new(rules)
        };

        for raw in [
            "https://www.profesia.sk/partneri",
            "https://www.profesia.sk/praca/zoznam-lokalit/",
            "https://www.profesia.sk/kontakt",
        ] {
            let u = url(raw);
            assert_eq!(
                build(false).classify(&u, None),
                build(true).classify(&u, None),
                "classification changed for {}",
                raw
            );
        }
    }
}
