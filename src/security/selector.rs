//! Handler selection: one sequential pass with token-type short-circuiting.

use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::security::handler::{AuthenticationContext, AuthenticationHandler};
use crate::security::registry::HandlerRegistry;

/// Selects the authentication handler governing a request.
///
/// Pure function of the context plus the registry snapshot; safe for
/// unbounded concurrent calls. Candidates are evaluated strictly
/// sequentially, never concurrently, and evaluation stops at the first
/// acceptance so handlers further down the chain see no side effects.
#[derive(Clone)]
pub struct HandlerSelector {
    registry: Arc<HandlerRegistry>,
}

impl HandlerSelector {
    /// Selector over a handler registry.
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Walk the ordered handler list and return the first handler whose
    /// `can_handle` accepts the request, or `None` when no handler matches.
    ///
    /// Before each candidate's `can_handle`, the context's
    /// last-of-token-type flag is recomputed: `true` iff no later handler in
    /// the list shares this candidate's token type. Handlers without a token
    /// type are never grouped and always see `true`. A non-last candidate may
    /// use the flag to stay speculative and leave the authoritative decision
    /// to the final handler of its group.
    ///
    /// # Errors
    ///
    /// A failing `can_handle` aborts selection and is propagated unmodified;
    /// this selector adds no retry or suppression.
    pub async fn select(
        &self,
        ctx: &mut AuthenticationContext,
    ) -> Result<Option<Arc<dyn AuthenticationHandler>>> {
        let handlers = self.registry.handlers();

        for (position, handler) in handlers.iter().enumerate() {
            let last_of_type = match handler.token_type() {
                None => true,
                Some(token_type) => !handlers[position + 1..]
                    .iter()
                    .any(|later| later.token_type() == Some(token_type)),
            };

            ctx.set_last_token_type_candidate(last_of_type);

            if handler.can_handle(ctx).await? {
                debug!(handler = handler.name(), "Authentication handler selected");
                return Ok(Some(handler.clone()));
            }
        }

        debug!("No authentication handler matched the request");
        Ok(None)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::Error;
    use crate::security::handler::{
        HandlerProvider, RequestParts, SecurityPolicy, StaticHandlerProvider,
    };

    /// Records how often `can_handle` ran and which last-of-type flag it saw.
    struct ProbeHandler {
        name: &'static str,
        order: i32,
        token_type: Option<&'static str>,
        accept: bool,
        fail: bool,
        calls: AtomicUsize,
        seen_flags: Mutex<Vec<bool>>,
    }

    impl ProbeHandler {
        fn new(
            name: &'static str,
            order: i32,
            token_type: Option<&'static str>,
            accept: bool,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                order,
                token_type,
                accept,
                fail: false,
                calls: AtomicUsize::new(0),
                seen_flags: Mutex::new(Vec::new()),
            })
        }

        fn failing(name: &'static str, order: i32) -> Arc<Self> {
            Arc::new(Self {
                name,
                order,
                token_type: None,
                accept: false,
                fail: true,
                calls: AtomicUsize::new(0),
                seen_flags: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn seen_flags(&self) -> Vec<bool> {
            self.seen_flags.lock().clone()
        }
    }

    #[async_trait]
    impl AuthenticationHandler for ProbeHandler {
        fn name(&self) -> &str {
            self.name
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn token_type(&self) -> Option<&str> {
            self.token_type
        }

        async fn can_handle(&self, ctx: &AuthenticationContext) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_flags.lock().push(ctx.is_last_token_type_candidate());
            if self.fail {
                return Err(Error::handler(
                    self.name,
                    std::io::Error::other("evaluation failed"),
                ));
            }
            Ok(self.accept)
        }

        fn handle(&self, _ctx: &AuthenticationContext) -> Vec<SecurityPolicy> {
            vec![SecurityPolicy::named(self.name)]
        }
    }

    fn selector_over(handlers: Vec<Arc<ProbeHandler>>) -> HandlerSelector {
        let provider: Box<dyn HandlerProvider> = Box::new(StaticHandlerProvider::new(
            handlers.into_iter().map(|h| h as _).collect(),
        ));
        let registry = Arc::new(HandlerRegistry::new(provider));
        registry.initialize();
        HandlerSelector::new(registry)
    }

    fn context() -> AuthenticationContext {
        AuthenticationContext::new(Arc::new(RequestParts::new()))
    }

    #[tokio::test]
    async fn short_circuits_on_first_accepting_handler() {
        // GIVEN: three ungrouped handlers; only the second accepts
        let first = ProbeHandler::new("first", 100, None, false);
        let second = ProbeHandler::new("second", 200, None, true);
        let third = ProbeHandler::new("third", 300, None, false);
        let selector = selector_over(vec![first.clone(), second.clone(), third.clone()]);

        // WHEN: selecting
        let mut ctx = context();
        let selected = selector.select(&mut ctx).await.unwrap().unwrap();

        // THEN: second wins; first evaluated once, third never invoked
        assert_eq!(selected.name(), "second");
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test]
    async fn grouped_handler_sees_false_when_a_later_handler_shares_its_type() {
        // GIVEN: handlers 1 and 2 share a token type, handler 3 differs;
        //        handler 1 accepts
        let h1 = ProbeHandler::new("h1", 100, Some("type"), true);
        let h2 = ProbeHandler::new("h2", 200, Some("type"), false);
        let h3 = ProbeHandler::new("h3", 300, Some("other"), false);
        let selector = selector_over(vec![h1.clone(), h2.clone(), h3.clone()]);

        let mut ctx = context();
        let selected = selector.select(&mut ctx).await.unwrap().unwrap();

        // THEN: h1 selected with the non-authoritative flag; h2/h3 untouched
        assert_eq!(selected.name(), "h1");
        assert_eq!(h1.seen_flags(), vec![false]);
        assert_eq!(h2.calls(), 0);
        assert_eq!(h3.calls(), 0);
    }

    #[tokio::test]
    async fn last_handler_of_its_group_sees_true() {
        // GIVEN: h1/h2 share a type; h1 declines, h2 accepts
        let h1 = ProbeHandler::new("h1", 100, Some("type"), false);
        let h2 = ProbeHandler::new("h2", 200, Some("type"), true);
        let h3 = ProbeHandler::new("h3", 300, Some("other"), false);
        let selector = selector_over(vec![h1.clone(), h2.clone(), h3.clone()]);

        let mut ctx = context();
        let selected = selector.select(&mut ctx).await.unwrap().unwrap();

        // THEN: h1 ran speculatively (false), h2 authoritatively (true)
        assert_eq!(selected.name(), "h2");
        assert_eq!(h1.seen_flags(), vec![false]);
        assert_eq!(h2.seen_flags(), vec![true]);
        assert_eq!(h3.calls(), 0);
    }

    #[tokio::test]
    async fn ungrouped_handlers_always_see_true() {
        let h1 = ProbeHandler::new("h1", 100, None, false);
        let h2 = ProbeHandler::new("h2", 200, None, true);
        let selector = selector_over(vec![h1.clone(), h2.clone()]);

        let mut ctx = context();
        selector.select(&mut ctx).await.unwrap();

        assert_eq!(h1.seen_flags(), vec![true]);
        assert_eq!(h2.seen_flags(), vec![true]);
    }

    #[tokio::test]
    async fn returns_none_when_no_handler_accepts() {
        let h1 = ProbeHandler::new("h1", 100, None, false);
        let h2 = ProbeHandler::new("h2", 200, None, false);
        let selector = selector_over(vec![h1.clone(), h2.clone()]);

        let mut ctx = context();
        let selected = selector.select(&mut ctx).await.unwrap();

        assert!(selected.is_none());
        assert_eq!(h1.calls(), 1);
        assert_eq!(h2.calls(), 1);
    }

    #[tokio::test]
    async fn selection_over_empty_registry_is_none() {
        let selector = selector_over(vec![]);
        let mut ctx = context();
        assert!(selector.select(&mut ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn handler_failure_propagates_and_aborts_selection() {
        let failing = ProbeHandler::failing("broken", 100);
        let after = ProbeHandler::new("after", 200, None, true);
        let selector = selector_over(vec![failing.clone(), after.clone()]);

        let mut ctx = context();
        let err = selector.select(&mut ctx).await.unwrap_err();

        assert!(matches!(err, Error::Handler { .. }));
        assert_eq!(after.calls(), 0);
    }

    #[tokio::test]
    async fn candidates_are_tried_in_priority_order_not_discovery_order() {
        // GIVEN: discovery order keyless(1000) then apikey(500), both accept
        let keyless = ProbeHandler::new("keyless", 1000, None, true);
        let apikey = ProbeHandler::new("apikey", 500, None, true);
        let selector = selector_over(vec![keyless.clone(), apikey.clone()]);

        let mut ctx = context();
        let selected = selector.select(&mut ctx).await.unwrap().unwrap();

        // THEN: the lower order wins and keyless is never consulted
        assert_eq!(selected.name(), "apikey");
        assert_eq!(keyless.calls(), 0);
    }
}
