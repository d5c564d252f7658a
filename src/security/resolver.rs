//! Security resolution: from inbound request to a handler's policy chain.

use tracing::debug;

use crate::Result;
use crate::security::handler::{AuthenticationContext, ExecutionPhase, SecurityPolicy};
use crate::security::selector::HandlerSelector;

/// The policy chain produced by the selected handler, ready for the flow
/// executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSecurity {
    /// Name of the handler that accepted the request.
    pub handler_name: String,
    /// Phase the chain applies to.
    pub phase: ExecutionPhase,
    /// Policies, in execution order.
    pub policies: Vec<SecurityPolicy>,
}

/// Thin glue between handler selection and the flow executor: asks the
/// selector for a handler and that handler for its policy chain.
#[derive(Clone)]
pub struct SecurityResolver {
    selector: HandlerSelector,
}

impl SecurityResolver {
    /// Resolver over a handler selector.
    #[must_use]
    pub fn new(selector: HandlerSelector) -> Self {
        Self { selector }
    }

    /// Resolve the security mechanism governing this request.
    ///
    /// Returns `Ok(None)` when no handler matches; the caller decides the
    /// response (typically the gateway's standard authentication failure).
    ///
    /// # Errors
    ///
    /// Handler evaluation failures from `select` are propagated unmodified.
    pub async fn resolve(
        &self,
        phase: ExecutionPhase,
        ctx: &mut AuthenticationContext,
    ) -> Result<Option<ResolvedSecurity>> {
        let Some(handler) = self.selector.select(ctx).await? else {
            return Ok(None);
        };

        let policies = handler.handle(ctx);
        debug!(
            handler = handler.name(),
            policies = policies.len(),
            ?phase,
            "Security resolved"
        );

        Ok(Some(ResolvedSecurity {
            handler_name: handler.name().to_string(),
            phase,
            policies,
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
