//! Task-local actor context.
//!
//! Log entries created inside [`with_context`] carry its actor, remote
//! address and correlation id. A context with `disabled` set suppresses
//! logging altogether.

use std::future::Future;

tokio::task_local! {
    static CONTEXT: AuditContext;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub actor: Option<String>,
    pub remote_addr: Option<String>,
    /// Correlation id shared by entries of one request.
    pub cid: Option<String>,
    pub disabled: bool,
}

impl AuditContext {
    #[must_use]
    pub fn actor(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            ..Self::default()
        }
    }

    /// A context in which nothing is logged.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    #[must_use]
    pub fn cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    /// The context of the current task, or the default outside any scope.
    #[must_use]
    pub fn current() -> Self {
        CONTEXT.try_with(Clone::clone).unwrap_or_default()
    }
}

/// Run `future` with `context` as the current audit context.
pub async fn with_context<F: Future>(context: AuditContext, future: F) -> F::Output {
    CONTEXT.scope(context, future).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn context_is_scoped() {
        assert_eq!(AuditContext::current(), AuditContext::default());

        let inner = with_context(
            AuditContext::actor("alice").remote_addr("127.0.0.1").cid("req-1"),
            async { AuditContext::current() },
        )
        .await;
        assert_eq!(inner.actor.as_deref(), Some("alice"));
        assert_eq!(inner.remote_addr.as_deref(), Some("127.0.0.1"));
        assert_eq!(inner.cid.as_deref(), Some("req-1"));

        assert_eq!(AuditContext::current(), AuditContext::default());
    }

    #[tokio::test]
    async fn nested_context_wins() {
        let disabled = with_context(AuditContext::actor("alice"), async {
            with_context(AuditContext::disabled(), async { AuditContext::current().disabled }).await
        })
        .await;
        assert!(disabled);
    }
}
