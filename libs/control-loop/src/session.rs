use agent_api::{Bindings, BrokerError, ClusterRole, TopicBinding};

use crate::error::AgentError;
use crate::failover::{Failover, Switch, Transition};

/// How one agent kind opens and retires its broker session.
pub trait Binder {
    type Session;

    fn open(&self, cluster: ClusterRole, binding: &TopicBinding) -> Result<Self::Session, BrokerError>;

    /// Flush or commit whatever the agent kind requires, then destroy.
    fn teardown(&self, cluster: ClusterRole, session: Self::Session) -> Result<(), BrokerError>;
}

/// Owner of the single live session of an agent.
///
/// The old session is always torn down before the replacement is
/// opened, so two sessions never coexist.
pub struct SessionManager<D: Binder> {
    binder: D,
    bindings: Bindings,
    failover: Failover,
    session: Option<D::Session>,
}

impl<D: Binder> SessionManager<D> {
    /// Open the initial session on the primary cluster.
    pub fn start(binder: D, bindings: Bindings) -> Result<Self, AgentError> {
        let failover = Failover::new();
        let role = failover.active();
        let session = binder
            .open(role, bindings.get(role))
            .map_err(|e| AgentError::broker(role, e))?;
        tracing::info!(cluster = %role, topics = %bindings.get(role), "session opened");
        Ok(Self {
            binder,
            bindings,
            failover,
            session: Some(session),
        })
    }

    pub fn active_role(&self) -> ClusterRole {
        self.failover.active()
    }

    pub fn active_binding(&self) -> &TopicBinding {
        self.bindings.get(self.failover.active())
    }

    /// Role changes applied so far, repeats included.
    pub fn switches(&self) -> u64 {
        self.failover.switches()
    }

    pub fn session(&mut self) -> Result<&mut D::Session, AgentError> {
        let role = self.failover.active();
        self.session.as_mut().ok_or(AgentError::Detached(role))
    }

    /// Apply `transition`: tear down the current session, then open one
    /// bound to the target role. Repeats rebuild against the same role.
    pub fn switch(&mut self, transition: Transition) -> Result<Switch, AgentError> {
        let switch = self.failover.apply(transition);
        tracing::info!(
            from = %switch.from,
            to = %switch.to,
            repeat = switch.is_repeat(),
            "failing over to {} cluster",
            switch.to
        );

        if let Some(old) = self.session.take() {
            self.binder
                .teardown(switch.from, old)
                .map_err(|e| AgentError::broker(switch.from, e))?;
        }

        let binding = self.bindings.get(switch.to);
        let session = self
            .binder
            .open(switch.to, binding)
            .map_err(|e| AgentError::broker(switch.to, e))?;
        tracing::info!(cluster = %switch.to, topics = %binding, "session opened");
        self.session = Some(session);
        Ok(switch)
    }

    /// Retire the live session.
    pub fn shutdown(mut self) -> Result<(), AgentError> {
        let role = self.failover.active();
        if let Some(session) = self.session.take() {
            self.binder
                .teardown(role, session)
                .map_err(|e| AgentError::broker(role, e))?;
        }
        tracing::info!(cluster = %role, "session closed");
        Ok(())
    }
}
