use agent_api::{BrokerError, ClusterRole};

/// Fatal agent errors. Anything that reaches `main` as an `AgentError`
/// ends the process with a non-zero status.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("broker ({cluster}): {source}")]
    Broker { cluster: ClusterRole, source: BrokerError },

    #[error("control channel '{path}': {source}")]
    ControlOpen { path: String, source: std::io::Error },

    #[error("control channel read: {0}")]
    ControlRead(std::io::Error),

    #[error("control channel: malformed command {0:?}")]
    MalformedCommand(String),

    #[error("control channel: unrecognized code {0}")]
    UnrecognizedCode(i64),

    #[error("input: {0}")]
    Input(std::io::Error),

    #[error("output: {0}")]
    Output(std::io::Error),

    #[error("no live session on {0} cluster")]
    Detached(ClusterRole),
}

impl AgentError {
    pub fn broker(cluster: ClusterRole, source: BrokerError) -> Self {
        AgentError::Broker { cluster, source }
    }
}
