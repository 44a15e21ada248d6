use control_loop::AgentError;

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Agent(#[from] AgentError),
}
