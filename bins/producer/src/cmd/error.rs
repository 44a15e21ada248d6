use control_loop::AgentError;

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("input file '{path}': {source}")]
    Input { path: String, source: std::io::Error },

    #[error("{0}")]
    Agent(#[from] AgentError),
}
