/// Broker client operation that failed. Lets the control loop tell
/// lifecycle failures (fatal) apart from commit failures (logged only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerOp {
    /// Building or applying the client configuration.
    Config,
    /// Creating a producer or consumer handle.
    Connect,
    /// Subscribing a consumer to its topic pair.
    Subscribe,
    /// Handing a record to the producer.
    Submit,
    /// Polling for records.
    Poll,
    /// Committing consumed offsets.
    Commit,
    /// Flushing buffered sends.
    Flush,
    /// Destroying a handle.
    Close,
}

impl BrokerOp {
    /// Whether a failure of this operation must end the agent.
    pub fn is_fatal(self) -> bool {
        !matches!(self, BrokerOp::Commit | BrokerOp::Flush)
    }
}

impl std::fmt::Display for BrokerOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerOp::Config => f.write_str("config"),
            BrokerOp::Connect => f.write_str("connect"),
            BrokerOp::Subscribe => f.write_str("subscribe"),
            BrokerOp::Submit => f.write_str("submit"),
            BrokerOp::Poll => f.write_str("poll"),
            BrokerOp::Commit => f.write_str("commit"),
            BrokerOp::Flush => f.write_str("flush"),
            BrokerOp::Close => f.write_str("close"),
        }
    }
}

/// Error returned by every broker session operation.
///
/// Carries the failed `BrokerOp` and the client's message. Implementations
/// wrap their native error with the constructor matching the call site.
#[derive(Clone)]
pub struct BrokerError {
    op: BrokerOp,
    message: String,
}

impl BrokerError {
    pub fn new(op: BrokerOp, msg: impl Into<String>) -> Self {
        Self { op, message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(BrokerOp::Config, msg)
    }

    pub fn connect(msg: impl Into<String>) -> Self {
        Self::new(BrokerOp::Connect, msg)
    }

    pub fn subscribe(msg: impl Into<String>) -> Self {
        Self::new(BrokerOp::Subscribe, msg)
    }

    pub fn submit(msg: impl Into<String>) -> Self {
        Self::new(BrokerOp::Submit, msg)
    }

    pub fn poll(msg: impl Into<String>) -> Self {
        Self::new(BrokerOp::Poll, msg)
    }

    pub fn commit(msg: impl Into<String>) -> Self {
        Self::new(BrokerOp::Commit, msg)
    }

    pub fn flush(msg: impl Into<String>) -> Self {
        Self::new(BrokerOp::Flush, msg)
    }

    pub fn close(msg: impl Into<String>) -> Self {
        Self::new(BrokerOp::Close, msg)
    }

    pub fn op(&self) -> BrokerOp {
        self.op
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Debug for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.op, self.message)
    }
}

impl std::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.op, self.message)
    }
}

impl std::error::Error for BrokerError {}
