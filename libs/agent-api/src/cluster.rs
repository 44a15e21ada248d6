// ═══════════════════════════════════════════════════════════════
//  Cluster role
// ═══════════════════════════════════════════════════════════════

/// Which of the two fixed clusters an agent is currently bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterRole {
    Primary,
    Backup,
}

impl ClusterRole {
    /// The role that is not active when `self` is.
    pub fn other(self) -> Self {
        match self {
            ClusterRole::Primary => ClusterRole::Backup,
            ClusterRole::Backup => ClusterRole::Primary,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClusterRole::Primary => "primary",
            ClusterRole::Backup => "backup",
        }
    }
}

impl std::fmt::Display for ClusterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Topic bindings
// ═══════════════════════════════════════════════════════════════

/// Topic names one role binds to. The producer publishes to `topic`;
/// the consumer subscribes to `topic` and, when present, `auxiliary`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBinding {
    topic: String,
    auxiliary: Option<String>,
}

impl TopicBinding {
    pub fn single(topic: impl Into<String>) -> Self {
        Self { topic: topic.into(), auxiliary: None }
    }

    pub fn pair(topic: impl Into<String>, auxiliary: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            auxiliary: Some(auxiliary.into()),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn auxiliary(&self) -> Option<&str> {
        self.auxiliary.as_deref()
    }

    /// All names of this binding, main topic first.
    pub fn names(&self) -> Vec<&str> {
        std::iter::once(self.topic.as_str())
            .chain(self.auxiliary.as_deref())
            .collect()
    }
}

impl std::fmt::Display for TopicBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.auxiliary {
            Some(aux) => write!(f, "{},{}", self.topic, aux),
            None => f.write_str(&self.topic),
        }
    }
}

/// The primary/backup binding pair, fixed at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    pub primary: TopicBinding,
    pub backup: TopicBinding,
}

impl Bindings {
    pub fn new(primary: TopicBinding, backup: TopicBinding) -> Self {
        Self { primary, backup }
    }

    pub fn get(&self, role: ClusterRole) -> &TopicBinding {
        match role {
            ClusterRole::Primary => &self.primary,
            ClusterRole::Backup => &self.backup,
        }
    }
}
