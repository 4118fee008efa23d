use shardworld_dungen::DungenError;

/// A player could not be placed. Carries the world state the host reports
/// back to the connecting client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("spawn rejected: population {population}, load {load:.2}")]
pub struct SpawnRejected {
    pub population: usize,
    pub load: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("invalid map: {0}")]
    Map(#[from] DungenError),
    #[error(transparent)]
    SpawnRejected(#[from] SpawnRejected),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_reports_context() {
        let err = SpawnRejected {
            population: 42,
            load: 0.5,
        };
        assert_eq!(err.to_string(), "spawn rejected: population 42, load 0.50");
        let wrapped: KernelError = err.into();
        assert!(wrapped.to_string().contains("population 42"));
    }
}
