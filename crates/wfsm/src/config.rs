// Settings for determinization and the minimization pipeline.

use crate::{FsmError, Result};

/// Default quantization step for residual weights (natural-log units).
pub const DEFAULT_DELTA: f64 = 1.0 / 1024.0;

/// Determinization settings.
///
/// `delta` is the bucket width used when comparing residual weights of two
/// candidate classes; residuals closer than `delta` are treated as equal.
/// It must be finite and positive; [`determinize`](crate::determinize())
/// rejects anything else with [`FsmError::InvalidDelta`](crate::FsmError::InvalidDelta).
///
/// `max_states` bounds the number of output states. Subset construction can
/// grow exponentially in the input size and the core imposes no limit of its
/// own; callers facing untrusted input should set one.
#[derive(Debug, Clone, PartialEq)]
pub struct DeterminizeConfig {
    pub delta: f64,
    pub max_states: Option<usize>,
}

impl Default for DeterminizeConfig {
    fn default() -> Self {
        Self {
            delta: DEFAULT_DELTA,
            max_states: None,
        }
    }
}

impl DeterminizeConfig {
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_max_states(mut self, limit: usize) -> Self {
        self.max_states = Some(limit);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.delta.is_finite() && self.delta > 0.0 {
            Ok(())
        } else {
            Err(FsmError::InvalidDelta(self.delta))
        }
    }
}

/// Minimization pipeline settings.
///
/// Pruning and nil-state elimination run before the determinization passes
/// unless disabled. Disabling them is only sound when the input is known to
/// be trim and free of eligible nil states already.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeConfig {
    pub determinize: DeterminizeConfig,
    pub prune: bool,
    pub eliminate_nils: bool,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        Self {
            determinize: DeterminizeConfig::default(),
            prune: true,
            eliminate_nils: true,
        }
    }
}

impl MinimizeConfig {
    pub fn with_determinize(mut self, config: DeterminizeConfig) -> Self {
        self.determinize = config;
        self
    }

    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn with_eliminate_nils(mut self, eliminate: bool) -> Self {
        self.eliminate_nils = eliminate;
        self
    }
}
