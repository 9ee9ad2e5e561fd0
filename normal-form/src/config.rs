//! Tuning parameters for the normal form algorithms.

/// Parameters of the factor refinement sieve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SieveConfig {
    /// The constant `C` in the sieve bound `C * log(N) * log(log(N))^2`.
    ///
    /// The default is 3.
    pub multiplier: u32,

    /// How many times the multiplier is doubled before giving up.
    ///
    /// The default is 24.
    pub max_rounds: u32,

    /// The largest sieve (number of candidate coefficients) that is allocated.
    ///
    /// The default is 2^24.
    pub max_bound: usize,
}

impl Default for SieveConfig {
    fn default() -> Self {
        Self {
            multiplier: 3,
            max_rounds: 24,
            max_bound: 1 << 24,
        }
    }
}

/// Configuration shared by all the normal form algorithms.
/// Use `Config::default()` to get a reasonable default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Parameters of the factor refinement sieve used by the column
    /// reductions and both phases of the Smith normal form.
    ///
    /// The default is `SieveConfig::default()`.
    pub sieve: SieveConfig,

    /// How many times the fixed-size Smith normal form alternates between
    /// the echelon forms of the matrix and its transpose.
    ///
    /// The default is 64.
    pub max_alternations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// The default configuration.
    pub fn new() -> Self {
        Self {
            sieve: SieveConfig::default(),
            max_alternations: 64,
        }
    }

    /// Sets [`SieveConfig::multiplier`]. The default is 3.
    pub fn with_sieve_multiplier(mut self, multiplier: u32) -> Self {
        self.sieve.multiplier = multiplier;
        self
    }

    /// Sets [`SieveConfig::max_rounds`]. The default is 24.
    pub fn with_sieve_rounds(mut self, rounds: u32) -> Self {
        self.sieve.max_rounds = rounds;
        self
    }

    /// Sets [`SieveConfig::max_bound`]. The default is 2^24.
    pub fn with_sieve_bound(mut self, bound: usize) -> Self {
        self.sieve.max_bound = bound;
        self
    }

    /// Sets [`Config::max_alternations`]. The default is 64.
    pub fn with_max_alternations(mut self, rounds: usize) -> Self {
        self.max_alternations = rounds;
        self
    }
}
