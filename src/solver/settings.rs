use derive_builder::Builder;

/// Solver settings.
///
/// The iteration cap is the resource-exhaustion guard for degenerate problems
/// that would otherwise cycle between activating and deactivating the same
/// constraint; hitting it is reported as
/// [`IterationLimitExceeded`](crate::solver::SolverError::IterationLimitExceeded),
/// distinct from proven infeasibility.
#[derive(Builder, Debug, Clone)]
pub struct Settings {
    ///maximum number of outer active-set iterations
    #[builder(default = "100")]
    pub max_iter: u32,

    ///verbose printing
    #[builder(default = "false")]
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        SettingsBuilder::default().build().unwrap()
    }
}
