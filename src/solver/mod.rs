//! The active-set solver: working-set maintenance, the ratio test, dual-graph
//! assembly, leaving-constraint selection and the outer driver, together with
//! the [`QuadraticProgram`] problem family and the bundled
//! [`DenseElimination`] backend.

mod active_set;
mod elimination;
mod qp;
mod settings;
mod working_set;

//flatten solver module structure
pub use active_set::*;
pub use elimination::*;
pub use qp::*;
pub use settings::*;
pub use working_set::*;
