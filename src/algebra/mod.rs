//! Scalar traits and the small dense linear algebra used by the bundled
//! elimination backend.

mod floats;
mod lu;
mod matrix;
mod vecmath;

//flatten algebra module structure
pub use floats::*;
pub use lu::*;
pub use matrix::*;
pub use vecmath::*;
