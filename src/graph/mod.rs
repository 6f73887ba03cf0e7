//! The factor-graph data model: variable keys, per-key vector values, the
//! linear factor types, factor graphs and the variable index.

mod factor;
mod key;
mod values;
mod variable_index;

//flatten graph module structure
pub use factor::*;
pub use key::*;
pub use values::*;
pub use variable_index::*;
