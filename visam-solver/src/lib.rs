//! visam-solver: numeric core for incremental bundle adjustment
//!
//! Forward-mode automatic differentiation with const-generic jets, small 3D
//! types that run on plain or dual scalars, and a sparse normal-equation
//! solver for the linearized problem.

mod jet;
pub mod math3d;
pub mod sparse_solver;

pub use jet::{Jet, Real};
pub use sparse_solver::{SolveError, SparseLeastSquares};

// Re-export nalgebra for convenience
pub use nalgebra;
