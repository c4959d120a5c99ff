//! End-to-end scenarios: expand a pipeline, fan it out with a mock runner,
//! and check what the gate decides

mod helpers;

mod cancellation;
mod fan_in;
mod matrix_legs;
mod results_file;
