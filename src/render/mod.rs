//! Chart rendering: roofline plots and the prediction-vs-actual view.

pub mod plot;

pub use plot::{render_pred_vs_actual, render_roofline};
