//! Types and functions for charting benchmark timings: how long a run over some number of inputs
//! took at each thread count.
//!
//! Timings are read from lines of `size | threads | elapsed`, where `elapsed` is either seconds
//! (`45.5`) or minutes and seconds (`1:30`). Each input size becomes one line on the chart.
//!
//! ```
//! use benchplot::{ChartOptions, Parser};
//! let input = "100 | 1 | 1:30\n100 | 2 | 48.2\n1000 | 1 | 12:01.5\n";
//! let table = Parser::new().parse_reader(input.as_bytes())?;
//! assert_eq!(table.get(100, 1), Some(90.0));
//!
//! let svg = benchplot::render_svg(&table, &ChartOptions::default())?;
//! assert!(svg.contains("1000 elements"));
//! # Ok::<(), benchplot::Error>(())
//! ```
//!

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications,
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::cognitive_complexity,
    clippy::missing_const_for_fn,
    clippy::needless_borrow
)]

mod error;
mod render;
mod table;

pub use error::{Error, Result, TimeError};
pub use render::{rasterize, render_svg, save, series_label, ChartOptions};
pub use table::{parse_elapsed, Measurement, Parser, Series, Table};
