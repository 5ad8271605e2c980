//! Task status dashboard core.
//!
//! Rows pulled from a spreadsheet are normalized into [`task::Task`] records,
//! classified into one of four [`classify::StatusCategory`] buckets, and
//! summarised by [`aggregate::aggregate`]. [`refresh::Refresher`] owns the
//! cached dataset and replaces it wholesale on each successful fetch;
//! [`api::router`] serves the results to a browser front end.

pub mod aggregate;
pub mod api;
pub mod classify;
pub mod export;
pub mod refresh;
pub mod source;
pub mod task;
pub mod view;
