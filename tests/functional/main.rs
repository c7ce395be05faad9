//! Functional test suite: the HTTP API and pipeline driven end to end

#![allow(dead_code)]

mod common;

mod auth_test;
mod pipeline_test;
mod remove_background_test;
