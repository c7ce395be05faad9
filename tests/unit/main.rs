//! Unit test suite for public building blocks

mod response_test;
