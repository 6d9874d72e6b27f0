//! Integration tests for the harvester

mod harvest_tests;
mod http_tests;
mod support;
