//! Integration tests for Search-Harvest
//!
//! These tests use wiremock to create mock HTTP servers and scripted
//! transports to drive the full fetch, extract and archive cycle.

mod common;
mod crawl_tests;
mod fetch_tests;
