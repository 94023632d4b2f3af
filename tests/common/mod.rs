#![allow(dead_code)]

pub mod fake_page;
pub mod fixtures;
pub mod wiremock_helpers;
