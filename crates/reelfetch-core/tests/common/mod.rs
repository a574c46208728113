#![allow(dead_code)]

pub mod fake_transport;
pub mod range_server;
