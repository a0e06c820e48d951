#![allow(dead_code)]

pub mod fakes;
pub mod logging;
pub mod pop_node;
