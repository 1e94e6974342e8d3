#![forbid(unsafe_code)]

pub mod hash;
pub mod envelope;
pub mod utils;

#[cfg(test)]
mod proptests;
