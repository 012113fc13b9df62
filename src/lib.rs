#![allow(clippy::excessive_precision)]
#![allow(missing_docs)]

pub mod backend;
pub mod body;
pub mod error;
pub mod function;
pub mod network;
pub mod pixmaf;
