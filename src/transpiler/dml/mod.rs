//! DML statement builders.

pub mod delete;
pub mod exec;
pub mod insert;
pub mod select;
pub mod update;
