pub use sea_orm_migration::prelude::*;

mod migrations;
mod migrator;
pub mod runner;

pub use migrator::Migrator;
