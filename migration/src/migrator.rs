use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202510160001_create_users::Migration),
            Box::new(migrations::m202510160002_create_enrollments::Migration),
            Box::new(migrations::m202510160003_create_attendance_sessions::Migration),
            Box::new(migrations::m202510160004_create_attendance_claims::Migration),
            Box::new(migrations::m202510160005_create_device_bindings::Migration),
            Box::new(migrations::m202510160006_create_credential_verifications::Migration),
        ]
    }
}
