use anyhow::{Context, Result};

use super::Db;
use crate::models::{NewService, Service};

pub async fn create(db: &Db, service: &NewService) -> Result<Service> {
  let id = sqlx::query(
    "
    INSERT INTO service (name, port, checker_path, udp)
    VALUES (?, ?, ?, ?)
    ",
  )
  .bind(&service.name)
  .bind(service.port)
  .bind(&service.checker_path)
  .bind(service.udp)
  .execute(&db.pool)
  .await
  .with_context(|| format!("could not insert service {}", service.name))?
  .last_insert_rowid();

  Ok(Service {
    id,
    name: service.name.clone(),
    port: service.port,
    checker_path: service.checker_path.clone(),
    udp: service.udp,
  })
}

pub async fn get_all(db: &Db) -> Result<Vec<Service>> {
  sqlx::query_as::<_, Service>("SELECT * FROM service ORDER BY id")
    .fetch_all(&db.pool)
    .await
    .context("could not list services")
}
