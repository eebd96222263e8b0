//! PostgreSQL storage backend implementation.
//!
//! Uses sqlx for database operations and implements the StorageBackend trait.
//! Artifacts are stored as a JSONB `data` document next to the columns that carry
//! constraints (`project_id`, `code`, link keys).

use super::{API_ENDPOINT_ENTITY, StorageError, traits::*};
use crate::models::{
    ApiContract, ApiDtoLink, ApiSequenceLink, DtoSchema, Module, Project, SequenceDiagram,
    UseCase,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

/// Unique index over a contract's project, method and endpoint.
const ENDPOINT_CONSTRAINT: &str = "api_contracts_endpoint_key";

/// Foreign-key column naming the record's owner, and its value.
type OwnerColumn = (&'static str, Option<Uuid>);

/// Columns written next to the JSONB document.
struct ArtifactRow<'a> {
    id: Uuid,
    project_id: Uuid,
    code: &'a str,
    created_at: DateTime<Utc>,
    owner: Option<OwnerColumn>,
}

/// PostgreSQL storage backend implementation.
pub struct PostgresStorageBackend {
    pool: PgPool,
}

impl PostgresStorageBackend {
    /// Create a new PostgreSQL storage backend.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled migrations.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::ConnectionError(format!("Migration failed: {}", e)))
    }

    async fn fetch_by_id<T: DeserializeOwned>(
        &self,
        table: &'static str,
        entity_type: &str,
        id: Uuid,
    ) -> Result<Option<T>, StorageError> {
        let sql = format!("SELECT data FROM {} WHERE id = $1", table);
        let row: Option<serde_json::Value> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error(entity_type, &id.to_string(), e))?;

        row.map(|data| decode(entity_type, data)).transpose()
    }

    async fn fetch_by_project<T: DeserializeOwned>(
        &self,
        table: &'static str,
        entity_type: &str,
        project_id: Uuid,
    ) -> Result<Vec<T>, StorageError> {
        let sql = format!(
            "SELECT data FROM {} WHERE project_id = $1 ORDER BY created_at, code",
            table
        );
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(entity_type, &project_id.to_string(), e))?;

        rows.into_iter().map(|data| decode(entity_type, data)).collect()
    }

    async fn insert_artifact<T: Serialize>(
        &self,
        table: &'static str,
        entity_type: &str,
        row: ArtifactRow<'_>,
        record: &T,
    ) -> Result<(), StorageError> {
        let data = encode(entity_type, record)?;
        let sql = match row.owner {
            Some((column, _)) => format!(
                "INSERT INTO {} (id, project_id, code, data, created_at, updated_at, {}) \
                 VALUES ($1, $2, $3, $4, $5, $5, $6)",
                table, column
            ),
            None => format!(
                "INSERT INTO {} (id, project_id, code, data, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $5)",
                table
            ),
        };
        let mut query = sqlx::query(&sql)
            .bind(row.id)
            .bind(row.project_id)
            .bind(row.code)
            .bind(data)
            .bind(row.created_at);
        if let Some((_, owner_id)) = row.owner {
            query = query.bind(owner_id);
        }
        query
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(entity_type, row.code, e))?;

        Ok(())
    }

    async fn update_artifact<T: Serialize>(
        &self,
        table: &'static str,
        entity_type: &str,
        id: Uuid,
        owner: Option<OwnerColumn>,
        record: &T,
    ) -> Result<(), StorageError> {
        let data = encode(entity_type, record)?;
        let sql = match owner {
            Some((column, _)) => format!(
                "UPDATE {} SET data = $1, updated_at = $2, {} = $4 WHERE id = $3",
                table, column
            ),
            None => format!(
                "UPDATE {} SET data = $1, updated_at = $2 WHERE id = $3",
                table
            ),
        };
        let mut query = sqlx::query(&sql).bind(data).bind(Utc::now()).bind(id);
        if let Some((_, owner_id)) = owner {
            query = query.bind(owner_id);
        }
        let rows_affected = query
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(entity_type, &id.to_string(), e))?
            .rows_affected();

        if rows_affected == 0 {
            Err(StorageError::not_found(entity_type, id))
        } else {
            Ok(())
        }
    }

    async fn delete_artifact(
        &self,
        table: &'static str,
        entity_type: &str,
        id: Uuid,
    ) -> Result<(), StorageError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", table);
        let rows_affected = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(entity_type, &id.to_string(), e))?
            .rows_affected();

        if rows_affected == 0 {
            Err(StorageError::not_found(entity_type, id))
        } else {
            Ok(())
        }
    }
}

fn encode<T: Serialize>(entity_type: &str, record: &T) -> Result<serde_json::Value, StorageError> {
    serde_json::to_value(record)
        .map_err(|e| StorageError::Other(format!("Failed to serialize {}: {}", entity_type, e)))
}

fn decode<T: DeserializeOwned>(
    entity_type: &str,
    data: serde_json::Value,
) -> Result<T, StorageError> {
    serde_json::from_value(data)
        .map_err(|e| StorageError::Other(format!("Failed to deserialize {}: {}", entity_type, e)))
}

/// Translate sqlx failures into storage errors, keeping serialization failures and
/// unique violations distinguishable so callers can retry them.
fn map_db_error(entity_type: &str, entity_id: &str, err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            // serialization_failure, deadlock_detected
            Some("40001") | Some("40P01") => {
                return StorageError::Conflict {
                    entity_type: entity_type.to_string(),
                    entity_id: entity_id.to_string(),
                    message: db_err.message().to_string(),
                };
            }
            // unique_violation
            Some("23505") if db_err.constraint() == Some(ENDPOINT_CONSTRAINT) => {
                return StorageError::duplicate(API_ENDPOINT_ENTITY, entity_id);
            }
            Some("23505") => return StorageError::duplicate(entity_type, entity_id),
            // foreign_key_violation: owner gone, or children still present
            Some("23503") => {
                return StorageError::referenced(entity_type, entity_id, db_err.message());
            }
            _ => {}
        }
    }
    match err {
        sqlx::Error::RowNotFound => StorageError::not_found(entity_type, entity_id),
        other => StorageError::ConnectionError(other.to_string()),
    }
}

#[async_trait]
impl CounterStore for PostgresStorageBackend {
    async fn increment_counter(&self, key: &CounterKey) -> Result<i64, StorageError> {
        let key_label = key.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("seq_counter", &key_label, e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("seq_counter", &key_label, e))?;

        let allocated: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO seq_counters (project_id, artifact_kind, scope_ref1, scope_ref2, next_number, updated_at)
            VALUES ($1, $2, $3, $4, 2, NOW())
            ON CONFLICT (project_id, artifact_kind, scope_ref1, scope_ref2)
            DO UPDATE SET next_number = seq_counters.next_number + 1, updated_at = NOW()
            RETURNING next_number - 1
            "#,
        )
        .bind(key.project_id)
        .bind(key.artifact_kind.as_str())
        .bind(key.scope_ref1.as_deref().unwrap_or(""))
        .bind(key.scope_ref2.as_deref().unwrap_or(""))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_error("seq_counter", &key_label, e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("seq_counter", &key_label, e))?;

        debug!("Counter {} issued {}", key_label, allocated);
        Ok(allocated)
    }
}

#[async_trait]
impl StorageBackend for PostgresStorageBackend {
    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, StorageError> {
        let row: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT data FROM projects WHERE id = $1")
                .bind(project_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_db_error("project", &project_id.to_string(), e))?;

        row.map(|data| decode("project", data)).transpose()
    }

    async fn create_project(&self, project: Project) -> Result<Project, StorageError> {
        let data = encode("project", &project)?;
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            "#,
        )
        .bind(project.id)
        .bind(&project.name)
        .bind(data)
        .bind(project.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("project", &project.id.to_string(), e))?;

        Ok(project)
    }

    async fn get_module(&self, module_id: Uuid) -> Result<Option<Module>, StorageError> {
        self.fetch_by_id("modules", "module", module_id).await
    }

    async fn create_module(&self, module: Module) -> Result<Module, StorageError> {
        self.insert_artifact(
            "modules",
            "module",
            ArtifactRow {
                id: module.id,
                project_id: module.project_id,
                code: &module.code,
                created_at: module.created_at,
                owner: Some(("parent_id", module.parent_id)),
            },
            &module,
        )
        .await?;
        Ok(module)
    }

    async fn update_module(&self, module: Module) -> Result<Module, StorageError> {
        self.update_artifact(
            "modules",
            "module",
            module.id,
            Some(("parent_id", module.parent_id)),
            &module,
        )
        .await?;
        Ok(module)
    }

    async fn delete_module(&self, module_id: Uuid) -> Result<(), StorageError> {
        // Child modules and use cases block the delete through their foreign keys
        self.delete_artifact("modules", "module", module_id).await
    }

    async fn list_modules(&self, project_id: Uuid) -> Result<Vec<Module>, StorageError> {
        self.fetch_by_project("modules", "module", project_id).await
    }

    async fn get_use_case(&self, use_case_id: Uuid) -> Result<Option<UseCase>, StorageError> {
        self.fetch_by_id("use_cases", "use_case", use_case_id).await
    }

    async fn create_use_case(&self, use_case: UseCase) -> Result<UseCase, StorageError> {
        self.insert_artifact(
            "use_cases",
            "use_case",
            ArtifactRow {
                id: use_case.id,
                project_id: use_case.project_id,
                code: &use_case.code,
                created_at: use_case.created_at,
                owner: Some(("module_id", Some(use_case.module_id))),
            },
            &use_case,
        )
        .await?;
        Ok(use_case)
    }

    async fn delete_use_case(&self, use_case_id: Uuid) -> Result<(), StorageError> {
        self.delete_artifact("use_cases", "use_case", use_case_id)
            .await
    }

    async fn list_use_cases(&self, project_id: Uuid) -> Result<Vec<UseCase>, StorageError> {
        self.fetch_by_project("use_cases", "use_case", project_id)
            .await
    }

    async fn get_sequence_diagram(
        &self,
        sequence_id: Uuid,
    ) -> Result<Option<SequenceDiagram>, StorageError> {
        self.fetch_by_id("sequence_diagrams", "sequence_diagram", sequence_id)
            .await
    }

    async fn create_sequence_diagram(
        &self,
        diagram: SequenceDiagram,
    ) -> Result<SequenceDiagram, StorageError> {
        self.insert_artifact(
            "sequence_diagrams",
            "sequence_diagram",
            ArtifactRow {
                id: diagram.id,
                project_id: diagram.project_id,
                code: &diagram.code,
                created_at: diagram.created_at,
                owner: Some(("use_case_id", Some(diagram.use_case_id))),
            },
            &diagram,
        )
        .await?;
        Ok(diagram)
    }

    async fn update_sequence_diagram(
        &self,
        diagram: SequenceDiagram,
    ) -> Result<SequenceDiagram, StorageError> {
        self.update_artifact("sequence_diagrams", "sequence_diagram", diagram.id, None, &diagram)
            .await?;
        Ok(diagram)
    }

    async fn delete_sequence_diagram(&self, sequence_id: Uuid) -> Result<(), StorageError> {
        // api_sequence_links rows go with it (ON DELETE CASCADE)
        self.delete_artifact("sequence_diagrams", "sequence_diagram", sequence_id)
            .await
    }

    async fn list_sequence_diagrams(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<SequenceDiagram>, StorageError> {
        self.fetch_by_project("sequence_diagrams", "sequence_diagram", project_id)
            .await
    }

    async fn get_api_contract(&self, api_id: Uuid) -> Result<Option<ApiContract>, StorageError> {
        self.fetch_by_id("api_contracts", "api_contract", api_id)
            .await
    }

    async fn create_api_contract(&self, api: ApiContract) -> Result<ApiContract, StorageError> {
        self.insert_artifact(
            "api_contracts",
            "api_contract",
            ArtifactRow {
                id: api.id,
                project_id: api.project_id,
                code: &api.code,
                created_at: api.created_at,
                owner: None,
            },
            &api,
        )
        .await?;
        Ok(api)
    }

    async fn delete_api_contract(&self, api_id: Uuid) -> Result<(), StorageError> {
        self.delete_artifact("api_contracts", "api_contract", api_id)
            .await
    }

    async fn list_api_contracts(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ApiContract>, StorageError> {
        self.fetch_by_project("api_contracts", "api_contract", project_id)
            .await
    }

    async fn get_dto_schema(&self, dto_id: Uuid) -> Result<Option<DtoSchema>, StorageError> {
        self.fetch_by_id("dto_schemas", "dto_schema", dto_id).await
    }

    async fn create_dto_schema(&self, dto: DtoSchema) -> Result<DtoSchema, StorageError> {
        self.insert_artifact(
            "dto_schemas",
            "dto_schema",
            ArtifactRow {
                id: dto.id,
                project_id: dto.project_id,
                code: &dto.code,
                created_at: dto.created_at,
                owner: None,
            },
            &dto,
        )
        .await?;
        Ok(dto)
    }

    async fn delete_dto_schema(&self, dto_id: Uuid) -> Result<(), StorageError> {
        self.delete_artifact("dto_schemas", "dto_schema", dto_id)
            .await
    }

    async fn list_dto_schemas(&self, project_id: Uuid) -> Result<Vec<DtoSchema>, StorageError> {
        self.fetch_by_project("dto_schemas", "dto_schema", project_id)
            .await
    }

    async fn create_api_sequence_link(
        &self,
        link: ApiSequenceLink,
    ) -> Result<ApiSequenceLink, StorageError> {
        let data = encode("api_sequence_link", &link)?;
        let (api_id, sequence_id, step_ref) = link.unique_key();
        let key = format!("{}/{}/{}", api_id, sequence_id, step_ref);

        sqlx::query(
            r#"
            INSERT INTO api_sequence_links (id, api_id, sequence_id, step_ref, line_number, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(link.id)
        .bind(api_id)
        .bind(sequence_id)
        .bind(step_ref)
        .bind(link.line_number.map(|n| n as i32))
        .bind(data)
        .bind(link.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("api_sequence_link", &key, e))?;

        Ok(link)
    }

    async fn list_api_sequence_links(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ApiSequenceLink>, StorageError> {
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT l.data
            FROM api_sequence_links l
            JOIN api_contracts a ON a.id = l.api_id
            WHERE a.project_id = $1
            ORDER BY l.created_at, l.id
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("api_sequence_link", &project_id.to_string(), e))?;

        rows.into_iter()
            .map(|data| decode("api_sequence_link", data))
            .collect()
    }

    async fn create_api_dto_link(&self, link: ApiDtoLink) -> Result<ApiDtoLink, StorageError> {
        let data = encode("api_dto_link", &link)?;
        let key = format!("{}/{}/{}", link.api_id, link.dto_id, link.role);

        sqlx::query(
            r#"
            INSERT INTO api_dto_links (id, api_id, dto_id, role, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(link.id)
        .bind(link.api_id)
        .bind(link.dto_id)
        .bind(link.role.to_string())
        .bind(data)
        .bind(link.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_error("api_dto_link", &key, e))?;

        Ok(link)
    }

    async fn list_api_dto_links(&self, project_id: Uuid) -> Result<Vec<ApiDtoLink>, StorageError> {
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT l.data
            FROM api_dto_links l
            JOIN api_contracts a ON a.id = l.api_id
            WHERE a.project_id = $1
            ORDER BY l.created_at, l.id
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("api_dto_link", &project_id.to_string(), e))?;

        rows.into_iter()
            .map(|data| decode("api_dto_link", data))
            .collect()
    }
}
