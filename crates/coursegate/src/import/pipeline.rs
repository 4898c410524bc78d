use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::Utc;
use csv::{ReaderBuilder, StringRecord, Trim};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect,
    Set, SqlErr,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::ValidateEmail;

use super::fields::{ColumnMap, Field, ImportRow};
use super::labels::LabelTable;
use crate::auth::{generate_temporary_password, hash_password};
use crate::error::ApiError;
use crate::models::enrollment::EnrollmentSource;
use crate::models::course;
use crate::models::user::{self, Role};
use crate::services::enrollment::grant_enrollment;

const MAX_USERNAME_LEN: usize = 30;

/// Outcome of one import run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub enrollments: usize,
    /// `Row N: ...` for every rejected row.
    pub errors: Vec<String>,
    /// `Row N: ...` for imported rows with a label that could not be applied.
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
struct RowOutcome {
    enrollments: usize,
    warnings: Vec<String>,
}

/// Creates accounts from a tabular export and enrolls them by label.
///
/// Every row stands alone: a rejected row is recorded in the summary and the
/// run moves on.
#[derive(Clone)]
pub struct BulkImporter {
    db: DatabaseConnection,
    labels: LabelTable,
}

impl BulkImporter {
    pub fn new(db: DatabaseConnection, labels: LabelTable) -> Self {
        BulkImporter { db, labels }
    }

    pub async fn import_path(&self, path: &Path) -> Result<ImportSummary, ApiError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to read import file: {}", e)))?;
        self.import_bytes(&data).await
    }

    pub async fn import_bytes(&self, data: &[u8]) -> Result<ImportSummary, ApiError> {
        let (columns, rows) = read_rows(data)?;
        let mut summary = ImportSummary::default();
        let mut courses: HashMap<String, Option<course::Model>> = HashMap::new();

        for (line, row) in rows {
            summary.total += 1;
            let outcome = match row {
                Ok(record) => {
                    self.import_row(line, &columns.row(&record), &mut courses)
                        .await
                }
                Err(reason) => Err(ApiError::Validation(reason)),
            };
            match outcome {
                Ok(outcome) => {
                    summary.successful += 1;
                    summary.enrollments += outcome.enrollments;
                    summary.warnings.extend(outcome.warnings);
                }
                Err(e) => {
                    tracing::warn!(row = line, error = %e, "import row rejected");
                    summary.failed += 1;
                    summary.errors.push(format!("Row {}: {}", line, e));
                }
            }
        }

        tracing::info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            enrollments = summary.enrollments,
            "bulk import finished"
        );
        Ok(summary)
    }

    async fn import_row(
        &self,
        line: u64,
        row: &ImportRow,
        courses: &mut HashMap<String, Option<course::Model>>,
    ) -> Result<RowOutcome, ApiError> {
        let email = row
            .email
            .as_deref()
            .ok_or_else(|| ApiError::Validation("Missing email".to_string()))?;
        if !email.validate_email() {
            return Err(ApiError::Validation(format!("Invalid email '{}'", email)));
        }

        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(ApiError::Conflict(format!(
                "User with email {} already exists",
                email
            )));
        }

        let username = unique_username(&self.db, email).await?;
        let password_hash = tokio::task::spawn_blocking(|| hash_password(&generate_temporary_password()))
            .await
            .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))??;

        let now = Utc::now().naive_utc();
        let created = user::ActiveModel {
            email: Set(email.to_string()),
            username: Set(username),
            password_hash: Set(password_hash),
            name: Set(row.name.clone()),
            phone: Set(row.phone.clone()),
            birthday: Set(row.birthday),
            street: Set(row.street.clone()),
            city: Set(row.city.clone()),
            state: Set(row.state.clone()),
            zip_code: Set(row.zip_code.clone()),
            country: Set(row.country.clone()),
            role: Set(Role::User.as_str().to_string()),
            auth_provider: Set("import".to_string()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                ApiError::Conflict(format!("User with email {} already exists", email))
            }
            _ => ApiError::Database(e),
        })?;

        let mut outcome = RowOutcome::default();
        for label in &row.labels {
            let Some(slug) = self.labels.resolve(label) else {
                tracing::debug!(row = line, label = %label, "unknown label ignored");
                continue;
            };
            let course = match courses.get(slug) {
                Some(cached) => cached.clone(),
                None => {
                    let found = course::Entity::find()
                        .filter(course::Column::Slug.eq(slug))
                        .one(&self.db)
                        .await?;
                    courses.insert(slug.to_string(), found.clone());
                    found
                }
            };
            let Some(course) = course else {
                outcome.warnings.push(format!(
                    "Row {}: no course with slug '{}' for label '{}'",
                    line, slug, label
                ));
                continue;
            };
            match grant_enrollment(&self.db, created.id, course.id, EnrollmentSource::Import).await {
                Ok(true) => outcome.enrollments += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(row = line, course_id = course.id, error = %e, "import enrollment failed");
                    outcome.warnings.push(format!(
                        "Row {}: enrollment in '{}' failed: {}",
                        line, course.slug, e
                    ));
                }
            }
        }

        tracing::debug!(row = line, user_id = created.id, "imported user");
        Ok(outcome)
    }
}

type Rows = Vec<(u64, Result<StringRecord, String>)>;

/// Parse the header and every record up front. Lines are 1-based with the
/// header on line 1.
fn read_rows(data: &[u8]) -> Result<(ColumnMap, Rows), ApiError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| ApiError::Validation(format!("Unreadable header row: {}", e)))?
        .clone();
    let columns = ColumnMap::from_headers(&headers);
    if !columns.has(Field::Email) {
        return Err(ApiError::Validation(
            "No email column found in the uploaded file".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let fallback = idx as u64 + 2;
        match result {
            Ok(record) => {
                if record.iter().all(|cell| cell.trim().is_empty()) {
                    continue;
                }
                let line = record.position().map_or(fallback, |p| p.line());
                rows.push((line, Ok(record)));
            }
            Err(e) => {
                let line = e.position().map_or(fallback, |p| p.line());
                rows.push((line, Err(format!("Unreadable row: {}", e))));
            }
        }
    }
    Ok((columns, rows))
}

/// A free username derived from `email`.
pub async fn unique_username(db: &DatabaseConnection, email: &str) -> Result<String, ApiError> {
    let base = base_username(email);
    let taken: HashSet<String> = user::Entity::find()
        .select_only()
        .column(user::Column::Username)
        .filter(user::Column::Username.starts_with(&base))
        .into_tuple::<String>()
        .all(db)
        .await?
        .into_iter()
        .collect();
    Ok(pick_username(&base, &taken))
}

/// Username stem from the email local part.
pub fn base_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let stem: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_USERNAME_LEN)
        .collect();
    if stem.is_empty() {
        "user".to_string()
    } else {
        stem
    }
}

/// `base`, or `base` with the smallest numeric suffix not in `taken`.
pub fn pick_username(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1u32..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| format!("{}{}", base, uuid::Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_from_local_part() {
        assert_eq!(base_username("Jane.Doe+promo@x.com"), "jane.doepromo");
        assert_eq!(base_username("@x.com"), "user");
    }

    #[test]
    fn username_collisions_get_a_suffix() {
        let taken: HashSet<String> = ["jane", "jane1", "jane3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(pick_username("jane", &taken), "jane2");
        assert_eq!(pick_username("bob", &taken), "bob");
    }

    #[test]
    fn rows_carry_file_line_numbers() {
        let data = b"Email,Name\na@x.com,A\n\nb@x.com,B\n";
        let (_, rows) = read_rows(data).unwrap();
        let lines: Vec<u64> = rows.iter().map(|(l, _)| *l).collect();
        assert_eq!(lines, vec![2, 4]);
    }

    #[test]
    fn file_without_email_column_is_rejected() {
        let err = read_rows(b"Name,Phone\nA,1\n").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn blank_rows_are_skipped() {
        let (_, rows) = read_rows(b"email,labels\n,\na@x.com,\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, 3);
    }
}
