use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

pub const NO_SOLUTION: &str = "No solution available.";
pub const UNKNOWN_CONTACT: &str = "Unknown Contact";
pub const NO_CONTACT_NUMBER: &str = "No contact information.";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MaintenanceRecord {
    pub solution: String,
    pub contact_name: String,
    pub contact_number: String,
}

impl MaintenanceRecord {
    pub fn placeholder() -> Self {
        MaintenanceRecord {
            solution: NO_SOLUTION.to_string(),
            contact_name: UNKNOWN_CONTACT.to_string(),
            contact_number: NO_CONTACT_NUMBER.to_string(),
        }
    }
}

#[async_trait]
pub trait MaintenanceLookup: Send + Sync {
    /// First record whose issue contains `keyword`, case-insensitively.
    async fn find(&self, keyword: &str) -> Result<Option<MaintenanceRecord>, LookupError>;
}

/// Keyword used for a fault label: its first word, so "Dent #2" looks up "Dent".
pub fn issue_keyword(label: &str) -> &str {
    label.split_whitespace().next().unwrap_or_default()
}

/// Reads the `issue_contacts` table.
#[derive(Clone)]
pub struct PgMaintenanceLookup {
    pool: PgPool,
}

impl PgMaintenanceLookup {
    /// Builds a lazily connecting pool so a database outage only degrades
    /// chat enrichment instead of blocking startup.
    pub fn connect_lazy(database_url: &str) -> Result<Self, LookupError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;
        Ok(PgMaintenanceLookup { pool })
    }
}

#[async_trait]
impl MaintenanceLookup for PgMaintenanceLookup {
    async fn find(&self, keyword: &str) -> Result<Option<MaintenanceRecord>, LookupError> {
        let record = sqlx::query_as::<_, MaintenanceRecord>(
            r"
            SELECT solution, contact_name, contact_number
            FROM issue_contacts
            WHERE issue ILIKE $1
            LIMIT 1
            ",
        )
        .bind(format!("%{}%", keyword))
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_is_first_word_of_label() {
        assert_eq!(issue_keyword("Dent #2"), "Dent");
        assert_eq!(issue_keyword("  Crack #1"), "Crack");
        assert_eq!(issue_keyword(""), "");
    }

    #[test]
    fn placeholder_uses_fixed_text() {
        let record = MaintenanceRecord::placeholder();
        assert_eq!(record.solution, "No solution available.");
        assert_eq!(record.contact_name, "Unknown Contact");
        assert_eq!(record.contact_number, "No contact information.");
    }

    #[tokio::test]
    async fn lazy_pool_rejects_bad_urls_only() {
        assert!(PgMaintenanceLookup::connect_lazy("not a url").is_err());
        assert!(PgMaintenanceLookup::connect_lazy("postgres://user:pw@127.0.0.1:1/db").is_ok());
    }
}
