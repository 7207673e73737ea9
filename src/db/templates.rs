//! Email and messaging templates.

use crate::error::DatabaseError;
use crate::types::{Channel, MessageTemplate, TemplateId};
use crate::{Error, Result};

use super::{Database, TemplateRow};

impl Database {
    /// Insert a template, keeping its id
    pub async fn insert_template(&self, template: &MessageTemplate) -> Result<TemplateId> {
        let now = chrono::Utc::now().timestamp();
        let variables = serde_json::to_string(&template.variables)?;

        sqlx::query(
            r#"
            INSERT INTO templates (
                id, channel, name, subject, body, html_body, variables, owner, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(template.id)
        .bind(template.channel.as_str())
        .bind(&template.name)
        .bind(&template.subject)
        .bind(&template.body)
        .bind(&template.html_body)
        .bind(variables)
        .bind(&template.owner)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert template: {}",
                e
            )))
        })?;

        Ok(template.id)
    }

    /// Get a template by id, only if it was written for `channel`
    pub async fn get_template(&self, id: TemplateId, channel: Channel) -> Result<Option<MessageTemplate>> {
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"
            SELECT id, channel, name, subject, body, html_body, variables, owner
            FROM templates
            WHERE id = ? AND channel = ?
            "#,
        )
        .bind(id)
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get template: {}",
                e
            )))
        })?;

        Ok(row.map(MessageTemplate::try_from).transpose()?)
    }
}
