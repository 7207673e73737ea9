//! Vendor inserts, filtering and id lookups.

use crate::error::DatabaseError;
use crate::types::{FilterCriterion, FilterKey, Vendor, VendorId};
use crate::{Error, Result};
use sqlx::{QueryBuilder, Sqlite};

use super::{Database, VendorRow};

const VENDOR_COLUMNS: &str = "SELECT id, name, code, company_name, contact_person, email, phone, whatsapp, industry, region, size_class FROM vendors";

impl Database {
    /// Insert a vendor, keeping its id
    pub async fn insert_vendor(&self, vendor: &Vendor) -> Result<VendorId> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO vendors (
                id, name, code, company_name, contact_person, email, phone,
                whatsapp, industry, region, size_class, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(vendor.id)
        .bind(&vendor.name)
        .bind(&vendor.code)
        .bind(&vendor.company_name)
        .bind(&vendor.contact_person)
        .bind(&vendor.email)
        .bind(&vendor.phone)
        .bind(&vendor.whatsapp)
        .bind(&vendor.industry)
        .bind(&vendor.region)
        .bind(&vendor.size_class)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => Error::Database(
                DatabaseError::ConstraintViolation(format!("vendor code '{}' already exists", vendor.code)),
            ),
            e => Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert vendor: {}",
                e
            ))),
        })?;

        Ok(vendor.id)
    }

    /// List vendors matching every criterion, ordered by name
    ///
    /// Industry and region match case-insensitively on a substring;
    /// size class matches exactly. No criteria lists every vendor.
    pub async fn list_vendors(&self, criteria: &[FilterCriterion]) -> Result<Vec<Vendor>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(VENDOR_COLUMNS);

        for (i, criterion) in criteria.iter().enumerate() {
            query.push(if i == 0 { " WHERE " } else { " AND " });
            match criterion.key {
                FilterKey::Industry => {
                    query.push("LOWER(industry) LIKE '%' || LOWER(");
                    query.push_bind(criterion.value.clone());
                    query.push(") || '%'");
                }
                FilterKey::Region => {
                    query.push("LOWER(region) LIKE '%' || LOWER(");
                    query.push_bind(criterion.value.clone());
                    query.push(") || '%'");
                }
                FilterKey::SizeClass => {
                    query.push("size_class = ");
                    query.push_bind(criterion.value.clone());
                }
            }
        }
        query.push(" ORDER BY name, code");

        let rows = query
            .build_query_as::<VendorRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to list vendors: {}",
                    e
                )))
            })?;

        Ok(rows.into_iter().map(Vendor::from).collect())
    }

    /// Fetch vendors by id; unknown ids are skipped
    pub async fn get_vendors_by_ids(&self, ids: &[VendorId]) -> Result<Vec<Vendor>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Stay well within SQLite's bind variable limit
        const MAX_IDS_PER_QUERY: usize = 500;

        let mut vendors = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(VENDOR_COLUMNS);
            query.push(" WHERE id IN (");
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            let rows = query
                .build_query_as::<VendorRow>()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to get vendors by id: {}",
                        e
                    )))
                })?;
            vendors.extend(rows.into_iter().map(Vendor::from));
        }

        vendors.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code)));
        Ok(vendors)
    }
}
