//! PostgreSQL data store over a unified JSON row model.
//!
//! Schema:
//! ```sql
//! CREATE TABLE public.records (
//!     id uuid PRIMARY KEY,
//!     relation TEXT NOT NULL,
//!     org uuid NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     data JSONB NOT NULL,
//!     fields JSONB NOT NULL
//! );
//!
//! -- relation is always bound; org on every scoped query; id DESC for the tie-break
//! CREATE INDEX idx_records_relation_org ON records(relation, org, id DESC);
//! CREATE INDEX idx_records_relation_org_created ON records(relation, org, created_at DESC);
//! -- GIN index for fields filter operations
//! CREATE INDEX idx_records_fields ON public.records USING GIN (fields jsonb_path_ops);
//! ```
//!
//! Column and relation names in generated SQL come from static descriptors,
//! never from caller input; only values are bound.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    PgPool, Postgres, Row,
    postgres::{PgArguments, PgRow},
    query::Query as PgQuery,
};
use uuid::Uuid;

use crate::descriptor::ColumnRef;
use crate::error::Error;
use crate::plan::{Predicate, QueryPlan, SortKey};
use crate::store::{DataStore, Page, RangeKind, Record};
use crate::value::FieldValue;

pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init_schema(&self) -> Result<(), Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| Error::Store(err.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS public.records (
                id uuid PRIMARY KEY,
                relation TEXT NOT NULL,
                org uuid NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                data JSONB NOT NULL,
                fields JSONB NOT NULL
            );
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_records_relation_org
                ON records(relation, org, id DESC)
                INCLUDE (created_at);
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_records_relation_org_created
                ON records(relation, org, created_at DESC)
                INCLUDE (id);
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_records_fields
                ON public.records USING GIN (fields jsonb_path_ops);
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS public.sequences (
                org uuid NOT NULL,
                name TEXT NOT NULL,
                value BIGINT NOT NULL,
                PRIMARY KEY (org, name)
            );
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        tx.commit().await.map_err(|e| Error::Store(e.to_string()))
    }

    fn map_row_to_record(row: PgRow) -> Result<Record, Error> {
        let de = |e: sqlx::Error| Error::Deserialize(e.to_string());
        let fields: serde_json::Value = row.try_get("fields").map_err(de)?;
        Ok(Record {
            id: row.try_get::<Uuid, _>("id").map_err(de)?,
            relation: row.try_get::<String, _>("relation").map_err(de)?,
            org: row.try_get::<Uuid, _>("org").map_err(de)?,
            created_at: row.try_get("created_at").map_err(de)?,
            data: row.try_get("data").map_err(de)?,
            fields: serde_json::from_value(fields).map_err(|e| Error::Deserialize(e.to_string()))?,
        })
    }

    /// Expression for a column in WHERE position. `id` and `created_at` are
    /// native columns; everything else is extracted from `fields` with a cast.
    fn where_expr(column: &str, cast: &str) -> String {
        match column {
            "id" => "r.id".to_string(),
            "created_at" => "r.created_at".to_string(),
            _ => format!("(r.fields->>'{}')::{}", column, cast),
        }
    }

    /// Expression for a column in ORDER BY position. JSON extraction without
    /// a cast (`->`, not `->>`) keeps jsonb type-aware ordering: numbers sort
    /// numerically, strings lexically.
    fn order_expr(alias: &str, column: &str) -> String {
        match column {
            "id" => format!("{}.id", alias),
            "created_at" => format!("{}.created_at", alias),
            _ => format!("{}.fields->'{}'", alias, column),
        }
    }

    /// WHERE clause for a plan. `$1` = relation, `$2` = org, `$3+` = predicate
    /// values in plan order.
    fn build_where_clause(predicates: &[Predicate]) -> String {
        let mut conditions = vec!["r.relation = $1".to_string(), "r.org = $2".to_string()];
        let mut param_idx = 3;

        for predicate in predicates {
            match predicate {
                Predicate::TextLike { columns, .. } => {
                    let terms: Vec<String> = columns
                        .iter()
                        .enumerate()
                        .map(|(i, col)| {
                            format!("(r.fields->>'{}') ILIKE ${}", col, param_idx + i)
                        })
                        .collect();
                    param_idx += columns.len();
                    conditions.push(if terms.len() == 1 {
                        terms.into_iter().next().unwrap_or_default()
                    } else {
                        format!("({})", terms.join(" OR "))
                    });
                }
                Predicate::AnyOf { column, .. } => {
                    conditions.push(format!("(r.fields->>'{}') = ANY(${})", column, param_idx));
                    param_idx += 1;
                }
                Predicate::NumberEq { column, .. } => {
                    conditions.push(format!(
                        "{} = ${}",
                        Self::where_expr(column, "double precision"),
                        param_idx
                    ));
                    param_idx += 1;
                }
                Predicate::NumberBetween { column, .. } => {
                    conditions.push(format!(
                        "{} BETWEEN ${} AND ${}",
                        Self::where_expr(column, "double precision"),
                        param_idx,
                        param_idx + 1
                    ));
                    param_idx += 2;
                }
                Predicate::DateEq { column, .. } => {
                    conditions.push(format!(
                        "{} = ${}",
                        Self::where_expr(column, "timestamptz"),
                        param_idx
                    ));
                    param_idx += 1;
                }
                Predicate::DateBetween { column, .. } => {
                    conditions.push(format!(
                        "{} BETWEEN ${} AND ${}",
                        Self::where_expr(column, "timestamptz"),
                        param_idx,
                        param_idx + 1
                    ));
                    param_idx += 2;
                }
            }
        }

        format!("WHERE {}", conditions.join(" AND "))
    }

    /// LEFT JOIN clauses for sort keys that order by a joined relation's
    /// column, plus the ORDER BY terms referencing them. Missing values sort
    /// first ascending and last descending.
    fn build_join_and_order_clauses(order: &[SortKey]) -> (String, String) {
        let mut joins = Vec::new();
        let mut terms = Vec::new();

        for key in order {
            let expr = match key.column {
                ColumnRef::Base(column) => Self::order_expr("r", column),
                ColumnRef::Joined {
                    relation,
                    fk,
                    column,
                } => {
                    let alias = format!("j{}", joins.len());
                    joins.push(format!(
                        "LEFT JOIN records {alias} ON {alias}.id = (r.fields->>'{fk}')::uuid AND {alias}.relation = '{relation}'",
                    ));
                    Self::order_expr(&alias, column)
                }
            };
            let direction = if key.ascending {
                "ASC NULLS FIRST"
            } else {
                "DESC NULLS LAST"
            };
            terms.push(format!("{} {}", expr, direction));
        }

        let order_clause = if terms.is_empty() {
            String::new()
        } else {
            format!("ORDER BY {}", terms.join(", "))
        };
        (joins.join("\n            "), order_clause)
    }

    /// Binds predicate values in the same order `build_where_clause` numbered
    /// them.
    fn bind_predicates<'a>(
        mut query: PgQuery<'a, Postgres, PgArguments>,
        predicates: &'a [Predicate],
    ) -> PgQuery<'a, Postgres, PgArguments> {
        for predicate in predicates {
            match predicate {
                Predicate::TextLike { columns, needle } => {
                    for _ in columns.iter() {
                        query = query.bind(format!("%{}%", needle));
                    }
                }
                Predicate::AnyOf { values, .. } => {
                    query = query.bind(values);
                }
                Predicate::NumberEq { value, .. } => {
                    query = query.bind(value);
                }
                Predicate::NumberBetween { min, max, .. } => {
                    query = query.bind(min).bind(max);
                }
                Predicate::DateEq { value, .. } => {
                    query = query.bind(value);
                }
                Predicate::DateBetween { min, max, .. } => {
                    query = query.bind(min).bind(max);
                }
            }
        }
        query
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn select(&self, plan: &QueryPlan) -> Result<Page<Record>, Error> {
        let where_clause = Self::build_where_clause(&plan.predicates);
        let (join_clause, order_clause) = Self::build_join_and_order_clauses(&plan.order);

        let sql = format!(
            r#"
            SELECT r.id, r.relation, r.org, r.created_at, r.data, r.fields
            FROM records r
            {}
            {}
            {}
            LIMIT {} OFFSET {}
            "#,
            join_clause, where_clause, order_clause, plan.limit, plan.offset
        );

        let mut query = sqlx::query(&sql).bind(plan.relation).bind(plan.org);
        query = Self::bind_predicates(query, &plan.predicates);
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|err| Error::Store(err.to_string()))?;
        let rows = rows
            .into_iter()
            .map(Self::map_row_to_record)
            .collect::<Result<Vec<Record>, Error>>()?;

        // The join never multiplies rows (it targets a primary key), so the
        // count can skip it.
        let count_sql = format!("SELECT COUNT(*) FROM records r {}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(plan.relation)
            .bind(plan.org);
        for predicate in &plan.predicates {
            count_query = match predicate {
                Predicate::TextLike { columns, needle } => {
                    let mut q = count_query;
                    for _ in columns.iter() {
                        q = q.bind(format!("%{}%", needle));
                    }
                    q
                }
                Predicate::AnyOf { values, .. } => count_query.bind(values),
                Predicate::NumberEq { value, .. } => count_query.bind(value),
                Predicate::NumberBetween { min, max, .. } => count_query.bind(min).bind(max),
                Predicate::DateEq { value, .. } => count_query.bind(value),
                Predicate::DateBetween { min, max, .. } => count_query.bind(min).bind(max),
            };
        }
        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|err| Error::Store(err.to_string()))?;

        Ok(Page {
            rows,
            total: total as u64,
        })
    }

    async fn fetch(
        &self,
        relation: &'static str,
        org: Uuid,
        id: Uuid,
    ) -> Result<Option<Record>, Error> {
        let row = sqlx::query(
            r#"
            SELECT r.id, r.relation, r.org, r.created_at, r.data, r.fields
            FROM records r
            WHERE r.id = $1 AND r.org = $2 AND r.relation = $3
            "#,
        )
        .bind(id)
        .bind(org)
        .bind(relation)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::Store(err.to_string()))?;

        match row {
            Some(r) => Self::map_row_to_record(r).map(Some),
            None => Ok(None),
        }
    }

    async fn first(
        &self,
        relation: &'static str,
        org: Uuid,
        column: &str,
        kind: RangeKind,
        ascending: bool,
    ) -> Result<Option<FieldValue>, Error> {
        let cast = match kind {
            RangeKind::Number => "double precision",
            RangeKind::Date => "timestamptz",
        };
        let expr = Self::where_expr(column, cast);
        let direction = if ascending { "ASC" } else { "DESC" };
        let sql = format!(
            r#"
            SELECT {expr} FROM records r
            WHERE r.relation = $1 AND r.org = $2 AND {expr} IS NOT NULL
            ORDER BY {expr} {direction}
            LIMIT 1
            "#,
        );

        match kind {
            RangeKind::Number => {
                let value = sqlx::query_scalar::<_, f64>(&sql)
                    .bind(relation)
                    .bind(org)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|err| Error::Store(err.to_string()))?;
                Ok(value.map(FieldValue::Float))
            }
            RangeKind::Date => {
                let value = sqlx::query_scalar::<_, DateTime<Utc>>(&sql)
                    .bind(relation)
                    .bind(org)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|err| Error::Store(err.to_string()))?;
                Ok(value.map(FieldValue::Timestamp))
            }
        }
    }

    async fn distinct(
        &self,
        relation: &'static str,
        org: Uuid,
        column: &str,
    ) -> Result<Vec<String>, Error> {
        let sql = format!(
            r#"
            SELECT DISTINCT r.fields->>'{column}' AS value
            FROM records r
            WHERE r.relation = $1 AND r.org = $2
                AND r.fields->>'{column}' IS NOT NULL
                AND r.fields->>'{column}' <> ''
            ORDER BY value
            "#,
        );
        sqlx::query_scalar::<_, String>(&sql)
            .bind(relation)
            .bind(org)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| Error::Store(err.to_string()))
    }

    async fn insert(&self, record: Record) -> Result<Record, Error> {
        let fields =
            serde_json::to_value(&record.fields).expect("Failed to serialize field index");
        sqlx::query(
            r#"
            INSERT INTO public.records (id, relation, org, created_at, data, fields)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.relation)
        .bind(record.org)
        .bind(record.created_at)
        .bind(&record.data)
        .bind(fields)
        .execute(&self.pool)
        .await
        .map_err(|err| Error::Store(err.to_string()))?;
        Ok(record)
    }

    async fn update(&self, record: Record) -> Result<Record, Error> {
        let fields =
            serde_json::to_value(&record.fields).expect("Failed to serialize field index");
        let row = sqlx::query(
            r#"
            UPDATE records
            SET data = $4, fields = $5
            WHERE id = $1 AND org = $2 AND relation = $3
            RETURNING id, relation, org, created_at, data, fields
            "#,
        )
        .bind(record.id)
        .bind(record.org)
        .bind(&record.relation)
        .bind(&record.data)
        .bind(fields)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Error::Store(err.to_string()))?;

        match row {
            Some(r) => Self::map_row_to_record(r),
            None => Err(Error::NotFound),
        }
    }

    async fn update_field_many(
        &self,
        relation: &'static str,
        org: Uuid,
        ids: &[Uuid],
        column: &str,
        value: FieldValue,
    ) -> Result<Vec<Record>, Error> {
        let sql = format!(
            r#"
            UPDATE records
            SET fields = jsonb_set(fields, '{{{column}}}', $4),
                data = jsonb_set(data, '{{{column}}}', $4)
            WHERE relation = $1 AND org = $2 AND id = ANY($3)
            RETURNING id, relation, org, created_at, data, fields
            "#,
        );
        let rows = sqlx::query(&sql)
            .bind(relation)
            .bind(org)
            .bind(ids)
            .bind(value.to_json())
            .fetch_all(&self.pool)
            .await
            .map_err(|err| Error::Store(err.to_string()))?;

        rows.into_iter().map(Self::map_row_to_record).collect()
    }

    async fn delete_many(
        &self,
        relation: &'static str,
        org: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Record>, Error> {
        let rows = sqlx::query(
            r#"
            DELETE FROM records
            WHERE relation = $1 AND org = $2 AND id = ANY($3)
            RETURNING id, relation, org, created_at, data, fields
            "#,
        )
        .bind(relation)
        .bind(org)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| Error::Store(err.to_string()))?;

        rows.into_iter().map(Self::map_row_to_record).collect()
    }

    async fn next_sequence(&self, org: Uuid, key: &str) -> Result<u64, Error> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequences (org, name, value) VALUES ($1, $2, 1)
            ON CONFLICT (org, name) DO UPDATE SET value = sequences.value + 1
            RETURNING value
            "#,
        )
        .bind(org)
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| Error::Store(err.to_string()))?;
        Ok(value as u64)
    }
}
