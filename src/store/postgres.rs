//! PostgreSQL account store.
//!
//! Layout (see `sql/schema.sql`):
//! - `accounts`: base identity row, `account_type` discriminator and the
//!   canonical `identity` value (unique across every account type).
//! - one extension table per account type, keyed by `account_id` with
//!   `ON DELETE CASCADE`, holding that type's fields as text columns.
//!
//! Table and column names come from descriptors, so they are checked against
//! a conservative identifier pattern and quoted before being spliced into SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::BTreeMap;
use tracing::{debug, info_span, Instrument, Span};

use super::AccountStore;
use crate::identity::{
    base::{Account, BaseIdentity},
    descriptor::{AccountTypeDescriptor, IdentityMatch, TypeKey, ID_FIELD},
    error::StoreError,
};

const BASE_COLUMNS: &str = "a.id, a.account_type, a.secret, a.last_login, \
     a.is_active, a.is_staff, a.is_superuser, a.created_at";
const ACCOUNTS_PKEY: &str = "accounts_pkey";
const EXT_PREFIX: &str = "ext_";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_span(operation: &'static str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn violated_constraint(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint().map(ToString::to_string),
        _ => None,
    }
}

/// Quote `name` as a SQL identifier after checking it is a plain lowercase name.
fn quote_ident(descriptor: &AccountTypeDescriptor, name: &str) -> Result<String, StoreError> {
    if Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").is_ok_and(|re| re.is_match(name)) {
        Ok(format!("\"{name}\""))
    } else {
        Err(StoreError::UnsupportedType(format!(
            "{}: '{name}' is not a valid column or table name",
            descriptor.key()
        )))
    }
}

/// Quoted extension table and `(field, quoted column)` pairs for a descriptor.
fn extension_layout(
    descriptor: &AccountTypeDescriptor,
) -> Result<(String, Vec<(String, String)>), StoreError> {
    let table = quote_ident(descriptor, descriptor.table())?;
    let columns = descriptor
        .extension_fields()
        .into_iter()
        .map(|field| Ok((field.to_string(), quote_ident(descriptor, field)?)))
        .collect::<Result<Vec<_>, StoreError>>()?;
    Ok((table, columns))
}

fn select_sql(table: &str, columns: &[(String, String)], predicate: &str) -> String {
    let mut select = BASE_COLUMNS.to_string();
    for (field, column) in columns {
        select.push_str(&format!(", e.{column} AS \"{EXT_PREFIX}{field}\""));
    }
    format!(
        "SELECT {select} FROM accounts a JOIN {table} e ON e.account_id = a.id \
         WHERE a.account_type = $1 AND {predicate} ORDER BY a.id"
    )
}

fn account_from_row(
    descriptor: &AccountTypeDescriptor,
    columns: &[(String, String)],
    row: &PgRow,
) -> Result<Account, StoreError> {
    let id: i64 = row.try_get("id")?;
    let secret: String = row.try_get("secret")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let mut base = BaseIdentity::restore(id, SecretString::from(secret), created_at);
    base.last_login = row.try_get("last_login")?;
    base.is_active = row.try_get("is_active")?;
    base.is_staff = row.try_get("is_staff")?;
    base.is_superuser = row.try_get("is_superuser")?;

    let mut fields = BTreeMap::new();
    for (field, _) in columns {
        let value: Option<String> = row.try_get(format!("{EXT_PREFIX}{field}").as_str())?;
        if let Some(value) = value {
            fields.insert(field.clone(), value);
        }
    }
    Ok(Account::from_parts(base, descriptor, fields))
}

/// Canonical identity stored in `accounts.identity`; `None` for surrogate types.
fn canonical_identity(descriptor: &AccountTypeDescriptor, account: &Account) -> Option<String> {
    if descriptor.identity_is_surrogate() {
        return None;
    }
    account
        .identity_value()
        .map(|value| descriptor.identity_match().canonical(&value))
}

fn integrity_error(
    err: sqlx::Error,
    descriptor: &AccountTypeDescriptor,
    account: &Account,
) -> StoreError {
    if !is_unique_violation(&err) {
        return StoreError::Database(err);
    }
    if violated_constraint(&err).as_deref() == Some(ACCOUNTS_PKEY) {
        return StoreError::Integrity {
            field: ID_FIELD.to_string(),
            value: account.id().map(|id| id.to_string()).unwrap_or_default(),
        };
    }
    StoreError::Integrity {
        field: descriptor.identity_field().to_string(),
        value: account.identity_value().unwrap_or_default(),
    }
}

#[async_trait]
impl AccountStore for PostgresStore {
    async fn find_by_identity(
        &self,
        descriptor: &AccountTypeDescriptor,
        value: &str,
    ) -> Result<Option<Account>, StoreError> {
        if descriptor.identity_is_surrogate() {
            return match value.trim().parse::<i64>() {
                Ok(id) => self.find_by_id(descriptor, id).await,
                Err(_) => Ok(None),
            };
        }
        self.find_by_field(
            descriptor,
            descriptor.identity_field(),
            value,
            descriptor.identity_match(),
        )
        .await
    }

    async fn find_by_field(
        &self,
        descriptor: &AccountTypeDescriptor,
        field: &str,
        value: &str,
        mode: IdentityMatch,
    ) -> Result<Option<Account>, StoreError> {
        let (table, columns) = extension_layout(descriptor)?;
        let column = quote_ident(descriptor, field)?;
        let predicate = match mode {
            IdentityMatch::Exact => format!("e.{column} = $2"),
            IdentityMatch::CaseInsensitive => format!("lower(e.{column}) = lower($2)"),
        };
        let query = format!("{} LIMIT 1", select_sql(&table, &columns, &predicate));
        let span = db_span("SELECT", &query);
        let row = sqlx::query(&query)
            .bind(descriptor.key().to_string())
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        row.map(|row| account_from_row(descriptor, &columns, &row))
            .transpose()
    }

    async fn find_by_id(
        &self,
        descriptor: &AccountTypeDescriptor,
        id: i64,
    ) -> Result<Option<Account>, StoreError> {
        let (table, columns) = extension_layout(descriptor)?;
        let query = select_sql(&table, &columns, "a.id = $2");
        let span = db_span("SELECT", &query);
        let row = sqlx::query(&query)
            .bind(descriptor.key().to_string())
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        row.map(|row| account_from_row(descriptor, &columns, &row))
            .transpose()
    }

    async fn account_type_of(&self, id: i64) -> Result<Option<TypeKey>, StoreError> {
        let query = "SELECT account_type FROM accounts WHERE id = $1";
        let span = db_span("SELECT", query);
        let account_type: Option<String> = sqlx::query_scalar(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        match account_type {
            None => Ok(None),
            Some(raw) => TypeKey::parse(&raw)
                .map(Some)
                .ok_or(StoreError::UnsupportedType(raw)),
        }
    }

    async fn insert(
        &self,
        descriptor: &AccountTypeDescriptor,
        mut account: Account,
    ) -> Result<Account, StoreError> {
        let (table, columns) = extension_layout(descriptor)?;
        let identity = canonical_identity(descriptor, &account);
        let mut tx = self.pool.begin().await?;

        let base_query = if account.id().is_some() {
            "INSERT INTO accounts (id, account_type, identity, secret, last_login, \
             is_active, is_staff, is_superuser, created_at) \
             VALUES ($9, $1, $2, $3, $4, $5, $6, $7, $8) RETURNING id"
        } else {
            "INSERT INTO accounts (account_type, identity, secret, last_login, \
             is_active, is_staff, is_superuser, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id"
        };
        let mut insert = sqlx::query_scalar::<_, i64>(base_query)
            .bind(descriptor.key().to_string())
            .bind(identity.as_deref())
            .bind(account.base.secret.expose_secret().to_string())
            .bind(account.base.last_login)
            .bind(account.base.is_active)
            .bind(account.base.is_staff)
            .bind(account.base.is_superuser)
            .bind(account.base.created_at());
        if let Some(id) = account.id() {
            insert = insert.bind(id);
        }
        let span = db_span("INSERT", base_query);
        let id = match insert.fetch_one(&mut *tx).instrument(span).await {
            Ok(id) => id,
            Err(err) => {
                let _ = tx.rollback().await;
                return Err(integrity_error(err, descriptor, &account));
            }
        };

        if account.id().is_some() {
            // Keep the serial ahead of explicitly chosen ids.
            let query = "SELECT setval(pg_get_serial_sequence('accounts', 'id'), \
                         GREATEST((SELECT MAX(id) FROM accounts), 1))";
            let span = db_span("SELECT", query);
            sqlx::query(query)
                .execute(&mut *tx)
                .instrument(span)
                .await?;
        }

        let mut names = String::from("account_id");
        let mut placeholders = String::from("$1");
        for (index, (_, column)) in columns.iter().enumerate() {
            names.push_str(&format!(", {column}"));
            placeholders.push_str(&format!(", ${}", index + 2));
        }
        let ext_query = format!("INSERT INTO {table} ({names}) VALUES ({placeholders})");
        let mut ext_insert = sqlx::query(&ext_query).bind(id);
        for (field, _) in &columns {
            ext_insert = ext_insert.bind(account.field(field).unwrap_or_default().to_string());
        }
        let span = db_span("INSERT", &ext_query);
        if let Err(err) = ext_insert.execute(&mut *tx).instrument(span).await {
            let _ = tx.rollback().await;
            return Err(integrity_error(err, descriptor, &account));
        }

        tx.commit().await?;

        account.base.id = Some(id);
        account.account_type = descriptor.key().clone();
        debug!(id, account_type = %descriptor.key(), "stored account");
        Ok(account)
    }

    async fn update(
        &self,
        descriptor: &AccountTypeDescriptor,
        account: &Account,
    ) -> Result<(), StoreError> {
        let id = account.id().ok_or(StoreError::NotFound(0))?;
        let (table, columns) = extension_layout(descriptor)?;
        let mut tx = self.pool.begin().await?;

        let base_query = "UPDATE accounts SET identity = $2, secret = $3, last_login = $4, \
                          is_active = $5, is_staff = $6, is_superuser = $7 \
                          WHERE id = $1 AND account_type = $8";
        let span = db_span("UPDATE", base_query);
        let updated = sqlx::query(base_query)
            .bind(id)
            .bind(canonical_identity(descriptor, account))
            .bind(account.base.secret.expose_secret().to_string())
            .bind(account.base.last_login)
            .bind(account.base.is_active)
            .bind(account.base.is_staff)
            .bind(account.base.is_superuser)
            .bind(descriptor.key().to_string())
            .execute(&mut *tx)
            .instrument(span)
            .await;
        match updated {
            Ok(result) if result.rows_affected() == 0 => {
                let _ = tx.rollback().await;
                return Err(StoreError::NotFound(id));
            }
            Ok(_) => {}
            Err(err) => {
                let _ = tx.rollback().await;
                return Err(integrity_error(err, descriptor, account));
            }
        }

        if !columns.is_empty() {
            let assignments = columns
                .iter()
                .enumerate()
                .map(|(index, (_, column))| format!("{column} = ${}", index + 2))
                .collect::<Vec<_>>()
                .join(", ");
            let ext_query = format!("UPDATE {table} SET {assignments} WHERE account_id = $1");
            let mut ext_update = sqlx::query(&ext_query).bind(id);
            for (field, _) in &columns {
                ext_update = ext_update.bind(account.field(field).unwrap_or_default().to_string());
            }
            let span = db_span("UPDATE", &ext_query);
            if let Err(err) = ext_update.execute(&mut *tx).instrument(span).await {
                let _ = tx.rollback().await;
                return Err(integrity_error(err, descriptor, account));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let query = "DELETE FROM accounts WHERE id = $1";
        let span = db_span("DELETE", query);
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn next_id(&self) -> Result<i64, StoreError> {
        let query = "SELECT COALESCE(MAX(id), 0) + 1 FROM accounts";
        let span = db_span("SELECT", query);
        let next: i64 = sqlx::query_scalar(query)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;
        Ok(next)
    }

    async fn list(&self, descriptor: &AccountTypeDescriptor) -> Result<Vec<Account>, StoreError> {
        let (table, columns) = extension_layout(descriptor)?;
        let query = select_sql(&table, &columns, "TRUE");
        let span = db_span("SELECT", &query);
        let rows = sqlx::query(&query)
            .bind(descriptor.key().to_string())
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;
        rows.iter()
            .map(|row| account_from_row(descriptor, &columns, row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt};

    fn email_type() -> AccountTypeDescriptor {
        AccountTypeDescriptor::new(
            TypeKey::new("polyauth_email", "EmailUser"),
            "e::EmailUser",
            "email",
        )
        .with_required_fields(&["first_name", "last_name"])
        .with_identity_match(IdentityMatch::CaseInsensitive)
    }

    #[test]
    fn layout_quotes_identifiers() {
        let (table, columns) = extension_layout(&email_type()).expect("layout");
        assert_eq!(table, "\"polyauth_email_emailuser\"");
        let quoted: Vec<&str> = columns.iter().map(|(_, c)| c.as_str()).collect();
        assert_eq!(quoted, vec!["\"email\"", "\"first_name\"", "\"last_name\""]);
    }

    #[test]
    fn layout_rejects_unsafe_names() {
        let bad = email_type().with_table("users; DROP TABLE accounts");
        assert!(matches!(
            extension_layout(&bad),
            Err(StoreError::UnsupportedType(_))
        ));
        let bad_field = AccountTypeDescriptor::new(TypeKey::new("x", "Y"), "x::Y", "Email");
        assert!(extension_layout(&bad_field).is_err());
    }

    #[test]
    fn select_aliases_extension_columns() {
        let (table, columns) = extension_layout(&email_type()).expect("layout");
        let sql = select_sql(&table, &columns, "a.id = $2");
        assert!(sql.contains("e.\"email\" AS \"ext_email\""));
        assert!(sql.contains("JOIN \"polyauth_email_emailuser\" e ON e.account_id = a.id"));
        assert!(sql.contains("WHERE a.account_type = $1 AND a.id = $2"));
    }

    #[test]
    fn canonical_identity_lowercases_case_insensitive_types() {
        let d = email_type();
        let mut account = Account::new(&d);
        account
            .fields
            .insert("email".to_string(), "Jane@Example.com".to_string());
        assert_eq!(
            canonical_identity(&d, &account).as_deref(),
            Some("jane@example.com")
        );

        let surrogate =
            AccountTypeDescriptor::new(TypeKey::new("polyauth", "User"), "p::User", ID_FIELD);
        let account = Account::new(&surrogate);
        assert!(canonical_identity(&surrogate, &account).is_none());
    }

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
        constraint: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    fn db_error(code: &'static str, constraint: Option<&'static str>) -> sqlx::Error {
        sqlx::Error::Database(Box::new(TestDbError {
            code: Some(code),
            constraint,
        }))
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        assert!(is_unique_violation(&db_error("23505", None)));
        assert!(!is_unique_violation(&db_error("99999", None)));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn unique_violation_maps_to_integrity() {
        let d = email_type();
        let mut account = Account::new(&d);
        account
            .fields
            .insert("email".to_string(), "a@x.com".to_string());

        let violation = db_error("23505", Some("accounts_identity_key"));
        let err = integrity_error(violation, &d, &account);
        assert_eq!(
            err.to_string(),
            "integrity error: email 'a@x.com' matches existing users"
        );

        account.base.id = Some(3);
        let err = integrity_error(db_error("23505", Some(ACCOUNTS_PKEY)), &d, &account);
        assert!(matches!(err, StoreError::Integrity { ref field, .. } if field == "id"));

        let err = integrity_error(sqlx::Error::RowNotFound, &d, &account);
        assert!(matches!(err, StoreError::Database(_)));
    }
}
