use crate::model::{CandidateOffer, StorageError, StoredOffer};
use crate::utils::parse_date;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use std::collections::BTreeSet;

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the store, creating the schema and running column migrations.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        Self::with_connection(Connection::open(db_path)?)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS web_offers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bank_name TEXT NOT NULL DEFAULT '',
                category_name TEXT NOT NULL DEFAULT '',
                merchant_name TEXT NOT NULL DEFAULT '',
                merchant_address TEXT NOT NULL DEFAULT '',
                merchant_location TEXT NOT NULL DEFAULT '',
                valid_from TEXT,
                valid_to TEXT,
                offer_day TEXT NOT NULL DEFAULT '',
                payment_methods TEXT NOT NULL DEFAULT '',
                card_brand TEXT NOT NULL DEFAULT '',
                benefit TEXT NOT NULL DEFAULT '',
                terms_raw TEXT NOT NULL DEFAULT '',
                terms_conditions TEXT NOT NULL DEFAULT '',
                source_file TEXT NOT NULL DEFAULT '',
                offer_url TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_web_offers_bank
                ON web_offers(bank_name);
            ",
        )?;

        // Column auto-migrations for databases created by earlier versions.
        Self::migrate_add_column_if_missing(
            &conn,
            "web_offers",
            "merchant_logo_url",
            "TEXT NOT NULL DEFAULT ''",
        )?;
        Self::migrate_add_column_if_missing(
            &conn,
            "web_offers",
            "status",
            "TEXT NOT NULL DEFAULT 'active'",
        )?;

        Ok(Self { conn })
    }

    /// Checks for the column via PRAGMA and adds it when absent.
    fn migrate_add_column_if_missing(
        conn: &Connection,
        table: &str,
        column: &str,
        column_def: &str,
    ) -> Result<(), StorageError> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let existing_columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;

        if !existing_columns.iter().any(|c| c == column) {
            let alter_sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def);
            conn.execute(&alter_sql, [])?;
        }

        Ok(())
    }

    /// All offers of one bank, ordered by creation so the matcher's tie-break
    /// (earliest wins) is deterministic.
    pub fn offers_for_bank(&self, bank_name: &str) -> Result<Vec<StoredOffer>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, bank_name, category_name, merchant_name, merchant_address,
                    merchant_location, valid_from, valid_to, offer_day, payment_methods,
                    card_brand, benefit, terms_raw, terms_conditions, source_file,
                    offer_url, merchant_logo_url, status, created_at, updated_at
             FROM web_offers WHERE bank_name = ?1
             ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![bank_name], Self::map_offer)?;
        let mut offers = Vec::new();
        for offer in rows {
            offers.push(offer?);
        }
        Ok(offers)
    }

    /// Inserts a full row for the candidate in one transaction and returns
    /// the new id.
    pub fn insert_offer(
        &mut self,
        candidate: &CandidateOffer,
        now: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO web_offers (
                bank_name, category_name, merchant_name, merchant_address,
                merchant_location, valid_from, valid_to, offer_day, payment_methods,
                card_brand, benefit, terms_raw, terms_conditions, source_file,
                offer_url, merchant_logo_url, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                      ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                &candidate.bank_name,
                &candidate.category_name,
                &candidate.merchant_name,
                &candidate.merchant_address,
                &candidate.merchant_location,
                candidate.valid_from.map(|d| d.to_string()),
                candidate.valid_to.map(|d| d.to_string()),
                join_set(&candidate.offer_day, ", "),
                &candidate.payment_methods,
                join_set(&candidate.card_brands, ", "),
                join_set(&candidate.benefits, "; "),
                &candidate.terms_raw,
                &candidate.terms_conditions,
                &candidate.source_file,
                &candidate.offer_url,
                &candidate.logo_url,
                "active",
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Writes the mutable subset of an offer in one transaction. Everything
    /// else (merchant identity, provenance, created_at) is immutable once
    /// inserted.
    pub fn update_offer(&mut self, offer: &StoredOffer) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE web_offers SET
                benefit = ?1, payment_methods = ?2, card_brand = ?3,
                terms_conditions = ?4, offer_day = ?5, valid_to = ?6,
                category_name = ?7, status = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                join_set(&offer.benefits, "; "),
                &offer.payment_methods,
                join_set(&offer.card_brands, ", "),
                &offer.terms_conditions,
                join_set(&offer.offer_day, ", "),
                offer.valid_to.map(|d| d.to_string()),
                &offer.category_name,
                &offer.status,
                offer.updated_at.to_rfc3339(),
                offer.id,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn count_offers(&self) -> Result<i64, StorageError> {
        let count =
            self.conn
                .query_row("SELECT COUNT(*) FROM web_offers", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_offer(row: &Row) -> Result<StoredOffer, rusqlite::Error> {
        let valid_from: Option<String> = row.get(6)?;
        let valid_to: Option<String> = row.get(7)?;
        let offer_day: String = row.get(8)?;
        let card_brand: String = row.get(10)?;
        let benefit: String = row.get(11)?;
        let created_at_str: String = row.get(18)?;
        let updated_at_str: String = row.get(19)?;

        let created_at = created_at_str.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(18, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let updated_at = updated_at_str.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(19, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(StoredOffer {
            id: row.get(0)?,
            bank_name: row.get(1)?,
            category_name: row.get(2)?,
            merchant_name: row.get(3)?,
            merchant_address: row.get(4)?,
            merchant_location: row.get(5)?,
            valid_from: valid_from.as_deref().and_then(parse_date),
            valid_to: valid_to.as_deref().and_then(parse_date),
            offer_day: split_set(&offer_day, ','),
            payment_methods: row.get(9)?,
            card_brands: split_set(&card_brand, ','),
            benefits: split_set(&benefit, ';'),
            terms_raw: row.get(12)?,
            terms_conditions: row.get(13)?,
            source_file: row.get(14)?,
            offer_url: row.get(15)?,
            logo_url: row.get(16)?,
            status: row.get(17)?,
            created_at,
            updated_at,
        })
    }
}

fn join_set(set: &BTreeSet<String>, sep: &str) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(sep)
}

fn split_set(raw: &str, sep: char) -> BTreeSet<String> {
    raw.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
