//! [`SqliteStore`], the SQLite implementation of the rule, alert and
//! quality-zeroing stores.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use qalert_core::{
  alert::{Assignment, QualityAlert, StatisticsBucket, StatusChange},
  rule::AlertRule,
  store::{AlertQuery, AlertStore, RuleStore, ZeroingSource},
  zeroing::QualityZeroingRecord,
};

use crate::{
  Error, Result,
  encode::{
    AlertRow, RawBucket, RuleRow, ZeroingRow, decode_doc, decode_doc_in_call,
    encode_dt,
  },
  schema::SCHEMA,
};

/// Shared filter clause for alert listing; `?1`..`?8` are the optional
/// criteria of [`AlertQuery`], each ignored when NULL.
const ALERT_FILTER: &str = "
  WHERE (?1 IS NULL OR level = ?1)
    AND (?2 IS NULL OR current_status = ?2)
    AND (?3 IS NULL OR category = ?3)
    AND (?4 IS NULL OR EXISTS (
          SELECT 1 FROM json_each(doc, '$.relatedObjects.suppliers')
          WHERE value = ?4))
    AND (?5 IS NULL OR EXISTS (
          SELECT 1 FROM json_each(doc, '$.relatedObjects.components')
          WHERE value = ?5))
    AND (?6 IS NULL
          OR instr(lower(title), lower(?6)) > 0
          OR instr(lower(coalesce(description, '')), lower(?6)) > 0
          OR instr(lower(coalesce(issue_summary, '')), lower(?6)) > 0)
    AND (?7 IS NULL OR created_at >= ?7)
    AND (?8 IS NULL OR created_at <= ?8)";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A quality alert store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or overwrite a quality-zeroing record, keyed by `zeroing_id`.
  pub async fn upsert_zeroing(&self, record: &QualityZeroingRecord) -> Result<()> {
    let row = ZeroingRow::encode(record)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO quality_zeroing (zeroing_id, updated_at, doc)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(zeroing_id) DO UPDATE
             SET updated_at = excluded.updated_at, doc = excluded.doc",
          rusqlite::params![row.zeroing_id, row.updated_at, row.doc],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read-modify-write one alert document inside a transaction.
  async fn modify_alert<F>(
    &self,
    alert_id: String,
    mutate: F,
  ) -> Result<Option<QualityAlert>>
  where
    F: FnOnce(&mut QualityAlert) + Send + 'static,
  {
    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let doc: Option<String> = tx
          .query_row(
            "SELECT doc FROM quality_alerts WHERE alert_id = ?1",
            rusqlite::params![alert_id],
            |r| r.get(0),
          )
          .optional()?;
        let Some(doc) = doc else {
          return Ok(None);
        };

        let mut alert: QualityAlert = decode_doc_in_call(&doc)?;
        mutate(&mut alert);
        let row = AlertRow::encode(&alert)
          .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;

        tx.execute(
          "UPDATE quality_alerts
              SET current_status = ?2, updated_at = ?3, doc = ?4
            WHERE alert_id = ?1",
          rusqlite::params![row.alert_id, row.current_status, row.updated_at, row.doc],
        )?;
        tx.commit()?;
        Ok(Some(alert))
      })
      .await?;
    Ok(updated)
  }
}

fn insert_alert_row(
  conn: &rusqlite::Connection,
  row: &AlertRow,
) -> rusqlite::Result<usize> {
  conn.execute(
    "INSERT OR IGNORE INTO quality_alerts (
       alert_id, rule_id, source_issue_id, level, category, current_status,
       title, description, issue_summary, created_at, updated_at, doc
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    rusqlite::params![
      row.alert_id,
      row.rule_id,
      row.source_issue_id,
      row.level,
      row.category,
      row.current_status,
      row.title,
      row.description,
      row.issue_summary,
      row.created_at,
      row.updated_at,
      row.doc,
    ],
  )
}

fn collect_docs(
  stmt: &mut rusqlite::Statement<'_>,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<String>> {
  stmt
    .query_map(params, |r| r.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()
}

// ─── RuleStore impl ──────────────────────────────────────────────────────────

impl RuleStore for SqliteStore {
  type Error = Error;

  async fn insert_rule(&self, rule: AlertRule) -> Result<Option<AlertRule>> {
    let row = RuleRow::encode(&rule)?;

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT OR IGNORE INTO alert_rules (rule_id, enabled, priority, created_at, doc)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![row.rule_id, row.enabled, row.priority, row.created_at, row.doc],
        )?;
        Ok(n > 0)
      })
      .await?;

    Ok(inserted.then_some(rule))
  }

  async fn get_rule<'a>(&'a self, rule_id: &'a str) -> Result<Option<AlertRule>> {
    let id = rule_id.to_owned();

    let doc: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT doc FROM alert_rules WHERE rule_id = ?1",
              rusqlite::params![id],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    doc.as_deref().map(decode_doc).transpose()
  }

  async fn replace_rule(&self, rule: AlertRule) -> Result<Option<AlertRule>> {
    let row = RuleRow::encode(&rule)?;

    let changed = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "UPDATE alert_rules SET enabled = ?2, priority = ?3, doc = ?4
            WHERE rule_id = ?1",
          rusqlite::params![row.rule_id, row.enabled, row.priority, row.doc],
        )?;
        Ok(n > 0)
      })
      .await?;

    Ok(changed.then_some(rule))
  }

  async fn list_rules(&self, enabled_only: bool) -> Result<Vec<AlertRule>> {
    let docs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT doc FROM alert_rules
            WHERE (?1 = 0 OR enabled = 1)
            ORDER BY priority ASC, created_at DESC, rule_id ASC",
        )?;
        Ok(collect_docs(&mut stmt, rusqlite::params![enabled_only])?)
      })
      .await?;

    docs.iter().map(|d| decode_doc(d)).collect()
  }
}

// ─── AlertStore impl ─────────────────────────────────────────────────────────

impl AlertStore for SqliteStore {
  type Error = Error;

  async fn insert_alert(&self, alert: QualityAlert) -> Result<QualityAlert> {
    let row = AlertRow::encode(&alert)?;

    let n = self
      .conn
      .call(move |conn| Ok(insert_alert_row(conn, &row)?))
      .await?;

    if n == 0 {
      return Err(Error::DuplicateAlert(alert.alert_id));
    }
    Ok(alert)
  }

  async fn insert_alert_unless_recent(
    &self,
    alert: QualityAlert,
    since: DateTime<Utc>,
  ) -> Result<Option<QualityAlert>> {
    let row = AlertRow::encode(&alert)?;
    let since_str = encode_dt(since);

    let inserted: Option<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let open_recent: bool = tx
          .query_row(
            "SELECT 1 FROM quality_alerts
              WHERE rule_id = ?1
                AND source_issue_id = ?2
                AND created_at >= ?3
                AND current_status NOT IN ('closed', 'false_alarm')
              LIMIT 1",
            rusqlite::params![row.rule_id, row.source_issue_id, since_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if open_recent {
          return Ok(None);
        }

        let n = insert_alert_row(&tx, &row)?;
        tx.commit()?;
        Ok(Some(n))
      })
      .await?;

    match inserted {
      None => Ok(None),
      Some(0) => Err(Error::DuplicateAlert(alert.alert_id)),
      Some(_) => Ok(Some(alert)),
    }
  }

  async fn get_alert<'a>(&'a self, alert_id: &'a str) -> Result<Option<QualityAlert>> {
    let id = alert_id.to_owned();

    let doc: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT doc FROM quality_alerts WHERE alert_id = ?1",
              rusqlite::params![id],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    doc.as_deref().map(decode_doc).transpose()
  }

  async fn list_alerts<'a>(
    &'a self,
    query: &'a AlertQuery,
  ) -> Result<(Vec<QualityAlert>, u64)> {
    let level     = query.level.map(|l| l.to_string());
    let status    = query.status.map(|s| s.to_string());
    let category  = query.category.map(|c| c.to_string());
    let supplier  = query.supplier.clone();
    let component = query.component.clone();
    let keyword   = query.keyword.clone();
    let after     = query.created_after.map(encode_dt);
    let before    = query.created_before.map(encode_dt);
    let limit     = i64::from(query.limit);
    let offset    = i64::try_from(query.offset()).unwrap_or(i64::MAX);

    let (docs, total): (Vec<String>, i64) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM quality_alerts {ALERT_FILTER}"),
          rusqlite::params![
            level, status, category, supplier, component, keyword, after, before,
          ],
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT doc FROM quality_alerts {ALERT_FILTER}
            ORDER BY created_at DESC, alert_id DESC
            LIMIT ?9 OFFSET ?10"
        ))?;
        let docs = collect_docs(
          &mut stmt,
          rusqlite::params![
            level, status, category, supplier, component, keyword, after, before,
            limit, offset,
          ],
        )?;
        Ok((docs, total))
      })
      .await?;

    let items = docs
      .iter()
      .map(|d| decode_doc(d))
      .collect::<Result<Vec<QualityAlert>>>()?;
    Ok((items, u64::try_from(total).unwrap_or(0)))
  }

  async fn record_status(
    &self,
    alert_id: String,
    change: StatusChange,
  ) -> Result<Option<QualityAlert>> {
    self
      .modify_alert(alert_id, move |alert| alert.transition(change))
      .await
  }

  async fn push_assignment(
    &self,
    alert_id: String,
    assignment: Assignment,
    at: DateTime<Utc>,
  ) -> Result<Option<QualityAlert>> {
    self
      .modify_alert(alert_id, move |alert| alert.push_assignment(assignment, at))
      .await
  }

  async fn count_by_level_and_category(
    &self,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
  ) -> Result<Vec<StatisticsBucket>> {
    let since_str = encode_dt(since);
    let until_str = encode_dt(until);

    let raws: Vec<RawBucket> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT level, category, COUNT(*) FROM quality_alerts
            WHERE created_at >= ?1 AND created_at <= ?2
            GROUP BY level, category
            ORDER BY level, category",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![since_str, until_str], |row| {
            Ok(RawBucket {
              level:    row.get(0)?,
              category: row.get(1)?,
              count:    row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBucket::into_bucket).collect()
  }
}

// ─── ZeroingSource impl ──────────────────────────────────────────────────────

impl ZeroingSource for SqliteStore {
  type Error = Error;

  async fn recent_zeroing(
    &self,
    since: Option<DateTime<Utc>>,
    limit: usize,
  ) -> Result<Vec<QualityZeroingRecord>> {
    let since_str = since.map(encode_dt);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let docs: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT doc FROM quality_zeroing
            WHERE (?1 IS NULL OR updated_at >= ?1)
            ORDER BY updated_at DESC, zeroing_id ASC
            LIMIT ?2",
        )?;
        Ok(collect_docs(&mut stmt, rusqlite::params![since_str, limit])?)
      })
      .await?;

    docs.iter().map(|d| decode_doc(d)).collect()
  }
}
