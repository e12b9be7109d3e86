//! The transactional service list.
//!
//! Everything starts by opening the currently published list. The list can
//! then be manipulated freely before a commit validates the staged state,
//! atomically replaces the published copy, and advertises the new SSID.
//!
//! Staged writes never touch the published table. Each handle owns its own
//! SQLite connection, and the first read or write clones the published
//! table into a per-connection `TEMPORARY` shadow table; every later read
//! and write targets the shadow. This gives readers a stable snapshot for
//! the duration of an iteration (`count` and subsequent indexed `get`s can
//! never disagree) and writers a private draft that other handles cannot
//! observe until a successful commit. Commits from concurrent handles are
//! serialised by an exclusive lock on the database; an uncommitted shadow
//! simply vanishes when its handle is dropped.
//!
//! A handle must stay on the thread that opened it; processes that want
//! parallelism open one handle each.

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::StoreError;
use crate::service::{Service, ServiceDraft};
use crate::ssid::{SsidBinding, SsidError, SSID_MAX_LEN};

/// Literal prefix of every advertised SSID.
pub const SSID_PREFIX: &[u8] = b"##";

const CREATE_PUBLISHED: &str = "\
    CREATE TABLE IF NOT EXISTS service_list (
        position  INTEGER PRIMARY KEY NOT NULL,
        mod_time  INTEGER NOT NULL,
        cat_id    INTEGER NOT NULL,
        uri       TEXT NOT NULL,
        desc      TEXT,
        long_desc TEXT
    )";

// Same column order as the published table: the publish step copies the
// shadow over with `INSERT INTO … SELECT *`.
const CREATE_SHADOW: &str = "\
    CREATE TEMPORARY TABLE IF NOT EXISTS service_list_shadow (
        position  INTEGER PRIMARY KEY NOT NULL,
        mod_time  INTEGER NOT NULL DEFAULT 0,
        cat_id    INTEGER NOT NULL,
        uri       TEXT NOT NULL,
        desc      TEXT,
        long_desc TEXT
    );
    INSERT INTO service_list_shadow SELECT * FROM service_list;";

fn wait_for_lock(_attempts: i32) -> bool {
    // With per-handle shadows a writer only contends during the short
    // publish section, so waiting indefinitely cannot starve.
    true
}

/// A handle on the published service list plus its private shadow copy.
pub struct ServiceList {
    conn: Connection,
    has_shadow: bool,
    ssid: Arc<dyn SsidBinding>,
}

impl ServiceList {
    /// Attaches to the persistent store, creating it on first use.
    pub fn open(db_path: impl AsRef<Path>, ssid: Arc<dyn SsidBinding>) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.execute(CREATE_PUBLISHED, [])?;
        conn.busy_handler(Some(wait_for_lock))?;
        Ok(Self {
            conn,
            has_shadow: false,
            ssid,
        })
    }

    /// Clones the published table into this handle's shadow on the first
    /// read or write.
    fn ensure_shadow(&mut self) -> Result<(), StoreError> {
        if self.has_shadow {
            return Ok(());
        }
        self.conn.execute_batch(CREATE_SHADOW)?;
        self.has_shadow = true;
        Ok(())
    }

    /// Number of services. Observes the shadow once one exists, otherwise
    /// the published copy.
    pub fn count(&self) -> Result<u32, StoreError> {
        let sql = if self.has_shadow {
            "SELECT count(*) FROM service_list_shadow"
        } else {
            "SELECT count(*) FROM service_list"
        };
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u32)
    }

    /// Returns a copy of the service at `idx`, or `None` past the end.
    pub fn get(&mut self, idx: u32) -> Result<Option<Service>, StoreError> {
        self.ensure_shadow()?;
        let mut stmt = self.conn.prepare_cached(
            "SELECT mod_time, cat_id, uri, desc, long_desc
             FROM service_list_shadow WHERE position = ?1",
        )?;
        let service = stmt
            .query_row(params![idx], |row| {
                Ok(Service {
                    pos: idx,
                    mod_time: row.get::<_, i64>(0)? as u64,
                    cat_id: row.get::<_, i64>(1)? as u32,
                    uri: row.get(2)?,
                    desc: row.get(3)?,
                    long_desc: row.get(4)?,
                })
            })
            .optional()?;
        Ok(service)
    }

    /// Adds a service at position 0, shifting the rest up.
    pub fn add_first(&mut self, draft: &ServiceDraft) -> Result<(), StoreError> {
        self.insert(draft, 0)
    }

    /// Appends a service after the current last position.
    pub fn add_last(&mut self, draft: &ServiceDraft) -> Result<(), StoreError> {
        self.insert(draft, self.count()?)
    }

    /// Inserts a service at `idx`, shifting positions `[idx, N)` up by one.
    /// `idx` may be at most the current count.
    pub fn insert(&mut self, draft: &ServiceDraft, idx: u32) -> Result<(), StoreError> {
        let count = self.count()?;
        if idx > count {
            return Err(StoreError::IndexOutOfRange { idx, count });
        }
        self.ensure_shadow()?;

        let tx = self.conn.transaction()?;
        {
            // One row at a time, highest first: the position column is the
            // primary key and must never hold transient duplicates.
            let mut shift = tx.prepare_cached(
                "UPDATE service_list_shadow SET position = position + ?1 WHERE position = ?2",
            )?;
            for pos in (idx..count).rev() {
                shift.execute(params![1, pos])?;
            }
            tx.prepare_cached(
                "INSERT INTO service_list_shadow (position, cat_id, uri, desc, long_desc)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(params![
                idx,
                draft.cat_id(),
                draft.uri(),
                draft.desc(),
                draft.long_desc()
            ])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Replaces the tuple of the service at `idx` in place.
    pub fn replace(&mut self, draft: &ServiceDraft, idx: u32) -> Result<(), StoreError> {
        self.ensure_shadow()?;
        let updated = self
            .conn
            .prepare_cached(
                "UPDATE service_list_shadow
                 SET cat_id = ?1, uri = ?2, desc = ?3, long_desc = ?4
                 WHERE position = ?5",
            )?
            .execute(params![
                draft.cat_id(),
                draft.uri(),
                draft.desc(),
                draft.long_desc(),
                idx
            ])?;
        if updated == 0 {
            return Err(StoreError::IndexOutOfRange {
                idx,
                count: self.count()?,
            });
        }
        Ok(())
    }

    /// Removes the service at `idx`, shifting positions `(idx, N)` down by
    /// one.
    pub fn remove(&mut self, idx: u32) -> Result<(), StoreError> {
        self.ensure_shadow()?;
        let count = self.count()?;

        let tx = self.conn.transaction()?;
        let removed = {
            let removed = tx
                .prepare_cached("DELETE FROM service_list_shadow WHERE position = ?1")?
                .execute(params![idx])?;
            if removed != 0 {
                // Lowest first; see insert() for the duplicate-key constraint.
                let mut shift = tx.prepare_cached(
                    "UPDATE service_list_shadow SET position = position + ?1 WHERE position = ?2",
                )?;
                for pos in idx + 1..count {
                    shift.execute(params![-1, pos])?;
                }
            }
            removed
        };
        tx.commit()?;

        if removed == 0 {
            return Err(StoreError::IndexOutOfRange { idx, count });
        }
        Ok(())
    }

    /// Empties the staged list.
    pub fn remove_all(&mut self) -> Result<(), StoreError> {
        self.ensure_shadow()?;
        self.conn.execute("DELETE FROM service_list_shadow", [])?;
        Ok(())
    }

    /// Last modification time of the *published* list (the newest record
    /// `mod_time`), 0 when nothing has ever been published. Staged edits do
    /// not move this until they are committed.
    pub fn last_published_mod_time(&self) -> Result<u64, StoreError> {
        let ts: Option<i64> =
            self.conn
                .query_row("SELECT max(mod_time) FROM service_list", [], |row| {
                    row.get(0)
                })?;
        Ok(ts.unwrap_or(0) as u64)
    }

    /// Validates the staged list, atomically replaces the published copy,
    /// and advertises the new SSID.
    ///
    /// `SsidTooLong` and `InvalidServicePos` abort before anything is
    /// published and leave the shadow intact for further editing. Any later
    /// failure rolls the SSID and the records back and reports
    /// [`StoreError::Save`]; a failed commit never partially updates either.
    /// After a successful commit the shadow is discarded, so the next read
    /// observes the freshly published copy.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        // A handle that never touched the list still publishes its (empty
        // or freshly cloned) snapshot, so the SSID always matches the
        // records after a successful commit.
        self.ensure_shadow()?;

        let candidate = self.build_candidate_ssid()?;
        let old_ssid = self
            .ssid
            .get_ssid()
            .map_err(|e| StoreError::Save(format!("cannot read the advertised SSID: {e}")))?;

        // Stamp every staged record with the commit second, then restore
        // the published mod_time wherever the tuple is unchanged at the
        // same position. `IS` keeps the comparison NULL-safe for the
        // optional descriptions.
        self.conn
            .execute_batch(
                "UPDATE service_list_shadow SET mod_time = strftime('%s', 'now');
                 UPDATE service_list_shadow SET mod_time = (
                     SELECT p.mod_time FROM service_list p
                     WHERE p.position = service_list_shadow.position
                 )
                 WHERE EXISTS (
                     SELECT 1 FROM service_list p
                     WHERE p.position = service_list_shadow.position
                       AND p.cat_id = service_list_shadow.cat_id
                       AND p.uri = service_list_shadow.uri
                       AND p.desc IS service_list_shadow.desc
                       AND p.long_desc IS service_list_shadow.long_desc
                 );",
            )
            .map_err(|e| StoreError::Save(format!("cannot stamp modification times: {e}")))?;

        let ssid = Arc::clone(&self.ssid);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Exclusive)
            .map_err(|e| StoreError::Save(format!("cannot lock the published list: {e}")))?;

        if let Err(e) = ssid.set_ssid(&candidate) {
            // Dropping the transaction releases the exclusive lock.
            return Err(match e {
                SsidError::TooLong => StoreError::SsidTooLong,
                SsidError::Os(os) => StoreError::Save(format!("cannot advertise the SSID: {os}")),
            });
        }

        let published = (|| {
            tx.execute("DELETE FROM service_list", [])?;
            tx.execute(
                "INSERT INTO service_list SELECT * FROM service_list_shadow",
                [],
            )?;
            tx.commit()
        })();

        if let Err(e) = published {
            if let Err(revert) = ssid.set_ssid(&old_ssid) {
                tracing::error!(error = %revert, "cannot revert to the previous SSID");
            }
            return Err(StoreError::Save(format!(
                "cannot replace the published records: {e}"
            )));
        }

        self.conn
            .execute_batch("DROP TABLE IF EXISTS temp.service_list_shadow")?;
        self.has_shadow = false;

        tracing::debug!(ssid_len = candidate.len(), "service list published");
        Ok(())
    }

    /// Walks the shadow in position order and serialises the SSID
    /// advertisement: `##`, then `^<cat_id>[,<desc>]` per service.
    fn build_candidate_ssid(&self) -> Result<Vec<u8>, StoreError> {
        let mut ssid = SSID_PREFIX.to_vec();

        let mut stmt = self.conn.prepare_cached(
            "SELECT cat_id, desc, position FROM service_list_shadow ORDER BY position ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut expected: i64 = 0;
        while let Some(row) = rows.next()? {
            let cat_id: i64 = row.get(0)?;
            let desc: Option<String> = row.get(1)?;
            let position: i64 = row.get(2)?;

            // A gap here is a programmer error, not bad user input.
            if position != expected {
                return Err(StoreError::InvalidServicePos(position as u32));
            }
            expected += 1;

            let fragment = format!("^{cat_id}");
            if ssid.len() + fragment.len() > SSID_MAX_LEN {
                return Err(StoreError::SsidTooLong);
            }
            ssid.extend_from_slice(fragment.as_bytes());

            if let Some(desc) = desc {
                if ssid.len() + 1 + desc.len() > SSID_MAX_LEN {
                    return Err(StoreError::SsidTooLong);
                }
                ssid.push(b',');
                ssid.extend_from_slice(desc.as_bytes());
            }
        }

        Ok(ssid)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
