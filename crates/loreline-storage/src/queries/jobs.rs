// SPDX-FileCopyrightText: 2026 Loreline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job queue operations: enqueue, atomic claim, completion,
//! failure with retry accounting, and retention cleanup.

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use loreline_core::{Job, JobPayload, JobStatus, LorelineError};

use crate::database::Database;

const JOB_COLUMNS: &str = "id, owner_id, job_type, payload, status, retry_count, \
     max_retries, error, created_at, updated_at, processed_at";

/// Enqueue a job, returning the new row id.
pub async fn enqueue(
    db: &Database,
    owner_id: &str,
    payload: &JobPayload,
    max_retries: i64,
) -> Result<i64, LorelineError> {
    let owner_id = owner_id.to_string();
    let job_type = payload.job_type().to_string();
    let payload_json =
        serde_json::to_string(payload).map_err(|e| LorelineError::Payload(e.to_string()))?;

    let id = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO jobs (owner_id, job_type, payload, max_retries) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![owner_id, job_type, payload_json, max_retries],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    debug!(job_id = id, "job enqueued");
    Ok(id)
}

/// Claim the oldest pending job, atomically moving it to `processing`.
///
/// The UPDATE is guarded by `status = 'pending'`; if another worker moved
/// the row between the SELECT and the UPDATE, zero rows are affected and
/// the claim returns None rather than double-claiming. Both statements
/// run in one transaction on the single writer thread.
pub async fn claim_next(db: &Database) -> Result<Option<Job>, LorelineError> {
    claim_inner(db, None).await
}

/// Claim the oldest pending job for one owner (synchronous drain path).
pub async fn claim_next_for_owner(
    db: &Database,
    owner_id: &str,
) -> Result<Option<Job>, LorelineError> {
    claim_inner(db, Some(owner_id.to_string())).await
}

async fn claim_inner(db: &Database, owner_id: Option<String>) -> Result<Option<Job>, LorelineError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let candidate: Option<i64> = match owner_id {
                Some(ref owner) => tx
                    .query_row(
                        "SELECT id FROM jobs WHERE status = 'pending' AND owner_id = ?1 \
                         ORDER BY created_at ASC, id ASC LIMIT 1",
                        params![owner],
                        |row| row.get(0),
                    )
                    .optional()?,
                None => tx
                    .query_row(
                        "SELECT id FROM jobs WHERE status = 'pending' \
                         ORDER BY created_at ASC, id ASC LIMIT 1",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?,
            };

            let Some(id) = candidate else {
                return Ok(None);
            };

            let updated = tx.execute(
                "UPDATE jobs SET status = 'processing', \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE id = ?1 AND status = 'pending'",
                params![id],
            )?;
            if updated == 0 {
                tx.commit()?;
                return Ok(None);
            }

            let job = tx.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id],
                |row| Ok(row_to_job(row)),
            )?;
            tx.commit()?;
            Ok(Some(job))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a job completed and stamp `processed_at`.
pub async fn complete(db: &Database, job_id: i64) -> Result<(), LorelineError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = 'completed', error = NULL, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), \
                 processed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                 WHERE id = ?1",
                params![job_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a job failure.
///
/// Increments the retry count, stores the error message, and either
/// returns the job to `pending` (retries remain) or dead-letters it as
/// `failed` with `processed_at` stamped. Returns the resulting status.
pub async fn fail(db: &Database, job_id: i64, error: &str) -> Result<JobStatus, LorelineError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let (retry_count, max_retries): (i64, i64) = tx.query_row(
                "SELECT retry_count, max_retries FROM jobs WHERE id = ?1",
                params![job_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_count = retry_count + 1;
            let status = if new_count < max_retries {
                JobStatus::Pending
            } else {
                JobStatus::Failed
            };

            match status {
                JobStatus::Failed => {
                    tx.execute(
                        "UPDATE jobs SET status = 'failed', retry_count = ?2, error = ?3, \
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), \
                         processed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                         WHERE id = ?1",
                        params![job_id, new_count, error],
                    )?;
                }
                _ => {
                    tx.execute(
                        "UPDATE jobs SET status = 'pending', retry_count = ?2, error = ?3, \
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                         WHERE id = ?1",
                        params![job_id, new_count, error],
                    )?;
                }
            }

            tx.commit()?;
            Ok(status)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete terminal jobs older than the retention window.
///
/// Only `completed` and `failed` rows are eligible; pending and
/// processing work is never reaped. Returns the number of rows removed.
pub async fn cleanup(db: &Database, retention_days: u32) -> Result<usize, LorelineError> {
    let modifier = format!("-{retention_days} days");
    let deleted = db
        .connection()
        .call(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM jobs WHERE status IN ('completed', 'failed') \
                 AND updated_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)",
                params![modifier],
            )?;
            Ok(deleted)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if deleted > 0 {
        debug!(deleted, "reaped terminal jobs past retention");
    }
    Ok(deleted)
}

/// Fetch one job by id.
pub async fn get_job(db: &Database, job_id: i64) -> Result<Option<Job>, LorelineError> {
    db.connection()
        .call(move |conn| {
            let job = conn
                .query_row(
                    &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                    params![job_id],
                    |row| Ok(row_to_job(row)),
                )
                .optional()?;
            Ok(job)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Count jobs in a given status (operator inspection, tests).
pub async fn count_by_status(db: &Database, status: JobStatus) -> Result<i64, LorelineError> {
    let status = status.as_str().to_string();
    db.connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Convert a rusqlite Row to a Job.
fn row_to_job(row: &rusqlite::Row) -> Job {
    let status_str: String = row.get(4).unwrap_or_default();
    Job {
        id: row.get(0).unwrap_or_default(),
        owner_id: row.get(1).unwrap_or_default(),
        job_type: row.get(2).unwrap_or_default(),
        payload: row.get(3).unwrap_or_default(),
        status: JobStatus::from_str_value(&status_str),
        retry_count: row.get(5).unwrap_or(0),
        max_retries: row.get(6).unwrap_or(0),
        error: row.get(7).unwrap_or(None),
        created_at: row.get(8).unwrap_or_default(),
        updated_at: row.get(9).unwrap_or_default(),
        processed_at: row.get(10).unwrap_or(None),
    }
}
