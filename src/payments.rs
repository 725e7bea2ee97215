use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::{
    cast::{CastMode, CastReport, Engine},
    roll::Dice,
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefundStatus {
    None,
    Refunded,
}

impl RefundStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RefundStatus::None => "none",
            RefundStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown refund status `{0}`")]
pub struct UnknownRefundStatus(String);

impl FromStr for RefundStatus {
    type Err = UnknownRefundStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RefundStatus::None),
            "refunded" => Ok(RefundStatus::Refunded),
            other => Err(UnknownRefundStatus(other.to_string())),
        }
    }
}

impl Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub charge_id: String,
    pub user_id: i64,
    pub chat_id: Option<i64>,
    pub amount: i64,
    pub refund_status: String,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn refund_status(&self) -> Option<RefundStatus> {
        self.refund_status.parse().ok()
    }
}

/// Stores a charge. Returns `false` if the charge id was seen before.
pub async fn record_charge(
    conn: &mut SqliteConnection,
    charge_id: &str,
    user_id: i64,
    chat_id: Option<i64>,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO payments (charge_id, user_id, chat_id, amount, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(charge_id)
    .bind(user_id)
    .bind(chat_id)
    .bind(amount)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get(conn: &mut SqliteConnection, charge_id: &str) -> Result<Option<Payment>> {
    Ok(sqlx::query_as("SELECT * FROM payments WHERE charge_id = ?")
        .bind(charge_id)
        .fetch_optional(&mut *conn)
        .await?)
}

/// Flags a charge as refunded. Returns `false` for unknown charges and
/// charges that were already refunded.
pub async fn mark_refunded(conn: &mut SqliteConnection, charge_id: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE payments SET refund_status = ? WHERE charge_id = ? AND refund_status = ?",
    )
    .bind(RefundStatus::Refunded.as_str())
    .bind(charge_id)
    .bind(RefundStatus::None.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PaidCast {
    /// The charge was already processed.
    Duplicate,
    /// `refund_due` is set when the cast produced nothing and the charge has
    /// been flagged for a refund.
    Completed { report: CastReport, refund_due: bool },
}

impl Engine {
    /// Runs a guaranteed cast paid for by `charge_id`. Each charge buys
    /// exactly one cast. A cast that errors leaves the charge refunded.
    pub async fn paid_cast<D: Dice>(
        &self,
        conn: &mut SqliteConnection,
        charge_id: &str,
        user_id: i64,
        chat_id: Option<i64>,
        dice: &mut D,
        now: DateTime<Utc>,
    ) -> Result<PaidCast> {
        let amount = self.config().guaranteed_cast_price;
        if !record_charge(conn, charge_id, user_id, chat_id, amount, now).await? {
            warn!("Ignoring duplicate charge {charge_id}");
            return Ok(PaidCast::Duplicate);
        }

        let report = match self
            .cast(conn, user_id, chat_id, CastMode::Guaranteed, dice, now)
            .await
        {
            Ok(report) => report,
            Err(err) => {
                if mark_refunded(conn, charge_id).await? {
                    warn!("Refunding charge {charge_id} of {user_id} after a failed cast: {err}");
                }
                return Err(err);
            }
        };

        let refund_due = report.is_failure() && mark_refunded(conn, charge_id).await?;
        if refund_due {
            info!("Refunding charge {charge_id} of {user_id}");
        }

        Ok(PaidCast::Completed { report, refund_due })
    }
}
