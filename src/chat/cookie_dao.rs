//! 会话 cookie 数据访问层（DAO）
//!
//! 把 [`SessionCookieStore`](crate::chat::cookie::SessionCookieStore) 的快照写入 SQLite，
//! 进程重启后 session token 依然有效（直到 cookie 过期）。

use crate::chat::cookie::StoredCookie;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;

/// cookie DAO（基于 sqlx）
#[derive(Clone)]
pub struct CookieDao {
    db: Pool<Sqlite>,
}

impl CookieDao {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// 读取所有持久化的 cookie
    pub async fn load_all(&self) -> Result<Vec<StoredCookie>> {
        let rows = sqlx::query(
            r#"
            SELECT host, name, value, path, secure, host_only, expires_at
            FROM session_cookies
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("查询 cookie 失败")?;

        let cookies: Vec<StoredCookie> = rows
            .into_iter()
            .map(|m| {
                let expires_at: Option<i64> = m.get("expires_at");
                StoredCookie {
                    host: m.get("host"),
                    name: m.get("name"),
                    value: m.get("value"),
                    path: m.get("path"),
                    secure: m.get("secure"),
                    host_only: m.get("host_only"),
                    expires_at: expires_at.and_then(DateTime::<Utc>::from_timestamp_millis),
                }
            })
            .collect();

        debug!("[CookieDAO] 读取本地 cookie，共 {} 条", cookies.len());
        Ok(cookies)
    }

    /// 用快照整体替换表内容
    pub async fn replace_all(&self, cookies: &[StoredCookie]) -> Result<()> {
        let mut tx = self.db.begin().await.context("开启事务失败")?;

        sqlx::query("DELETE FROM session_cookies")
            .execute(&mut *tx)
            .await
            .context("清空 cookie 表失败")?;

        let sql = r#"
            INSERT INTO session_cookies (host, name, value, path, secure, host_only, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(host, name) DO UPDATE SET
                value = excluded.value,
                path = excluded.path,
                secure = excluded.secure,
                host_only = excluded.host_only,
                expires_at = excluded.expires_at
        "#;
        for cookie in cookies {
            sqlx::query(sql)
                .bind(&cookie.host)
                .bind(&cookie.name)
                .bind(&cookie.value)
                .bind(&cookie.path)
                .bind(cookie.secure)
                .bind(cookie.host_only)
                .bind(cookie.expires_at.map(|at| at.timestamp_millis()))
                .execute(&mut *tx)
                .await
                .context("保存 cookie 失败")?;
        }

        tx.commit().await.context("提交 cookie 事务失败")?;
        debug!("[CookieDAO] 保存 cookie 快照，共 {} 条", cookies.len());
        Ok(())
    }
}
