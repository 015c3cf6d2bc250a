use anyhow::{anyhow, bail, Context, Result};
use remindy_core::{CreateReminder, ListQuery, ReminderPage, ReminderRecord, UpdateReminder};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ApiSection;

/// Thin client for the reminders REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(cfg: &ApiSection) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/reminders/", self.base_url)
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/reminders/{}", self.base_url, id)
    }

    pub async fn list(&self, query: &ListQuery) -> Result<ReminderPage> {
        debug!(?query, "list reminders");
        let resp = self
            .http
            .get(self.collection_url())
            .query(&query.query_pairs())
            .send()
            .await
            .context("list reminders request")?;
        let resp = check(resp).await?;
        resp.json().await.context("parse reminders page")
    }

    pub async fn get(&self, id: &str) -> Result<ReminderRecord> {
        let resp = self
            .http
            .get(self.item_url(id))
            .send()
            .await
            .context("get reminder request")?;
        let resp = check(resp).await?;
        resp.json().await.context("parse reminder")
    }

    pub async fn create(&self, body: &CreateReminder) -> Result<ReminderRecord> {
        debug!(
            title = %body.title,
            at = %body.scheduled_time_utc,
            tz = %body.timezone,
            "create reminder"
        );
        let resp = self
            .http
            .post(self.collection_url())
            .json(body)
            .send()
            .await
            .context("create reminder request")?;
        let resp = check(resp).await?;
        resp.json().await.context("parse created reminder")
    }

    pub async fn update(&self, id: &str, body: &UpdateReminder) -> Result<ReminderRecord> {
        debug!(id, ?body, "update reminder");
        let resp = self
            .http
            .patch(self.item_url(id))
            .json(body)
            .send()
            .await
            .context("update reminder request")?;
        let resp = check(resp).await?;
        resp.json().await.context("parse updated reminder")
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        debug!(id, "delete reminder");
        let resp = self
            .http
            .delete(self.item_url(id))
            .send()
            .await
            .context("delete reminder request")?;
        check(resp).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Pass successful responses through; otherwise fail with the server's `detail`.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let txt = resp.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        if let Some(detail) = error_detail(&txt) {
            return Err(anyhow!(detail));
        }
        bail!("reminder not found");
    }
    match error_detail(&txt) {
        Some(detail) => bail!("{detail}"),
        None => bail!("api error: {status} {txt}"),
    }
}

/// `detail` is a string for handled errors, or a list of `{loc, msg}` for
/// request validation failures.
fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(items) => {
            let msgs: Vec<String> = items
                .iter()
                .filter_map(|i| {
                    let msg = i.get("msg")?.as_str()?;
                    let field = i
                        .get("loc")
                        .and_then(|l| l.as_array())
                        .and_then(|l| l.last())
                        .and_then(|l| l.as_str());
                    Some(match field {
                        Some(f) => format!("{f}: {msg}"),
                        None => msg.to_string(),
                    })
                })
                .collect();
            if msgs.is_empty() { None } else { Some(msgs.join("; ")) }
        }
        _ => None,
    }
}
