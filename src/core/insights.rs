//! AI spending insights.
//!
//! Pure date-range arithmetic and payload assembly live here next to the
//! OpenAI client so the HTTP handler in `telegram::webapp` stays thin.

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use serde::Serialize;

use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// One transaction as presented to the model.
#[derive(Debug, Serialize)]
pub struct InsightsTransaction {
    pub date: String,
    pub amount: f64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<InsightsCategory>,
}

#[derive(Debug, Serialize)]
pub struct InsightsCategory {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

/// The JSON blob handed to the model verbatim.
#[derive(Debug, Serialize)]
pub struct InsightsPayload {
    pub period: String,
    pub date_range: DateRange,
    pub total: f64,
    pub transaction_count: usize,
    pub transactions: Vec<InsightsTransaction>,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Inclusive [start, end] date range for a named period.
///
/// `week` starts on Monday; anything unrecognized falls back to `month`,
/// matching the API's documented default.
pub fn period_range(period: &str, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = match period {
        "today" => today,
        "week" => today - ChronoDuration::days(i64::from(today.weekday().num_days_from_monday())),
        "year" => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        _ => NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today),
    };
    (start, today)
}

/// Capitalized label for the period ("month" → "Month").
pub fn period_label(period: &str) -> String {
    let mut chars = period.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Assemble the payload the model analyses.
pub fn build_insights_payload(
    period: &str,
    start: NaiveDate,
    end: NaiveDate,
    transactions: Vec<InsightsTransaction>,
) -> InsightsPayload {
    let total = transactions.iter().map(|t| t.amount).sum();
    InsightsPayload {
        period: period_label(period),
        date_range: DateRange {
            start: start.format("%Y-%m-%d").to_string(),
            end: end.format("%Y-%m-%d").to_string(),
        },
        total,
        transaction_count: transactions.len(),
        transactions,
    }
}

/// Thin OpenAI chat-completions client.
pub struct InsightsClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl InsightsClient {
    /// # Errors
    /// Fails if the underlying HTTP client cannot be constructed.
    pub fn new(api_key: String, model: String) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config::network::timeout())
            .build()?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    /// Ask the model to analyse the period's transactions.
    ///
    /// # Errors
    /// Propagates transport errors; a non-2xx status or an empty
    /// completion is reported as a validation error.
    pub async fn analyze(&self, payload: &InsightsPayload) -> AppResult<String> {
        let payload_json = serde_json::to_string_pretty(payload)?;
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": format!("Analyse those transactions:\n\n{payload_json}"),
            }],
            "temperature": 0.7,
            "max_tokens": 1000,
        });

        let response = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            log::error!("OpenAI API error ({}): {}", status, text);
            return Err(AppError::Validation(format!(
                "OpenAI request failed with status {status}"
            )));
        }

        let data: serde_json::Value = response.json().await?;
        let analysis = data["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("empty completion from OpenAI".to_string()))?;

        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn today_range_is_a_single_day() {
        let today = d(2024, 4, 18);
        assert_eq!(period_range("today", today), (today, today));
    }

    #[test]
    fn week_starts_on_monday() {
        // 2024-04-18 is a Thursday
        assert_eq!(period_range("week", d(2024, 4, 18)).0, d(2024, 4, 15));
        // Sunday belongs to the week that started six days earlier
        assert_eq!(period_range("week", d(2024, 4, 21)).0, d(2024, 4, 15));
    }

    #[test]
    fn month_is_the_default_for_unknown_periods() {
        assert_eq!(period_range("fortnight", d(2024, 4, 18)).0, d(2024, 4, 1));
        assert_eq!(period_range("month", d(2024, 4, 18)).0, d(2024, 4, 1));
    }

    #[test]
    fn year_starts_in_january() {
        assert_eq!(period_range("year", d(2024, 4, 18)).0, d(2024, 1, 1));
    }

    #[test]
    fn payload_totals_and_labels() {
        let txs = vec![
            InsightsTransaction {
                date: "2024-04-01".into(),
                amount: 12.5,
                name: "Coffee".into(),
                category: None,
            },
            InsightsTransaction {
                date: "2024-04-02".into(),
                amount: 7.5,
                name: "Bus".into(),
                category: Some(InsightsCategory {
                    name: "transport".into(),
                    emoji: Some("🚌".into()),
                }),
            },
        ];
        let payload = build_insights_payload("month", d(2024, 4, 1), d(2024, 4, 18), txs);
        assert_eq!(payload.period, "Month");
        assert_eq!(payload.total, 20.0);
        assert_eq!(payload.transaction_count, 2);
        assert_eq!(payload.date_range.start, "2024-04-01");
    }
}
