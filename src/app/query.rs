//! 列表查詢的 query string 組合。空值與未設定的參數一律省略。

use crate::domain::warehouse::{InboundQuery, LotTransferQuery, OutboundQuery, PageQuery};
use chrono::{DateTime, SecondsFormat, Utc};
use url::form_urlencoded;

/// 依序收集查詢參數
#[derive(Debug, Default, Clone)]
pub struct QueryString {
    pairs: Vec<(String, String)>,
}

impl QueryString {
    pub fn new() -> Self {
        Self::default()
    }

    /// 空字串視為未設定
    pub fn push(&mut self, key: &str, value: impl ToString) -> &mut Self {
        let value = value.to_string();
        if !value.is_empty() {
            self.pairs.push((key.to_string(), value));
        }
        self
    }

    pub fn push_opt<V: ToString>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    pub fn push_date(&mut self, key: &str, value: Option<DateTime<Utc>>) -> &mut Self {
        self.push_opt(key, value.map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true)))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// 以 `?` 開頭的編碼結果；沒有任何參數時回傳空字串
    pub fn build(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish();
        format!("?{}", encoded)
    }

    /// 將查詢字串附加在路徑後
    pub fn append_to(&self, path: &str) -> String {
        format!("{}{}", path, self.build())
    }
}

/// 可轉為查詢參數的條件
pub trait ToQuery {
    fn write_query(&self, query: &mut QueryString);

    fn to_query(&self) -> QueryString {
        let mut query = QueryString::new();
        self.write_query(&mut query);
        query
    }
}

impl ToQuery for PageQuery {
    fn write_query(&self, query: &mut QueryString) {
        query
            .push("page", self.page)
            .push("pageSize", self.page_size)
            .push_opt("search", self.search.as_deref())
            .push_date("dateFrom", self.date_from)
            .push_date("dateTo", self.date_to);
    }
}

impl ToQuery for InboundQuery {
    fn write_query(&self, query: &mut QueryString) {
        self.paging.write_query(query);
        query
            .push_opt("inboundStatus", self.inbound_status.map(|s| s.code()))
            .push_opt("isReportPendingExist", self.is_report_pending_exist);
    }
}

impl ToQuery for OutboundQuery {
    fn write_query(&self, query: &mut QueryString) {
        self.paging.write_query(query);
        query
            .push_opt("customerId", self.customer_id)
            .push_opt("status", self.status.as_deref());
    }
}

impl ToQuery for LotTransferQuery {
    fn write_query(&self, query: &mut QueryString) {
        self.paging.write_query(query);
        query.push_opt("status", self.status.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::warehouse::InboundStatus;
    use chrono::TimeZone;

    #[test]
    fn test_empty_query_has_no_question_mark() {
        assert_eq!(QueryString::new().build(), "");
        assert_eq!(QueryString::new().append_to("/api/Customer"), "/api/Customer");
    }

    #[test]
    fn test_empty_and_missing_values_are_omitted() {
        let mut query = PageQuery::new(1, 10);
        query.search = Some(String::new());

        assert_eq!(query.to_query().build(), "?page=1&pageSize=10");
    }

    #[test]
    fn test_dates_use_iso_timestamps() {
        let mut query = PageQuery::new(2, 20);
        query.date_from = Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());

        assert_eq!(
            query.to_query().build(),
            "?page=2&pageSize=20&dateFrom=2025-03-01T00%3A00%3A00.000Z"
        );
    }

    #[test]
    fn test_values_are_percent_encoded() {
        let mut query = LotTransferQuery::default();
        query.paging = PageQuery::new(1, 5);
        query.paging.search = Some("Lô A&B".to_string());
        query.status = Some("InProgress".to_string());

        assert_eq!(
            query.to_query().build(),
            "?page=1&pageSize=5&search=L%C3%B4+A%26B&status=InProgress"
        );
    }

    #[test]
    fn test_inbound_filters() {
        let query = InboundQuery {
            paging: PageQuery::new(1, 10),
            inbound_status: Some(InboundStatus::Completed),
            is_report_pending_exist: Some(true),
        };

        assert_eq!(
            query.to_query().append_to("/api/Inbound"),
            "/api/Inbound?page=1&pageSize=10&inboundStatus=3&isReportPendingExist=true"
        );
    }
}
