//! 倉儲 API 的資料模型。閘道層只轉送，不解讀這些內容。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 分頁回應
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_size: u32,
    pub current_page: u32,
    pub total_pages: u32,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutboundStatus {
    Pending = 1,
    InProgress = 2,
    Cancelled = 3,
    Completed = 4,
    Returned = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LotTransferStatus {
    Pending = 1,
    InProgress = 2,
    Completed = 3,
    Cancelled = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundStatus {
    Pending = 1,
    InProgress = 2,
    Completed = 3,
    Cancelled = 4,
}

macro_rules! numeric_status {
    ($name:ident { $($variant:ident = $code:literal => $label:literal),+ $(,)? }) => {
        impl $name {
            pub fn code(self) -> u8 {
                self as u8
            }

            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// 介面顯示文字
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// 不分大小寫解析伺服器回傳的文字狀態，未知值視為 Pending
            pub fn parse_lenient(text: &str) -> Self {
                let normalized = text.to_ascii_lowercase();
                $(
                    if normalized == stringify!($variant).to_ascii_lowercase() {
                        return $name::$variant;
                    }
                )+
                if let Ok(code) = normalized.parse::<u8>() {
                    if let Some(status) = Self::from_code(code) {
                        return status;
                    }
                }
                $name::Pending
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_u8(self.code())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = Value::deserialize(deserializer)?;
                match value {
                    Value::Number(n) => n
                        .as_u64()
                        .and_then(|c| u8::try_from(c).ok())
                        .and_then(Self::from_code)
                        .ok_or_else(|| serde::de::Error::custom(format!("unknown status code {}", n))),
                    Value::String(s) => Ok(Self::parse_lenient(&s)),
                    other => Err(serde::de::Error::custom(format!("invalid status {}", other))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.to_ascii_lowercase().replace(['-', '_'], "");
                $(
                    if normalized == stringify!($variant).to_ascii_lowercase() {
                        return Ok($name::$variant);
                    }
                )+
                Err(format!("unknown {}: {}", stringify!($name), s))
            }
        }
    };
}

numeric_status!(OutboundStatus {
    Pending = 1 => "Đang chờ",
    InProgress = 2 => "Đang xử lý",
    Cancelled = 3 => "Đã hủy",
    Completed = 4 => "Hoàn thành",
    Returned = 5 => "Đã trả lại",
});

numeric_status!(LotTransferStatus {
    Pending = 1 => "Đang chờ",
    InProgress = 2 => "Đang xử lý",
    Completed = 3 => "Đã hoàn thành",
    Cancelled = 4 => "Đã hủy",
});

numeric_status!(InboundStatus {
    Pending = 1 => "Đang chờ",
    InProgress = 2 => "Đang xử lý",
    Completed = 3 => "Đã hoàn thành",
    Cancelled = 4 => "Đã hủy",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundDetail {
    pub outbound_details_id: i64,
    pub lot_id: i64,
    pub lot_number: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
    pub unit_type: String,
    pub product_name: String,
    pub expiry_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundItem {
    pub outbound_id: i64,
    pub outbound_code: String,
    pub customer_name: String,
    pub receiver_name: Option<String>,
    pub receiver_phone: Option<String>,
    pub receiver_address: Option<String>,
    pub note: Option<String>,
    pub phone_number: String,
    pub outbound_order_code: Option<String>,
    pub outbound_date: String,
    pub status: OutboundStatus,
    #[serde(default)]
    pub outbound_details: Vec<OutboundDetail>,
}

impl OutboundItem {
    pub fn total_amount(&self) -> f64 {
        self.outbound_details.iter().map(|d| d.total_price).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotTransferDetail {
    pub lot_transfer_detail_id: i64,
    pub expiry_date: String,
    pub quantity: f64,
    pub product_name: Option<String>,
    pub lot_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotTransferItem {
    pub lot_transfer_id: i64,
    pub lot_transfer_code: String,
    pub lot_transfer_status: String,
    pub from_ware_house: String,
    pub to_ware_house: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub lot_transfer_details: Vec<LotTransferDetail>,
}

impl LotTransferItem {
    pub fn status(&self) -> LotTransferStatus {
        LotTransferStatus::parse_lenient(&self.lot_transfer_status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundDetail {
    pub lot_number: String,
    pub product_id: i64,
    pub product_name: String,
    pub opening_stock: f64,
    pub manufacturing_date: String,
    pub expiry_date: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
}

/// 報告附件（通常為照片）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub asset_id: i64,
    pub file_url: String,
    pub file_name: String,
    pub file_extension: String,
    pub file_size: u64,
    pub uploaded_at: String,
    pub status: String,
    pub account_id: String,
    pub category_id: i64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundReport {
    pub inbound_report_id: i64,
    pub problem_description: String,
    pub status: String,
    pub report_date: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDetails {
    pub provider_id: i64,
    pub provider_name: String,
    pub address: String,
    pub phone_number: String,
    pub tax_code: String,
    pub nationality: Option<String>,
    pub email: String,
    pub document_number: String,
    pub document_issue_date: String,
    pub status: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundItem {
    pub inbound_id: i64,
    pub inbound_code: String,
    pub provider_order_code: String,
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub create_by: String,
    pub note: Option<String>,
    pub inbound_date: String,
    pub status: String,
    #[serde(default)]
    pub inbound_details: Vec<InboundDetail>,
    pub report: Option<InboundReport>,
    pub provider_details: Option<ProviderDetails>,
}

impl InboundItem {
    pub fn status(&self) -> InboundStatus {
        InboundStatus::parse_lenient(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    pub role_id: i64,
    pub role_name: String,
    pub status: String,
    pub two_factor_enabled: bool,
    pub phone_number_confirmed: bool,
    pub email_confirmed: bool,
    pub account_settings: Option<Value>,
}

/// 列表查詢共用的分頁與篩選條件
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageQuery {
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl PageQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InboundQuery {
    pub paging: PageQuery,
    pub inbound_status: Option<InboundStatus>,
    pub is_report_pending_exist: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutboundQuery {
    pub paging: PageQuery,
    pub customer_id: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LotTransferQuery {
    pub paging: PageQuery,
    pub status: Option<String>,
}

/// 一張待上傳的照片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// 入庫異常報告：新建時帶 inbound_id，修改既有報告時帶 report_id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportTarget {
    NewForInbound(i64),
    Existing(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSubmission {
    pub target: ReportTarget,
    pub problem_description: String,
    pub images: Vec<ReportImage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_and_labels() {
        assert_eq!(OutboundStatus::Returned.code(), 5);
        assert_eq!(LotTransferStatus::from_code(3), Some(LotTransferStatus::Completed));
        assert_eq!(InboundStatus::from_code(9), None);
        assert_eq!(OutboundStatus::Cancelled.label(), "Đã hủy");
    }

    #[test]
    fn test_lenient_parsing_defaults_to_pending() {
        assert_eq!(InboundStatus::parse_lenient("InProgress"), InboundStatus::InProgress);
        assert_eq!(InboundStatus::parse_lenient("COMPLETED"), InboundStatus::Completed);
        assert_eq!(InboundStatus::parse_lenient("archived"), InboundStatus::Pending);
        assert_eq!(LotTransferStatus::parse_lenient("4"), LotTransferStatus::Cancelled);
    }

    #[test]
    fn test_status_from_cli_text() {
        assert_eq!("in-progress".parse::<OutboundStatus>().unwrap(), OutboundStatus::InProgress);
        assert_eq!("completed".parse::<InboundStatus>().unwrap(), InboundStatus::Completed);
        assert!("shipped".parse::<OutboundStatus>().is_err());
    }

    #[test]
    fn test_outbound_deserializes_numeric_status() {
        let json = serde_json::json!({
            "outboundId": 7,
            "outboundCode": "PX-007",
            "customerName": "Nhà thuốc An Khang",
            "receiverName": null,
            "receiverPhone": null,
            "receiverAddress": null,
            "note": null,
            "phoneNumber": "0900000000",
            "outboundOrderCode": null,
            "outboundDate": "2025-06-01T00:00:00Z",
            "status": 2,
            "outboundDetails": [
                {"outboundDetailsId": 1, "lotId": 3, "lotNumber": "L3", "quantity": 2.0,
                 "unitPrice": 10.0, "totalPrice": 20.0, "unitType": "Hộp",
                 "productName": "Paracetamol", "expiryDate": "2026-01-01"},
                {"outboundDetailsId": 2, "lotId": 4, "lotNumber": "L4", "quantity": 1.0,
                 "unitPrice": 5.5, "totalPrice": 5.5, "unitType": "Hộp",
                 "productName": "Vitamin C", "expiryDate": "2026-02-01"}
            ]
        });

        let item: OutboundItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.status, OutboundStatus::InProgress);
        assert!((item.total_amount() - 25.5).abs() < f64::EPSILON);
    }
}
