//! 图库服务的请求/响应数据模型。

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 上传成功后服务端返回的图片记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub id: i64,
    pub sha256: String,
    pub original_filename: String,
    pub mime_type: String,
    pub ext: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub stored_path: String,
    /// 服务端写入时间（UTC，无时区后缀）。
    pub created_at: NaiveDateTime,
}

/// 检索结果。`score` 在列出全部图片时为空。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    #[serde(default)]
    pub score: Option<f64>,
    pub filename: String,
    pub mime_type: String,
    pub url: String,
    pub stored_path: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    pub(super) detail: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uploaded_image_with_naive_timestamp() {
        let json = r#"{
            "id": 7,
            "sha256": "ab12",
            "original_filename": "cat.jpg",
            "mime_type": "image/jpeg",
            "ext": "jpg",
            "size_bytes": 2048,
            "width": 300,
            "height": null,
            "stored_path": "data/images/ab12.jpg",
            "created_at": "2024-05-01T08:30:15.123456"
        }"#;

        let image: UploadedImage = serde_json::from_str(json).expect("valid payload");
        assert_eq!(image.id, 7);
        assert_eq!(image.width, Some(300));
        assert!(image.height.is_none());
        assert_eq!(image.created_at.format("%Y-%m-%d").to_string(), "2024-05-01");
    }

    #[test]
    fn search_result_score_may_be_missing_or_null() {
        let json = r#"[
            {"id": 1, "score": 0.87, "filename": "a.jpg", "mime_type": "image/jpeg", "url": "/images/1/raw", "stored_path": "a"},
            {"id": 2, "score": null, "filename": "b.png", "mime_type": "image/png", "url": "/images/2/raw", "stored_path": "b"},
            {"id": 3, "filename": "c.png", "mime_type": "image/png", "url": "/images/3/raw", "stored_path": "c"}
        ]"#;

        let results: Vec<SearchResult> = serde_json::from_str(json).expect("valid payload");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].score, Some(0.87));
        assert!(results[1].score.is_none());
        assert!(results[2].score.is_none());
    }
}
