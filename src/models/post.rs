// Blog content models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published or draft post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub slug: Option<String>,
    pub content: String,
    pub summary: Option<String>,
    pub cover_image: Option<String>,
    pub category: Option<Category>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub views: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub name: String,
}

/// A comment on a post; `parent_id` links replies to their parent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub post_id: u64,
    pub author: String,
    pub content: String,
    pub parent_id: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One page of a paginated listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

/// Fields accepted by the post create/update endpoints
#[derive(Debug, Clone, Serialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag_ids: Vec<u64>,
}

/// Fields accepted by the comment creation endpoint
#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_deserializes_sparse_payload() {
        let post: Post = serde_json::from_str(
            r#"{"id": 1, "title": "Hello", "content": "First post."}"#,
        )
        .unwrap();

        assert_eq!(post.id, 1);
        assert_eq!(post.title, "Hello");
        assert!(post.tags.is_empty());
        assert_eq!(post.views, 0);
        assert!(post.category.is_none());
    }

    #[test]
    fn test_page_deserializes() {
        let page: Page<Post> = serde_json::from_str(
            r#"{
                "items": [{"id": 1, "title": "Hello", "content": "x"}],
                "total": 41,
                "page": 1,
                "page_size": 20
            }"#,
        )
        .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 41);
    }

    #[test]
    fn test_post_draft_omits_empty_optionals() {
        let draft = PostDraft {
            title: "t".to_string(),
            content: "c".to_string(),
            summary: None,
            category_id: None,
            tag_ids: Vec::new(),
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value, serde_json::json!({"title": "t", "content": "c"}));
    }
}
