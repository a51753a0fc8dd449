// Post, category, tag, and comment endpoints

use serde_json::json;

use crate::error::ApiError;
use crate::gateway::RequestGateway;
use crate::models::post::{Category, Comment, NewComment, Page, Post, PostDraft, Tag};
use crate::transport::RequestDescriptor;

pub async fn list_posts(
    gateway: &RequestGateway,
    page: u64,
    page_size: u64,
) -> Result<Page<Post>, ApiError> {
    let value = gateway
        .dispatch(RequestDescriptor::get(format!(
            "/posts?page={}&page_size={}",
            page, page_size
        )))
        .await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn get_post(gateway: &RequestGateway, id: u64) -> Result<Post, ApiError> {
    let value = gateway
        .dispatch(RequestDescriptor::get(format!("/posts/{}", id)))
        .await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn create_post(gateway: &RequestGateway, draft: &PostDraft) -> Result<Post, ApiError> {
    let value = gateway
        .dispatch(RequestDescriptor::post("/posts").with_json(json!(draft)))
        .await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn update_post(
    gateway: &RequestGateway,
    id: u64,
    draft: &PostDraft,
) -> Result<Post, ApiError> {
    let value = gateway
        .dispatch(RequestDescriptor::put(format!("/posts/{}", id)).with_json(json!(draft)))
        .await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn delete_post(gateway: &RequestGateway, id: u64) -> Result<(), ApiError> {
    gateway
        .dispatch(RequestDescriptor::delete(format!("/posts/{}", id)))
        .await?;
    Ok(())
}

pub async fn list_categories(gateway: &RequestGateway) -> Result<Vec<Category>, ApiError> {
    let value = gateway
        .dispatch(RequestDescriptor::get("/categories"))
        .await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn list_tags(gateway: &RequestGateway) -> Result<Vec<Tag>, ApiError> {
    let value = gateway.dispatch(RequestDescriptor::get("/tags")).await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn list_comments(gateway: &RequestGateway, post_id: u64) -> Result<Vec<Comment>, ApiError> {
    let value = gateway
        .dispatch(RequestDescriptor::get(format!("/posts/{}/comments", post_id)))
        .await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn create_comment(
    gateway: &RequestGateway,
    post_id: u64,
    comment: &NewComment,
) -> Result<Comment, ApiError> {
    let value = gateway
        .dispatch(
            RequestDescriptor::post(format!("/posts/{}/comments", post_id))
                .with_json(json!(comment)),
        )
        .await?;
    Ok(serde_json::from_value(value)?)
}
