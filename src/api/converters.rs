//! Model → response conversions

use super::dto::*;
use crate::data::{PostDetail, User};
use crate::service::SearchHit;

pub fn user_to_response(user: &User) -> UserResponse {
    UserResponse {
        id: user.id.clone(),
        username: user.username.clone(),
    }
}

pub fn post_detail_to_response(detail: &PostDetail, collectors: &[User]) -> PostResponse {
    PostResponse {
        id: detail.post.id.clone(),
        user_id: detail.post.user_id.clone(),
        author: detail.author.clone(),
        title: detail.title.clone(),
        quote: detail.post.quote.clone(),
        latitude: detail.post.latitude,
        longitude: detail.post.longitude,
        address: detail.post.address.clone(),
        filename: detail.post.filename.clone(),
        thumbnail_url: detail.post.thumbnail_url.clone(),
        photo_url: detail.post.photo_url.clone(),
        added: detail.post.added,
        in_collection: collectors.iter().map(user_to_response).collect(),
    }
}

pub fn search_hit_to_response(hit: &SearchHit) -> SearchHitResponse {
    SearchHitResponse {
        found_in: hit.found_in.map(|field| field.as_str()),
        post: SearchPostResponse {
            id: hit.detail.post.id.clone(),
            user_id: hit.detail.post.user_id.clone(),
            author: hit.detail.author.clone(),
            title: hit.detail.title.clone(),
            quote: hit.detail.post.quote.clone(),
            latitude: hit.detail.post.latitude,
            longitude: hit.detail.post.longitude,
            address: hit.detail.post.address.clone(),
            filename: hit.detail.post.filename.clone(),
            thumbnail_url: hit.detail.post.thumbnail_url.clone(),
        },
    }
}

pub fn collection_to_response(user: &User, collection: &[PostDetail]) -> CollectionResponse {
    CollectionResponse {
        id: user.id.clone(),
        username: user.username.clone(),
        collection: collection
            .iter()
            .map(|detail| CollectedPostResponse {
                id: detail.post.id.clone(),
                author: detail.author.clone(),
                title: detail.title.clone(),
            })
            .collect(),
    }
}
