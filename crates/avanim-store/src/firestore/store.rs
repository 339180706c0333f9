//! [`Store`] implementation on Firestore.

use std::collections::HashMap;

use async_trait::async_trait;
use avanim_models::user::normalize_email;
use avanim_models::{
    Animation, AnimationId, AnimationStatus, Avatar, AvatarId, Expression, Role,
    SubscriptionStatus, User, UserId,
};
use chrono::Utc;
use tracing::{debug, info};

use super::client::FirestoreClient;
use super::records::{self, ANIMATIONS, AVATARS, EXPRESSIONS, USERS};
use super::types::{Document, StructuredQuery, ToFirestoreValue};
use crate::error::{StoreError, StoreResult};
use crate::store::{ProfileUpdate, Store};

/// Firestore-backed store.
///
/// Documents are keyed by record ID in the `users`, `avatars`, `expressions`
/// and `animations` collections. Ordering is applied client side so that no
/// composite indexes are needed.
#[derive(Clone)]
pub struct FirestoreStore {
    client: FirestoreClient,
}

impl FirestoreStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn from_env() -> StoreResult<Self> {
        let client = FirestoreClient::from_env().await?;
        info!(
            project_id = %client.config().project_id,
            emulator = client.config().emulator_host.is_some(),
            "Connected Firestore store"
        );
        Ok(Self::new(client))
    }

    async fn get<T>(
        &self,
        collection: &str,
        id: &str,
        decode: fn(&Document) -> StoreResult<T>,
    ) -> StoreResult<Option<T>> {
        let doc = self
            .client
            .with_retry("get_document", || self.client.get_document(collection, id))
            .await?;
        doc.as_ref().map(decode).transpose()
    }

    async fn query_equals<T>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: Option<i32>,
        decode: fn(&Document) -> StoreResult<T>,
    ) -> StoreResult<Vec<T>> {
        let mut query = StructuredQuery::field_equals(collection, field, value.to_firestore_value());
        if let Some(limit) = limit {
            query = query.with_limit(limit);
        }
        let docs = self
            .client
            .with_retry("run_query", || self.client.run_query(query.clone()))
            .await?;
        docs.iter().map(decode).collect()
    }

    async fn list_all<T>(
        &self,
        collection: &str,
        decode: fn(&Document) -> StoreResult<T>,
    ) -> StoreResult<Vec<T>> {
        let docs = self.client.list_all_documents(collection).await?;
        docs.iter().map(decode).collect()
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.client
            .with_retry("delete_document", || self.client.delete_document(collection, id))
            .await
    }
}

fn newest_first<T>(mut items: Vec<T>, key: fn(&T) -> chrono::DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl Store for FirestoreStore {
    fn backend(&self) -> &'static str {
        "firestore"
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.client.list_documents(USERS, Some(1), None).await?;
        Ok(())
    }

    // Email uniqueness is checked with a query before the write, so two
    // concurrent sign-ups with one address can both succeed.
    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let email = normalize_email(&user.email);
        if self.find_user_by_email(&email).await?.is_some() {
            return Err(StoreError::already_exists(format!("user with email {email}")));
        }

        let mut user = user.clone();
        user.email = email;
        let fields = records::user_fields(&user);
        self.client
            .create_document(USERS, user.user_id.as_str(), fields)
            .await?;
        debug!(user_id = %user.user_id, "Created user");
        Ok(())
    }

    async fn get_user(&self, user_id: &UserId) -> StoreResult<Option<User>> {
        self.get(USERS, user_id.as_str(), records::user_from_document)
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        let mut users = self
            .query_equals(USERS, "email", &email, Some(1), records::user_from_document)
            .await?;
        Ok(users.pop())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = self.list_all(USERS, records::user_from_document).await?;
        Ok(newest_first(users, |u| u.created_at))
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> StoreResult<User> {
        let email = normalize_email(&update.email);
        if let Some(other) = self.find_user_by_email(&email).await? {
            if &other.user_id != user_id {
                return Err(StoreError::already_exists(format!("user with email {email}")));
            }
        }

        let fields = HashMap::from([
            ("fullname".to_string(), update.fullname.to_firestore_value()),
            ("email".to_string(), email.to_firestore_value()),
        ]);
        let doc = self
            .client
            .patch_document(
                USERS,
                user_id.as_str(),
                fields,
                Some(&["fullname", "email"][..]),
                true,
            )
            .await?;
        records::user_from_document(&doc)
    }

    async fn set_subscription(
        &self,
        user_id: &UserId,
        role: Option<Role>,
        status: SubscriptionStatus,
    ) -> StoreResult<User> {
        let mut fields = HashMap::from([(
            "subscription_status".to_string(),
            status.as_str().to_firestore_value(),
        )]);
        let mut mask = vec!["subscription_status"];
        if let Some(role) = role {
            fields.insert("role".to_string(), role.as_str().to_firestore_value());
            mask.push("role");
        }

        let doc = self
            .client
            .patch_document(USERS, user_id.as_str(), fields, Some(mask.as_slice()), true)
            .await?;
        records::user_from_document(&doc)
    }

    async fn delete_user(&self, user_id: &UserId) -> StoreResult<()> {
        self.delete(USERS, user_id.as_str()).await
    }

    async fn create_avatar(&self, avatar: &Avatar) -> StoreResult<()> {
        self.client
            .create_document(AVATARS, avatar.avatar_id.as_str(), records::avatar_fields(avatar))
            .await?;
        Ok(())
    }

    async fn get_avatar(&self, avatar_id: &AvatarId) -> StoreResult<Option<Avatar>> {
        self.get(AVATARS, avatar_id.as_str(), records::avatar_from_document)
            .await
    }

    async fn list_avatars(&self, owner: Option<&UserId>) -> StoreResult<Vec<Avatar>> {
        let avatars = match owner {
            Some(owner) => {
                self.query_equals(
                    AVATARS,
                    "user_id",
                    owner.as_str(),
                    None,
                    records::avatar_from_document,
                )
                .await?
            }
            None => self.list_all(AVATARS, records::avatar_from_document).await?,
        };
        Ok(newest_first(avatars, |a| a.created_at))
    }

    async fn delete_avatar(&self, avatar_id: &AvatarId) -> StoreResult<()> {
        self.delete(AVATARS, avatar_id.as_str()).await
    }

    async fn upsert_expression(&self, expression: &Expression) -> StoreResult<()> {
        let fields = records::expression_fields(expression);
        self.client
            .with_retry("patch_document", || {
                self.client.patch_document(
                    EXPRESSIONS,
                    &expression.expression_id,
                    fields.clone(),
                    None,
                    false,
                )
            })
            .await?;
        Ok(())
    }

    async fn get_expression(&self, expression_id: &str) -> StoreResult<Option<Expression>> {
        self.get(EXPRESSIONS, expression_id, records::expression_from_document)
            .await
    }

    async fn list_expressions(&self) -> StoreResult<Vec<Expression>> {
        let mut expressions = self
            .list_all(EXPRESSIONS, records::expression_from_document)
            .await?;
        expressions.sort_by(|a, b| a.expression_name.cmp(&b.expression_name));
        Ok(expressions)
    }

    async fn create_animation(&self, animation: &Animation) -> StoreResult<()> {
        self.client
            .create_document(
                ANIMATIONS,
                animation.animation_id.as_str(),
                records::animation_fields(animation),
            )
            .await?;
        Ok(())
    }

    async fn get_animation(&self, animation_id: &AnimationId) -> StoreResult<Option<Animation>> {
        self.get(ANIMATIONS, animation_id.as_str(), records::animation_from_document)
            .await
    }

    async fn list_animations(&self, user_id: &UserId) -> StoreResult<Vec<Animation>> {
        let animations = self
            .query_equals(
                ANIMATIONS,
                "user_id",
                user_id.as_str(),
                None,
                records::animation_from_document,
            )
            .await?;
        Ok(newest_first(animations, |a| a.created_at))
    }

    async fn update_animation_status(
        &self,
        animation_id: &AnimationId,
        status: AnimationStatus,
        error_message: Option<String>,
    ) -> StoreResult<Animation> {
        let completed_at = status.is_terminal().then(Utc::now);
        let fields = records::animation_status_fields(status, error_message, completed_at);
        let doc = self
            .client
            .with_retry("patch_document", || {
                self.client.patch_document(
                    ANIMATIONS,
                    animation_id.as_str(),
                    fields.clone(),
                    Some(records::ANIMATION_STATUS_MASK),
                    true,
                )
            })
            .await?;
        records::animation_from_document(&doc)
    }

    async fn delete_animation(&self, animation_id: &AnimationId) -> StoreResult<()> {
        self.delete(ANIMATIONS, animation_id.as_str()).await
    }
}
