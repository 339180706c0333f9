//! Mapping between records and Firestore documents.

use std::collections::HashMap;

use avanim_models::{
    Animation, AnimationId, AnimationStatus, Avatar, AvatarId, Expression, Role,
    SubscriptionStatus, User, UserId,
};
use chrono::{DateTime, Utc};

use super::types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
use crate::error::{StoreError, StoreResult};

pub const USERS: &str = "users";
pub const AVATARS: &str = "avatars";
pub const EXPRESSIONS: &str = "expressions";
pub const ANIMATIONS: &str = "animations";

type Fields = HashMap<String, Value>;

fn required<T: FromFirestoreValue>(doc: &Document, field: &str) -> StoreResult<T> {
    doc.get(field).ok_or_else(|| {
        StoreError::invalid_response(format!(
            "{} is missing field '{}'",
            doc.name.as_deref().unwrap_or("document"),
            field
        ))
    })
}

/// Document ID, preferring the stored field over the resource name.
fn record_id(doc: &Document, field: &str) -> StoreResult<String> {
    match doc.get::<String>(field) {
        Some(id) => Ok(id),
        None => doc
            .id()
            .map(str::to_string)
            .ok_or_else(|| StoreError::invalid_response(format!("document has no '{}'", field))),
    }
}

fn parse_enum<T: std::str::FromStr>(doc: &Document, field: &str) -> StoreResult<T>
where
    T::Err: std::fmt::Display,
{
    let raw: String = required(doc, field)?;
    raw.parse()
        .map_err(|e: T::Err| StoreError::invalid_response(e.to_string()))
}

// Users

pub fn user_fields(user: &User) -> Fields {
    HashMap::from([
        ("user_id".into(), user.user_id.as_str().to_firestore_value()),
        ("fullname".into(), user.fullname.to_firestore_value()),
        ("email".into(), user.email.to_firestore_value()),
        ("password_hash".into(), user.password_hash.to_firestore_value()),
        ("role".into(), user.role.as_str().to_firestore_value()),
        (
            "subscription_status".into(),
            user.subscription_status.as_str().to_firestore_value(),
        ),
        ("created_at".into(), user.created_at.to_firestore_value()),
    ])
}

pub fn user_from_document(doc: &Document) -> StoreResult<User> {
    Ok(User {
        user_id: UserId::from_string(record_id(doc, "user_id")?),
        fullname: required(doc, "fullname")?,
        email: required(doc, "email")?,
        password_hash: required(doc, "password_hash")?,
        role: parse_enum::<Role>(doc, "role")?,
        subscription_status: doc
            .get::<String>("subscription_status")
            .and_then(|s| s.parse::<SubscriptionStatus>().ok())
            .unwrap_or_default(),
        created_at: doc.get("created_at").unwrap_or_else(Utc::now),
    })
}

// Avatars

pub fn avatar_fields(avatar: &Avatar) -> Fields {
    HashMap::from([
        ("avatar_id".into(), avatar.avatar_id.as_str().to_firestore_value()),
        ("user_id".into(), avatar.user_id.as_str().to_firestore_value()),
        ("avatar_path".into(), avatar.avatar_path.to_firestore_value()),
        ("created_at".into(), avatar.created_at.to_firestore_value()),
    ])
}

pub fn avatar_from_document(doc: &Document) -> StoreResult<Avatar> {
    Ok(Avatar {
        avatar_id: AvatarId::from_string(record_id(doc, "avatar_id")?),
        user_id: UserId::from_string(required::<String>(doc, "user_id")?),
        avatar_path: required(doc, "avatar_path")?,
        created_at: doc.get("created_at").unwrap_or_else(Utc::now),
    })
}

// Expressions

pub fn expression_fields(expression: &Expression) -> Fields {
    HashMap::from([
        ("expression_id".into(), expression.expression_id.to_firestore_value()),
        ("expression_name".into(), expression.expression_name.to_firestore_value()),
        ("video_path".into(), expression.video_path.to_firestore_value()),
        ("description".into(), expression.description.to_firestore_value()),
    ])
}

pub fn expression_from_document(doc: &Document) -> StoreResult<Expression> {
    let expression_id = record_id(doc, "expression_id")?;
    Ok(Expression {
        expression_name: doc
            .get("expression_name")
            .unwrap_or_else(|| expression_id.clone()),
        video_path: required(doc, "video_path")?,
        description: doc.get("description").unwrap_or_default(),
        expression_id,
    })
}

// Animations

pub fn animation_fields(animation: &Animation) -> Fields {
    HashMap::from([
        ("animation_id".into(), animation.animation_id.as_str().to_firestore_value()),
        ("user_id".into(), animation.user_id.as_str().to_firestore_value()),
        ("avatar_id".into(), animation.avatar_id.as_str().to_firestore_value()),
        ("expression_id".into(), animation.expression_id.to_firestore_value()),
        ("driving_path".into(), animation.driving_path.to_firestore_value()),
        ("animation_path".into(), animation.animation_path.to_firestore_value()),
        ("status".into(), animation.status.as_str().to_firestore_value()),
        ("error_message".into(), animation.error_message.to_firestore_value()),
        ("created_at".into(), animation.created_at.to_firestore_value()),
        ("completed_at".into(), animation.completed_at.to_firestore_value()),
    ])
}

/// Fields touched by a status change.
pub const ANIMATION_STATUS_MASK: &[&str] = &["status", "error_message", "completed_at"];

pub fn animation_status_fields(
    status: AnimationStatus,
    error_message: Option<String>,
    completed_at: Option<DateTime<Utc>>,
) -> Fields {
    HashMap::from([
        ("status".into(), status.as_str().to_firestore_value()),
        ("error_message".into(), error_message.to_firestore_value()),
        ("completed_at".into(), completed_at.to_firestore_value()),
    ])
}

pub fn animation_from_document(doc: &Document) -> StoreResult<Animation> {
    Ok(Animation {
        animation_id: AnimationId::from_string(record_id(doc, "animation_id")?),
        user_id: UserId::from_string(required::<String>(doc, "user_id")?),
        avatar_id: AvatarId::from_string(required::<String>(doc, "avatar_id")?),
        expression_id: doc.get("expression_id"),
        driving_path: doc.get("driving_path"),
        animation_path: required(doc, "animation_path")?,
        status: doc
            .get::<String>("status")
            .map(|s| AnimationStatus::from_str_lossy(&s))
            .unwrap_or_default(),
        error_message: doc.get("error_message"),
        created_at: doc.get("created_at").unwrap_or_else(Utc::now),
        completed_at: doc.get("completed_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_document(fields: Fields, name: &str) -> Document {
        Document {
            name: Some(format!("projects/p/databases/(default)/documents/{}", name)),
            ..Document::new(fields)
        }
    }

    #[test]
    fn test_user_document_keeps_hash_and_role() {
        let user = User::new("Ada", "Ada@Example.com", "$argon2id$hash").with_role(Role::Admin);
        let doc = as_document(user_fields(&user), "users/x");

        let back = user_from_document(&doc).unwrap();
        assert_eq!(back.user_id, user.user_id);
        assert_eq!(back.email, "ada@example.com");
        assert_eq!(back.password_hash, "$argon2id$hash");
        assert_eq!(back.role, Role::Admin);
    }

    #[test]
    fn test_animation_nulls_read_as_none() {
        let animation = Animation::for_expression(UserId::new(), AvatarId::new(), "smile");
        let doc = as_document(animation_fields(&animation), "animations/x");

        let back = animation_from_document(&doc).unwrap();
        assert_eq!(back.expression_id.as_deref(), Some("smile"));
        assert!(back.driving_path.is_none());
        assert!(back.completed_at.is_none());
        assert_eq!(back.status, AnimationStatus::Processing);
    }

    #[test]
    fn test_expression_falls_back_to_document_id() {
        let mut fields = HashMap::new();
        fields.insert("video_path".to_string(), "expressions/wink.mp4".to_firestore_value());
        let doc = as_document(fields, "expressions/wink");

        let expression = expression_from_document(&doc).unwrap();
        assert_eq!(expression.expression_id, "wink");
        assert_eq!(expression.expression_name, "wink");
        assert!(expression.description.is_empty());
    }

    #[test]
    fn test_bad_role_is_invalid_response() {
        let user = User::new("Ada", "ada@example.com", "hash");
        let mut fields = user_fields(&user);
        fields.insert("role".into(), "overlord".to_firestore_value());

        let err = user_from_document(&as_document(fields, "users/x")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidResponse(_)));
    }
}
