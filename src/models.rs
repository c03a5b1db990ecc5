use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::messages;
use crate::store::StoreError;

pub const EMPTY_BODY: &str = "Message body cannot be empty";
pub const EMPTY_USERNAME: &str = "Username cannot be empty";

#[derive(Queryable, Selectable, Serialize, Debug, Clone, PartialEq)]
#[diesel(table_name = messages, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Message {
    pub id: i32,
    pub body: String,
    pub username: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub body: &'a str,
    pub username: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl<'a> NewMessage<'a> {
    /// Checks both fields and stamps the record with `now`.
    pub fn new(body: &'a str, username: &'a str, now: NaiveDateTime) -> Result<Self, StoreError> {
        Ok(NewMessage {
            body: validate_body(body)?,
            username: validate_username(username)?,
            created_at: now,
            updated_at: now,
        })
    }
}

/// A field is valid when something other than whitespace is left.
pub fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn validate_body(body: &str) -> Result<&str, StoreError> {
    if is_present(body) {
        Ok(body)
    } else {
        Err(StoreError::Validation(EMPTY_BODY))
    }
}

pub fn validate_username(username: &str) -> Result<&str, StoreError> {
    if is_present(username) {
        Ok(username)
    } else {
        Err(StoreError::Validation(EMPTY_USERNAME))
    }
}
