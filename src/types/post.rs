use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::user::User;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct Post {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) user_id: i64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) author: Option<User>,
}

#[derive(Debug, Clone)]
pub(crate) struct NewPost {
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) user_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PostFilter {
    pub(crate) user_id: Option<i64>,
    pub(crate) title: Option<String>,
    pub(crate) content: Option<String>,
}
