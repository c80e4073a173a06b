use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Queryable, Selectable, Debug, Serialize, Clone)]
#[diesel(table_name = crate::schema::article)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Article {
    pub id: i32,
    pub link: String,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub lean: Option<String>,
    pub origin: String,
    pub author: Option<String>,
    pub section: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::article)]
pub struct NewArticle {
    pub link: String,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub lean: Option<String>,
    pub origin: String,
    pub author: Option<String>,
    pub section: Option<String>,
}
