//! Site content entities

use crate::content::backend::OrderBy;
use crate::error::{Result, SiteError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four content collections managed from the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Projects,
    #[serde(alias = "posts")]
    Blog,
    Reviews,
    Partners,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Projects,
        ContentKind::Blog,
        ContentKind::Reviews,
        ContentKind::Partners,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Projects => "projects",
            ContentKind::Blog => "blog",
            ContentKind::Reviews => "reviews",
            ContentKind::Partners => "partners",
        }
    }

    /// `CREATE TABLE` statement for the kind's table
    pub fn ddl(&self) -> String {
        match self {
            ContentKind::Projects => table_ddl::<Project>(),
            ContentKind::Blog => table_ddl::<BlogPost>(),
            ContentKind::Reviews => table_ddl::<Review>(),
            ContentKind::Partners => table_ddl::<Partner>(),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = SiteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "projects" | "portfolio" => Ok(ContentKind::Projects),
            "blog" | "posts" => Ok(ContentKind::Blog),
            "reviews" => Ok(ContentKind::Reviews),
            "partners" => Ok(ContentKind::Partners),
            other => Err(SiteError::not_found(format!("unknown content kind '{other}'"))),
        }
    }
}

/// Table metadata and validation shared by all entities
pub trait ContentEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ContentKind;
    const TABLE: &'static str;

    /// Field the slug is derived from; `None` for entities without slugs
    const SLUG_SOURCE: Option<&'static str>;

    /// Listing order
    const ORDER: OrderBy;

    /// Columns stored as 0/1 and accepted by `toggle_field`
    const BOOLEAN_FIELDS: &'static [&'static str];

    /// Columns stored as JSON text
    const JSON_FIELDS: &'static [&'static str] = &[];

    /// Column names with their SQL declarations
    const COLUMNS: &'static [(&'static str, &'static str)];

    fn id(&self) -> &str;

    fn is_published(&self) -> bool;

    fn validate(&self) -> Result<()>;
}

pub fn table_ddl<E: ContentEntity>() -> String {
    let columns = E::COLUMNS
        .iter()
        .map(|(name, decl)| format!("{name} {decl}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({columns})", E::TABLE)
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SiteError::invalid_input(format!("{field} must not be empty")));
    }
    Ok(())
}

fn check_url(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(raw) if !raw.is_empty() => url::Url::parse(raw)
            .map(|_| ())
            .map_err(|e| SiteError::invalid_input(format!("{field} is not a valid URL: {e}"))),
        _ => Ok(()),
    }
}

const ID: (&str, &str) = ("id", "TEXT PRIMARY KEY");
const PUBLISHED: (&str, &str) = ("published", "INTEGER NOT NULL DEFAULT 0");
const CREATED_AT: (&str, &str) = ("created_at", "TEXT NOT NULL");
const UPDATED_AT: (&str, &str) = ("updated_at", "TEXT NOT NULL");

/// Portfolio project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub project_url: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl ContentEntity for Project {
    const KIND: ContentKind = ContentKind::Projects;
    const TABLE: &'static str = "projects";
    const SLUG_SOURCE: Option<&'static str> = Some("title");
    const ORDER: OrderBy = OrderBy::desc("created_at");
    const BOOLEAN_FIELDS: &'static [&'static str] = &["published", "featured"];
    const JSON_FIELDS: &'static [&'static str] = &["technologies"];
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ID,
        ("title", "TEXT NOT NULL"),
        ("slug", "TEXT NOT NULL UNIQUE"),
        ("description", "TEXT NOT NULL DEFAULT ''"),
        ("content", "TEXT"),
        ("image_url", "TEXT"),
        ("category", "TEXT"),
        ("technologies", "TEXT NOT NULL DEFAULT '[]'"),
        ("client", "TEXT"),
        ("project_url", "TEXT"),
        PUBLISHED,
        ("featured", "INTEGER NOT NULL DEFAULT 0"),
        CREATED_AT,
        UPDATED_AT,
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn is_published(&self) -> bool {
        self.published
    }

    fn validate(&self) -> Result<()> {
        require("title", &self.title)?;
        check_url("project_url", self.project_url.as_deref())
    }
}

/// Blog post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl ContentEntity for BlogPost {
    const KIND: ContentKind = ContentKind::Blog;
    const TABLE: &'static str = "blog_posts";
    const SLUG_SOURCE: Option<&'static str> = Some("title");
    const ORDER: OrderBy = OrderBy::desc("created_at");
    const BOOLEAN_FIELDS: &'static [&'static str] = &["published", "featured"];
    const JSON_FIELDS: &'static [&'static str] = &["tags"];
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ID,
        ("title", "TEXT NOT NULL"),
        ("slug", "TEXT NOT NULL UNIQUE"),
        ("excerpt", "TEXT"),
        ("content", "TEXT NOT NULL"),
        ("cover_image", "TEXT"),
        ("author", "TEXT"),
        ("tags", "TEXT NOT NULL DEFAULT '[]'"),
        PUBLISHED,
        ("featured", "INTEGER NOT NULL DEFAULT 0"),
        CREATED_AT,
        UPDATED_AT,
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn is_published(&self) -> bool {
        self.published
    }

    fn validate(&self) -> Result<()> {
        require("title", &self.title)?;
        require("content", &self.content)
    }
}

/// Client testimonial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub id: String,
    pub client_name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub content: String,
    pub rating: u8,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub display_order: i64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl ContentEntity for Review {
    const KIND: ContentKind = ContentKind::Reviews;
    const TABLE: &'static str = "reviews";
    const SLUG_SOURCE: Option<&'static str> = None;
    const ORDER: OrderBy = OrderBy::asc("display_order");
    const BOOLEAN_FIELDS: &'static [&'static str] = &["published"];
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ID,
        ("client_name", "TEXT NOT NULL"),
        ("company", "TEXT"),
        ("role", "TEXT"),
        ("content", "TEXT NOT NULL"),
        ("rating", "INTEGER NOT NULL"),
        ("avatar_url", "TEXT"),
        PUBLISHED,
        ("display_order", "INTEGER NOT NULL DEFAULT 0"),
        CREATED_AT,
        UPDATED_AT,
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn is_published(&self) -> bool {
        self.published
    }

    fn validate(&self) -> Result<()> {
        require("client_name", &self.client_name)?;
        require("content", &self.content)?;
        if !(1..=5).contains(&self.rating) {
            return Err(SiteError::invalid_input(format!(
                "rating must be between 1 and 5, got {}",
                self.rating
            )));
        }
        Ok(())
    }
}

/// Trusted partner logo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub display_order: i64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl ContentEntity for Partner {
    const KIND: ContentKind = ContentKind::Partners;
    const TABLE: &'static str = "partners";
    const SLUG_SOURCE: Option<&'static str> = None;
    const ORDER: OrderBy = OrderBy::asc("display_order");
    const BOOLEAN_FIELDS: &'static [&'static str] = &["published"];
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ID,
        ("name", "TEXT NOT NULL"),
        ("logo_url", "TEXT"),
        ("website_url", "TEXT"),
        PUBLISHED,
        ("display_order", "INTEGER NOT NULL DEFAULT 0"),
        CREATED_AT,
        UPDATED_AT,
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn is_published(&self) -> bool {
        self.published
    }

    fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        check_url("website_url", self.website_url.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("blog".parse::<ContentKind>().unwrap(), ContentKind::Blog);
        assert_eq!("posts".parse::<ContentKind>().unwrap(), ContentKind::Blog);
        assert_eq!(
            "portfolio".parse::<ContentKind>().unwrap(),
            ContentKind::Projects
        );
        assert!(matches!(
            "users".parse::<ContentKind>(),
            Err(SiteError::NotFound(_))
        ));
    }

    #[test]
    fn test_timestamps_serialize_fixed_width() {
        let partner: Partner = serde_json::from_value(json!({
            "id": "p1",
            "name": "Acme",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00.5+00:00",
        }))
        .unwrap();
        let value = serde_json::to_value(&partner).unwrap();
        assert_eq!(value["created_at"], "2024-03-01T10:00:00.000Z");
        assert_eq!(value["updated_at"], "2024-03-01T10:00:00.500Z");
    }

    #[test]
    fn test_review_rating_bounds() {
        let mut review: Review = serde_json::from_value(json!({
            "client_name": "Dana",
            "content": "Great work",
            "rating": 5,
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z",
        }))
        .unwrap();
        assert!(review.validate().is_ok());

        review.rating = 0;
        assert!(matches!(review.validate(), Err(SiteError::InvalidInput(_))));
    }

    #[test]
    fn test_partner_website_must_be_url() {
        let partner: Partner = serde_json::from_value(json!({
            "name": "Acme",
            "website_url": "not a url",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z",
        }))
        .unwrap();
        assert!(partner.validate().is_err());
    }

    #[test]
    fn test_table_ddl() {
        let ddl = ContentKind::Partners.ddl();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS partners ("));
        assert!(ddl.contains("id TEXT PRIMARY KEY"));
        assert!(ddl.contains("display_order INTEGER NOT NULL DEFAULT 0"));
    }
}
