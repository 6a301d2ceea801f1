//! Records returned by the repositories and serialized by the API.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::types::{EventMode, ItemKind, SearchDepth};

pub const DEFAULT_TAG_COLOR: &str = "#7da6ff";
pub const DEFAULT_POSITION_RANK: i32 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: TagRecord,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlogPostRecord {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub image_url: String,
    pub author_name: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_date: Option<OffsetDateTime>,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub content: String,
    pub image_url: String,
    pub author_name: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_date: Option<OffsetDateTime>,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadmapRecord {
    pub id: i64,
    pub icon_name: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author_name: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_date: Option<OffsetDateTime>,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "TeamMemberView")]
pub struct TeamMemberRecord {
    pub id: i64,
    pub name: String,
    pub role: String,
    pub photo_url: String,
    pub bio: String,
    /// Comma separated, as entered.
    pub skills: String,
    pub position_rank: i32,
    pub github_url: String,
    pub linkedin_url: String,
    pub instagram_url: String,
    pub twitter_url: String,
    pub website_url: String,
    pub tags: Vec<TagRecord>,
}

impl TeamMemberRecord {
    pub fn skills_list(&self) -> Vec<String> {
        split_skills(&self.skills)
    }
}

pub fn split_skills(skills: &str) -> Vec<String> {
    skills
        .split(',')
        .map(str::trim)
        .filter(|skill| !skill.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Serialize)]
struct TeamMemberView {
    id: i64,
    name: String,
    role: String,
    photo_url: String,
    bio: String,
    skills_list: Vec<String>,
    skills: String,
    position_rank: i32,
    github_url: String,
    linkedin_url: String,
    instagram_url: String,
    twitter_url: String,
    website_url: String,
    tags: Vec<TagRecord>,
}

impl From<TeamMemberRecord> for TeamMemberView {
    fn from(record: TeamMemberRecord) -> Self {
        Self {
            skills_list: record.skills_list(),
            id: record.id,
            name: record.name,
            role: record.role,
            photo_url: record.photo_url,
            bio: record.bio,
            skills: record.skills,
            position_rank: record.position_rank,
            github_url: record.github_url,
            linkedin_url: record.linkedin_url,
            instagram_url: record.instagram_url,
            twitter_url: record.twitter_url,
            website_url: record.website_url,
            tags: record.tags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeakerRecord {
    pub id: i64,
    pub name: String,
    pub profile_image: String,
    pub bio: String,
    pub social_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTechTag {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventGalleryImage {
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResource {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub image_url: String,
    pub author_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub event_date: OffsetDateTime,
    pub speakers: Vec<SpeakerRecord>,
    pub requires_registration: bool,
    pub registration_link: Option<String>,
    pub mode: EventMode,
    pub location_address: String,
    pub meeting_link: String,
    pub tech_tags: Vec<EventTechTag>,
    pub gallery_images: Vec<EventGalleryImage>,
    pub resources: Vec<EventResource>,
    pub tags: Vec<TagRecord>,
}

/// Any of the five content records, serialized as the bare record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentRecord {
    Blog(BlogPostRecord),
    Project(ProjectRecord),
    Event(EventRecord),
    Roadmap(RoadmapRecord),
    Team(TeamMemberRecord),
}

impl ContentRecord {
    pub fn kind(&self) -> ItemKind {
        match self {
            ContentRecord::Blog(_) => ItemKind::Blogs,
            ContentRecord::Project(_) => ItemKind::Projects,
            ContentRecord::Event(_) => ItemKind::Events,
            ContentRecord::Roadmap(_) => ItemKind::Roadmaps,
            ContentRecord::Team(_) => ItemKind::Team,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            ContentRecord::Blog(r) => r.id,
            ContentRecord::Project(r) => r.id,
            ContentRecord::Event(r) => r.id,
            ContentRecord::Roadmap(r) => r.id,
            ContentRecord::Team(r) => r.id,
        }
    }

    pub fn tags(&self) -> &[TagRecord] {
        match self {
            ContentRecord::Blog(r) => &r.tags,
            ContentRecord::Project(r) => &r.tags,
            ContentRecord::Event(r) => &r.tags,
            ContentRecord::Roadmap(r) => &r.tags,
            ContentRecord::Team(r) => &r.tags,
        }
    }

    pub fn tags_mut(&mut self) -> &mut Vec<TagRecord> {
        match self {
            ContentRecord::Blog(r) => &mut r.tags,
            ContentRecord::Project(r) => &mut r.tags,
            ContentRecord::Event(r) => &mut r.tags,
            ContentRecord::Roadmap(r) => &mut r.tags,
            ContentRecord::Team(r) => &mut r.tags,
        }
    }

    /// Publish date, or event date for events. Team members have none.
    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        match self {
            ContentRecord::Blog(r) => r.published_date,
            ContentRecord::Project(r) => r.published_date,
            ContentRecord::Event(r) => Some(r.event_date),
            ContentRecord::Roadmap(r) => r.published_date,
            ContentRecord::Team(_) => None,
        }
    }

    pub fn position_rank(&self) -> Option<i32> {
        match self {
            ContentRecord::Team(r) => Some(r.position_rank),
            _ => None,
        }
    }

    /// Values of the columns named by [`ItemKind::search_columns`], in the same order.
    pub fn search_fields(&self, depth: SearchDepth) -> Vec<&str> {
        let fields: Vec<&String> = match (self, depth) {
            (ContentRecord::Blog(r), SearchDepth::Summary) => vec![&r.title, &r.summary],
            (ContentRecord::Blog(r), SearchDepth::Full) => {
                vec![&r.title, &r.summary, &r.content, &r.author_name]
            }
            (ContentRecord::Project(r), SearchDepth::Summary) => vec![&r.title, &r.description],
            (ContentRecord::Project(r), SearchDepth::Full) => {
                vec![&r.title, &r.description, &r.content, &r.author_name]
            }
            (ContentRecord::Event(r), SearchDepth::Summary) => vec![&r.title, &r.summary],
            (ContentRecord::Event(r), SearchDepth::Full) => {
                vec![&r.title, &r.summary, &r.content, &r.author_name]
            }
            (ContentRecord::Roadmap(r), SearchDepth::Summary) => vec![&r.title, &r.description],
            (ContentRecord::Roadmap(r), SearchDepth::Full) => {
                vec![&r.title, &r.description, &r.content]
            }
            (ContentRecord::Team(r), SearchDepth::Summary) => vec![&r.name, &r.bio],
            (ContentRecord::Team(r), SearchDepth::Full) => {
                vec![&r.name, &r.role, &r.bio, &r.skills]
            }
        };
        fields.into_iter().map(String::as_str).collect()
    }

    /// Case-insensitive substring match over the searchable fields.
    pub fn matches_text(&self, needle: &str, depth: SearchDepth) -> bool {
        let needle = needle.to_lowercase();
        self.search_fields(depth)
            .into_iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

impl ItemKind {
    pub fn search_columns(self, depth: SearchDepth) -> &'static [&'static str] {
        match (self, depth) {
            (ItemKind::Blogs, SearchDepth::Summary) => &["title", "summary"],
            (ItemKind::Blogs, SearchDepth::Full) => &["title", "summary", "content", "author_name"],
            (ItemKind::Projects, SearchDepth::Summary) => &["title", "description"],
            (ItemKind::Projects, SearchDepth::Full) => {
                &["title", "description", "content", "author_name"]
            }
            (ItemKind::Events, SearchDepth::Summary) => &["title", "summary"],
            (ItemKind::Events, SearchDepth::Full) => {
                &["title", "summary", "content", "author_name"]
            }
            (ItemKind::Roadmaps, SearchDepth::Summary) => &["title", "description"],
            (ItemKind::Roadmaps, SearchDepth::Full) => &["title", "description", "content"],
            (ItemKind::Team, SearchDepth::Summary) => &["name", "bio"],
            (ItemKind::Team, SearchDepth::Full) => &["name", "role", "bio", "skills"],
        }
    }
}
