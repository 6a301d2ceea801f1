//! Write-side shapes for content records.
//!
//! Drafts are what admin clients submit. Each one names the tags (and, for
//! events, the speakers) it should be linked to by id. A stored record can be
//! turned back into its draft, which is how partial updates are merged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::entities::{
    BlogPostRecord, ContentRecord, DEFAULT_POSITION_RANK, EventGalleryImage, EventRecord,
    EventResource, EventTechTag, ProjectRecord, RoadmapRecord, SpeakerRecord, TagRecord,
    TeamMemberRecord,
};
use super::error::DomainError;
use super::types::{EventMode, ItemKind};

const MAX_URL_LEN: usize = 500;
const MAX_SOCIAL_URL_LEN: usize = 200;
const MAX_AUTHOR_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPostDraft {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapDraft {
    pub icon_name: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

fn default_rank() -> i32 {
    DEFAULT_POSITION_RANK
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMemberDraft {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub skills: String,
    #[serde(default = "default_rank")]
    pub position_rank: i32,
    #[serde(default)]
    pub github_url: String,
    #[serde(default)]
    pub linkedin_url: String,
    #[serde(default)]
    pub instagram_url: String,
    #[serde(default)]
    pub twitter_url: String,
    #[serde(default)]
    pub website_url: String,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub event_date: Option<OffsetDateTime>,
    #[serde(default = "default_true")]
    pub requires_registration: bool,
    #[serde(default)]
    pub registration_link: Option<String>,
    #[serde(default)]
    pub mode: EventMode,
    #[serde(default)]
    pub location_address: String,
    #[serde(default)]
    pub meeting_link: String,
    #[serde(default)]
    pub tech_tags: Vec<EventTechTag>,
    #[serde(default)]
    pub gallery_images: Vec<EventGalleryImage>,
    #[serde(default)]
    pub resources: Vec<EventResource>,
    #[serde(default)]
    pub speaker_ids: Vec<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentDraft {
    Blog(BlogPostDraft),
    Project(ProjectDraft),
    Event(EventDraft),
    Roadmap(RoadmapDraft),
    Team(TeamMemberDraft),
}

/// A draft type bound to the collection it writes to.
pub trait KindedDraft: DeserializeOwned + Into<ContentDraft> + Send + 'static {
    const KIND: ItemKind;
}

macro_rules! kinded_draft {
    ($draft:ty, $variant:ident, $kind:expr) => {
        impl KindedDraft for $draft {
            const KIND: ItemKind = $kind;
        }

        impl From<$draft> for ContentDraft {
            fn from(draft: $draft) -> Self {
                ContentDraft::$variant(draft)
            }
        }
    };
}

kinded_draft!(BlogPostDraft, Blog, ItemKind::Blogs);
kinded_draft!(ProjectDraft, Project, ItemKind::Projects);
kinded_draft!(EventDraft, Event, ItemKind::Events);
kinded_draft!(RoadmapDraft, Roadmap, ItemKind::Roadmaps);
kinded_draft!(TeamMemberDraft, Team, ItemKind::Team);

impl ContentDraft {
    pub fn kind(&self) -> ItemKind {
        match self {
            ContentDraft::Blog(_) => ItemKind::Blogs,
            ContentDraft::Project(_) => ItemKind::Projects,
            ContentDraft::Event(_) => ItemKind::Events,
            ContentDraft::Roadmap(_) => ItemKind::Roadmaps,
            ContentDraft::Team(_) => ItemKind::Team,
        }
    }

    pub fn tag_ids(&self) -> &[i64] {
        match self {
            ContentDraft::Blog(d) => &d.tag_ids,
            ContentDraft::Project(d) => &d.tag_ids,
            ContentDraft::Event(d) => &d.tag_ids,
            ContentDraft::Roadmap(d) => &d.tag_ids,
            ContentDraft::Team(d) => &d.tag_ids,
        }
    }

    pub fn speaker_ids(&self) -> &[i64] {
        match self {
            ContentDraft::Event(d) => &d.speaker_ids,
            _ => &[],
        }
    }

    /// Parse a JSON object as the draft for `kind`.
    pub fn from_value(kind: ItemKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ItemKind::Blogs => ContentDraft::Blog(serde_json::from_value(value)?),
            ItemKind::Projects => ContentDraft::Project(serde_json::from_value(value)?),
            ItemKind::Events => ContentDraft::Event(serde_json::from_value(value)?),
            ItemKind::Roadmaps => ContentDraft::Roadmap(serde_json::from_value(value)?),
            ItemKind::Team => ContentDraft::Team(serde_json::from_value(value)?),
        })
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            ContentDraft::Blog(d) => serde_json::to_value(d),
            ContentDraft::Project(d) => serde_json::to_value(d),
            ContentDraft::Event(d) => serde_json::to_value(d),
            ContentDraft::Roadmap(d) => serde_json::to_value(d),
            ContentDraft::Team(d) => serde_json::to_value(d),
        }
    }

    /// Apply a partial JSON object on top of this draft.
    pub fn merge_patch(&self, patch: Value) -> Result<Self, serde_json::Error> {
        let mut base = self.to_value()?;
        if let (Value::Object(target), Value::Object(changes)) = (&mut base, patch) {
            for (key, value) in changes {
                target.insert(key, value);
            }
        }
        Self::from_value(self.kind(), base)
    }

    /// Fill timestamps a client may omit.
    pub fn with_default_dates(mut self, now: OffsetDateTime) -> Self {
        match &mut self {
            ContentDraft::Blog(d) => {
                d.published_date.get_or_insert(now);
            }
            ContentDraft::Project(d) => {
                d.published_date.get_or_insert(now);
            }
            ContentDraft::Roadmap(d) => {
                d.published_date.get_or_insert(now);
            }
            ContentDraft::Event(d) => {
                d.event_date.get_or_insert(now);
            }
            ContentDraft::Team(_) => {}
        }
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            ContentDraft::Blog(d) => {
                require("title", &d.title, 200)?;
                require("summary", &d.summary, usize::MAX)?;
                limit("image_url", &d.image_url, MAX_URL_LEN)?;
                limit("author_name", &d.author_name, MAX_AUTHOR_LEN)
            }
            ContentDraft::Project(d) => {
                require("title", &d.title, 100)?;
                require("description", &d.description, usize::MAX)?;
                limit("image_url", &d.image_url, MAX_URL_LEN)?;
                limit("author_name", &d.author_name, MAX_AUTHOR_LEN)
            }
            ContentDraft::Roadmap(d) => {
                require("icon_name", &d.icon_name, 50)?;
                require("title", &d.title, 100)?;
                require("description", &d.description, usize::MAX)?;
                limit("author_name", &d.author_name, MAX_AUTHOR_LEN)
            }
            ContentDraft::Team(d) => {
                require("name", &d.name, 100)?;
                require("role", &d.role, 100)?;
                limit("photo_url", &d.photo_url, MAX_URL_LEN)?;
                if d.position_rank < 0 {
                    return Err(DomainError::validation(
                        "position_rank",
                        "must not be negative",
                    ));
                }
                for (field, value) in [
                    ("github_url", &d.github_url),
                    ("linkedin_url", &d.linkedin_url),
                    ("instagram_url", &d.instagram_url),
                    ("twitter_url", &d.twitter_url),
                    ("website_url", &d.website_url),
                ] {
                    limit(field, value, MAX_SOCIAL_URL_LEN)?;
                }
                Ok(())
            }
            ContentDraft::Event(d) => {
                require("title", &d.title, 150)?;
                require("summary", &d.summary, usize::MAX)?;
                limit("image_url", &d.image_url, MAX_URL_LEN)?;
                limit("author_name", &d.author_name, MAX_AUTHOR_LEN)?;
                limit("location_address", &d.location_address, 255)?;
                limit("meeting_link", &d.meeting_link, MAX_URL_LEN)?;
                if let Some(link) = d.registration_link.as_deref() {
                    limit("registration_link", link, MAX_URL_LEN)?;
                }
                for tag in &d.tech_tags {
                    require("tech_tags", &tag.name, 100)?;
                }
                for image in &d.gallery_images {
                    require("gallery_images", &image.image_url, MAX_URL_LEN)?;
                }
                for resource in &d.resources {
                    require("resources", &resource.label, 100)?;
                    require("resources", &resource.url, MAX_URL_LEN)?;
                }
                Ok(())
            }
        }
    }
}

impl ContentDraft {
    /// Materialise the draft as a stored record with the given id and links.
    pub fn into_record(
        self,
        id: i64,
        tags: Vec<TagRecord>,
        speakers: Vec<SpeakerRecord>,
    ) -> ContentRecord {
        match self {
            ContentDraft::Blog(d) => ContentRecord::Blog(BlogPostRecord {
                id,
                title: d.title,
                summary: d.summary,
                content: d.content,
                image_url: d.image_url,
                author_name: d.author_name,
                published_date: d.published_date,
                tags,
            }),
            ContentDraft::Project(d) => ContentRecord::Project(ProjectRecord {
                id,
                title: d.title,
                description: d.description,
                content: d.content,
                image_url: d.image_url,
                author_name: d.author_name,
                published_date: d.published_date,
                tags,
            }),
            ContentDraft::Roadmap(d) => ContentRecord::Roadmap(RoadmapRecord {
                id,
                icon_name: d.icon_name,
                title: d.title,
                description: d.description,
                content: d.content,
                author_name: d.author_name,
                published_date: d.published_date,
                tags,
            }),
            ContentDraft::Team(d) => ContentRecord::Team(TeamMemberRecord {
                id,
                name: d.name,
                role: d.role,
                photo_url: d.photo_url,
                bio: d.bio,
                skills: d.skills,
                position_rank: d.position_rank,
                github_url: d.github_url,
                linkedin_url: d.linkedin_url,
                instagram_url: d.instagram_url,
                twitter_url: d.twitter_url,
                website_url: d.website_url,
                tags,
            }),
            ContentDraft::Event(d) => ContentRecord::Event(EventRecord {
                id,
                title: d.title,
                summary: d.summary,
                content: d.content,
                image_url: d.image_url,
                author_name: d.author_name,
                event_date: d.event_date.unwrap_or_else(OffsetDateTime::now_utc),
                speakers,
                requires_registration: d.requires_registration,
                registration_link: d.registration_link,
                mode: d.mode,
                location_address: d.location_address,
                meeting_link: d.meeting_link,
                tech_tags: d.tech_tags,
                gallery_images: d.gallery_images,
                resources: d.resources,
                tags,
            }),
        }
    }
}

fn require(field: &'static str, value: &str, max: usize) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    limit(field, value, max)
}

fn limit(field: &'static str, value: &str, max: usize) -> Result<(), DomainError> {
    if value.chars().count() > max {
        return Err(DomainError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

fn tag_ids_of(record: &ContentRecord) -> Vec<i64> {
    record.tags().iter().map(|tag| tag.id).collect()
}

impl From<&ContentRecord> for ContentDraft {
    fn from(record: &ContentRecord) -> Self {
        let tag_ids = tag_ids_of(record);
        match record {
            ContentRecord::Blog(BlogPostRecord {
                title,
                summary,
                content,
                image_url,
                author_name,
                published_date,
                ..
            }) => ContentDraft::Blog(BlogPostDraft {
                title: title.clone(),
                summary: summary.clone(),
                content: content.clone(),
                image_url: image_url.clone(),
                author_name: author_name.clone(),
                published_date: *published_date,
                tag_ids,
            }),
            ContentRecord::Project(ProjectRecord {
                title,
                description,
                content,
                image_url,
                author_name,
                published_date,
                ..
            }) => ContentDraft::Project(ProjectDraft {
                title: title.clone(),
                description: description.clone(),
                content: content.clone(),
                image_url: image_url.clone(),
                author_name: author_name.clone(),
                published_date: *published_date,
                tag_ids,
            }),
            ContentRecord::Roadmap(RoadmapRecord {
                icon_name,
                title,
                description,
                content,
                author_name,
                published_date,
                ..
            }) => ContentDraft::Roadmap(RoadmapDraft {
                icon_name: icon_name.clone(),
                title: title.clone(),
                description: description.clone(),
                content: content.clone(),
                author_name: author_name.clone(),
                published_date: *published_date,
                tag_ids,
            }),
            ContentRecord::Team(member) => ContentDraft::Team(team_draft(member, tag_ids)),
            ContentRecord::Event(event) => ContentDraft::Event(event_draft(event, tag_ids)),
        }
    }
}

fn team_draft(member: &TeamMemberRecord, tag_ids: Vec<i64>) -> TeamMemberDraft {
    TeamMemberDraft {
        name: member.name.clone(),
        role: member.role.clone(),
        photo_url: member.photo_url.clone(),
        bio: member.bio.clone(),
        skills: member.skills.clone(),
        position_rank: member.position_rank,
        github_url: member.github_url.clone(),
        linkedin_url: member.linkedin_url.clone(),
        instagram_url: member.instagram_url.clone(),
        twitter_url: member.twitter_url.clone(),
        website_url: member.website_url.clone(),
        tag_ids,
    }
}

fn event_draft(event: &EventRecord, tag_ids: Vec<i64>) -> EventDraft {
    EventDraft {
        title: event.title.clone(),
        summary: event.summary.clone(),
        content: event.content.clone(),
        image_url: event.image_url.clone(),
        author_name: event.author_name.clone(),
        event_date: Some(event.event_date),
        requires_registration: event.requires_registration,
        registration_link: event.registration_link.clone(),
        mode: event.mode,
        location_address: event.location_address.clone(),
        meeting_link: event.meeting_link.clone(),
        tech_tags: event.tech_tags.clone(),
        gallery_images: event.gallery_images.clone(),
        resources: event.resources.clone(),
        speaker_ids: event.speakers.iter().map(|speaker| speaker.id).collect(),
        tag_ids,
    }
}

/// Fields accepted when creating or updating a speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerDraft {
    pub name: String,
    pub profile_image: String,
    pub bio: String,
    #[serde(default)]
    pub social_link: Option<String>,
}

impl SpeakerDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        require("name", &self.name, 100)?;
        require("profile_image", &self.profile_image, MAX_URL_LEN)?;
        require("bio", &self.bio, usize::MAX)?;
        if let Some(link) = self.social_link.as_deref() {
            limit("social_link", link, MAX_URL_LEN)?;
        }
        Ok(())
    }
}
