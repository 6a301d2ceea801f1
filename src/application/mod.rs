//! Application services: read-side payload builders, admin writes and the
//! repository seams they run against.

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod items;
pub mod pagination;
pub mod repos;
pub mod tag_index;
