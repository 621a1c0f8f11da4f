//! Course types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub shortname: String,
    pub fullname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startdate: Option<i64>,
    /// Unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enddate: Option<i64>,
}

/// A section of a course with its activities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseContent {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub modules: Vec<CourseModule>,
}

/// A single activity or resource inside a course section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseModule {
    pub id: i64,
    pub name: String,
    pub instance: i64,
    pub modname: String,
    pub modplural: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
