use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identity block of a résumé. Copied verbatim from the profile on every generation.
///
/// Nullable fields serialize as explicit `null`, never omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
    pub x: Option<String>,
}

impl PersonalInfo {
    /// Returns the name of the first field that differs from `other`, if any.
    pub fn first_difference(&self, other: &PersonalInfo) -> Option<&'static str> {
        if self.full_name != other.full_name {
            Some("full_name")
        } else if self.email != other.email {
            Some("email")
        } else if self.phone != other.phone {
            Some("phone")
        } else if self.address != other.address {
            Some("address")
        } else if self.linkedin != other.linkedin {
            Some("linkedin")
        } else if self.facebook != other.facebook {
            Some("facebook")
        } else if self.x != other.x {
            Some("x")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Education {
    pub school: String,
    pub degree: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Skill {
    pub skill_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Certification {
    pub title: String,
    pub authority: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    #[serde(default)]
    pub used_skills: Vec<String>,
}

/// The structured résumé document: identity block plus ordered sections.
///
/// Serves both as the loop input (a candidate's full profile, or a previously
/// produced résumé being optimized) and as the loop output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResumeDocument {
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub experiences: Vec<Experience>,
    #[serde(default)]
    pub educations: Vec<Education>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub certifications: Vec<Certification>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// Everything known about the candidate. Immutable input to the loop.
pub type CandidateProfile = ResumeDocument;

/// A model-produced résumé that passed schema validation.
pub type CandidateResume = ResumeDocument;
