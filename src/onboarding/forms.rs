//! Onboarding forms, one per step.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail, ValidationError};

use crate::profile::ProfileDetails;

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{6,19}$").unwrap());

// Optional text fields accept blank input, stored as absent by `apply`.

fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() || email.to_owned().validate_email() {
        Ok(())
    } else {
        Err(ValidationError::new("email"))
    }
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let phone = phone.trim();
    if phone.is_empty() || PHONE.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("phone"))
    }
}

fn is_web_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

fn validate_url(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || is_web_url(value) {
        Ok(())
    } else {
        Err(ValidationError::new("url"))
    }
}

fn validate_urls(urls: &Vec<String>) -> Result<(), ValidationError> {
    if urls.iter().all(|u| is_web_url(u)) {
        Ok(())
    } else {
        Err(ValidationError::new("url"))
    }
}

fn validate_tags(tags: &Vec<String>) -> Result<(), ValidationError> {
    if tags.iter().all(|t| !t.trim().is_empty() && t.len() <= 100) {
        Ok(())
    } else {
        Err(ValidationError::new("tag"))
    }
}

/// Drop blank strings so that they are stored as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Trimmed tags without duplicates, first occurrence order.
fn tags(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_owned())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Contact step.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactForm {
    #[validate(custom(function = "validate_email", message = "Email must be formatted."))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_phone", message = "Phone number is invalid."))]
    pub phone: Option<String>,
    #[validate(custom(function = "validate_phone", message = "WhatsApp number is invalid."))]
    pub whatsapp: Option<String>,
    #[validate(length(max = 255, message = "Address must be at most 255 characters long."))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

impl ContactForm {
    pub fn apply(self, details: &mut ProfileDetails) {
        details.contact_email = non_blank(self.email);
        details.contact_phone = non_blank(self.phone);
        details.whatsapp = non_blank(self.whatsapp);
        details.address = non_blank(self.address);
        details.city = non_blank(self.city);
        details.country = non_blank(self.country);
    }
}

/// Personal and career information step.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct InformationForm {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters long."))]
    pub full_name_english: String,
    #[validate(length(max = 100))]
    pub full_name_arabic: Option<String>,
    #[validate(length(max = 20))]
    pub prefix: Option<String>,
    #[validate(length(max = 50))]
    pub career_stage: Option<String>,
    #[validate(length(max = 100))]
    pub position: Option<String>,
    #[validate(length(max = 150))]
    pub institution: Option<String>,
    #[validate(length(max = 100))]
    pub work_country: Option<String>,
    #[validate(length(max = 100))]
    pub spouse_name: Option<String>,
    #[validate(range(min = 0, max = 30, message = "Children count is out of range."))]
    pub children_count: Option<i32>,
    #[validate(length(max = 10), custom(function = "validate_urls", message = "Photos must be URLs."))]
    pub photos: Vec<String>,
}

impl InformationForm {
    pub fn apply(self, details: &mut ProfileDetails) {
        details.full_name_english = self.full_name_english.trim().to_owned();
        details.full_name_arabic = non_blank(self.full_name_arabic);
        details.prefix = non_blank(self.prefix);
        details.career_stage = non_blank(self.career_stage);
        details.position = non_blank(self.position);
        details.institution = non_blank(self.institution);
        details.work_country = non_blank(self.work_country);
        details.spouse_name = non_blank(self.spouse_name);
        details.children_count = self.children_count;
        details.photos = self.photos;
    }
}

/// Education, subspecialty and research step.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct EducationForm {
    #[validate(length(max = 50))]
    pub education_level: Option<String>,
    #[validate(length(min = 2, max = 150, message = "University is required."))]
    pub university: String,
    #[validate(length(min = 2, max = 100, message = "Graduation country is required."))]
    pub graduation_country: String,
    #[validate(range(min = 1950, max = 2100, message = "Graduation year is out of range."))]
    pub graduation_year: i32,
    #[validate(custom(function = "validate_tags"))]
    pub qualifications: Vec<String>,
    #[validate(custom(function = "validate_tags"))]
    pub subspecialties: Vec<String>,
    #[validate(length(max = 150))]
    pub subspecialty_certification: Option<String>,
    #[validate(length(max = 2000))]
    pub research_interests: Option<String>,
    #[validate(length(max = 5000))]
    pub publications: Option<String>,
}

impl EducationForm {
    pub fn apply(self, details: &mut ProfileDetails) {
        details.education_level = non_blank(self.education_level);
        details.university = self.university.trim().to_owned();
        details.graduation_country = self.graduation_country.trim().to_owned();
        details.graduation_year = self.graduation_year;
        details.qualifications = tags(self.qualifications);
        details.subspecialties = tags(self.subspecialties);
        details.subspecialty_certification = non_blank(self.subspecialty_certification);
        details.research_interests = non_blank(self.research_interests);
        details.publications = non_blank(self.publications);
    }
}

/// Professional activity step.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityForm {
    #[validate(
        length(min = 1, max = 50, message = "Select at least one skill."),
        custom(function = "validate_tags")
    )]
    pub skills: Vec<String>,
}

impl ActivityForm {
    pub fn apply(self, details: &mut ProfileDetails) {
        details.skills = tags(self.skills);
    }
}

/// Attachments step. Files are uploaded elsewhere, only URLs are kept.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachmentForm {
    #[validate(custom(function = "validate_url", message = "CV must be an URL."))]
    pub cv_url: Option<String>,
    #[validate(length(max = 20), custom(function = "validate_urls", message = "Papers must be URLs."))]
    pub papers: Vec<String>,
}

impl AttachmentForm {
    pub fn apply(self, details: &mut ProfileDetails) {
        details.cv_url = non_blank(self.cv_url);
        details.papers = self.papers;
    }
}

/// Team equipment and system eligibility.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct EligibilityForm {
    #[validate(length(max = 50), custom(function = "validate_tags"))]
    pub systems: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_validation() {
        let form = ContactForm {
            email: Some("not-an-email".into()),
            phone: Some("abc".into()),
            ..Default::default()
        };
        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("phone"));

        let form = ContactForm {
            email: Some("doc@example.org".into()),
            phone: Some("+966 55 123 4567".into()),
            ..Default::default()
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_blank_optional_fields_pass_validation() {
        let form = ContactForm {
            email: Some(String::new()),
            phone: Some("  ".into()),
            whatsapp: Some(String::new()),
            ..Default::default()
        };
        assert!(form.validate().is_ok());

        let mut details = ProfileDetails::default();
        form.apply(&mut details);
        assert_eq!(details.contact_email, None);
        assert_eq!(details.contact_phone, None);
        assert_eq!(details.whatsapp, None);

        let form = AttachmentForm {
            cv_url: Some(String::new()),
            ..Default::default()
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_tags_are_a_set() {
        let mut details = ProfileDetails::default();
        ActivityForm {
            skills: vec![
                "PICU".into(),
                "neonatology".into(),
                " PICU".into(),
                "neonatology".into(),
            ],
        }
        .apply(&mut details);
        assert_eq!(details.skills, vec!["PICU".to_owned(), "neonatology".to_owned()]);
    }

    #[test]
    fn test_contact_blank_values_are_absent() {
        let mut details = ProfileDetails::default();
        ContactForm {
            email: Some("doc@example.org".into()),
            city: Some("   ".into()),
            ..Default::default()
        }
        .apply(&mut details);
        assert_eq!(details.contact_email.as_deref(), Some("doc@example.org"));
        assert_eq!(details.city, None);
    }

    #[test]
    fn test_education_ranges() {
        let form = EducationForm {
            university: "King Saud University".into(),
            graduation_country: "Saudi Arabia".into(),
            graduation_year: 1900,
            ..Default::default()
        };
        assert!(form.validate().unwrap_err().field_errors().contains_key("graduation_year"));
    }

    #[test]
    fn test_activity_requires_skill() {
        assert!(ActivityForm::default().validate().is_err());
        assert!(
            ActivityForm {
                skills: vec!["PICU".into()]
            }
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn test_attachment_urls() {
        let form = AttachmentForm {
            cv_url: Some("https://cdn.example.org/cv.pdf".into()),
            papers: vec!["ftp://example.org/paper.pdf".into()],
        };
        assert!(form.validate().unwrap_err().field_errors().contains_key("papers"));
    }
}
