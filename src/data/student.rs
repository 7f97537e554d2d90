use crate::data::{StudentId, avatar::Avatar};
use email_address::EmailAddress;
use maud::{Markup, Render, html};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    pub const ALL: [Self; 3] = [Self::Male, Self::Female, Self::Other];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            _ => Err(format!("unknown gender {s:?}")),
        }
    }
}

impl TryFrom<String> for Gender {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Gender> for String {
    fn from(value: Gender) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: Gender,
    pub country: String,
    pub avatar: String,
    pub btc_address: String,
}

impl Student {
    pub fn avatar(&self) -> Avatar<'_> {
        Avatar::new(&self.avatar, &self.last_name)
    }

    pub fn to_form(&self) -> StudentForm {
        StudentForm {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            gender: self.gender,
            country: self.country.clone(),
            avatar: self.avatar.clone(),
            btc_address: self.btc_address.clone(),
        }
    }
}

impl Render for Student {
    fn render(&self) -> Markup {
        html! {
            (self.first_name) " " (self.last_name)
        }
    }
}

/// Everything about a student the user can edit - a student without its id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub gender: Gender,
    pub country: String,
    pub avatar: String,
    pub btc_address: String,
}

impl StudentForm {
    /// Checks what can be checked without asking the API.
    pub fn validate_locally(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if EmailAddress::from_str(self.email.trim()).is_err() {
            errors.insert("email", "Email is not a valid address");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Per-field messages, as the API sends them alongside a 422.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Body of a 422 from the API: `{"error": {"email": "..."}}`
#[derive(Debug, Deserialize)]
pub struct ValidationBody {
    pub error: FieldErrors,
}
