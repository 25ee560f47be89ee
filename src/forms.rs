//! Form parsing and validation.
//!
//! Validation never touches storage except to check that referenced rows
//! exist; failures come back as `FormErrors` for the template to render.

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use axum::Form;
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::groups;
use crate::error::{AppError, AppResult};
use crate::media::UploadedImage;

const REQUIRED: &str = "This field is required.";

/// Field-level error messages, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    errors: Vec<(&'static str, String)>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push((field, message.into()));
    }

    pub fn field(&self, name: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|(field, _)| *field == name)
            .map(|(_, message)| message.as_str())
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.errors.iter().any(|(field, _)| *field == name)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

// --- Posts ---

/// Raw contents of the create/edit post form.
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub text: String,
    pub group: String,
    pub image: Option<UploadedImage>,
    pub clear_image: bool,
}

/// A post form that passed validation.
#[derive(Debug, Clone)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<UploadedImage>,
    pub clear_image: bool,
}

/// Text-only post form, as sent without a file input.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostFields {
    text: String,
    group: String,
    #[serde(rename = "image-clear")]
    image_clear: Option<String>,
}

fn is_checked(value: &str) -> bool {
    !value.is_empty() && value != "off"
}

impl PostSubmission {
    /// Read the post form from either a multipart or a urlencoded body.
    pub async fn from_request(request: Request) -> AppResult<Self> {
        let is_multipart = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(request, &())
                .await
                .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
            return Self::from_multipart(multipart).await;
        }

        let Form(fields) = Form::<PostFields>::from_request(request, &())
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(PostSubmission {
            text: fields.text,
            group: fields.group,
            image: None,
            clear_image: fields.image_clear.as_deref().is_some_and(is_checked),
        })
    }

    /// Drain a multipart body into a submission. Unknown fields are ignored;
    /// a file input left empty by the browser counts as no upload.
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = PostSubmission::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" => form.text = field.text().await?,
                "group" => form.group = field.text().await?,
                "image-clear" => {
                    form.clear_image = is_checked(&field.text().await?);
                }
                "image" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;
                    if !file_name.is_empty() || !data.is_empty() {
                        form.image = Some(UploadedImage {
                            file_name,
                            content_type,
                            data,
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    pub fn validate(&self, conn: &Connection) -> AppResult<Result<ValidPost, FormErrors>> {
        let mut errors = FormErrors::default();

        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_id = match self.group.trim() {
            "" => None,
            raw => {
                let found = match raw.parse::<i64>() {
                    Ok(id) => groups::exists(conn, id)?.then_some(id),
                    Err(_) => None,
                };
                if found.is_none() {
                    errors.add(
                        "group",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                }
                found
            }
        };

        if let Some(image) = &self.image {
            for problem in image.problems() {
                errors.add("image", problem);
            }
        }

        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        Ok(Ok(ValidPost {
            text: text.to_string(),
            group_id,
            image: self.image.clone(),
            clear_image: self.clear_image,
        }))
    }

    pub fn selected_group(&self) -> Option<i64> {
        self.group.trim().parse().ok()
    }
}

// --- Comments ---

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let text = self.text.trim();
        if text.is_empty() {
            let mut errors = FormErrors::default();
            errors.add("text", REQUIRED);
            return Err(errors);
        }
        Ok(text.to_string())
    }
}

// --- Accounts ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();

        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if username.chars().count() > 150 {
            errors.add("username", "Ensure this value has at most 150 characters.");
        } else if !username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
        {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }

        let email = self.email.trim();
        if !email.is_empty() && !is_plausible_email(email) {
            errors.add("email", "Enter a valid email address.");
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        } else if self.password1.chars().count() < 8 {
            errors.add(
                "password1",
                "This password is too short. It must contain at least 8 characters.",
            );
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        } else if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: String,
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}
