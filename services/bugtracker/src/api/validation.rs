//! Field-level request validation.
//!
//! A [`Validator`] collects every problem in a payload before anything hits the
//! store, so clients get all field errors in one 400 response.
use crate::api::error::{ApiError, api_field_errors};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::str::FromStr;
use url::{Host, Url};
use validator::ValidateEmail;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// How strictly missing fields are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// POST: required fields must be present.
    Create,
    /// PUT: same requirements as create.
    Replace,
    /// PATCH: any subset is fine.
    Partial,
}

#[derive(Debug)]
pub struct Validator {
    mode: Mode,
    errors: BTreeMap<String, Vec<String>>,
}

impl Validator {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            errors: BTreeMap::new(),
        }
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn non_field_error(&mut self, message: impl Into<String>) {
        self.error(NON_FIELD_ERRORS, message);
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Records a missing-field error unless the mode is partial.
    pub fn required<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() && self.mode != Mode::Partial {
            self.error(field, REQUIRED);
        }
        value
    }

    /// Required, non-blank text.
    pub fn text(&mut self, field: &str, value: Option<String>) -> Option<String> {
        let value = self.required(field, value)?;
        self.non_blank(field, value)
    }

    /// Optional text that must not be blank when given.
    pub fn optional_text(&mut self, field: &str, value: Option<String>) -> Option<String> {
        self.non_blank(field, value?)
    }

    fn non_blank(&mut self, field: &str, value: String) -> Option<String> {
        if value.trim().is_empty() {
            self.error(field, BLANK);
            return None;
        }
        Some(value)
    }

    /// Syntax check plus a dotted domain (or `localhost`).
    pub fn email(&mut self, field: &str, value: Option<String>) -> Option<String> {
        let value = self.text(field, value)?;
        let dotted = value
            .rsplit_once('@')
            .is_some_and(|(_, domain)| domain.contains('.') || domain == "localhost");
        if !dotted || !value.as_str().validate_email() {
            self.error(field, "Enter a valid email address.");
            return None;
        }
        Some(value)
    }

    /// Required choice; the message for an unknown value comes from the enum.
    pub fn choice<T>(&mut self, field: &str, value: Option<String>) -> Option<T>
    where
        T: FromStr<Err = String>,
    {
        let value = self.required(field, value)?;
        self.parse_choice(field, &value)
    }

    pub fn optional_choice<T>(&mut self, field: &str, value: Option<String>) -> Option<T>
    where
        T: FromStr<Err = String>,
    {
        let value = value?;
        self.parse_choice(field, &value)
    }

    fn parse_choice<T>(&mut self, field: &str, value: &str) -> Option<T>
    where
        T: FromStr<Err = String>,
    {
        match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(message) => {
                self.error(field, message);
                None
            }
        }
    }

    /// `YYYY-MM-DD` date.
    pub fn date(&mut self, field: &str, value: Option<String>) -> Option<NaiveDate> {
        let value = self.required(field, value)?;
        match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                self.error(
                    field,
                    "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
                );
                None
            }
        }
    }

    /// Required integer in `0..=i32::MAX`.
    pub fn non_negative(&mut self, field: &str, value: Option<i64>) -> Option<i32> {
        let value = self.required(field, value)?;
        if value < 0 {
            self.error(field, "Ensure this value is greater than or equal to 0.");
            return None;
        }
        match i32::try_from(value) {
            Ok(value) => Some(value),
            Err(_) => {
                self.error(field, "Ensure this value is less than or equal to 2147483647.");
                None
            }
        }
    }

    /// Optional absolute http(s) URL; `Some(None)` clears it.
    pub fn url(&mut self, field: &str, value: Option<Option<String>>) -> Option<Option<String>> {
        match value {
            Some(Some(url)) if url.trim().is_empty() => Some(None),
            Some(Some(url)) => {
                if is_web_url(&url) {
                    Some(Some(url))
                } else {
                    self.error(field, "Enter a valid URL.");
                    None
                }
            }
            other => other,
        }
    }

    /// Optional path below the media root; absolute paths and `..` are refused.
    pub fn media_path(
        &mut self,
        field: &str,
        value: Option<Option<String>>,
    ) -> Option<Option<String>> {
        match value {
            Some(Some(path)) if path.trim().is_empty() => Some(None),
            Some(Some(path)) => {
                let escapes = path.starts_with('/')
                    || path.starts_with('\\')
                    || path.split(['/', '\\']).any(|part| part == "..");
                if escapes {
                    self.error(field, "Enter a path relative to the media root.");
                    return None;
                }
                Some(Some(path))
            }
            other => other,
        }
    }

    /// Turns collected errors into a 400.
    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(api_field_errors(self.errors))
        }
    }
}

/// `http`/`https` with a dotted domain, `localhost`, or an IP address.
fn is_web_url(value: &str) -> bool {
    let Ok(parsed) = Url::parse(value) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match parsed.host() {
        Some(Host::Domain(domain)) => domain.contains('.') || domain == "localhost",
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        None => false,
    }
}

pub fn missing_pk(pk: i64) -> String {
    format!("Invalid pk \"{pk}\" - object does not exist.")
}

pub fn missing_username(username: &str) -> String {
    format!("Object with username={username} does not exist.")
}
