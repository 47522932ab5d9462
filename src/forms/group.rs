use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::group::NewGroup;

use super::{check, FormErrors};

#[derive(Deserialize, Serialize, Validate, Debug, Default, Clone)]
pub struct GroupForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "Required. 200 characters or fewer."))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 50, message = "Required. 50 characters or fewer."))]
    pub slug: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub description: String,
}

impl GroupForm {
    pub fn clean(mut self) -> Result<NewGroup, FormErrors> {
        self.title = self.title.trim().to_owned();
        self.slug = self.slug.trim().to_owned();
        self.description = self.description.trim().to_owned();

        let mut errors = check(&self);
        if !self
            .slug
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            errors.add(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            );
        }
        errors.into_result()?;
        Ok(NewGroup {
            title: self.title,
            slug: self.slug,
            description: self.description,
        })
    }
}
