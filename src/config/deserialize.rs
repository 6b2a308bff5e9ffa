// ABOUTME: Custom serde deserializers for validated config fields.
// ABOUTME: Handles app names and image references.

use serde::Deserialize;

use crate::types::{AppName, ImageRef};

pub fn deserialize_app_name<'de, D>(deserializer: D) -> Result<AppName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    AppName::new(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_image_ref<'de, D>(deserializer: D) -> Result<ImageRef, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ImageRef::parse(&s).map_err(serde::de::Error::custom)
}
