//! Deterministic extraction from JSON-LD and OpenGraph data, used when
//! no LLM credential is configured. Field precedence is fixed; anything
//! unparseable resolves to null/empty rather than an error.

use serde::Deserialize;
use serde_json::Value;

use eventdigest_common::{EnrichedStub, NormalizedEvent};

/// JSON-LD `location` comes in several shapes: a plain string, or a
/// Place object whose `name` or `address` carries the useful part.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocationShape {
    Text(String),
    Place {
        name: Option<String>,
        address: Option<AddressShape>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AddressShape {
    Text(String),
    Postal {
        #[serde(rename = "addressLocality")]
        locality: Option<String>,
    },
}

impl LocationShape {
    fn into_name(self) -> Option<String> {
        match self {
            Self::Text(text) => non_empty(text),
            Self::Place { name, address } => {
                if let Some(name) = name.and_then(non_empty) {
                    return Some(name);
                }
                match address? {
                    AddressShape::Text(text) => non_empty(text),
                    AddressShape::Postal { locality } => locality.and_then(non_empty),
                }
            }
        }
    }
}

/// `organizer`, `performer` entries: a plain string or an object with
/// a `name`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PersonShape {
    Text(String),
    Named { name: Option<String> },
}

impl PersonShape {
    fn into_name(self) -> Option<String> {
        match self {
            Self::Text(text) => non_empty(text),
            Self::Named { name } => name.and_then(non_empty),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PersonListShape {
    Many(Vec<PersonShape>),
    One(PersonShape),
}

impl PersonListShape {
    fn into_names(self) -> Vec<String> {
        match self {
            Self::Many(people) => people.into_iter().filter_map(PersonShape::into_name).collect(),
            Self::One(person) => person.into_name().into_iter().collect(),
        }
    }
}

/// JSON-LD `image`: a URL string, an ImageObject, or a list of either.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageShape {
    Text(String),
    Object { url: Option<String> },
    List(Vec<ImageShape>),
}

impl ImageShape {
    fn into_url(self) -> Option<String> {
        match self {
            Self::Text(url) => non_empty(url),
            Self::Object { url } => url.and_then(non_empty),
            Self::List(images) => images.into_iter().find_map(ImageShape::into_url),
        }
    }
}

/// Derive a normalized event from one enriched stub.
pub fn extract_event(item: &EnrichedStub) -> NormalizedEvent {
    let stub = &item.stub;
    let ld = item.json_ld.as_ref();

    let title = ld_string(ld, "name")
        .or_else(|| og(item, "og:title"))
        .unwrap_or_else(|| stub.title.clone());

    let location = decode::<LocationShape>(ld, "location").and_then(LocationShape::into_name);
    let organizer = decode::<PersonShape>(ld, "organizer").and_then(PersonShape::into_name);

    let speakers = decode::<PersonListShape>(ld, "performer")
        .or_else(|| decode::<PersonListShape>(ld, "performers"))
        .map(PersonListShape::into_names)
        .unwrap_or_default();

    let image_url = og(item, "og:image")
        .or_else(|| decode::<ImageShape>(ld, "image").and_then(ImageShape::into_url));

    let description = og(item, "og:description")
        .or_else(|| ld_string(ld, "description"))
        .unwrap_or_else(|| stub.description.clone());

    NormalizedEvent {
        title,
        // Dates pass through verbatim; the pipeline parses them later.
        date: ld_string(ld, "startDate"),
        end_date: ld_string(ld, "endDate"),
        location,
        // Inference-only fields stay empty without an LLM.
        topics: Vec::new(),
        event_type: None,
        level: None,
        language: None,
        url: stub.url.clone(),
        description,
        speakers,
        organizer,
        image_url,
    }
}

fn ld_string(ld: Option<&Value>, field: &str) -> Option<String> {
    ld?.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .and_then(non_empty)
}

fn decode<T: serde::de::DeserializeOwned>(ld: Option<&Value>, field: &str) -> Option<T> {
    serde_json::from_value(ld?.get(field)?.clone()).ok()
}

fn og(item: &EnrichedStub, property: &str) -> Option<String> {
    item.og_meta.get(property).cloned().and_then(non_empty)
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}
