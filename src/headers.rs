// Typed Accept header used to negotiate the representation of the upscaled
// result: raw image bytes for image/* requests, a JSON data URL otherwise.

use axum::http;
use headers::{Header, HeaderName, HeaderValue};
use mime::Mime;

#[derive(Debug, Clone)]
pub struct Accept(pub Vec<Mime>);

impl Accept {
    /// Whether the client asked for the raw image representation: either the
    /// exact MIME type of the result or any image/* range, listed before a
    /// JSON preference.
    pub fn prefers_raw_image(&self, result_mime: &str) -> bool {
        for mime in &self.0 {
            if mime.type_() == mime::IMAGE {
                return mime.subtype() == mime::STAR
                    || result_mime == mime.essence_str();
            }
            if mime.type_() == mime::APPLICATION && mime.subtype() == mime::JSON {
                return false;
            }
        }
        false
    }
}

impl Header for Accept {
    fn name() -> &'static HeaderName {
        &http::header::ACCEPT
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let mut mime_types = Vec::new();
        for value in values {
            let list = value.to_str().map_err(|_| headers::Error::invalid())?;
            for entry in list.split(',') {
                let entry = entry.trim();
                if entry.is_empty() {
                    continue;
                }
                let mime: Mime = entry.parse().map_err(|_| headers::Error::invalid())?;
                mime_types.push(mime);
            }
        }

        if mime_types.is_empty() {
            return Err(headers::Error::invalid());
        }

        Ok(Accept(mime_types))
    }

    fn encode<E>(&self, values: &mut E)
    where
        E: Extend<HeaderValue>,
    {
        let joined = self
            .0
            .iter()
            .map(|mime| mime.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        if let Ok(value) = HeaderValue::from_str(&joined) {
            values.extend(std::iter::once(value));
        }
    }
}
