/// Maps a stored photo reference to a displayable URL.
pub trait AvatarResolver: Send + Sync {
    fn resolve(&self, reference: Option<&str>) -> Option<String>;
}

/// Resolves bare references against an image CDN with a square face crop.
/// References that are already URLs pass through untouched.
#[derive(Debug, Clone)]
pub struct CdnAvatarResolver {
    base_url: Option<String>,
    size: u32,
}

impl CdnAvatarResolver {
    pub fn new(base_url: Option<String>, size: u32) -> Self {
        Self {
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            size,
        }
    }
}

impl AvatarResolver for CdnAvatarResolver {
    fn resolve(&self, reference: Option<&str>) -> Option<String> {
        let reference = reference.map(str::trim).filter(|r| !r.is_empty())?;

        if is_http_url(reference) {
            return Some(reference.to_string());
        }

        let base = self.base_url.as_deref()?;
        Some(format!(
            "{base}/c_fill,g_face,w_{size},h_{size},f_auto,q_auto/{reference}",
            size = self.size,
        ))
    }
}

fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}
