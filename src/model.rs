use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionReport {
    pub fn connected(version: Option<String>) -> Self {
        Self {
            success: true,
            version,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            version: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddKind {
    Added,
    Duplicate,
}

/// Outcome of a single add request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<AddKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub redirect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AddResult {
    pub fn accepted(
        kind: AddKind,
        torrent_id: Option<i64>,
        hash_string: Option<String>,
        name: Option<String>,
    ) -> Self {
        Self {
            success: true,
            kind: Some(kind),
            torrent_id,
            hash_string,
            name,
            redirect: false,
            upload_url: None,
            error: None,
        }
    }

    pub fn redirect(upload_url: String) -> Self {
        Self {
            success: true,
            kind: None,
            torrent_id: None,
            hash_string: None,
            name: None,
            redirect: true,
            upload_url: Some(upload_url),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: None,
            torrent_id: None,
            hash_string: None,
            name: None,
            redirect: false,
            upload_url: None,
            error: Some(error.into()),
        }
    }

    pub fn summary(&self) -> String {
        if !self.success {
            let reason = self.error.as_deref().unwrap_or("unknown error");
            return format!("Add failed: {reason}");
        }
        if self.redirect {
            return "Opened the web UI upload page".to_string();
        }
        let label = self.name.as_deref().unwrap_or("torrent");
        match self.kind {
            Some(AddKind::Duplicate) => format!("Torrent already present ({label})"),
            _ => format!("Torrent queued ({label})"),
        }
    }
}
