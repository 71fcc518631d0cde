// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Blocking REST client for XNAT-style servers.
//!
//! Logs in once per session through the `/data/JSESSION` endpoint using HTTP
//! basic authentication, then authenticates every further request with the
//! returned session cookie. Listings are requested as JSON result sets.

use crate::store::session::{
    Connector, ExperimentEntry, RemoteError, RemoteFile, RemoteNode, RemoteSession, ResourceEntry, Result,
    ScanEntry,
};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de::DeserializeOwned, Deserialize};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{copy, Write},
    path::Path,
    time::Duration,
};
use tracing::{debug, instrument};
use ureq::{Agent, AgentBuilder, Request, Response};

/// Connects to an XNAT-style server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConnector {
    server: String,
    user: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl RestConnector {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into().trim_end_matches('/').to_string(),
            user: None,
            password: None,
            timeout: Duration::from_secs(300),
        }
    }

    /// Log in with credentials instead of anonymously.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set timeout of individual requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }
}

impl Connector for RestConnector {
    type Session = RestSession;

    #[instrument(skip(self), fields(server = %self.server), level = "debug")]
    fn connect(&self) -> Result<Self::Session> {
        let agent = AgentBuilder::new().timeout(self.timeout).build();
        let mut session = RestSession {
            agent,
            server: self.server.clone(),
            cookie: None,
        };

        let url = session.url("/data/JSESSION");
        let mut request = session.agent.post(&url);
        if let (Some(user), Some(password)) = (&self.user, &self.password) {
            let token = STANDARD.encode(format!("{user}:{password}"));
            request = request.set("Authorization", &format!("Basic {token}"));
        }
        let response = request.call().map_err(|error| classify(error, "POST", &url))?;
        let token = response.into_string().map_err(|source| RemoteError::Io {
            url: url.clone(),
            source,
        })?;
        let token = token.trim();
        if token.is_empty() || token.contains(char::is_whitespace) {
            return Err(RemoteError::Malformed {
                url,
                reason: "login did not return a session token".into(),
            });
        }
        session.cookie = Some(token.to_string());
        debug!("logged into {}", self.server);

        Ok(session)
    }
}

/// Logged in session on an XNAT-style server.
#[derive(Debug)]
pub struct RestSession {
    agent: Agent,
    server: String,
    cookie: Option<String>,
}

impl RestSession {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server)
    }

    fn request(&self, method: &str, url: &str) -> Request {
        let request = self.agent.request(method, url);
        match &self.cookie {
            Some(cookie) => request.set("Cookie", &format!("JSESSIONID={cookie}")),
            None => request,
        }
    }

    fn call(&self, method: &'static str, path: &str, query: &[(&str, &str)]) -> Result<Response> {
        let url = self.url(path);
        let request = self.request(method, &url).query_pairs(query.iter().copied());
        request.call().map_err(|error| classify(error, method, &url))
    }

    fn json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        self.call("GET", path, &[("format", "json")])?
            .into_json()
            .map_err(|error| RemoteError::Malformed {
                url,
                reason: error.to_string(),
            })
    }

    fn rows<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let listing: Listing<T> = self.json(path)?;
        Ok(listing.result_set.result)
    }
}

impl RemoteSession for RestSession {
    fn disconnect(self) -> Result<()> {
        self.call("DELETE", "/data/JSESSION", &[])?;
        Ok(())
    }

    fn experiments(&self, project: &str) -> Result<Vec<ExperimentEntry>> {
        let url = self.url(&format!("/data/projects/{project}/experiments"));
        let response = self
            .call(
                "GET",
                &format!("/data/projects/{project}/experiments"),
                &[("format", "json"), ("columns", "ID,label,subject_label")],
            )?
            .into_json::<Listing<ExperimentRow>>()
            .map_err(|error| RemoteError::Malformed {
                url,
                reason: error.to_string(),
            })?;

        Ok(response
            .result_set
            .result
            .into_iter()
            .map(|row| ExperimentEntry {
                subject_label: row.subject_label,
                label: row.label,
            })
            .collect())
    }

    fn scans(&self, node: &RemoteNode) -> Result<Vec<ScanEntry>> {
        let mut scans = Vec::new();
        for row in self.rows::<ScanRow>(&format!("{}/scans", node.uri))? {
            let scan_uri = format!("{}/scans/{}", node.uri, row.id);
            let resources = self
                .rows::<ResourceRow>(&format!("{scan_uri}/resources"))?
                .into_iter()
                .map(|resource| resource.into_entry(&scan_uri))
                .collect();
            scans.push(ScanEntry {
                id: row.id,
                scan_type: row.scan_type,
                quality: non_empty(row.quality),
                resources,
            });
        }

        Ok(scans)
    }

    fn resources(&self, node: &RemoteNode) -> Result<Vec<ResourceEntry>> {
        Ok(self
            .rows::<ResourceRow>(&format!("{}/resources", node.uri))?
            .into_iter()
            .map(|resource| resource.into_entry(&node.uri))
            .collect())
    }

    fn fields(&self, node: &RemoteNode) -> Result<BTreeMap<String, String>> {
        let document: serde_json::Value = self.json(&node.uri)?;
        let mut fields = BTreeMap::new();
        let children = document["items"][0]["children"].as_array().cloned().unwrap_or_default();
        for child in children.iter().filter(|child| child["field"] == "fields/field") {
            for item in child["items"].as_array().into_iter().flatten() {
                let data = &item["data_fields"];
                if let (Some(name), Some(value)) = (data["name"].as_str(), data["field"].as_str()) {
                    fields.insert(name.to_string(), value.to_string());
                }
            }
        }

        Ok(fields)
    }

    fn ensure_node(&self, node: &RemoteNode) -> Result<()> {
        self.call("PUT", &node.uri, &[])?;
        Ok(())
    }

    fn file_digests(&self, resource: &str) -> Result<Vec<RemoteFile>> {
        Ok(self
            .rows::<FileRow>(&format!("{resource}/files"))?
            .into_iter()
            .map(|row| RemoteFile {
                uri: row.uri,
                digest: row.digest,
            })
            .collect())
    }

    fn download(&self, resource: &str, sink: &mut dyn Write) -> Result<()> {
        let path = format!("{resource}/files");
        let response = self.call("GET", &path, &[("format", "tar.gz")])?;
        copy(&mut response.into_reader(), sink).map_err(|source| RemoteError::Io {
            url: self.url(&path),
            source,
        })?;

        Ok(())
    }

    fn delete_resource(&self, resource: &str) -> Result<bool> {
        match self.call("DELETE", resource, &[("removeFiles", "true")]) {
            Ok(_) => Ok(true),
            Err(RemoteError::NotFound { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn create_resource(&self, resource: &str, format: &str) -> Result<()> {
        self.call("PUT", resource, &[("format", format)])?;
        Ok(())
    }

    fn upload(&self, resource: &str, source: &Path, remote_name: &str) -> Result<()> {
        let url = self.url(&format!("{resource}/files/{remote_name}"));
        let file = File::open(source).map_err(|error| RemoteError::Io {
            url: url.clone(),
            source: error,
        })?;
        self.request("PUT", &url)
            .query("inbody", "true")
            .query("overwrite", "true")
            .send(file)
            .map_err(|error| classify(error, "PUT", &url))?;

        Ok(())
    }

    fn put_field(&self, node: &RemoteNode, name: &str, value: &str) -> Result<()> {
        let key = format!("{}/fields/field[name={name}]/field", node.kind.field_namespace());
        self.call("PUT", &node.uri, &[(key.as_str(), value)])?;
        Ok(())
    }
}

fn classify(error: ureq::Error, method: &'static str, url: &str) -> RemoteError {
    match error {
        ureq::Error::Status(404, _) => RemoteError::NotFound { uri: url.into() },
        ureq::Error::Status(status, _) => RemoteError::Status {
            method,
            url: url.into(),
            status,
        },
        ureq::Error::Transport(transport) => RemoteError::Transport {
            url: url.into(),
            source: Box::new(transport),
        },
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

#[derive(Deserialize)]
struct Listing<T> {
    #[serde(rename = "ResultSet")]
    result_set: Rows<T>,
}

#[derive(Deserialize)]
struct Rows<T> {
    #[serde(rename = "Result", default = "Vec::new")]
    result: Vec<T>,
}

#[derive(Deserialize)]
struct ExperimentRow {
    label: String,
    subject_label: String,
}

#[derive(Deserialize)]
struct ScanRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "type", default)]
    scan_type: String,
    #[serde(default)]
    quality: Option<String>,
}

#[derive(Deserialize)]
struct ResourceRow {
    label: String,
    #[serde(default)]
    format: Option<String>,
}

impl ResourceRow {
    // INVARIANT: Address resources by label, never by numeric ID.
    fn into_entry(self, parent: &str) -> ResourceEntry {
        ResourceEntry {
            uri: format!("{parent}/resources/{}", self.label),
            label: self.label,
            format: non_empty(self.format),
        }
    }
}

#[derive(Deserialize)]
struct FileRow {
    #[serde(rename = "URI")]
    uri: String,
    #[serde(default)]
    digest: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_experiment_listing() -> anyhow::Result<()> {
        let listing: Listing<ExperimentRow> = serde_json::from_str(indoc! {r#"
            {"ResultSet": {"totalRecords": "2", "Result": [
                {"ID": "XNAT_E00001", "label": "S01_MR1", "subject_label": "S01"},
                {"ID": "XNAT_E00002", "label": "S02_MR1", "subject_label": "S02"}
            ]}}
        "#})?;

        let labels: Vec<(String, String)> = listing
            .result_set
            .result
            .into_iter()
            .map(|row| (row.subject_label, row.label))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("S01".to_string(), "S01_MR1".to_string()),
                ("S02".to_string(), "S02_MR1".to_string())
            ]
        );

        Ok(())
    }

    #[test]
    fn resources_addressed_by_label() -> anyhow::Result<()> {
        let row: ResourceRow = serde_json::from_str(r#"{"label": "NIFTI", "format": "", "xnat_abstractresource_id": "42"}"#)?;
        let entry = row.into_entry("/data/archive/projects/P/subjects/S/experiments/E/scans/1");
        assert_eq!(
            entry,
            ResourceEntry {
                label: "NIFTI".into(),
                format: None,
                uri: "/data/archive/projects/P/subjects/S/experiments/E/scans/1/resources/NIFTI".into(),
            }
        );

        Ok(())
    }

    #[test]
    fn missing_result_rows_mean_empty() -> anyhow::Result<()> {
        let listing: Listing<FileRow> = serde_json::from_str(r#"{"ResultSet": {"totalRecords": "0"}}"#)?;
        assert!(listing.result_set.result.is_empty());
        Ok(())
    }

    #[test]
    fn connector_trims_server() {
        let connector = RestConnector::new("https://xnat.example.org/");
        assert_eq!(connector.server(), "https://xnat.example.org");
    }
}
