//! Instance resolution
//!
//! Maps host aliases onto the hosted instances, probes standalone
//! installations for the API mount point and derives the WebSocket and
//! dashboard base URLs from whatever the user gave us.

use serde_json::Value;
use url::Url;

use crate::common::{Error, Result};

/// Instance assumed when no URL is given at all
pub const DEFAULT_INSTANCE: &str = "app.testrun.dev";

/// Path suffixes under which standalone installations mount the API
pub const KNOWN_SUFFIXES: &[&str] = &["", "/v1", "/results/v1"];

/// A hosted instance with fixed service URLs
#[derive(Debug, Clone, Copy)]
pub struct KnownInstance {
    pub api: &'static str,
    pub ws: &'static str,
    pub dashboard: &'static str,
}

/// Collapse the host aliases each instance is reachable under
fn canonical_host(host: &str) -> &str {
    match host {
        "api.testrun.dev" | "cloud.testrun.dev" => "app.testrun.dev",
        "api.testrun.io" | "cloud.testrun.io" => "app.testrun.io",
        other => other,
    }
}

/// Look up a hosted instance by any of its hosts
pub fn known_instance(host: &str) -> Option<KnownInstance> {
    match canonical_host(host) {
        "app.testrun.dev" => Some(KnownInstance {
            api: "https://api.testrun.dev",
            ws: "wss://websockets.testrun.dev",
            dashboard: "https://app.testrun.dev",
        }),
        "app.testrun.io" => Some(KnownInstance {
            api: "https://api.testrun.io",
            ws: "wss://websockets.testrun.io",
            dashboard: "https://app.testrun.io",
        }),
        _ => None,
    }
}

/// User-provided connection inputs, after merging flags over the config file
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub url: Option<String>,
    pub ws_url: Option<String>,
    pub dashboard_url: Option<String>,
    pub organization: Option<String>,
    pub environment: Option<String>,
    pub token: Option<String>,
}

/// Fully resolved connection endpoints
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub api_url: String,
    pub ws_url: String,
    pub dashboard_url: Option<String>,
    pub token: Option<String>,
    pub cloud: bool,
}

/// Force a URL into the given protocol family, keeping the secure bit
pub fn sanitize_url(url: &str, scheme: &str) -> String {
    let url = url.trim_end_matches('/');
    match url.find("://") {
        None => format!("{scheme}://{url}"),
        Some(idx) => {
            let current = &url[..idx];
            if current == scheme || (current.strip_suffix('s') == Some(scheme)) {
                url.to_string()
            } else {
                let secure = if current.ends_with('s') { "s" } else { "" };
                format!("{scheme}{secure}://{}", &url[idx + 3..])
            }
        }
    }
}

/// Resolve connection options into concrete endpoints
///
/// Known hosts (or the presence of cloud credentials) select cloud mode with
/// its organization/environment path prefix; anything else is treated as a
/// standalone installation and probed for its API mount point.
pub async fn resolve(options: &ConnectionOptions) -> Result<ConnectionConfig> {
    let api = sanitize_url(options.url.as_deref().unwrap_or(DEFAULT_INSTANCE), "http");
    let ws = sanitize_url(options.ws_url.as_deref().unwrap_or(&api), "ws");
    let dashboard = options
        .dashboard_url
        .as_deref()
        .map(|u| sanitize_url(u, "http"));

    let host = Url::parse(&api)?
        .host_str()
        .map(str::to_string)
        .unwrap_or_default();
    let detected = known_instance(&host);
    let cloud =
        detected.is_some() || options.organization.is_some() || options.environment.is_some();

    let mut api_url = detected.map(|i| i.api.to_string()).unwrap_or_else(|| api.clone());
    let mut ws_url = detected.map(|i| i.ws.to_string()).unwrap_or(ws);
    let mut dashboard_url = detected.map(|i| i.dashboard.to_string()).or(dashboard);

    if dashboard_url.is_none() {
        dashboard_url = infer_dashboard_url(&api_url);
    }

    if cloud {
        let (Some(org), Some(env)) = (&options.organization, &options.environment) else {
            return Err(Error::IncompleteCloudCredentials);
        };
        api_url = format!("{api_url}/organizations/{org}/environments/{env}/agent");
        ws_url = format!("{ws_url}/organizations/{org}/environments/{env}/agent");
        dashboard_url = dashboard_url
            .map(|d| format!("{d}/organization/{org}/environment/{env}/dashboard"));
    } else {
        (api_url, ws_url) = probe_standalone(&api, api_url, ws_url).await?;
    }

    Ok(ConnectionConfig {
        api_url,
        ws_url,
        dashboard_url,
        token: options.token.clone(),
        cloud,
    })
}

/// Find the API mount point of a standalone installation
///
/// Tries each known suffix until `{base}{suffix}/info` answers with valid
/// JSON, following redirects. The WebSocket base follows the resolved REST
/// base when it wasn't pointed at a different server explicitly.
async fn probe_standalone(
    original: &str,
    api_url: String,
    ws_url: String,
) -> Result<(String, String)> {
    let client = reqwest::Client::new();
    let mut last_error = String::from("no known API suffix responded");

    for suffix in KNOWN_SUFFIXES {
        let probe = format!("{api_url}{suffix}/info");
        match client.get(&probe).send().await {
            Ok(response) if response.status().is_success() => {
                let final_url = response.url().clone();
                match response.json::<Value>().await {
                    Ok(_) => {
                        let same = strip_scheme(&api_url) == strip_scheme(&ws_url);
                        let resolved = final_url
                            .as_str()
                            .trim_end_matches('/')
                            .strip_suffix("/info")
                            .unwrap_or(final_url.as_str())
                            .to_string();
                        let ws_url = if same {
                            sanitize_url(&resolved, "ws")
                        } else {
                            ws_url
                        };
                        return Ok((resolved, ws_url));
                    }
                    Err(error) => last_error = error.to_string(),
                }
            }
            Ok(response) => last_error = format!("unexpected status {}", response.status()),
            Err(error) => last_error = error.to_string(),
        }
    }

    Err(Error::connect(original, last_error))
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map(|(_, rest)| rest).unwrap_or(url)
}

/// Guess the dashboard URL from common API URL patterns
fn infer_dashboard_url(api_url: &str) -> Option<String> {
    if let Some(base) = api_url.strip_suffix("/results/v1") {
        return Some(base.to_string());
    }
    let (_, rest) = api_url.split_once("://")?;
    if rest.starts_with("api.") && !rest.contains('/') {
        return Some(api_url.replacen("//api.", "//app.", 1));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_adds_missing_scheme() {
        assert_eq!(sanitize_url("demo.example.com", "http"), "http://demo.example.com");
        assert_eq!(sanitize_url("demo.example.com", "ws"), "ws://demo.example.com");
    }

    #[test]
    fn sanitize_swaps_protocol_family_keeping_secure_bit() {
        assert_eq!(sanitize_url("https://demo.example.com", "ws"), "wss://demo.example.com");
        assert_eq!(sanitize_url("ws://demo.example.com", "http"), "http://demo.example.com");
    }

    #[test]
    fn sanitize_keeps_matching_scheme_and_strips_trailing_slashes() {
        assert_eq!(sanitize_url("wss://demo.example.com//", "ws"), "wss://demo.example.com");
        assert_eq!(sanitize_url("http://demo.example.com/", "http"), "http://demo.example.com");
    }

    #[test]
    fn aliases_resolve_to_the_same_instance() {
        let direct = known_instance("app.testrun.dev").unwrap();
        let api_alias = known_instance("api.testrun.dev").unwrap();
        let legacy_alias = known_instance("cloud.testrun.dev").unwrap();
        assert_eq!(direct.api, api_alias.api);
        assert_eq!(direct.api, legacy_alias.api);
        assert!(known_instance("selfhosted.example.com").is_none());
    }

    #[test]
    fn dashboard_inferred_from_results_suffix() {
        assert_eq!(
            infer_dashboard_url("https://ci.example.com/results/v1"),
            Some("https://ci.example.com".to_string())
        );
    }

    #[test]
    fn dashboard_inferred_from_api_subdomain() {
        assert_eq!(
            infer_dashboard_url("https://api.example.com"),
            Some("https://app.example.com".to_string())
        );
        assert_eq!(infer_dashboard_url("https://api.example.com/v1"), None);
        assert_eq!(infer_dashboard_url("https://ci.example.com"), None);
    }
}
