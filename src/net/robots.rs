// src/net/robots.rs
// =============================================================================
// The robots.txt gate, consulted once before the crawl starts.
//
// Only the parts that matter for "may I crawl this root?" are implemented:
// - groups are selected by User-agent (a group naming our agent wins over *)
// - Allow / Disallow lines are matched as path prefixes, first match wins
// - an empty Disallow allows everything
//
// A missing or unreadable robots.txt means crawling is allowed.
// =============================================================================

use tracing::{debug, info};
use url::Url;

use super::http::HttpClient;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    prefix: String,
}

#[derive(Debug, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

/// Parsed robots.txt, reduced to the rules for one user agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    rules: Vec<Rule>,
}

impl RobotsRules {
    pub fn parse(body: &str, user_agent: &str) -> Self {
        let groups = parse_groups(body);
        // "Mozilla/5.0 (X11...)" -> "mozilla"
        let agent_token = user_agent
            .split('/')
            .next()
            .unwrap_or(user_agent)
            .trim()
            .to_ascii_lowercase();

        let specific = groups.iter().find(|group| {
            group
                .agents
                .iter()
                .any(|agent| agent != "*" && !agent_token.is_empty() && agent_token.contains(agent.as_str()))
        });
        let fallback = groups.iter().find(|group| group.agents.iter().any(|a| a == "*"));

        RobotsRules {
            rules: specific.or(fallback).map(|g| g.rules.clone()).unwrap_or_default(),
        }
    }

    pub fn is_allowed(&self, path: &str) -> bool {
        self.rules
            .iter()
            .find(|rule| path.starts_with(rule.prefix.as_str()))
            .map_or(true, |rule| rule.allow)
    }
}

fn parse_groups(body: &str) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut collecting_agents = false;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                // Consecutive User-agent lines share one group
                if !collecting_agents {
                    groups.push(Group::default());
                    collecting_agents = true;
                }
                if let Some(group) = groups.last_mut() {
                    group.agents.push(value.to_ascii_lowercase());
                }
            }
            "allow" | "disallow" => {
                collecting_agents = false;
                if value.is_empty() {
                    continue;
                }
                if let Some(group) = groups.last_mut() {
                    group.rules.push(Rule {
                        allow: key == "allow",
                        prefix: normalize_path(value),
                    });
                }
            }
            _ => collecting_agents = false,
        }
    }

    groups
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Whether robots.txt on the root's host lets `user_agent` crawl the root.
pub async fn is_crawl_allowed(client: &HttpClient, root: &Url, user_agent: &str) -> bool {
    let Ok(robots_url) = root.join("/robots.txt") else {
        return true;
    };

    match client.get_page(&robots_url).await {
        Ok(page) => {
            let rules = RobotsRules::parse(&page.body, user_agent);
            let allowed = rules.is_allowed(root.path());
            debug!(url = %robots_url, allowed, "checked robots.txt");
            allowed
        }
        Err(e) => {
            info!(url = %robots_url, error = %e, "could not read robots.txt, assuming allowed");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::http::{HttpSettings, RetryPolicy};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UA: &str = "Mozilla/5.0 (X11; Linux x86_64)";

    #[test]
    fn test_star_group_disallow() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /private/\n", UA);
        assert!(!rules.is_allowed("/private/files/"));
        assert!(rules.is_allowed("/pub/"));
    }

    #[test]
    fn test_empty_disallow_allows_all() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow:\n", UA);
        assert!(rules.is_allowed("/anything"));
    }

    #[test]
    fn test_specific_agent_group_wins() {
        let body = "User-agent: *\nDisallow: /\n\nUser-agent: Mozilla\nAllow: /pub/\nDisallow: /\n";
        let rules = RobotsRules::parse(body, UA);
        assert!(rules.is_allowed("/pub/iso/"));
        assert!(!rules.is_allowed("/other/"));
    }

    #[test]
    fn test_other_agents_ignored() {
        let body = "User-agent: Googlebot\nDisallow: /\n";
        assert!(RobotsRules::parse(body, UA).is_allowed("/"));
    }

    #[test]
    fn test_shared_group_and_comments() {
        let body = "# rules\nUser-agent: a-bot\nUser-agent: *\nDisallow: secret # hidden\n";
        let rules = RobotsRules::parse(body, UA);
        assert!(!rules.is_allowed("/secret/x"));
    }

    fn client() -> HttpClient {
        HttpClient::new(&HttpSettings {
            retry: RetryPolicy {
                max_retries: 0,
                backoff: Duration::ZERO,
            },
            ..HttpSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_gate_reads_robots_from_root_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /pub/\n"))
            .mount(&server)
            .await;

        let root = Url::parse(&format!("{}/pub/", server.uri())).unwrap();
        assert!(!is_crawl_allowed(&client(), &root, UA).await);

        let other = Url::parse(&format!("{}/mirror/", server.uri())).unwrap();
        assert!(is_crawl_allowed(&client(), &other, UA).await);
    }

    #[tokio::test]
    async fn test_missing_robots_allows() {
        let server = MockServer::start().await;
        let root = Url::parse(&format!("{}/pub/", server.uri())).unwrap();
        assert!(is_crawl_allowed(&client(), &root, UA).await);
    }
}
