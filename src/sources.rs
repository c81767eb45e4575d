//! Refreshing the sponsor and contributor data files from upstream APIs.
//!
//! HTTP calls are kept apart from collection and merging, which are pure.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::logos::LogoOverrides;

/// One row of OpenCollective's `members/all.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(rename = "MemberId")]
    pub member_id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub profile: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub total_amount_donated: f64,
}

/// One row of GitHub's `/repos/{repo}/contributors`.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubContributor {
    pub id: u64,
    pub login: String,
    pub avatar_url: String,
    pub html_url: String,
    pub contributions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorEntry {
    pub name: String,
    pub logo: String,
    pub link: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorEntry {
    pub name: String,
    pub logo: String,
    pub link: String,
    pub count: u64,
}

/// Keeps the first entry per profile, drops inactive and non-paying members,
/// and sorts by donated amount, largest first.
pub fn collect_sponsors(members: Vec<Member>, overrides: &LogoOverrides) -> Vec<SponsorEntry> {
    let mut seen = HashSet::new();
    let mut sponsors: Vec<SponsorEntry> = members
        .into_iter()
        .filter(|m| seen.insert(m.profile.clone()) && m.is_active && m.total_amount_donated > 0.0)
        .map(|m| {
            let slug = m.profile.rsplit('/').next().unwrap_or_default().to_string();
            let logo = match overrides.get(&slug) {
                Some(custom) => custom.to_string(),
                None => format!("https://images.opencollective.com/{slug}/{}/logo.png", m.member_id),
            };
            let link = m
                .website
                .filter(|w| !w.trim().is_empty())
                .unwrap_or_else(|| m.profile.clone());
            SponsorEntry {
                name: m.name.unwrap_or(slug),
                logo,
                link,
                amount: m.total_amount_donated,
            }
        })
        .collect();
    sponsors.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    sponsors
}

/// Sums contributions per GitHub account across repositories, folds aliased
/// logins into their canonical login, and sorts by count, largest first.
/// Equal counts keep ascending account id order.
pub fn merge_contributors(
    lists: Vec<Vec<GithubContributor>>,
    aliases: &IndexMap<String, String>,
) -> Vec<ContributorEntry> {
    let mut by_id: BTreeMap<u64, ContributorEntry> = BTreeMap::new();
    for c in lists.into_iter().flatten() {
        by_id
            .entry(c.id)
            .and_modify(|e| e.count += c.contributions)
            .or_insert(ContributorEntry {
                name: c.login,
                logo: c.avatar_url,
                link: c.html_url,
                count: c.contributions,
            });
    }

    let (aliased, canonical): (Vec<_>, Vec<_>) = by_id
        .into_values()
        .partition(|e| aliases.get(&e.name).is_some_and(|to| *to != e.name));
    let mut by_login: IndexMap<String, ContributorEntry> =
        canonical.into_iter().map(|e| (e.name.clone(), e)).collect();
    for entry in aliased {
        let target = &aliases[&entry.name];
        match by_login.get_mut(target) {
            Some(existing) => existing.count += entry.count,
            None => {
                let renamed = ContributorEntry {
                    name: target.clone(),
                    ..entry
                };
                by_login.insert(target.clone(), renamed);
            }
        }
    }

    let mut merged: Vec<ContributorEntry> = by_login.into_values().collect();
    merged.sort_by(|a, b| b.count.cmp(&a.count));
    merged
}

pub async fn fetch_members(client: &reqwest::Client, url: &str) -> Result<Vec<Member>, SourceError> {
    get_json(client, url).await
}

/// Fetches the contributor lists of every repository concurrently, in `repos` order.
pub async fn fetch_contributors(
    client: &reqwest::Client,
    api: &str,
    repos: &[String],
) -> Result<Vec<Vec<GithubContributor>>, SourceError> {
    let handles: Vec<_> = repos
        .iter()
        .map(|repo| {
            let client = client.clone();
            let url = format!("{}/repos/{repo}/contributors?per_page=100", api.trim_end_matches('/'));
            tokio::spawn(async move { get_paged::<GithubContributor>(&client, &url).await })
        })
        .collect();

    let mut lists = Vec::with_capacity(handles.len());
    for handle in handles {
        let list = handle.await.map_err(|e| SourceError::Task(e.to_string()))??;
        lists.push(list);
    }
    Ok(lists)
}

async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T, SourceError> {
    let response = send(client, url).await?;
    response.json::<T>().await.map_err(|source| SourceError::Payload {
        url: url.to_string(),
        source,
    })
}

/// Upper bound on followed pages, 10000 contributors at `per_page=100`.
const MAX_PAGES: usize = 100;

/// Collects a paginated list by following `Link: <..>; rel="next"` headers.
async fn get_paged<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<Vec<T>, SourceError> {
    let mut items = Vec::new();
    let mut next = Some(url.to_string());
    let mut pages = 0;
    while let Some(url) = next.take() {
        if pages == MAX_PAGES {
            tracing::warn!(url, "page limit reached, list is truncated");
            break;
        }
        pages += 1;
        let response = send(client, &url).await?;
        next = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(next_page);
        let page: Vec<T> = response.json().await.map_err(|source| SourceError::Payload {
            url: url.clone(),
            source,
        })?;
        items.extend(page);
    }
    Ok(items)
}

fn next_page(link: &str) -> Option<String> {
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        params
            .split(';')
            .any(|param| param.trim() == r#"rel="next""#)
            .then(|| target.trim().trim_start_matches('<').trim_end_matches('>').to_string())
    })
}

async fn send(client: &reqwest::Client, url: &str) -> Result<reqwest::Response, SourceError> {
    tracing::info!(url, "fetching");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| SourceError::Request {
            url: url.to_string(),
            source,
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status,
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn members() -> Vec<Member> {
        serde_json::from_str(
            r#"[
                { "MemberId": 1, "name": "Acme", "profile": "https://opencollective.com/acme",
                  "website": "https://acme.test", "isActive": true, "totalAmountDonated": 500 },
                { "MemberId": 2, "name": "Globex", "profile": "https://opencollective.com/globex",
                  "website": null, "isActive": true, "totalAmountDonated": 2500.5, "role": "BACKER" },
                { "MemberId": 3, "name": "Acme again", "profile": "https://opencollective.com/acme",
                  "isActive": true, "totalAmountDonated": 9999 },
                { "MemberId": 4, "name": "Lapsed", "profile": "https://opencollective.com/lapsed",
                  "isActive": false, "totalAmountDonated": 100 },
                { "MemberId": 5, "name": "Free", "profile": "https://opencollective.com/free",
                  "isActive": true, "totalAmountDonated": 0 },
                { "MemberId": 6, "name": null, "profile": "https://opencollective.com/initech",
                  "website": "", "isActive": true, "totalAmountDonated": 500 }
            ]"#,
        )
        .unwrap()
    }

    fn contributor(id: u64, login: &str, contributions: u64) -> GithubContributor {
        GithubContributor {
            id,
            login: login.to_string(),
            avatar_url: format!("https://avatars.test/{id}"),
            html_url: format!("https://github.com/{login}"),
            contributions,
        }
    }

    #[test]
    fn collects_active_paying_sponsors() {
        let overrides: LogoOverrides = [("acme".to_string(), "sponsors/acme.svg".to_string())]
            .into_iter()
            .collect();
        let sponsors = collect_sponsors(members(), &overrides);

        assert_eq!(
            sponsors,
            [
                SponsorEntry {
                    name: "Globex".into(),
                    logo: "https://images.opencollective.com/globex/2/logo.png".into(),
                    link: "https://opencollective.com/globex".into(),
                    amount: 2500.5,
                },
                SponsorEntry {
                    name: "Acme".into(),
                    logo: "sponsors/acme.svg".into(),
                    link: "https://acme.test".into(),
                    amount: 500.0,
                },
                SponsorEntry {
                    name: "initech".into(),
                    logo: "https://images.opencollective.com/initech/6/logo.png".into(),
                    link: "https://opencollective.com/initech".into(),
                    amount: 500.0,
                },
            ]
        );
    }

    #[test]
    fn first_profile_entry_wins_even_when_inactive() {
        let list: Vec<Member> = serde_json::from_str(
            r#"[
                { "MemberId": 1, "profile": "p/x", "isActive": false, "totalAmountDonated": 10 },
                { "MemberId": 2, "profile": "p/x", "isActive": true, "totalAmountDonated": 10 }
            ]"#,
        )
        .unwrap();
        assert!(collect_sponsors(list, &LogoOverrides::default()).is_empty());
    }

    #[test]
    fn follows_the_next_link() {
        let link = r#"<https://api.github.com/repositories/1/contributors?per_page=100&page=2>; rel="next", <https://api.github.com/repositories/1/contributors?per_page=100&page=4>; rel="last""#;
        assert_eq!(
            next_page(link).as_deref(),
            Some("https://api.github.com/repositories/1/contributors?per_page=100&page=2")
        );

        let last = r#"<https://api.github.com/x?page=1>; rel="first", <https://api.github.com/x?page=3>; rel="prev""#;
        assert_eq!(next_page(last), None);
        assert_eq!(next_page(""), None);
    }

    #[test]
    fn sums_contributions_across_repos() {
        let lists = vec![
            vec![contributor(7, "zed", 3), contributor(2, "amy", 10)],
            vec![contributor(2, "amy", 5), contributor(9, "bo", 3)],
        ];
        let merged = merge_contributors(lists, &IndexMap::new());
        let rows: Vec<_> = merged.iter().map(|c| (c.name.as_str(), c.count)).collect();
        assert_eq!(rows, [("amy", 15), ("zed", 3), ("bo", 3)]);
        assert_eq!(merged[0].link, "https://github.com/amy");
    }

    #[test]
    fn folds_aliases_into_canonical_login() {
        let lists = vec![vec![
            contributor(1, "old-name", 4),
            contributor(2, "new-name", 5),
            contributor(3, "bot-account", 2),
            contributor(4, "other", 6),
        ]];
        let aliases: IndexMap<String, String> = [
            ("old-name".to_string(), "new-name".to_string()),
            ("bot-account".to_string(), "maintainer".to_string()),
        ]
        .into_iter()
        .collect();
        let merged = merge_contributors(lists, &aliases);
        let rows: Vec<_> = merged.iter().map(|c| (c.name.as_str(), c.count)).collect();
        assert_eq!(rows, [("new-name", 9), ("other", 6), ("maintainer", 2)]);
        assert_eq!(merged[2].link, "https://github.com/bot-account");
    }
}
