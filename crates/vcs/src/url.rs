/// Parsed repository location for browse URL synthesis.
///
/// Recognizes `https://host/owner/repo(.git)` and `git@host:owner/repo(.git)`
/// forms. URL synthesis only works for hosts with a known web UI; everything
/// else yields `None` from the helpers without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLink {
    pub host: String,
    pub owner: String,
    pub repo: String,
}

const WEB_HOSTS: [&str; 2] = ["github.com", "gitlab.com"];

impl RepoLink {
    pub fn parse(url: &str) -> Option<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        let rest = if let Some(rest) = trimmed.strip_prefix("https://") {
            rest.to_string()
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            rest.to_string()
        } else if let Some(rest) = trimmed.strip_prefix("git@") {
            rest.replacen(':', "/", 1)
        } else {
            return None;
        };

        let mut parts = rest.split('/');
        let host = parts.next()?.to_string();
        let owner = parts.next()?.to_string();
        let repo = parts.next()?.trim_end_matches(".git").to_string();
        if host.is_empty() || owner.is_empty() || repo.is_empty() {
            return None;
        }
        Some(Self { host, owner, repo })
    }

    fn has_web_ui(&self) -> bool {
        WEB_HOSTS.contains(&self.host.as_str())
    }

    /// Browse URL for a tag's tree.
    pub fn browse_url(&self, tag: &str) -> Option<String> {
        if !self.has_web_ui() {
            return None;
        }
        Some(format!(
            "https://{}/{}/{}/tree/{tag}",
            self.host, self.owner, self.repo
        ))
    }

    /// View URL for one file at a tag.
    pub fn file_url(&self, tag: &str, path: &str) -> Option<String> {
        if !self.has_web_ui() {
            return None;
        }
        Some(format!(
            "https://{}/{}/{}/blob/{tag}/{path}",
            self.host, self.owner, self.repo
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_https_and_ssh_forms() {
        let https = RepoLink::parse("https://github.com/acme/provider-foo.git").unwrap();
        let ssh = RepoLink::parse("git@github.com:acme/provider-foo.git").unwrap();
        assert_eq!(https, ssh);
        assert_eq!(https.repo, "provider-foo");
    }

    #[test]
    fn browse_urls_for_known_hosts() {
        let link = RepoLink::parse("https://github.com/acme/foo").unwrap();
        assert_eq!(
            link.browse_url("v1.2.3").unwrap(),
            "https://github.com/acme/foo/tree/v1.2.3"
        );
        assert_eq!(
            link.file_url("v1.2.3", "docs/index.md").unwrap(),
            "https://github.com/acme/foo/blob/v1.2.3/docs/index.md"
        );
    }

    #[test]
    fn unknown_host_has_no_web_access() {
        let link = RepoLink::parse("https://git.internal.example/acme/foo").unwrap();
        assert_eq!(link.browse_url("v1"), None);
        assert_eq!(link.file_url("v1", "x"), None);
    }

    #[test]
    fn rejects_unparsable() {
        assert_eq!(RepoLink::parse("not a url"), None);
        assert_eq!(RepoLink::parse("https://github.com/only-owner"), None);
    }
}
