// src/core/wordlists.rs

//! Built-in wordlists for parameterized probes and a loader for user-supplied ones.

use std::path::Path;

use strum::{Display, EnumString};

use crate::core::errors::ConfigError;

/// How much of the built-in subdomain list the `subdomains` probe walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SubdomainMode {
    Quick,
    #[default]
    Default,
    Thorough,
}

const DEFAULT_SUBDOMAINS: &[&str] = &[
    // web
    "www", "web", "site", "host", "home", "portal", "gateway",
    // mail
    "mail", "smtp", "pop", "pop3", "imap", "webmail", "email", "mx", "exchange",
    // files
    "ftp", "sftp", "files", "upload", "download", "share", "storage", "backup",
    // nameservers
    "ns", "ns1", "ns2", "ns3", "ns4", "dns", "nameserver",
    // panels
    "cpanel", "whm", "panel", "control", "admin", "administrator", "manage",
    "autodiscover", "autoconfig", "wpad", "proxy",
    // development
    "dev", "development", "test", "testing", "qa", "stage", "staging",
    "demo", "sandbox", "beta", "alpha", "uat", "preprod",
    // api
    "api", "api1", "api2", "rest", "graphql", "ws", "websocket",
    "mobile", "m", "app", "apps", "ios", "android",
    "blog", "news", "forum", "chat", "wiki", "docs", "documentation",
    "shop", "store", "cart", "checkout", "payment", "pay",
    "media", "cdn", "static", "assets", "img", "images", "video", "stream",
    "help", "support", "ticket", "helpdesk", "faq", "kb", "knowledgebase",
    "vpn", "remote", "secure", "ssl", "tls", "cert", "auth", "sso", "oauth",
    "git", "gitlab", "github", "bitbucket", "svn", "repo", "repository",
    "jenkins", "ci", "cd", "build", "deploy", "pipeline", "travis",
    "db", "database", "mysql", "postgres", "postgresql", "mongo", "mongodb",
    "redis", "elastic", "elasticsearch", "cassandra",
    "status", "monitor", "monitoring", "stats", "statistics", "analytics",
    "metrics", "logs", "grafana", "prometheus", "kibana",
    "cloud", "aws", "azure", "gcp", "kubernetes", "k8s", "docker", "swarm",
    "sub", "subdomain", "internal", "private", "public", "external",
    "us", "eu", "asia", "uk", "de", "fr", "es", "it", "jp", "cn", "au",
    "east", "west", "north", "south", "central",
    "localhost", "dashboard", "console", "account", "my", "user", "client",
    "partner", "affiliate", "reseller", "corporate", "enterprise",
];

const DEFAULT_SRV_SERVICES: &[&str] = &[
    "_sip._tcp", "_sip._udp", "_sips._tcp",
    "_xmpp-server._tcp", "_xmpp-client._tcp",
    "_jabber._tcp", "_jabber-client._tcp",
    "_ldap._tcp", "_ldaps._tcp",
    "_kerberos._tcp", "_kerberos._udp",
    "_kpasswd._tcp", "_kpasswd._udp",
    "_caldav._tcp", "_caldavs._tcp",
    "_carddav._tcp", "_carddavs._tcp",
    "_imap._tcp", "_imaps._tcp",
    "_pop3._tcp", "_pop3s._tcp",
    "_smtp._tcp", "_submission._tcp",
    "_http._tcp", "_https._tcp",
    "_ftp._tcp", "_ftps._tcp",
    "_sftp._tcp", "_ssh._tcp",
    "_ntp._udp", "_nfs._tcp",
    "_autodiscover._tcp",
];

pub fn subdomains_for(mode: SubdomainMode) -> Vec<String> {
    let take = match mode {
        SubdomainMode::Quick => 20,
        SubdomainMode::Default => 40,
        SubdomainMode::Thorough => DEFAULT_SUBDOMAINS.len(),
    };
    DEFAULT_SUBDOMAINS.iter().take(take).map(|w| w.to_string()).collect()
}

pub fn default_srv_services() -> Vec<String> {
    DEFAULT_SRV_SERVICES.iter().map(|s| s.to_string()).collect()
}

/// Reads one entry per line, skipping blank lines and `#` comments.
pub fn load_wordlist(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Wordlist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_wordlist(&content))
}

fn parse_wordlist(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn modes_take_growing_prefixes() {
        assert_eq!(subdomains_for(SubdomainMode::Quick).len(), 20);
        assert_eq!(subdomains_for(SubdomainMode::Default).len(), 40);
        assert_eq!(subdomains_for(SubdomainMode::Thorough).len(), DEFAULT_SUBDOMAINS.len());
        assert_eq!(subdomains_for(SubdomainMode::Quick)[0], "www");
    }

    #[test]
    fn wordlist_skips_comments_and_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# header\nwww\n\n  api  \n#api2\nmail").unwrap();
        let words = load_wordlist(file.path()).unwrap();
        assert_eq!(words, vec!["www", "api", "mail"]);
    }

    #[test]
    fn missing_wordlist_is_a_config_error() {
        let err = load_wordlist(Path::new("/nonexistent/words.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::Wordlist { .. }));
    }

    #[test]
    fn mode_parses_from_cli_text() {
        assert_eq!("thorough".parse::<SubdomainMode>().unwrap(), SubdomainMode::Thorough);
    }
}
